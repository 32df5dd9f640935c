//! Command-line front-end for the gantry compiler.
//!
//! The core is I/O-free; this crate owns file reading/writing, logging
//! setup, Lua script extraction and exit codes: 0 on success, 1 on any
//! pipeline error, 2 when the input file is missing.

use anyhow::Context;
use clap::Parser;
use gantry_core::{registry, GeneratorOptions, TranslateError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_NO_INPUT: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "gantry")]
#[command(version)]
#[command(about = "Compile a declarative load-balancer DSL to native HAProxy configuration")]
#[command(after_help = "Examples:\n  gantry site.hap -o haproxy.cfg\n  gantry site.hap --validate\n  gantry --list-formats")]
pub struct Args {
    /// Input configuration file
    pub input: Option<PathBuf>,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Force a specific input format instead of detecting by extension
    #[arg(long)]
    pub format: Option<String>,

    /// List available input formats and exit
    #[arg(long)]
    pub list_formats: bool,

    /// Parse and validate only, emit nothing
    #[arg(long)]
    pub validate: bool,

    /// Verbose progress output
    #[arg(short, long)]
    pub verbose: bool,

    /// Debug output (IR summary)
    #[arg(long)]
    pub debug: bool,

    /// Directory for extracted inline Lua scripts
    #[arg(long)]
    pub lua_dir: Option<PathBuf>,
}

/// Run the CLI. Normal output goes to `out`; diagnostics go to stderr.
pub fn run(args: &Args, out: &mut dyn Write) -> i32 {
    match run_inner(args, out) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            EXIT_ERROR
        }
    }
}

fn run_inner(args: &Args, out: &mut dyn Write) -> anyhow::Result<i32> {
    if args.list_formats {
        writeln!(out, "Available Input Formats:")?;
        for format in registry::formats() {
            writeln!(
                out,
                "  {:<10} {:<24} (extensions: {})",
                format.name,
                format.description,
                format.extensions.join(", ")
            )?;
        }
        return Ok(EXIT_OK);
    }

    let Some(input) = &args.input else {
        eprintln!("Error: no input file given");
        return Ok(EXIT_NO_INPUT);
    };
    if !input.exists() {
        eprintln!("Error: input file not found: {}", input.display());
        return Ok(EXIT_NO_INPUT);
    }

    if args.verbose {
        writeln!(out, "Reading config from: {}", input.display())?;
    }
    let source = std::fs::read_to_string(input)
        .with_context(|| format!("cannot read {}", input.display()))?;

    let parser = match &args.format {
        Some(name) => match registry::by_name(name) {
            Some(parser) => parser,
            None => {
                eprintln!("Error: unknown format '{name}'");
                return Ok(EXIT_ERROR);
            }
        },
        None => registry::for_path(input)
            .or_else(|| registry::by_name("dsl"))
            .expect("builtin dsl parser"),
    };
    if args.verbose {
        writeln!(out, "Using parser: {}", parser.format_name())?;
    }

    let file = input.display().to_string();
    let mut warnings = Vec::new();
    let ir = match parser.parse(&source, &file, &mut warnings) {
        Ok(ir) => ir,
        Err(err) => {
            report_error(&err.into());
            return Ok(EXIT_ERROR);
        }
    };
    if args.verbose {
        writeln!(out, "Parsed successfully: {}", ir.name)?;
    }

    let ir = match gantry_core::transform_and_validate(ir, &mut warnings) {
        Ok(ir) => ir,
        Err(err) => {
            report_error(&err);
            return Ok(EXIT_ERROR);
        }
    };

    for warning in &warnings {
        eprintln!("{warning}");
    }

    if args.debug {
        writeln!(out, "IR Debug Info:")?;
        writeln!(out, "  Frontends: {}", ir.frontends.len())?;
        writeln!(out, "  Backends: {}", ir.backends.len())?;
        writeln!(out, "  Listens: {}", ir.listens.len())?;
        writeln!(out, "  Variables: {}", ir.variables.len())?;
        writeln!(out, "  Templates: {}", ir.templates.len())?;
        match serde_json::to_string_pretty(&ir) {
            Ok(snapshot) => debug!(target: "gantry::ir", %snapshot, "IR snapshot"),
            Err(err) => debug!("IR snapshot unavailable: {err}"),
        }
    }

    if args.validate {
        writeln!(out, "Configuration is valid")?;
        return Ok(EXIT_OK);
    }

    let lua_dir = resolve_lua_dir(args);
    let options = GeneratorOptions {
        lua_dir: lua_dir.display().to_string(),
    };
    let translation = match gantry_core::generate(&ir, warnings, options) {
        Ok(translation) => translation,
        Err(err) => {
            report_error(&err);
            return Ok(EXIT_ERROR);
        }
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &translation.output)
                .with_context(|| format!("cannot write {}", path.display()))?;
            if args.verbose {
                writeln!(out, "Configuration written to: {}", path.display())?;
            }
        }
        None => {
            out.write_all(translation.output.as_bytes())?;
        }
    }

    if !translation.lua_files.is_empty() {
        std::fs::create_dir_all(&lua_dir)
            .with_context(|| format!("cannot create {}", lua_dir.display()))?;
        for (name, body) in &translation.lua_files {
            let path = lua_dir.join(format!("{name}.lua"));
            std::fs::write(&path, body)
                .with_context(|| format!("cannot write {}", path.display()))?;
        }
        if args.verbose {
            writeln!(out, "Lua scripts written to: {}", lua_dir.display())?;
        }
    }

    Ok(EXIT_OK)
}

/// `--lua-dir` wins; otherwise scripts land in `lua/` next to the output
/// file, or `lua/` in the working directory when emitting to stdout.
fn resolve_lua_dir(args: &Args) -> PathBuf {
    if let Some(dir) = &args.lua_dir {
        return dir.clone();
    }
    match &args.output {
        Some(output) => output
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("lua"),
        None => PathBuf::from("lua"),
    }
}

/// Errors with a location already carry the `path:line:col:` prefix;
/// bare messages get an `Error:` prefix instead.
fn report_error(err: &TranslateError) {
    if err.location().is_some() {
        eprintln!("{err}");
    } else {
        eprintln!("Error: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_config(dir: &Path) -> PathBuf {
        let path = dir.join("test.hap");
        fs::write(
            &path,
            r#"
config test {
    frontend web {
        bind *:80
        default_backend: servers
    }

    backend servers {
        balance: roundrobin
        servers {
            server web1 {
                address: "10.0.1.1"
                port: 8080
                check: true
            }
        }
    }
}
"#,
        )
        .unwrap();
        path
    }

    fn run_to_string(args: &[&str]) -> (i32, String) {
        let args = Args::parse_from(args);
        let mut out = Vec::new();
        let code = run(&args, &mut out);
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn translate_to_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let (code, output) = run_to_string(&["gantry", config.to_str().unwrap()]);
        assert_eq!(code, EXIT_OK);
        assert!(output.contains("frontend web"));
        assert!(output.contains("backend servers"));
        assert!(output.contains("bind *:80"));
    }

    #[test]
    fn translate_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let out_path = dir.path().join("haproxy.cfg");
        let (code, _) = run_to_string(&[
            "gantry",
            config.to_str().unwrap(),
            "-o",
            out_path.to_str().unwrap(),
        ]);
        assert_eq!(code, EXIT_OK);
        let contents = fs::read_to_string(&out_path).unwrap();
        assert!(contents.contains("frontend web"));
        assert!(contents.contains("server web1 10.0.1.1:8080 check"));
    }

    #[test]
    fn validate_only_emits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let (code, output) =
            run_to_string(&["gantry", config.to_str().unwrap(), "--validate"]);
        assert_eq!(code, EXIT_OK);
        assert!(output.contains("Configuration is valid"));
        assert!(!output.contains("frontend web"));
    }

    #[test]
    fn missing_input_exits_2() {
        let (code, _) = run_to_string(&["gantry", "/definitely/not/here.hap"]);
        assert_eq!(code, EXIT_NO_INPUT);
    }

    #[test]
    fn unknown_format_exits_1() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let (code, _) = run_to_string(&[
            "gantry",
            config.to_str().unwrap(),
            "--format",
            "invalid_format",
        ]);
        assert_eq!(code, EXIT_ERROR);
    }

    #[test]
    fn invalid_config_exits_1() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.hap");
        fs::write(
            &path,
            "config broken { frontend web { bind *:80\n default_backend: missing } }",
        )
        .unwrap();
        let (code, _) = run_to_string(&["gantry", path.to_str().unwrap()]);
        assert_eq!(code, EXIT_ERROR);
    }

    #[test]
    fn list_formats() {
        let (code, output) = run_to_string(&["gantry", "--list-formats"]);
        assert_eq!(code, EXIT_OK);
        assert!(output.contains("Available Input Formats:"));
        assert!(output.contains("dsl"));
    }

    #[test]
    fn verbose_mode_narrates() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let out_path = dir.path().join("haproxy.cfg");
        let (code, output) = run_to_string(&[
            "gantry",
            config.to_str().unwrap(),
            "-o",
            out_path.to_str().unwrap(),
            "--verbose",
        ]);
        assert_eq!(code, EXIT_OK);
        assert!(output.contains("Reading config from:"));
        assert!(output.contains("Using parser:"));
        assert!(output.contains("Parsed successfully:"));
    }

    #[test]
    fn debug_mode_summarizes_ir() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let out_path = dir.path().join("haproxy.cfg");
        let (code, output) = run_to_string(&[
            "gantry",
            config.to_str().unwrap(),
            "-o",
            out_path.to_str().unwrap(),
            "--debug",
        ]);
        assert_eq!(code, EXIT_OK);
        assert!(output.contains("IR Debug Info:"));
        assert!(output.contains("Frontends: 1"));
        assert!(output.contains("Backends: 1"));
    }

    #[test]
    fn lua_scripts_extracted_to_custom_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scripted.hap");
        fs::write(
            &path,
            r#"
config scripted {
    lua {
        inline hello {
            core.Info("test")
        }
    }

    frontend web {
        bind *:80
    }
}
"#,
        )
        .unwrap();
        let lua_dir = dir.path().join("scripts");
        let out_path = dir.path().join("haproxy.cfg");
        let (code, _) = run_to_string(&[
            "gantry",
            path.to_str().unwrap(),
            "-o",
            out_path.to_str().unwrap(),
            "--lua-dir",
            lua_dir.to_str().unwrap(),
        ]);
        assert_eq!(code, EXIT_OK);
        let script = fs::read_to_string(lua_dir.join("hello.lua")).unwrap();
        assert!(script.contains("core.Info"));
        let config_out = fs::read_to_string(&out_path).unwrap();
        assert!(config_out.contains(&format!("lua-load {}/hello.lua", lua_dir.display())));
    }
}
