//! Process-wide format registry.
//!
//! Parser implementations declare a format name and the file extensions
//! they claim; clients look parsers up by name or by input path. The
//! table is populated once at startup (the built-in DSL parser is
//! registered on first use) and is read-only afterwards.

use crate::error::{ParseError, ValidationWarning};
use crate::ir::ConfigIR;
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// A front-end that can turn source text into a lowered IR.
pub trait ConfigParser: Send + Sync {
    fn format_name(&self) -> &'static str;
    fn extensions(&self) -> &'static [&'static str];
    fn description(&self) -> &'static str;
    /// Parse and lower. Grammar and lowering problems surface as
    /// `ParseError`; advisories accumulate in `warnings`.
    fn parse(
        &self,
        source: &str,
        file: &str,
        warnings: &mut Vec<ValidationWarning>,
    ) -> Result<ConfigIR, ParseError>;
}

/// The built-in DSL front-end.
pub struct DslParser;

impl ConfigParser for DslParser {
    fn format_name(&self) -> &'static str {
        "dsl"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["hap", "dsl", "gantry"]
    }

    fn description(&self) -> &'static str {
        "Declarative load-balancer DSL"
    }

    fn parse(
        &self,
        source: &str,
        file: &str,
        warnings: &mut Vec<ValidationWarning>,
    ) -> Result<ConfigIR, ParseError> {
        let node = crate::parser::parse_source(source, file)?;
        crate::lower::lower(node, warnings)
    }
}

/// Summary row for `--list-formats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatInfo {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub description: &'static str,
}

static REGISTRY: Lazy<RwLock<Vec<Arc<dyn ConfigParser>>>> =
    Lazy::new(|| RwLock::new(vec![Arc::new(DslParser)]));

/// Register an additional parser. Meant for startup wiring; later
/// registrations are visible to subsequent lookups.
pub fn register(parser: Arc<dyn ConfigParser>) {
    REGISTRY.write().expect("format registry poisoned").push(parser);
}

pub fn by_name(name: &str) -> Option<Arc<dyn ConfigParser>> {
    REGISTRY
        .read()
        .expect("format registry poisoned")
        .iter()
        .find(|p| p.format_name() == name)
        .cloned()
}

pub fn for_path(path: &Path) -> Option<Arc<dyn ConfigParser>> {
    let extension = path.extension()?.to_str()?;
    REGISTRY
        .read()
        .expect("format registry poisoned")
        .iter()
        .find(|p| p.extensions().contains(&extension))
        .cloned()
}

pub fn formats() -> Vec<FormatInfo> {
    REGISTRY
        .read()
        .expect("format registry poisoned")
        .iter()
        .map(|p| FormatInfo {
            name: p.format_name(),
            extensions: p.extensions(),
            description: p.description(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_dsl_parser_is_registered() {
        assert!(by_name("dsl").is_some());
        assert!(by_name("nonexistent").is_none());
    }

    #[test]
    fn lookup_by_path_extension() {
        assert!(for_path(Path::new("config.hap")).is_some());
        assert!(for_path(Path::new("config.toml")).is_none());
        assert!(for_path(Path::new("noextension")).is_none());
    }

    #[test]
    fn formats_lists_the_builtin() {
        let formats = formats();
        assert!(formats.iter().any(|f| f.name == "dsl"));
    }

    #[test]
    fn dsl_parser_lowers_source() {
        let parser = by_name("dsl").unwrap();
        let mut warnings = Vec::new();
        let ir = parser
            .parse(
                "config demo { global { maxconn: 1000 } }",
                "demo.hap",
                &mut warnings,
            )
            .unwrap();
        assert_eq!(ir.name, "demo");
        assert_eq!(ir.global.unwrap().maxconn, Some(1000));
    }
}
