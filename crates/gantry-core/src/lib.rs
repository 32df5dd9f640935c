//! gantry-core: a compiler from a declarative load-balancer DSL to
//! native HAProxy configuration text.
//!
//! The pipeline is a fixed sequence of pure transformations:
//!
//! 1. lex/parse the source to a concrete syntax tree
//! 2. lower the tree to the [`ir::ConfigIR`] record
//! 3. resolve `env(...)` calls and `${...}` interpolation
//! 4. expand `@name` template spreads
//! 5. unroll `for` loops
//! 6. validate referential and modal integrity
//! 7. serialize to the native text format
//!
//! The core performs no I/O: it receives already-loaded strings and
//! returns strings. Callers (the CLI) handle files, logging setup and
//! exit codes. Two invocations on the same input produce byte-identical
//! output.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod lower;
pub mod parser;
pub mod registry;
pub mod transform;
pub mod validate;

pub use codegen::{GeneratorOptions, HaproxyGenerator};
pub use error::{
    CodeGenerationError, ParseError, SourceLocation, TranslateError, ValidationError,
    ValidationWarning,
};
pub use ir::ConfigIR;

use ir::LuaSource;
use tracing::{debug, info};

/// The result of a full translation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// The emitted native configuration.
    pub output: String,
    /// Inline scripts to extract: (script name, verbatim body).
    pub lua_files: Vec<(String, String)>,
    /// Non-fatal advisories collected across all stages.
    pub warnings: Vec<ValidationWarning>,
}

/// Transform and validate a lowered IR (from any registered front-end),
/// returning the final IR. Warnings from earlier stages accumulate into
/// the same list.
pub fn transform_and_validate(
    ir: ConfigIR,
    warnings: &mut Vec<ValidationWarning>,
) -> Result<ConfigIR, TranslateError> {
    // Unused-definition advisories need the pre-transform IR, where
    // spreads and markers are still visible.
    warnings.extend(validate::unused_definition_warnings(&ir));

    let ir = transform::run_all(ir, warnings)?;
    warnings.extend(validate::validate(&ir)?);
    Ok(ir)
}

/// Serialize a validated IR, collecting inline scripts for extraction.
pub fn generate(
    ir: &ConfigIR,
    warnings: Vec<ValidationWarning>,
    options: GeneratorOptions,
) -> Result<Translation, TranslateError> {
    let output = HaproxyGenerator::with_options(options).generate(ir)?;
    let lua_files = ir
        .lua_scripts
        .iter()
        .filter(|s| s.source_type == LuaSource::Inline)
        .map(|s| (s.name.clone(), s.content.clone()))
        .collect();

    info!(
        config = %ir.name,
        bytes = output.len(),
        warnings = warnings.len(),
        "translation complete"
    );
    Ok(Translation {
        output,
        lua_files,
        warnings,
    })
}

/// Parse, transform and validate, returning the final IR without
/// serializing. Used by `--validate`.
pub fn parse_and_validate(
    source: &str,
    file: &str,
) -> Result<(ConfigIR, Vec<ValidationWarning>), TranslateError> {
    let mut warnings = Vec::new();

    let node = parser::parse_source(source, file)?;
    let ir = lower::lower(node, &mut warnings)?;
    debug!(config = %ir.name, "lowered configuration");

    let ir = transform_and_validate(ir, &mut warnings)?;
    Ok((ir, warnings))
}

/// Run the whole pipeline with default serializer options.
pub fn translate(source: &str, file: &str) -> Result<Translation, TranslateError> {
    translate_with(source, file, GeneratorOptions::default())
}

/// Run the whole pipeline, controlling serializer options (notably the
/// Lua extraction directory referenced by emitted `lua-load` lines).
pub fn translate_with(
    source: &str,
    file: &str,
    options: GeneratorOptions,
) -> Result<Translation, TranslateError> {
    let (ir, warnings) = parse_and_validate(source, file)?;
    generate(&ir, warnings, options)
}
