//! Error taxonomy for the translation pipeline.
//!
//! Every stage reports failures through one of three fatal error kinds
//! (parse, validation, code generation) plus a non-fatal warning type.
//! Errors carry the source location where they were detected; locations
//! originate in the lexer and are propagated by every later stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in the DSL source text.
///
/// `line` and `column` are 1-based. `length` is the token length in
/// characters when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            length: None,
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

fn located(loc: &Option<SourceLocation>, msg: &str) -> String {
    match loc {
        Some(loc) => format!("{loc}: {msg}"),
        None => msg.to_string(),
    }
}

/// Grammar violation, lexical error, undefined variable reference,
/// unresolvable interpolation, cyclic variable reference, or malformed
/// loop iterable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", located(.location, .message))]
pub struct ParseError {
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    pub fn at(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location: Some(location),
        }
    }
}

/// Referential violation, duplicate identifier, mode/directive
/// incompatibility, out-of-range numeric, or invalid health-check
/// parameter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", located(.location, .message))]
pub struct ValidationError {
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    pub fn at(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location: Some(location),
        }
    }
}

/// Serializer invariant violation. Should never fire once validation has
/// succeeded; if it does, it is a bug in the pipeline itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", located(.location, .message))]
pub struct CodeGenerationError {
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl CodeGenerationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }
}

/// Non-fatal advisory produced by the semantic validator and the
/// transformers. Accumulated and returned alongside the validated IR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl ValidationWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    pub fn at(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location: Some(location),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{loc}: Warning: {}", self.message),
            None => write!(f, "Warning: {}", self.message),
        }
    }
}

/// Umbrella error for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    CodeGeneration(#[from] CodeGenerationError),
}

impl TranslateError {
    /// The source location attached to the underlying error, if any.
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            TranslateError::Parse(e) => e.location.as_ref(),
            TranslateError::Validation(e) => e.location.as_ref(),
            TranslateError::CodeGeneration(e) => e.location.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_location_display() {
        let loc = SourceLocation::new("test.hap", 10, 5);
        assert_eq!(loc.to_string(), "test.hap:10:5");
    }

    #[test]
    fn source_location_with_length() {
        let loc = SourceLocation::new("config.hap", 20, 10).with_length(5);
        assert_eq!(loc.file, "config.hap");
        assert_eq!(loc.line, 20);
        assert_eq!(loc.column, 10);
        assert_eq!(loc.length, Some(5));
    }

    #[test]
    fn parse_error_without_location() {
        let err = ParseError::new("Invalid syntax");
        assert_eq!(err.to_string(), "Invalid syntax");
    }

    #[test]
    fn parse_error_with_location() {
        let err = ParseError::at(
            "Unexpected token",
            SourceLocation::new("config.hap", 15, 20),
        );
        assert_eq!(err.to_string(), "config.hap:15:20: Unexpected token");
    }

    #[test]
    fn validation_error_with_location() {
        let err = ValidationError::at("Backend not found", SourceLocation::new("test.hap", 25, 5));
        assert_eq!(err.to_string(), "test.hap:25:5: Backend not found");
    }

    #[test]
    fn warning_display() {
        let warning = ValidationWarning::new("backend 'x' has no servers defined");
        assert_eq!(
            warning.to_string(),
            "Warning: backend 'x' has no servers defined"
        );
        let located =
            ValidationWarning::at("Minor issue", SourceLocation::new("test.hap", 20, 10));
        assert_eq!(located.to_string(), "test.hap:20:10: Warning: Minor issue");
    }

    #[test]
    fn translate_error_wraps_kinds() {
        let err: TranslateError = ParseError::new("boom").into();
        assert!(matches!(err, TranslateError::Parse(_)));
        let err: TranslateError = ValidationError::new("bad ref").into();
        assert!(matches!(err, TranslateError::Validation(_)));
    }
}
