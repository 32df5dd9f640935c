//! Scalar and composite values carried by variables and template
//! parameter bags.

use serde::{Deserialize, Serialize};

/// A DSL value. Variables hold these until the resolver renders them into
/// the string-typed IR fields that reference them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Duration literal preserved verbatim (`30s`, `500ms`).
    Duration(String),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
    /// Unevaluated `env(NAME, DEFAULT?)` call. Resolved against the
    /// process environment when the variable table is built.
    Env {
        name: String,
        default: Option<Box<Value>>,
    },
}

impl Value {
    /// Canonical string rendition used for `${...}` substitution:
    /// booleans become `true`/`false`, numbers their decimal form,
    /// durations stay verbatim.
    pub fn render(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Bool(b) => b.to_string(),
            Value::Duration(d) => d.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::render)
                .collect::<Vec<_>>()
                .join(","),
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| format!("{k}={}", v.render()))
                .collect::<Vec<_>>()
                .join(","),
            Value::Env { name, .. } => format!("env({name})"),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Str(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Duration(s) => Some(s),
            _ => None,
        }
    }

    /// True if the rendered form still contains an interpolation marker.
    pub fn has_markers(&self) -> bool {
        match self {
            Value::Str(s) => s.contains("${"),
            Value::List(items) => items.iter().any(Value::has_markers),
            Value::Map(entries) => entries.iter().any(|(_, v)| v.has_markers()),
            Value::Env { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_scalars() {
        assert_eq!(Value::Int(8080).render(), "8080");
        assert_eq!(Value::Bool(true).render(), "true");
        assert_eq!(Value::Bool(false).render(), "false");
        assert_eq!(Value::Duration("30s".into()).render(), "30s");
        assert_eq!(Value::Str("x".into()).render(), "x");
    }

    #[test]
    fn renders_whole_floats_with_decimal() {
        assert_eq!(Value::Float(2.0).render(), "2.0");
        assert_eq!(Value::Float(1.5).render(), "1.5");
    }

    #[test]
    fn marker_detection() {
        assert!(Value::Str("${a}".into()).has_markers());
        assert!(!Value::Str("plain".into()).has_markers());
        assert!(Value::Env {
            name: "X".into(),
            default: None
        }
        .has_markers());
    }
}
