//! Concrete syntax tree produced by the parser.
//!
//! The tree mirrors the source shape closely: sections are generic blocks,
//! directives keep their argument lists in source order, and template
//! spreads / loops survive as explicit nodes. Lowering (see `lower`) maps
//! this tree onto the typed IR.

use crate::error::SourceLocation;

/// A parsed `config NAME { ... }` unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigNode {
    pub name: String,
    pub items: Vec<Item>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Directive(Directive),
    Block(Block),
    /// Bare `@name` at item position.
    Spread { name: String, location: SourceLocation },
    For(ForNode),
    /// `let NAME = value`
    Let(LetNode),
    /// `import "path"`
    Import { path: String, location: SourceLocation },
    /// Raw-bodied block inside `lua { ... }`.
    RawBlock(RawBlock),
}

/// `key: value...` or `key arg arg...` (positional form).
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub key: String,
    pub args: Vec<Arg>,
    pub location: SourceLocation,
}

/// `key [args] { items }`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub key: String,
    pub args: Vec<Arg>,
    pub body: Vec<Item>,
    pub location: SourceLocation,
}

/// `inline NAME { <verbatim text> }`
#[derive(Debug, Clone, PartialEq)]
pub struct RawBlock {
    pub key: String,
    pub name: String,
    pub raw: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForNode {
    pub var: String,
    pub iterable: ValueNode,
    pub body: Vec<Item>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetNode {
    pub name: String,
    pub value: ValueNode,
    pub location: SourceLocation,
}

/// A directive argument: either a positional value or a `name: value` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(ValueNode),
    Named(String, ValueNode),
}

impl Arg {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Arg::Positional(v) => &v.location,
            Arg::Named(_, v) => &v.location,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueNode {
    pub kind: ValueKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Duration(String),
    /// Bare word (addresses, enum-ish values, ACL criteria).
    Ident(String),
    Range(i64, i64),
    List(Vec<ValueNode>),
    Map(Vec<(String, ValueNode)>),
    /// `env("NAME" [, default])`
    EnvCall {
        name: String,
        default: Option<Box<ValueNode>>,
    },
    /// `@name` used in value position (ACL template spread).
    TemplateRef(String),
    /// `word(arg)` call form, e.g. `rdp-cookie("custom")`.
    Call { name: String, arg: Option<Box<ValueNode>> },
}

impl ValueNode {
    /// Best-effort rendition as plain text, used when a directive argument
    /// is consumed as a bare token (addresses, criteria, conditions).
    pub fn as_text(&self) -> String {
        match &self.kind {
            ValueKind::Str(s) => s.clone(),
            ValueKind::Int(n) => n.to_string(),
            ValueKind::Float(n) => n.to_string(),
            ValueKind::Bool(b) => b.to_string(),
            ValueKind::Duration(s) => s.clone(),
            ValueKind::Ident(s) => s.clone(),
            ValueKind::Range(a, b) => format!("{a}..{b}"),
            ValueKind::List(items) => items
                .iter()
                .map(|v| v.as_text())
                .collect::<Vec<_>>()
                .join(","),
            ValueKind::Map(_) => "{..}".into(),
            ValueKind::EnvCall { name, .. } => format!("env({name})"),
            ValueKind::TemplateRef(name) => format!("@{name}"),
            ValueKind::Call { name, arg } => match arg {
                Some(a) => format!("{name}({})", a.as_text()),
                None => format!("{name}()"),
            },
        }
    }
}
