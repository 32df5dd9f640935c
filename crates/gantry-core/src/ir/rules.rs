//! Rule records: HTTP/TCP processing rules, routing rules, and the
//! deferred rule loops the unroller expands.
//!
//! All rule kinds share one shape: an action tag, positional arguments,
//! named parameters in source order, and an optional condition. Order
//! within a proxy is preserved verbatim from the source.

use crate::error::SourceLocation;
use crate::ir::server::LoopIterable;
use serde::{Deserialize, Serialize};

/// `if acl` / `unless acl` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// True for `unless`.
    #[serde(default)]
    pub negated: bool,
    pub expr: String,
}

impl Condition {
    pub fn if_(expr: impl Into<String>) -> Self {
        Self {
            negated: false,
            expr: expr.into(),
        }
    }

    pub fn unless(expr: impl Into<String>) -> Self {
        Self {
            negated: true,
            expr: expr.into(),
        }
    }

    pub fn keyword(&self) -> &'static str {
        if self.negated {
            "unless"
        } else {
            "if"
        }
    }
}

/// One processing rule (`http-request deny if blocked`,
/// `tcp-request content accept`, `http-check expect status 200`, ...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Rule {
    /// Canonical hyphenated action name (`set-header`, `deny`, ...).
    pub action: String,
    /// Positional arguments in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Named parameters in source order; emitted as `key value` pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl Rule {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }
}

/// `use_backend target if acl`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseBackend {
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

/// `use-server server if acl`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseServer {
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

/// Which rule list a deferred loop feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleList {
    HttpRequest,
    HttpResponse,
    HttpAfterResponse,
    TcpRequest,
    TcpResponse,
    HttpCheck,
    TcpCheck,
}

/// A deferred `for` loop whose body declares rules for one rule list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleLoop {
    pub var: String,
    pub iterable: LoopIterable,
    pub list: RuleList,
    pub body: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}
