//! Auxiliary top-level sections: peers, resolvers, mailers, embedded Lua
//! scripts, variables and templates.

use crate::error::SourceLocation;
use crate::ir::Value;
use serde::{Deserialize, Serialize};

/// Member of a `peers` cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub name: String,
    pub address: String,
    pub port: i64,
}

/// `peers` section: stick-table replication cluster.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Peers {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peers: Vec<PeerEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nameserver {
    pub name: String,
    pub address: String,
    pub port: i64,
}

/// `resolvers` section: upstream DNS resolution policy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Resolvers {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<Nameserver>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_payload_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_retries: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_nx: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_valid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_obsolete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_refused: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_other: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_resolve: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_retry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_resolv_conf: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailerEntry {
    pub name: String,
    pub address: String,
    pub port: i64,
}

/// `mailers` section: SMTP relays for email alerts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mailers {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_mail: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mailers: Vec<MailerEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LuaSource {
    Inline,
    File,
}

/// An embedded script: either inline body text (extracted to a file by
/// the CLI) or a path reference. Script content is passed through
/// verbatim, never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuaScript {
    pub name: String,
    pub source_type: LuaSource,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

/// A `let`-bound variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

/// A named parameter bag spread into entities by `@name`. Parameter order
/// is source order; later templates win over earlier ones during merge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<(String, Value)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl Template {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}
