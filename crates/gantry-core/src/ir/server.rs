//! Upstream server records, server templates and deferred server loops.

use crate::error::SourceLocation;
use crate::ir::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `server` line. Also reused for `default-server`, whose name is
/// ignored. Unset fields are simply not emitted; the free-form `options`
/// map carries less common knobs and is emitted in key order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Server {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,

    // Health checking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rise: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fall: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_sni: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_send_proxy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_proto: Option<String>,

    // Agent checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_check: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_inter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_send: Option<String>,

    // Capacity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxconn: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minconn: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxqueue: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reuse: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_max_conn: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_purge_delay: Option<String>,

    // TLS towards the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_verify: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sni: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alpn: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crl_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ciphers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curves: Option<String>,

    // PROXY protocol
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_proxy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_proxy_v2: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slowstart: Option<String>,

    // DNS resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolvers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_prefer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_addr: Option<String>,

    // Error policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_marked_down: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_marked_up: Option<String>,

    // Protocol plumbing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proto: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tfo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usesrc: Option<String>,

    // Identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redir: Option<String>,

    // State
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<bool>,

    /// Less common knobs, emitted in key order after the typed fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

/// `server-template web 5 web-{id}.example.com:8080 ...`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerTemplate {
    pub prefix: String,
    pub count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    /// Trailing server flags, same payload as a `server` line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Box<Server>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

/// Loop iterable descriptor, kept until the unroller runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopIterable {
    /// Inclusive numeric range `a..b`.
    Range(i64, i64),
    List(Vec<Value>),
}

/// A deferred `for` loop whose body declares servers. Expanded servers
/// are appended after the statically declared ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerLoop {
    pub var: String,
    pub iterable: LoopIterable,
    pub body: Vec<Server>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}
