//! Frontend / backend / listen sections.
//!
//! The three section kinds share most of their directive surface, so the
//! shared part lives in `ProxySettings` and the role-specific parts in
//! `FrontendFacet` / `BackendFacet`. A `listen` carries both facets.

use crate::error::{SourceLocation, ValidationError};
use crate::ir::defaults::{EmailAlert, PersistRdpCookie};
use crate::ir::rules::{Rule, RuleLoop, UseBackend, UseServer};
use crate::ir::server::{Server, ServerLoop, ServerTemplate};
use crate::ir::Bind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Proxy operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Http,
    Tcp,
    Health,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Http => "http",
            Mode::Tcp => "tcp",
            Mode::Health => "health",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Mode::Http),
            "tcp" => Ok(Mode::Tcp),
            "health" => Ok(Mode::Health),
            other => Err(ValidationError::new(format!(
                "invalid mode '{other}': expected http, tcp or health"
            ))),
        }
    }
}

/// Load-balancing algorithm. Parameterized algorithms keep their payload
/// (`hdr(host)`, `url_param userid`) in the string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance(pub String);

impl Balance {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub(crate) const KNOWN_BALANCE_ALGORITHMS: &[&str] = &[
    "roundrobin",
    "static-rr",
    "leastconn",
    "first",
    "source",
    "uri",
    "url_param",
    "hdr",
    "random",
    "rdp-cookie",
];

/// Timeout directives shared by defaults and proxy sections. Durations
/// are stored verbatim and never normalized.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_keep_alive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_fin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_fin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tarpit: Option<String>,
}

impl Timeouts {
    pub fn is_empty(&self) -> bool {
        self == &Timeouts::default()
    }
}

/// A named ACL. `criterion`/`values` may arrive via an `@template`
/// spread, recorded in `template_refs` until expansion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Acl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criterion: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

/// Health-check expectation: `expect: !rstatus "^5.."`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expect {
    #[serde(default)]
    pub negated: bool,
    pub kind: ExpectKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectKind {
    Status(i64),
    String(String),
    Rstring(String),
    Rstatus(String),
}

/// Structured health-check block; serialized to `option httpchk` /
/// `http-check send` / `http-check expect` lines.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthCheck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<Expect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

/// `compression { algo: "gzip" type: [...] }`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Compression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algo: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offload: Option<bool>,
}

/// Embedded statistics page configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_version: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureDirection {
    Request,
    Response,
}

impl CaptureDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureDirection::Request => "request",
            CaptureDirection::Response => "response",
        }
    }
}

/// `declare capture request len 64`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclareCapture {
    pub direction: CaptureDirection,
    pub length: i64,
}

/// Stream filters (`filter` directive). One variant per filter kind the
/// target understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Filter {
    Compression,
    Spoe {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        engine: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config: Option<String>,
    },
    Cache {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Trace {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    BwlimIn {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_limit: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_period: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        period: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table: Option<String>,
    },
    BwlimOut {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_limit: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_period: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        period: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table: Option<String>,
    },
}

/// Directive surface shared by frontend, backend and listen sections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProxySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxconn: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlog: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullconn: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_format_sd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_log_format: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acls: Vec<Acl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_request_rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_response_rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_after_response_rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tcp_request_rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tcp_response_rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quic_initial_rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_loops: Vec<RuleLoop>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stick_tables: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<Compression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_alert: Option<EmailAlert>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_rdp_cookie: Option<PersistRdpCookie>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub force_persist: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_persist: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errorloc: BTreeMap<i64, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errorloc302: BTreeMap<i64, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errorloc303: BTreeMap<i64, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errorfile: BTreeMap<i64, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errorfiles: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_refs: Vec<String>,
}

/// Frontend-only directives (also present on listens).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrontendFacet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<Bind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_backend: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub use_backends: Vec<UseBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monitor_net: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monitor_fail: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub declare_captures: Vec<DeclareCapture>,
}

/// Backend-only directives (also present on listens).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BackendFacet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Balance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_balance_factor: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_server: Option<Server>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_templates: Vec<ServerTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_loops: Vec<ServerLoop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_check_rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tcp_check_rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_reuse: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retry_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_send_name_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_server_state_from_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_state_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub use_servers: Vec<UseServer>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frontend {
    pub name: String,
    #[serde(default)]
    pub settings: ProxySettings,
    #[serde(default)]
    pub front: FrontendFacet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Backend {
    pub name: String,
    #[serde(default)]
    pub settings: ProxySettings,
    #[serde(default)]
    pub back: BackendFacet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Listen {
    pub name: String,
    #[serde(default)]
    pub settings: ProxySettings,
    #[serde(default)]
    pub front: FrontendFacet,
    #[serde(default)]
    pub back: BackendFacet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}
