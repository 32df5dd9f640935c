//! Intermediate representation of a translated configuration.
//!
//! The IR is a single rooted record (`ConfigIR`) owning every sub-entity.
//! It is strictly a tree: cross references (`default_backend`,
//! `use_backend`, `use-server` targets) are stored as names and resolved
//! only by the validator. Every field is optional unless the section
//! cannot exist without it; `None` means "not specified", which is
//! distinct from an explicit default.

mod bind;
mod defaults;
mod global;
mod proxy;
mod rules;
mod sections;
mod server;
mod value;

pub use bind::Bind;
pub use defaults::{Defaults, EmailAlert, PersistRdpCookie};
pub use global::{
    DeviceAtlas, FiftyOneDegrees, Global, LogTarget, StatsSocket, Wurfl,
};
pub use proxy::{
    Acl, Backend, BackendFacet, Balance, Compression, DeclareCapture, CaptureDirection, Expect,
    ExpectKind, Filter, Frontend, FrontendFacet, HealthCheck, Listen, Mode, ProxySettings,
    StatsConfig, Timeouts,
};
pub(crate) use proxy::KNOWN_BALANCE_ALGORITHMS;
pub use rules::{Condition, Rule, RuleList, RuleLoop, UseBackend, UseServer};
pub use sections::{
    LuaScript, LuaSource, Mailers, MailerEntry, Nameserver, PeerEntry, Peers, Resolvers, Template,
    Variable,
};
pub use server::{LoopIterable, Server, ServerLoop, ServerTemplate};
pub use value::Value;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root of the IR tree. Created by lowering, rewritten by each
/// transformer in turn, then read by the validator and the serializer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigIR {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<Global>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Defaults>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frontends: Vec<Frontend>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backends: Vec<Backend>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listens: Vec<Listen>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peers: Vec<Peers>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolvers: Vec<Resolvers>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mailers: Vec<Mailers>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, Variable>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, Template>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub health_check_templates: BTreeMap<String, Template>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lua_scripts: Vec<LuaScript>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
}

impl ConfigIR {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Backend names visible to `use_backend` / `default_backend`
    /// references (listens answer to both roles).
    pub fn backend_names(&self) -> impl Iterator<Item = &str> {
        self.backends
            .iter()
            .map(|b| b.name.as_str())
            .chain(self.listens.iter().map(|l| l.name.as_str()))
    }
}
