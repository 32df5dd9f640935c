//! Listening socket records.

use crate::error::SourceLocation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `bind` line: an address plus socket/TLS options. Options without a
/// value (`accept-proxy`, `transparent`, `defer-accept`, `strict-sni`,
/// `allow-0rtt`, ...) are stored with an empty value and emitted bare.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Bind {
    /// `host:port`, `*:port`, UNIX socket path or abns@ address.
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alpn: Vec<String>,
    /// Remaining socket options in source-independent key order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl Bind {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }
}
