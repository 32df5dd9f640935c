//! The `defaults` section and the email-alert / persistence payloads it
//! shares with proxy sections.

use crate::error::SourceLocation;
use crate::ir::proxy::{Mode, Timeouts};
use serde::{Deserialize, Serialize};

/// `email-alert` block: where and at which level to send mail on state
/// changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmailAlert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub myhostname: Option<String>,
}

/// `persist rdp-cookie` with an optional custom cookie name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PersistRdpCookie {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<i64>,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_format_sd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_log_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_alert: Option<EmailAlert>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_rdp_cookie: Option<PersistRdpCookie>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}
