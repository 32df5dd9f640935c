//! The `global` section: process-wide settings.

use crate::error::SourceLocation;
use crate::ir::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `log` target line: `log /dev/log local0 info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogTarget {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_level: Option<String>,
}

/// Runtime API socket: `stats socket /var/run/haproxy.sock level admin`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsSocket {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
}

/// 51Degrees device detection inputs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FiftyOneDegrees {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_name_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<i64>,
}

/// DeviceAtlas device detection inputs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceAtlas {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties_cookie: Option<String>,
}

/// WURFL device detection inputs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Wurfl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub information_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub information_list_separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub useragent_priority: Option<String>,
}

/// The `global` section. Everything optional: absence means the directive
/// was not specified and is not emitted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Global {
    // Process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_worker: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pidfile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chroot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_stop_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zero_warning: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_dumpable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_check: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub busy_polling: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_cfg_parser_pause: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mworker_max_reloads: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setcap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ulimit_n: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonkey: Option<i64>,

    // Limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxconn: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxconnrate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxsessrate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxsslrate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxpipes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fd_hard_limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxzlibmem: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxcomprate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxcompcpuusage: Option<i64>,
    /// Emitted with explicit state: `strict-limits on` / `off`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict_limits: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbproc: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbthread: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_groups: Option<i64>,
    /// Emitted with explicit state: `numa-cpu-mapping on` / `off`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numa_cpu_mapping: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread_checks: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_spread_checks: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_blocked_traffic_after: Option<String>,

    // Logging
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_targets: Vec<LogTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_send_hostname: Option<String>,

    // SSL defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crt_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuers_chain_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_default_bind_ciphers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_default_bind_ciphersuites: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssl_default_bind_options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_default_bind_curves: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_default_bind_sigalgs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_default_bind_client_sigalgs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_default_server_ciphers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_default_server_ciphersuites: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_default_server_curves: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_default_server_sigalgs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_default_server_client_sigalgs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_dh_param_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_engine: Option<String>,
    /// Bare keyword when true, absent when false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_mode_async: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_server_verify: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_security_level: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_provider_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_propquery: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_load_extra_del_ext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_load_extra_files: Option<String>,

    // Device detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiftyone_degrees: Option<FiftyOneDegrees>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviceatlas: Option<DeviceAtlas>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wurfl: Option<Wurfl>,

    // Runtime API
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stats_sockets: Vec<StatsSocket>,

    // Server state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_state_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_state_file: Option<String>,

    // Environment manipulation, in source order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setenv: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presetenv: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resetenv: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unsetenv: Vec<String>,

    // CPU pinning, in source order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cpu_map: Vec<(String, String)>,

    /// Verbatim payload of `unix-bind` (`mode 660 user haproxy ...`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unix_bind: Option<String>,

    /// Open-ended `tune.*` / `profiling.*` / `httpclient.*` / `debug.*`
    /// knobs. Keys keep their native spelling; values keep their DSL type
    /// and are rendered per directive convention by the serializer.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tuning: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}
