//! Lowering of the `global` section.

use super::{
    as_bool, as_duration, as_int, as_string, as_string_list, is_tuning_key, item_location,
    norm_key, single, to_ir_value, unknown_directive,
};
use crate::ast::{Arg, Block, Directive, Item, ValueKind};
use crate::error::ParseError;
use crate::ir::{Global, LogTarget, StatsSocket};

pub(super) fn lower_global(block: &Block) -> Result<Global, ParseError> {
    let mut g = Global {
        location: Some(block.location.clone()),
        ..Default::default()
    };

    for item in &block.body {
        match item {
            Item::Directive(d) => lower_global_directive(&mut g, d)?,
            Item::Block(b) => match norm_key(&b.key).as_str() {
                "stats-socket" => g.stats_sockets.push(lower_stats_socket(b)?),
                other => {
                    return Err(unknown_directive("global", other, b.location.clone()));
                }
            },
            other => {
                return Err(ParseError::at(
                    "unexpected item in global section",
                    item_location(other).clone(),
                ));
            }
        }
    }

    Ok(g)
}

fn lower_global_directive(g: &mut Global, d: &Directive) -> Result<(), ParseError> {
    let key = norm_key(&d.key);

    if is_tuning_key(&key) {
        g.tuning.insert(key, to_ir_value(single(d)?)?);
        return Ok(());
    }

    match key.as_str() {
        // Process
        "daemon" => g.daemon = Some(as_bool(single(d)?)?),
        "master-worker" => g.master_worker = Some(as_bool(single(d)?)?),
        "user" => g.user = Some(as_string(single(d)?)?),
        "group" => g.group = Some(as_string(single(d)?)?),
        "uid" => g.uid = Some(as_int(single(d)?)?),
        "gid" => g.gid = Some(as_int(single(d)?)?),
        "node" => g.node = Some(as_string(single(d)?)?),
        "description" => g.description = Some(as_string(single(d)?)?),
        "pidfile" => g.pidfile = Some(as_string(single(d)?)?),
        "chroot" => g.chroot = Some(as_string(single(d)?)?),
        "hard-stop-after" => g.hard_stop_after = Some(as_duration(single(d)?)?),
        "quiet" => g.quiet = Some(as_bool(single(d)?)?),
        "zero-warning" => g.zero_warning = Some(as_bool(single(d)?)?),
        "set-dumpable" => g.set_dumpable = Some(as_bool(single(d)?)?),
        "external-check" => g.external_check = Some(as_bool(single(d)?)?),
        "busy-polling" => g.busy_polling = Some(as_bool(single(d)?)?),
        "force-cfg-parser-pause" => g.force_cfg_parser_pause = Some(as_bool(single(d)?)?),
        "mworker-max-reloads" => g.mworker_max_reloads = Some(as_int(single(d)?)?),
        "setcap" => g.setcap = Some(as_string(single(d)?)?),
        "default-path" => g.default_path = Some(as_string(single(d)?)?),
        "ulimit-n" => g.ulimit_n = Some(as_int(single(d)?)?),
        "anonkey" => g.anonkey = Some(as_int(single(d)?)?),

        // Limits
        "maxconn" => g.maxconn = Some(as_int(single(d)?)?),
        "maxconnrate" => g.maxconnrate = Some(as_int(single(d)?)?),
        "maxsessrate" => g.maxsessrate = Some(as_int(single(d)?)?),
        "maxsslrate" => g.maxsslrate = Some(as_int(single(d)?)?),
        "maxpipes" => g.maxpipes = Some(as_int(single(d)?)?),
        "fd-hard-limit" => g.fd_hard_limit = Some(as_int(single(d)?)?),
        "maxzlibmem" => g.maxzlibmem = Some(as_int(single(d)?)?),
        "maxcomprate" => g.maxcomprate = Some(as_int(single(d)?)?),
        "maxcompcpuusage" => g.maxcompcpuusage = Some(as_int(single(d)?)?),
        "strict-limits" => g.strict_limits = Some(as_bool(single(d)?)?),
        "nbproc" => g.nbproc = Some(as_int(single(d)?)?),
        "nbthread" => g.nbthread = Some(as_int(single(d)?)?),
        "thread-groups" => g.thread_groups = Some(as_int(single(d)?)?),
        "numa-cpu-mapping" => g.numa_cpu_mapping = Some(as_bool(single(d)?)?),
        "spread-checks" => g.spread_checks = Some(as_int(single(d)?)?),
        "max-spread-checks" => g.max_spread_checks = Some(as_int(single(d)?)?),
        "warn-blocked-traffic-after" => {
            g.warn_blocked_traffic_after = Some(as_duration(single(d)?)?)
        }

        // Logging
        "log" => g.log_targets.push(lower_log_target(d)?),
        "log-tag" => g.log_tag = Some(as_string(single(d)?)?),
        "log-send-hostname" => g.log_send_hostname = Some(as_string(single(d)?)?),

        // SSL defaults
        "ca-base" => g.ca_base = Some(as_string(single(d)?)?),
        "crt-base" => g.crt_base = Some(as_string(single(d)?)?),
        "key-base" => g.key_base = Some(as_string(single(d)?)?),
        "issuers-chain-path" => g.issuers_chain_path = Some(as_string(single(d)?)?),
        "ssl-default-bind-ciphers" => {
            g.ssl_default_bind_ciphers = Some(as_string(single(d)?)?)
        }
        "ssl-default-bind-ciphersuites" => {
            g.ssl_default_bind_ciphersuites = Some(as_string(single(d)?)?)
        }
        "ssl-default-bind-options" => {
            g.ssl_default_bind_options = as_string_list(single(d)?)?
        }
        "ssl-default-bind-curves" => g.ssl_default_bind_curves = Some(as_string(single(d)?)?),
        "ssl-default-bind-sigalgs" => {
            g.ssl_default_bind_sigalgs = Some(as_string(single(d)?)?)
        }
        "ssl-default-bind-client-sigalgs" => {
            g.ssl_default_bind_client_sigalgs = Some(as_string(single(d)?)?)
        }
        "ssl-default-server-ciphers" => {
            g.ssl_default_server_ciphers = Some(as_string(single(d)?)?)
        }
        "ssl-default-server-ciphersuites" => {
            g.ssl_default_server_ciphersuites = Some(as_string(single(d)?)?)
        }
        "ssl-default-server-curves" => {
            g.ssl_default_server_curves = Some(as_string(single(d)?)?)
        }
        "ssl-default-server-sigalgs" => {
            g.ssl_default_server_sigalgs = Some(as_string(single(d)?)?)
        }
        "ssl-default-server-client-sigalgs" => {
            g.ssl_default_server_client_sigalgs = Some(as_string(single(d)?)?)
        }
        "ssl-dh-param-file" => g.ssl_dh_param_file = Some(as_string(single(d)?)?),
        "ssl-engine" => g.ssl_engine = Some(as_string(single(d)?)?),
        "ssl-mode-async" => g.ssl_mode_async = Some(as_bool(single(d)?)?),
        "ssl-server-verify" => g.ssl_server_verify = Some(as_string(single(d)?)?),
        "ssl-security-level" => g.ssl_security_level = Some(as_int(single(d)?)?),
        "ssl-provider" => g.ssl_provider = Some(as_string(single(d)?)?),
        "ssl-provider-path" => g.ssl_provider_path = Some(as_string(single(d)?)?),
        "ssl-propquery" => g.ssl_propquery = Some(as_string(single(d)?)?),
        "ssl-load-extra-del-ext" => g.ssl_load_extra_del_ext = Some(as_string(single(d)?)?),
        "ssl-load-extra-files" => g.ssl_load_extra_files = Some(as_string(single(d)?)?),

        // Device detection
        "51degrees-data-file" => {
            g.fiftyone_degrees.get_or_insert_with(Default::default).data_file =
                Some(as_string(single(d)?)?)
        }
        "51degrees-property-name-list" => {
            g.fiftyone_degrees
                .get_or_insert_with(Default::default)
                .property_name_list = as_string_list(single(d)?)?
        }
        "51degrees-property-separator" => {
            g.fiftyone_degrees
                .get_or_insert_with(Default::default)
                .property_separator = Some(as_string(single(d)?)?)
        }
        "51degrees-cache-size" => {
            g.fiftyone_degrees.get_or_insert_with(Default::default).cache_size =
                Some(as_int(single(d)?)?)
        }
        "deviceatlas-json-file" => {
            g.deviceatlas.get_or_insert_with(Default::default).json_file =
                Some(as_string(single(d)?)?)
        }
        "deviceatlas-log-level" => {
            g.deviceatlas.get_or_insert_with(Default::default).log_level =
                Some(as_int(single(d)?)?)
        }
        "deviceatlas-separator" => {
            g.deviceatlas.get_or_insert_with(Default::default).separator =
                Some(as_string(single(d)?)?)
        }
        "deviceatlas-properties-cookie" => {
            g.deviceatlas
                .get_or_insert_with(Default::default)
                .properties_cookie = Some(as_string(single(d)?)?)
        }
        "wurfl-data-file" => {
            g.wurfl.get_or_insert_with(Default::default).data_file =
                Some(as_string(single(d)?)?)
        }
        "wurfl-information-list" => {
            g.wurfl.get_or_insert_with(Default::default).information_list =
                as_string_list(single(d)?)?
        }
        "wurfl-information-list-separator" => {
            g.wurfl
                .get_or_insert_with(Default::default)
                .information_list_separator = Some(as_string(single(d)?)?)
        }
        "wurfl-patch-file" => {
            g.wurfl.get_or_insert_with(Default::default).patch_file =
                Some(as_string(single(d)?)?)
        }
        "wurfl-cache-size" => {
            g.wurfl.get_or_insert_with(Default::default).cache_size = Some(as_int(single(d)?)?)
        }
        "wurfl-engine-mode" => {
            g.wurfl.get_or_insert_with(Default::default).engine_mode =
                Some(as_string(single(d)?)?)
        }
        "wurfl-useragent-priority" => {
            g.wurfl.get_or_insert_with(Default::default).useragent_priority =
                Some(as_string(single(d)?)?)
        }

        // Server state
        "server-state-base" => g.server_state_base = Some(as_string(single(d)?)?),
        "server-state-file" => g.server_state_file = Some(as_string(single(d)?)?),

        // Environment
        "setenv" => g.setenv.push(lower_env_pair(d)?),
        "presetenv" => g.presetenv.push(lower_env_pair(d)?),
        "resetenv" => g.resetenv.extend(positional_strings(d)?),
        "unsetenv" => g.unsetenv.extend(positional_strings(d)?),

        // CPU pinning
        "cpu-map" => {
            let parts = positional_strings(d)?;
            if parts.len() != 2 {
                return Err(ParseError::at(
                    "cpu-map expects a process/thread set and a CPU set",
                    d.location.clone(),
                ));
            }
            g.cpu_map.push((parts[0].clone(), parts[1].clone()));
        }

        "unix-bind" => {
            let parts = positional_strings(d)?;
            g.unix_bind = Some(parts.join(" "));
        }

        other => return Err(unknown_directive("global", other, d.location.clone())),
    }
    Ok(())
}

fn positional_strings(d: &Directive) -> Result<Vec<String>, ParseError> {
    let mut out = Vec::new();
    for arg in &d.args {
        match arg {
            Arg::Positional(v) => match &v.kind {
                ValueKind::List(items) => {
                    for item in items {
                        out.push(as_string(item)?);
                    }
                }
                _ => out.push(as_string(v)?),
            },
            Arg::Named(k, v) => {
                out.push(k.clone());
                out.push(as_string(v)?);
            }
        }
    }
    Ok(out)
}

fn lower_env_pair(d: &Directive) -> Result<(String, String), ParseError> {
    let parts = positional_strings(d)?;
    if parts.len() != 2 {
        return Err(ParseError::at(
            format!("'{}' expects a name and a value", d.key),
            d.location.clone(),
        ));
    }
    Ok((parts[0].clone(), parts[1].clone()))
}

/// `log "/dev/log" local0 info [notice]`
fn lower_log_target(d: &Directive) -> Result<LogTarget, ParseError> {
    let parts = positional_strings(d)?;
    let mut iter = parts.into_iter();
    let address = iter.next().ok_or_else(|| {
        ParseError::at("log directive requires a target address", d.location.clone())
    })?;
    Ok(LogTarget {
        address,
        facility: iter.next(),
        level: iter.next(),
        min_level: iter.next(),
    })
}

/// `stats_socket "/var/run/haproxy.sock" { level: "admin" ... }`
fn lower_stats_socket(b: &Block) -> Result<StatsSocket, ParseError> {
    let path = match b.args.first() {
        Some(Arg::Positional(v)) => as_string(v)?,
        _ => {
            return Err(ParseError::at(
                "stats_socket requires a socket path",
                b.location.clone(),
            ));
        }
    };
    let mut socket = StatsSocket {
        path,
        ..Default::default()
    };
    for item in &b.body {
        match item {
            Item::Directive(d) => match norm_key(&d.key).as_str() {
                "level" => socket.level = Some(as_string(single(d)?)?),
                "mode" => socket.mode = Some(as_string(single(d)?)?),
                "user" => socket.user = Some(as_string(single(d)?)?),
                "group" => socket.group = Some(as_string(single(d)?)?),
                "process" => socket.process = Some(as_string(single(d)?)?),
                other => {
                    return Err(unknown_directive("stats_socket", other, d.location.clone()));
                }
            },
            other => {
                return Err(ParseError::at(
                    "unexpected item in stats_socket block",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower;
    use crate::ir::Value;
    use crate::parser::parse_source;

    fn lower_global_src(body: &str) -> Global {
        let src = format!("config t {{ global {{ {body} }} }}");
        let node = parse_source(&src, "test.hap").unwrap();
        lower(node, &mut Vec::new()).unwrap().global.unwrap()
    }

    #[test]
    fn process_and_limit_directives() {
        let g = lower_global_src(
            "daemon: true\n maxconn: 4096\n user: \"haproxy\"\n group: \"haproxy\"\n nbthread: 8",
        );
        assert_eq!(g.daemon, Some(true));
        assert_eq!(g.maxconn, Some(4096));
        assert_eq!(g.user.as_deref(), Some("haproxy"));
        assert_eq!(g.nbthread, Some(8));
    }

    #[test]
    fn log_target_parts() {
        let g = lower_global_src("log \"/dev/log\" local0 info");
        assert_eq!(g.log_targets.len(), 1);
        let log = &g.log_targets[0];
        assert_eq!(log.address, "/dev/log");
        assert_eq!(log.facility.as_deref(), Some("local0"));
        assert_eq!(log.level.as_deref(), Some("info"));
    }

    #[test]
    fn tuning_keys_keep_native_spelling() {
        let g = lower_global_src(
            "tune.lua.burst-timeout: 1000\n tune.lua.bool-sample-conversion: true\n profiling.tasks.on: true",
        );
        assert_eq!(
            g.tuning.get("tune.lua.burst-timeout"),
            Some(&Value::Int(1000))
        );
        assert_eq!(
            g.tuning.get("tune.lua.bool-sample-conversion"),
            Some(&Value::Bool(true))
        );
        assert_eq!(g.tuning.get("profiling.tasks.on"), Some(&Value::Bool(true)));
    }

    #[test]
    fn stats_socket_block() {
        let g = lower_global_src(
            "stats_socket \"/var/run/haproxy.sock\" { level: \"admin\"\n mode: \"660\" }",
        );
        assert_eq!(g.stats_sockets.len(), 1);
        assert_eq!(g.stats_sockets[0].path, "/var/run/haproxy.sock");
        assert_eq!(g.stats_sockets[0].level.as_deref(), Some("admin"));
        assert_eq!(g.stats_sockets[0].mode.as_deref(), Some("660"));
    }

    #[test]
    fn env_and_cpu_map() {
        let g = lower_global_src(
            "setenv \"API_KEY\" \"secret123\"\n unsetenv \"DEBUG\"\n cpu-map \"1\" \"0-3\"",
        );
        assert_eq!(g.setenv, vec![("API_KEY".into(), "secret123".into())]);
        assert_eq!(g.unsetenv, vec!["DEBUG".to_string()]);
        assert_eq!(g.cpu_map, vec![("1".into(), "0-3".into())]);
    }

    #[test]
    fn device_detection_clusters() {
        let g = lower_global_src(
            "51degrees-data-file: \"/etc/haproxy/51Degrees.dat\"\n 51degrees-cache-size: 10000\n wurfl-engine-mode: \"performance\"",
        );
        let fifty = g.fiftyone_degrees.unwrap();
        assert_eq!(fifty.data_file.as_deref(), Some("/etc/haproxy/51Degrees.dat"));
        assert_eq!(fifty.cache_size, Some(10000));
        assert_eq!(g.wurfl.unwrap().engine_mode.as_deref(), Some("performance"));
    }

    #[test]
    fn unknown_global_directive() {
        let src = "config t { global { not_a_thing: 1 } }";
        let node = parse_source(src, "test.hap").unwrap();
        let err = lower(node, &mut Vec::new()).unwrap_err();
        assert!(err.message.contains("unknown directive"));
    }
}
