//! Lowering of defaults, peers, resolvers, mailers and lua sections.

use super::proxy::lower_email_alert;
use super::{
    as_bool, as_duration, as_int, as_string, as_string_list, item_location, norm_key, single,
    unknown_directive,
};
use crate::ast::{Arg, Block, Directive, Item, ValueKind};
use crate::error::ParseError;
use crate::ir::{
    Defaults, LuaScript, LuaSource, MailerEntry, Mailers, Mode, Nameserver, PeerEntry, Peers,
    PersistRdpCookie, Resolvers,
};

pub(super) fn lower_defaults(block: &Block) -> Result<Defaults, ParseError> {
    let mut def = Defaults {
        location: Some(block.location.clone()),
        ..Default::default()
    };
    for item in &block.body {
        match item {
            Item::Directive(d) => lower_defaults_directive(&mut def, d)?,
            Item::Block(b) => match norm_key(&b.key).as_str() {
                "email-alert" => def.email_alert = Some(lower_email_alert(b)?),
                "timeout" => {
                    for inner in &b.body {
                        match inner {
                            Item::Directive(d) => {
                                apply_defaults_timeout(&mut def, &norm_key(&d.key), d)?
                            }
                            other => {
                                return Err(ParseError::at(
                                    "unexpected item in timeout block",
                                    item_location(other).clone(),
                                ));
                            }
                        }
                    }
                }
                other => {
                    return Err(unknown_directive("defaults", other, b.location.clone()));
                }
            },
            other => {
                return Err(ParseError::at(
                    "unexpected item in defaults section",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(def)
}

fn lower_defaults_directive(def: &mut Defaults, d: &Directive) -> Result<(), ParseError> {
    let key = norm_key(&d.key);
    match key.as_str() {
        "mode" => {
            let text = as_string(single(d)?)?;
            def.mode = Some(
                text.parse::<Mode>()
                    .map_err(|e| ParseError::at(e.message, d.location.clone()))?,
            );
        }
        "retries" => def.retries = Some(as_int(single(d)?)?),
        "option" => def.options.extend(as_string_list(single(d)?)?),
        "log" => {
            let mut parts = Vec::new();
            for arg in &d.args {
                if let Arg::Positional(v) = arg {
                    parts.push(v.as_text());
                }
            }
            def.log.push(parts.join(" "));
        }
        "log-format" => def.log_format = Some(as_string(single(d)?)?),
        "log-format-sd" => def.log_format_sd = Some(as_string(single(d)?)?),
        "error-log-format" => def.error_log_format = Some(as_string(single(d)?)?),
        "log-tag" => def.log_tag = Some(as_string(single(d)?)?),
        "log-steps" => {
            let mut steps = Vec::new();
            for part in as_string_list(single(d)?)? {
                steps.extend(part.split(',').map(str::trim).map(String::from));
            }
            def.log_steps = steps;
        }
        "timeout" => {
            let v = single(d)?;
            let ValueKind::Map(entries) = &v.kind else {
                return Err(ParseError::at(
                    "timeout expects a mapping of timeout names to durations",
                    v.location.clone(),
                ));
            };
            for (name, value) in entries {
                let duration = as_duration(value)?;
                set_defaults_timeout(def, &norm_key(name), duration, d)?;
            }
        }
        "persist" => match d.args.as_slice() {
            [Arg::Positional(v)] => match &v.kind {
                ValueKind::Ident(w) if w == "rdp-cookie" => {
                    def.persist_rdp_cookie = Some(PersistRdpCookie { cookie: None });
                }
                ValueKind::Call { name, arg } if name == "rdp-cookie" => {
                    def.persist_rdp_cookie = Some(PersistRdpCookie {
                        cookie: arg.as_ref().map(|a| a.as_text()),
                    });
                }
                _ => {
                    return Err(ParseError::at(
                        "persist supports the rdp-cookie form",
                        v.location.clone(),
                    ));
                }
            },
            _ => {
                return Err(ParseError::at(
                    "persist expects 'rdp-cookie' or 'rdp-cookie(\"name\")'",
                    d.location.clone(),
                ));
            }
        },
        _ if key.starts_with("timeout-") => {
            apply_defaults_timeout(def, key.trim_start_matches("timeout-"), d)?;
        }
        other => return Err(unknown_directive("defaults", other, d.location.clone())),
    }
    Ok(())
}

fn apply_defaults_timeout(def: &mut Defaults, key: &str, d: &Directive) -> Result<(), ParseError> {
    let duration = as_duration(single(d)?)?;
    set_defaults_timeout(def, key, duration, d)
}

fn set_defaults_timeout(
    def: &mut Defaults,
    key: &str,
    duration: String,
    d: &Directive,
) -> Result<(), ParseError> {
    let t = &mut def.timeouts;
    match key {
        "connect" => t.connect = Some(duration),
        "client" => t.client = Some(duration),
        "server" => t.server = Some(duration),
        "check" => t.check = Some(duration),
        "queue" => t.queue = Some(duration),
        "http-request" => t.http_request = Some(duration),
        "http-keep-alive" => t.http_keep_alive = Some(duration),
        "tunnel" => t.tunnel = Some(duration),
        "client-fin" => t.client_fin = Some(duration),
        "server-fin" => t.server_fin = Some(duration),
        "tarpit" => t.tarpit = Some(duration),
        other => {
            return Err(ParseError::at(
                format!("unknown timeout '{other}'"),
                d.location.clone(),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Peers / resolvers / mailers
// ---------------------------------------------------------------------------

/// `peer NAME "addr" port` and friends.
fn lower_member(d: &Directive, what: &str) -> Result<(String, String, i64), ParseError> {
    let mut positional = d.args.iter().filter_map(|a| match a {
        Arg::Positional(v) => Some(v),
        Arg::Named(..) => None,
    });
    let name = positional
        .next()
        .map(|v| v.as_text())
        .ok_or_else(|| ParseError::at(format!("{what} requires a name"), d.location.clone()))?;
    let address = positional.next().map(as_string).transpose()?.ok_or_else(|| {
        ParseError::at(format!("{what} requires an address"), d.location.clone())
    })?;
    let port = positional.next().map(as_int).transpose()?.ok_or_else(|| {
        ParseError::at(format!("{what} requires a port"), d.location.clone())
    })?;
    Ok((name, address, port))
}

pub(super) fn lower_peers(name: String, block: &Block) -> Result<Peers, ParseError> {
    let mut peers = Peers {
        name,
        location: Some(block.location.clone()),
        ..Default::default()
    };
    for item in &block.body {
        match item {
            Item::Directive(d) => match norm_key(&d.key).as_str() {
                "peer" => {
                    let (name, address, port) = lower_member(d, "peer")?;
                    peers.peers.push(PeerEntry {
                        name,
                        address,
                        port,
                    });
                }
                "disabled" => peers.disabled = Some(as_bool(single(d)?)?),
                other => return Err(unknown_directive("peers", other, d.location.clone())),
            },
            other => {
                return Err(ParseError::at(
                    "unexpected item in peers section",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(peers)
}

pub(super) fn lower_resolvers(name: String, block: &Block) -> Result<Resolvers, ParseError> {
    let mut r = Resolvers {
        name,
        location: Some(block.location.clone()),
        ..Default::default()
    };
    for item in &block.body {
        match item {
            Item::Directive(d) => match norm_key(&d.key).as_str() {
                "nameserver" => {
                    let (name, address, port) = lower_member(d, "nameserver")?;
                    r.nameservers.push(Nameserver {
                        name,
                        address,
                        port,
                    });
                }
                "accepted-payload-size" => r.accepted_payload_size = Some(as_int(single(d)?)?),
                "resolve-retries" => r.resolve_retries = Some(as_int(single(d)?)?),
                "hold-nx" => r.hold_nx = Some(as_duration(single(d)?)?),
                "hold-valid" => r.hold_valid = Some(as_duration(single(d)?)?),
                "hold-timeout" => r.hold_timeout = Some(as_duration(single(d)?)?),
                "hold-obsolete" => r.hold_obsolete = Some(as_duration(single(d)?)?),
                "hold-refused" => r.hold_refused = Some(as_duration(single(d)?)?),
                "hold-other" => r.hold_other = Some(as_duration(single(d)?)?),
                "timeout-resolve" => r.timeout_resolve = Some(as_duration(single(d)?)?),
                "timeout-retry" => r.timeout_retry = Some(as_duration(single(d)?)?),
                "parse-resolv-conf" => r.parse_resolv_conf = Some(as_bool(single(d)?)?),
                other => return Err(unknown_directive("resolvers", other, d.location.clone())),
            },
            other => {
                return Err(ParseError::at(
                    "unexpected item in resolvers section",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(r)
}

pub(super) fn lower_mailers(name: String, block: &Block) -> Result<Mailers, ParseError> {
    let mut m = Mailers {
        name,
        location: Some(block.location.clone()),
        ..Default::default()
    };
    for item in &block.body {
        match item {
            Item::Directive(d) => match norm_key(&d.key).as_str() {
                "mailer" => {
                    let (name, address, port) = lower_member(d, "mailer")?;
                    m.mailers.push(MailerEntry {
                        name,
                        address,
                        port,
                    });
                }
                "timeout-mail" => m.timeout_mail = Some(as_duration(single(d)?)?),
                other => return Err(unknown_directive("mailers", other, d.location.clone())),
            },
            other => {
                return Err(ParseError::at(
                    "unexpected item in mailers section",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(m)
}

// ---------------------------------------------------------------------------
// Lua
// ---------------------------------------------------------------------------

/// `lua { inline NAME { ... } load "path" }` — inline bodies were captured
/// verbatim by the parser and are never interpreted.
pub(super) fn lower_lua(block: &Block, scripts: &mut Vec<LuaScript>) -> Result<(), ParseError> {
    for item in &block.body {
        match item {
            Item::RawBlock(raw) => scripts.push(LuaScript {
                name: raw.name.clone(),
                source_type: LuaSource::Inline,
                content: raw.raw.clone(),
                location: Some(raw.location.clone()),
            }),
            Item::Directive(d) if norm_key(&d.key) == "load" => {
                let path = as_string(single(d)?)?;
                let name = path
                    .rsplit('/')
                    .next()
                    .unwrap_or(&path)
                    .trim_end_matches(".lua")
                    .to_string();
                scripts.push(LuaScript {
                    name,
                    source_type: LuaSource::File,
                    content: path,
                    location: Some(d.location.clone()),
                });
            }
            other => {
                return Err(ParseError::at(
                    "lua blocks may only contain 'inline' scripts and 'load' directives",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower;
    use crate::parser::parse_source;
    use crate::ir::ConfigIR;

    fn lower_src(src: &str) -> ConfigIR {
        let node = parse_source(src, "test.hap").unwrap();
        lower(node, &mut Vec::new()).unwrap()
    }

    #[test]
    fn defaults_timeouts_nested_and_flat() {
        let ir = lower_src(
            "config t { defaults { mode: http\n retries: 3\n timeout: { connect: 5s\n client: 50s }\n timeout_tarpit: 60s } }",
        );
        let def = ir.defaults.unwrap();
        assert_eq!(def.mode, Some(Mode::Http));
        assert_eq!(def.retries, Some(3));
        assert_eq!(def.timeouts.connect.as_deref(), Some("5s"));
        assert_eq!(def.timeouts.client.as_deref(), Some("50s"));
        assert_eq!(def.timeouts.tarpit.as_deref(), Some("60s"));
    }

    #[test]
    fn defaults_options_concatenate() {
        let ir = lower_src(
            "config t { defaults { option: [\"httplog\"]\n option: [\"dontlognull\"] } }",
        );
        let def = ir.defaults.unwrap();
        assert_eq!(def.options, vec!["httplog", "dontlognull"]);
    }

    #[test]
    fn peers_section() {
        let ir = lower_src(
            "config t { peers mypeers { disabled: true\n peer haproxy1 \"10.0.0.1\" 1024 } }",
        );
        let peers = &ir.peers[0];
        assert_eq!(peers.name, "mypeers");
        assert_eq!(peers.disabled, Some(true));
        assert_eq!(peers.peers[0].name, "haproxy1");
        assert_eq!(peers.peers[0].address, "10.0.0.1");
        assert_eq!(peers.peers[0].port, 1024);
    }

    #[test]
    fn resolvers_options() {
        let ir = lower_src(
            "config t { resolvers mydns { nameserver dns1 \"8.8.8.8\" 53\n accepted_payload_size: 8192\n hold_nx: 30s\n timeout_resolve: 1s } }",
        );
        let r = &ir.resolvers[0];
        assert_eq!(r.nameservers.len(), 1);
        assert_eq!(r.accepted_payload_size, Some(8192));
        assert_eq!(r.hold_nx.as_deref(), Some("30s"));
        assert_eq!(r.timeout_resolve.as_deref(), Some("1s"));
    }

    #[test]
    fn mailers_section() {
        let ir = lower_src(
            "config t { mailers alerts { timeout_mail: 10s\n mailer smtp1 \"smtp.example.com\" 25 } }",
        );
        let m = &ir.mailers[0];
        assert_eq!(m.timeout_mail.as_deref(), Some("10s"));
        assert_eq!(m.mailers[0].address, "smtp.example.com");
    }

    #[test]
    fn lua_scripts() {
        let ir = lower_src(
            "config t { lua { inline hello { core.log(core.info, \"hi\") }\n load \"/etc/haproxy/lua/helpers.lua\" } }",
        );
        assert_eq!(ir.lua_scripts.len(), 2);
        assert_eq!(ir.lua_scripts[0].name, "hello");
        assert_eq!(ir.lua_scripts[0].source_type, LuaSource::Inline);
        assert_eq!(ir.lua_scripts[1].source_type, LuaSource::File);
        assert_eq!(ir.lua_scripts[1].content, "/etc/haproxy/lua/helpers.lua");
        assert_eq!(ir.lua_scripts[1].name, "helpers");
    }
}
