//! Lowering of server lists, binds, health checks and server loops.

use super::{
    as_bool, as_duration, as_int, as_string, as_string_list, item_location, norm_key, single,
    to_ir_value, unknown_directive,
};
use crate::ast::{Arg, Block, Directive, Item, ValueKind, ValueNode};
use crate::error::ParseError;
use crate::ir::{
    Bind, Expect, ExpectKind, HealthCheck, LoopIterable, Server, ServerLoop, ServerTemplate,
    Value,
};

/// Lower the body of a `servers { ... }` block.
pub(super) fn lower_servers_block(
    block: &Block,
    servers: &mut Vec<Server>,
    templates: &mut Vec<ServerTemplate>,
    loops: &mut Vec<ServerLoop>,
) -> Result<(), ParseError> {
    for item in &block.body {
        match item {
            Item::Directive(d) if norm_key(&d.key) == "server" => {
                servers.push(lower_server_inline(d)?);
            }
            Item::Directive(d) if norm_key(&d.key) == "server-template" => {
                templates.push(lower_server_template_directive(d)?);
            }
            Item::Block(b) if norm_key(&b.key) == "server" => {
                servers.push(lower_server_block(b)?);
            }
            Item::Block(b) if norm_key(&b.key) == "server-template" => {
                templates.push(lower_server_template_block(b)?);
            }
            Item::For(f) => {
                let mut body = Vec::new();
                for inner in &f.body {
                    match inner {
                        Item::Block(b) if norm_key(&b.key) == "server" => {
                            body.push(lower_server_block(b)?);
                        }
                        Item::Directive(d) if norm_key(&d.key) == "server" => {
                            body.push(lower_server_inline(d)?);
                        }
                        Item::For(nested) => {
                            return Err(ParseError::at(
                                "nested loops are not supported",
                                nested.location.clone(),
                            ));
                        }
                        other => {
                            return Err(ParseError::at(
                                "loop bodies inside servers may only declare servers",
                                item_location(other).clone(),
                            ));
                        }
                    }
                }
                loops.push(ServerLoop {
                    var: f.var.clone(),
                    iterable: lower_iterable(&f.iterable)?,
                    body,
                    location: Some(f.location.clone()),
                });
            }
            other => {
                return Err(ParseError::at(
                    "servers blocks may only contain server declarations and loops",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(())
}

pub(super) fn lower_iterable(v: &ValueNode) -> Result<LoopIterable, ParseError> {
    match &v.kind {
        ValueKind::Range(a, b) => Ok(LoopIterable::Range(*a, *b)),
        ValueKind::List(items) => {
            // `[1..3]` parses as a one-element list holding the range.
            if let [only] = items.as_slice() {
                if let ValueKind::Range(a, b) = only.kind {
                    return Ok(LoopIterable::Range(a, b));
                }
            }
            let values = items
                .iter()
                .map(to_ir_value)
                .collect::<Result<Vec<Value>, _>>()?;
            Ok(LoopIterable::List(values))
        }
        _ => Err(ParseError::at(
            "loop iterable must be a range or a list",
            v.location.clone(),
        )),
    }
}

/// `server NAME key: value ...` single-line form.
fn lower_server_inline(d: &Directive) -> Result<Server, ParseError> {
    let mut args = d.args.iter();
    let name = match args.next() {
        Some(Arg::Positional(v)) => v.as_text(),
        _ => {
            return Err(ParseError::at(
                "server requires a name",
                d.location.clone(),
            ));
        }
    };
    let mut server = Server {
        name,
        location: Some(d.location.clone()),
        ..Default::default()
    };
    for arg in args {
        match arg {
            Arg::Named(key, value) => apply_server_param(&mut server, key, value)?,
            Arg::Positional(v) => match &v.kind {
                ValueKind::TemplateRef(name) => server.template_refs.push(name.clone()),
                _ => {
                    return Err(ParseError::at(
                        format!("unexpected server argument '{}'", v.as_text()),
                        v.location.clone(),
                    ));
                }
            },
        }
    }
    Ok(server)
}

/// `server NAME { key: value ... @template }` block form.
pub(super) fn lower_server_block(b: &Block) -> Result<Server, ParseError> {
    let name = match b.args.first() {
        Some(Arg::Positional(v)) => v.as_text(),
        _ => {
            return Err(ParseError::at(
                "server requires a name",
                b.location.clone(),
            ));
        }
    };
    let mut server = Server {
        name,
        location: Some(b.location.clone()),
        ..Default::default()
    };
    apply_server_body(&mut server, &b.body)?;
    Ok(server)
}

/// Shared by `server` blocks and `default-server` blocks.
pub(super) fn apply_server_body(server: &mut Server, body: &[Item]) -> Result<(), ParseError> {
    for item in body {
        match item {
            Item::Directive(d) => {
                let value = single(d)?;
                apply_server_param(server, &d.key, value)?;
            }
            Item::Spread { name, .. } => server.template_refs.push(name.clone()),
            other => {
                return Err(ParseError::at(
                    "server blocks may only contain parameters and template spreads",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(())
}

pub(super) fn apply_server_param(
    server: &mut Server,
    key: &str,
    v: &ValueNode,
) -> Result<(), ParseError> {
    match norm_key(key).as_str() {
        "address" | "addr" => server.address = Some(as_string(v)?),
        "port" => server.port = Some(as_int(v)?),
        "check" => server.check = Some(as_bool(v)?),
        "inter" | "check-interval" => server.check_interval = Some(as_duration(v)?),
        "rise" => server.rise = Some(as_int(v)?),
        "fall" => server.fall = Some(as_int(v)?),
        "check-port" => server.check_port = Some(as_int(v)?),
        "check-address" => server.check_address = Some(as_string(v)?),
        "check-sni" => server.check_sni = Some(as_string(v)?),
        "check-send-proxy" => server.check_send_proxy = Some(as_bool(v)?),
        "check-proto" => server.check_proto = Some(as_string(v)?),
        "agent-check" => server.agent_check = Some(as_bool(v)?),
        "agent-port" => server.agent_port = Some(as_int(v)?),
        "agent-inter" => server.agent_inter = Some(as_duration(v)?),
        "agent-addr" => server.agent_addr = Some(as_string(v)?),
        "agent-send" => server.agent_send = Some(as_string(v)?),
        "weight" => server.weight = Some(as_int(v)?),
        "maxconn" => server.maxconn = Some(as_int(v)?),
        "minconn" => server.minconn = Some(as_int(v)?),
        "maxqueue" => server.maxqueue = Some(as_int(v)?),
        "max-reuse" => server.max_reuse = Some(as_int(v)?),
        "pool-max-conn" => server.pool_max_conn = Some(as_int(v)?),
        "pool-purge-delay" => server.pool_purge_delay = Some(as_duration(v)?),
        "ssl" => server.ssl = Some(as_bool(v)?),
        "verify" | "ssl-verify" => server.ssl_verify = Some(as_string(v)?),
        "sni" => server.sni = Some(as_string(v)?),
        "alpn" => server.alpn = as_string_list(v)?,
        "ca-file" => server.ca_file = Some(as_string(v)?),
        "crl-file" => server.crl_file = Some(as_string(v)?),
        "crt" => server.crt = Some(as_string(v)?),
        "ciphers" => server.ciphers = Some(as_string(v)?),
        "curves" => server.curves = Some(as_string(v)?),
        "send-proxy" => server.send_proxy = Some(as_bool(v)?),
        "send-proxy-v2" => server.send_proxy_v2 = Some(as_bool(v)?),
        "slowstart" => server.slowstart = Some(as_duration(v)?),
        "resolvers" => server.resolvers = Some(as_string(v)?),
        "resolve-prefer" => server.resolve_prefer = Some(as_string(v)?),
        "init-addr" => server.init_addr = Some(as_string_list(v)?.join(",")),
        "error-limit" => server.error_limit = Some(as_int(v)?),
        "observe" => server.observe = Some(as_string(v)?),
        "on-error" => server.on_error = Some(as_string(v)?),
        "on-marked-down" => server.on_marked_down = Some(as_string(v)?),
        "on-marked-up" => server.on_marked_up = Some(as_string(v)?),
        "proto" => server.proto = Some(as_string(v)?),
        "tfo" => server.tfo = Some(as_bool(v)?),
        "namespace" => server.namespace = Some(as_string(v)?),
        "usesrc" => server.usesrc = Some(as_string(v)?),
        "id" => server.id = Some(as_int(v)?),
        "cookie" => server.cookie = Some(as_string(v)?),
        "track" => server.track = Some(as_string(v)?),
        "redir" => server.redir = Some(as_string(v)?),
        "disabled" => server.disabled = Some(as_bool(v)?),
        "backup" => server.backup = Some(as_bool(v)?),
        // Anything else lands in the free-form options map and is emitted
        // in key order.
        other => {
            server.options.insert(other.to_string(), as_string(v)?);
        }
    }
    Ok(())
}

fn lower_server_template_directive(d: &Directive) -> Result<ServerTemplate, ParseError> {
    let mut positional = Vec::new();
    let mut tpl = ServerTemplate {
        location: Some(d.location.clone()),
        ..Default::default()
    };
    let mut params = Server::default();
    let mut has_params = false;
    for arg in &d.args {
        match arg {
            Arg::Positional(v) => positional.push(v),
            Arg::Named(k, v) => match norm_key(k).as_str() {
                "fqdn" => tpl.fqdn = Some(as_string(v)?),
                "port" => tpl.port = Some(as_int(v)?),
                other => {
                    apply_server_param(&mut params, other, v)?;
                    has_params = true;
                }
            },
        }
    }
    let mut iter = positional.into_iter();
    tpl.prefix = iter
        .next()
        .map(|v| v.as_text())
        .ok_or_else(|| ParseError::at("server-template requires a prefix", d.location.clone()))?;
    tpl.count = match iter.next() {
        Some(v) => as_int(v)?,
        None => {
            return Err(ParseError::at(
                "server-template requires an instance count",
                d.location.clone(),
            ));
        }
    };
    if let Some(v) = iter.next() {
        tpl.fqdn = Some(as_string(v)?);
    }
    if let Some(v) = iter.next() {
        tpl.port = Some(as_int(v)?);
    }
    if has_params {
        tpl.params = Some(Box::new(params));
    }
    Ok(tpl)
}

/// `server-template web 5 { fqdn: "..." port: 8080 check: true }`
fn lower_server_template_block(b: &Block) -> Result<ServerTemplate, ParseError> {
    let mut tpl = ServerTemplate {
        location: Some(b.location.clone()),
        ..Default::default()
    };
    let mut iter = b.args.iter();
    tpl.prefix = match iter.next() {
        Some(Arg::Positional(v)) => v.as_text(),
        _ => {
            return Err(ParseError::at(
                "server-template requires a prefix",
                b.location.clone(),
            ));
        }
    };
    tpl.count = match iter.next() {
        Some(Arg::Positional(v)) => as_int(v)?,
        _ => {
            return Err(ParseError::at(
                "server-template requires an instance count",
                b.location.clone(),
            ));
        }
    };
    let mut params = Server::default();
    let mut has_params = false;
    for item in &b.body {
        match item {
            Item::Directive(d) => {
                let value = single(d)?;
                match norm_key(&d.key).as_str() {
                    "fqdn" => tpl.fqdn = Some(as_string(value)?),
                    "port" => tpl.port = Some(as_int(value)?),
                    other => {
                        apply_server_param(&mut params, other, value)?;
                        has_params = true;
                    }
                }
            }
            other => {
                return Err(ParseError::at(
                    "server-template blocks may only contain parameters",
                    item_location(other).clone(),
                ));
            }
        }
    }
    if has_params {
        tpl.params = Some(Box::new(params));
    }
    Ok(tpl)
}

/// `default-server { ... }` reuses the server parameter surface.
pub(super) fn lower_default_server(b: &Block) -> Result<Server, ParseError> {
    let mut server = Server {
        location: Some(b.location.clone()),
        ..Default::default()
    };
    apply_server_body(&mut server, &b.body)?;
    Ok(server)
}

// ---------------------------------------------------------------------------
// Binds
// ---------------------------------------------------------------------------

/// Bind options that never take a value.
const BIND_FLAGS: &[&str] = &[
    "accept-proxy",
    "transparent",
    "defer-accept",
    "tfo",
    "allow-0rtt",
    "strict-sni",
    "prefer-client-ciphers",
    "no-sslv3",
    "no-tlsv10",
    "no-tlsv11",
    "no-tlsv12",
    "v4v6",
    "v6only",
];

/// `bind ADDR [ssl] [opt value]... [{ ssl-options }]`
pub(super) fn lower_bind(args: &[Arg], body: Option<&[Item]>, d_loc: &crate::error::SourceLocation) -> Result<Bind, ParseError> {
    let mut iter = args.iter().peekable();
    let address = match iter.next() {
        Some(Arg::Positional(v)) => v.as_text(),
        _ => {
            return Err(ParseError::at(
                "bind requires an address",
                d_loc.clone(),
            ));
        }
    };
    let mut bind = Bind {
        address,
        location: Some(d_loc.clone()),
        ..Default::default()
    };

    while let Some(arg) = iter.next() {
        match arg {
            Arg::Named(key, value) => apply_bind_option(&mut bind, key, Some(value))?,
            Arg::Positional(v) => {
                let word = v.as_text();
                let key = norm_key(&word);
                if key == "ssl" {
                    bind.ssl = Some(true);
                    continue;
                }
                if BIND_FLAGS.contains(&key.as_str()) {
                    // Optional trailing boolean: `accept-proxy true`.
                    if let Some(Arg::Positional(next)) = iter.peek() {
                        if let ValueKind::Bool(flag) = next.kind {
                            iter.next();
                            if flag {
                                bind.options.insert(key, String::new());
                            }
                            continue;
                        }
                    }
                    bind.options.insert(key, String::new());
                    continue;
                }
                // Valued option: consume the next argument.
                match iter.next() {
                    Some(Arg::Positional(value)) => {
                        apply_bind_option(&mut bind, &key, Some(value))?;
                    }
                    _ => {
                        return Err(ParseError::at(
                            format!("bind option '{word}' requires a value"),
                            v.location.clone(),
                        ));
                    }
                }
            }
        }
    }

    if let Some(body) = body {
        for item in body {
            match item {
                Item::Directive(d) => {
                    let value = single(d)?;
                    apply_bind_option(&mut bind, &d.key, Some(value))?;
                }
                other => {
                    return Err(ParseError::at(
                        "bind blocks may only contain options",
                        item_location(other).clone(),
                    ));
                }
            }
        }
    }

    Ok(bind)
}

fn apply_bind_option(
    bind: &mut Bind,
    key: &str,
    value: Option<&ValueNode>,
) -> Result<(), ParseError> {
    let key = norm_key(key);
    match key.as_str() {
        "ssl" => {
            bind.ssl = Some(match value {
                Some(v) => as_bool(v)?,
                None => true,
            })
        }
        "cert" | "crt" => {
            bind.ssl_cert = value.map(as_string).transpose()?;
        }
        "alpn" => {
            if let Some(v) = value {
                bind.alpn = as_string_list(v)?;
            }
        }
        _ => {
            let rendered = match value {
                Some(v) => match &v.kind {
                    ValueKind::Bool(true) => String::new(),
                    ValueKind::Bool(false) => return Ok(()),
                    _ => as_string(v)?,
                },
                None => String::new(),
            };
            bind.options.insert(key, rendered);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Health checks
// ---------------------------------------------------------------------------

/// `health-check { method: "GET" uri: "/health" expect: status 200 }`
pub(super) fn lower_health_check(b: &Block) -> Result<HealthCheck, ParseError> {
    let mut hc = HealthCheck {
        location: Some(b.location.clone()),
        ..Default::default()
    };
    for item in &b.body {
        match item {
            Item::Directive(d) => match norm_key(&d.key).as_str() {
                "method" => hc.method = Some(as_string(single(d)?)?),
                "uri" => hc.uri = Some(as_string(single(d)?)?),
                "expect" => hc.expect = Some(lower_expect(d)?),
                "header" => {
                    let mut parts = Vec::new();
                    for arg in &d.args {
                        match arg {
                            Arg::Positional(v) => parts.push(as_string(v)?),
                            Arg::Named(k, v) => {
                                hc.headers.push((k.clone(), as_string(v)?));
                            }
                        }
                    }
                    if parts.len() == 2 {
                        hc.headers.push((parts[0].clone(), parts[1].clone()));
                    }
                }
                other => {
                    return Err(unknown_directive("health-check", other, d.location.clone()));
                }
            },
            Item::Spread { name, .. } => hc.template_refs.push(name.clone()),
            other => {
                return Err(ParseError::at(
                    "unexpected item in health-check block",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(hc)
}

/// `expect: [!]status 200` / `[!]string "OK"` / `[!]rstring RE` /
/// `[!]rstatus RE`
fn lower_expect(d: &Directive) -> Result<Expect, ParseError> {
    let mut values = Vec::new();
    for arg in &d.args {
        match arg {
            Arg::Positional(v) => values.push(v),
            Arg::Named(..) => {
                return Err(ParseError::at(
                    "expect takes positional arguments",
                    d.location.clone(),
                ));
            }
        }
    }
    let [kind_node, value_node] = values.as_slice() else {
        return Err(ParseError::at(
            "expect requires a match kind and a value",
            d.location.clone(),
        ));
    };
    let mut kind_word = kind_node.as_text();
    let negated = kind_word.starts_with('!');
    if negated {
        kind_word.remove(0);
    }
    let kind = match kind_word.as_str() {
        "status" => ExpectKind::Status(as_int(value_node)?),
        "string" => ExpectKind::String(as_string(value_node)?),
        "rstring" => ExpectKind::Rstring(as_string(value_node)?),
        "rstatus" => ExpectKind::Rstatus(as_string(value_node)?),
        other => {
            return Err(ParseError::at(
                format!("unknown expect kind '{other}'"),
                kind_node.location.clone(),
            ));
        }
    };
    Ok(Expect { negated, kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower;
    use crate::parser::parse_source;

    fn lower_backend(body: &str) -> crate::ir::Backend {
        let src = format!("config t {{ backend b {{ {body} }} }}");
        let node = parse_source(&src, "test.hap").unwrap();
        lower(node, &mut Vec::new())
            .unwrap()
            .backends
            .into_iter()
            .next()
            .unwrap()
    }

    #[test]
    fn server_block_fields() {
        let backend = lower_backend(
            "servers { server s1 { address: \"127.0.0.1\"\n port: 8080\n check: true\n weight: 100 } }",
        );
        let server = &backend.back.servers[0];
        assert_eq!(server.name, "s1");
        assert_eq!(server.address.as_deref(), Some("127.0.0.1"));
        assert_eq!(server.port, Some(8080));
        assert_eq!(server.check, Some(true));
        assert_eq!(server.weight, Some(100));
    }

    #[test]
    fn inline_server_named_args() {
        let backend =
            lower_backend("servers { server s1 address: \"127.0.0.1\" port: 8080 check: true }");
        let server = &backend.back.servers[0];
        assert_eq!(server.name, "s1");
        assert_eq!(server.check, Some(true));
    }

    #[test]
    fn unknown_server_param_goes_to_options() {
        let backend = lower_backend(
            "servers { server s1 { address: \"10.0.0.1\"\n port: 80\n ws: \"h1\" } }",
        );
        let server = &backend.back.servers[0];
        assert_eq!(server.options.get("ws").map(String::as_str), Some("h1"));
    }

    #[test]
    fn server_loop_is_deferred() {
        let backend = lower_backend(
            "servers { for i in [1..3] { server \"web${i}\" { address: \"10.0.1.${i}\"\n port: 8080 } } }",
        );
        assert!(backend.back.servers.is_empty());
        assert_eq!(backend.back.server_loops.len(), 1);
        let l = &backend.back.server_loops[0];
        assert_eq!(l.var, "i");
        assert_eq!(l.iterable, LoopIterable::Range(1, 3));
        assert_eq!(l.body.len(), 1);
    }

    #[test]
    fn health_check_with_negated_expect() {
        let backend = lower_backend(
            "health-check { method: \"GET\"\n uri: \"/health\"\n expect: !rstatus \"^5[0-9][0-9]$\" }",
        );
        let hc = backend.back.health_check.unwrap();
        assert_eq!(hc.method.as_deref(), Some("GET"));
        let expect = hc.expect.unwrap();
        assert!(expect.negated);
        assert_eq!(expect.kind, ExpectKind::Rstatus("^5[0-9][0-9]$".into()));
    }

    #[test]
    fn server_template_block() {
        let backend = lower_backend(
            "servers { server-template web 5 { fqdn: \"web-{id}.internal.example.com\"\n port: 8080 } }",
        );
        let tpl = &backend.back.server_templates[0];
        assert_eq!(tpl.prefix, "web");
        assert_eq!(tpl.count, 5);
        assert_eq!(tpl.fqdn.as_deref(), Some("web-{id}.internal.example.com"));
        assert_eq!(tpl.port, Some(8080));
    }
}
