//! Lowering of frontend / backend / listen sections.

use super::server::{
    lower_bind, lower_default_server, lower_health_check, lower_iterable, lower_server_block,
    lower_servers_block,
};
use super::{
    as_bool, as_duration, as_int, as_string, as_string_list, item_location, norm_key, single,
    split_condition, unknown_directive,
};
use crate::ast::{Arg, Block, Directive, Item, ValueKind, ValueNode};
use crate::error::ParseError;
use crate::ir::{
    Acl, Backend, BackendFacet, Balance, CaptureDirection, Compression, Condition,
    DeclareCapture, EmailAlert, Filter, Frontend, FrontendFacet, Listen, Mode,
    PersistRdpCookie, ProxySettings, Rule, RuleList, RuleLoop, StatsConfig, UseBackend,
    UseServer,
};
use crate::ir::KNOWN_BALANCE_ALGORITHMS;

pub(super) fn lower_frontend(name: String, block: &Block) -> Result<Frontend, ParseError> {
    let mut fe = Frontend {
        name,
        location: Some(block.location.clone()),
        ..Default::default()
    };
    for item in &block.body {
        match item {
            Item::Directive(d) => {
                if apply_frontend_directive(&mut fe.front, d)?
                    || apply_common_directive(&mut fe.settings, d)?
                {
                    continue;
                }
                return Err(unknown_directive(
                    "frontend",
                    &norm_key(&d.key),
                    d.location.clone(),
                ));
            }
            Item::Block(b) => {
                if apply_frontend_block(&mut fe.front, b)?
                    || apply_common_block(&mut fe.settings, b)?
                {
                    continue;
                }
                return Err(unknown_directive(
                    "frontend",
                    &norm_key(&b.key),
                    b.location.clone(),
                ));
            }
            Item::Spread { name, .. } => fe.settings.template_refs.push(name.clone()),
            other => {
                return Err(ParseError::at(
                    "unexpected item in frontend section",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(fe)
}

pub(super) fn lower_backend(name: String, block: &Block) -> Result<Backend, ParseError> {
    let mut be = Backend {
        name,
        location: Some(block.location.clone()),
        ..Default::default()
    };
    for item in &block.body {
        match item {
            Item::Directive(d) => {
                if apply_backend_directive(&mut be.back, d)?
                    || apply_common_directive(&mut be.settings, d)?
                {
                    continue;
                }
                return Err(unknown_directive(
                    "backend",
                    &norm_key(&d.key),
                    d.location.clone(),
                ));
            }
            Item::Block(b) => {
                if apply_backend_block(&mut be.back, b)?
                    || apply_common_block(&mut be.settings, b)?
                {
                    continue;
                }
                return Err(unknown_directive(
                    "backend",
                    &norm_key(&b.key),
                    b.location.clone(),
                ));
            }
            Item::Spread { name, .. } => be.settings.template_refs.push(name.clone()),
            other => {
                return Err(ParseError::at(
                    "unexpected item in backend section",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(be)
}

pub(super) fn lower_listen(name: String, block: &Block) -> Result<Listen, ParseError> {
    let mut li = Listen {
        name,
        location: Some(block.location.clone()),
        ..Default::default()
    };
    for item in &block.body {
        match item {
            Item::Directive(d) => {
                if apply_frontend_directive(&mut li.front, d)?
                    || apply_backend_directive(&mut li.back, d)?
                    || apply_common_directive(&mut li.settings, d)?
                {
                    continue;
                }
                return Err(unknown_directive(
                    "listen",
                    &norm_key(&d.key),
                    d.location.clone(),
                ));
            }
            Item::Block(b) => {
                if apply_frontend_block(&mut li.front, b)?
                    || apply_backend_block(&mut li.back, b)?
                    || apply_common_block(&mut li.settings, b)?
                {
                    continue;
                }
                return Err(unknown_directive(
                    "listen",
                    &norm_key(&b.key),
                    b.location.clone(),
                ));
            }
            Item::Spread { name, .. } => li.settings.template_refs.push(name.clone()),
            other => {
                return Err(ParseError::at(
                    "unexpected item in listen section",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(li)
}

// ---------------------------------------------------------------------------
// Frontend facet
// ---------------------------------------------------------------------------

fn apply_frontend_directive(front: &mut FrontendFacet, d: &Directive) -> Result<bool, ParseError> {
    match norm_key(&d.key).as_str() {
        "bind" => front.binds.push(lower_bind(&d.args, None, &d.location)?),
        "default-backend" => front.default_backend = Some(as_string(single(d)?)?),
        "use-backend" => {
            let (head, condition) = split_condition(&d.args);
            let backend = head
                .first()
                .map(|v| v.as_text())
                .ok_or_else(|| {
                    ParseError::at("use_backend requires a backend name", d.location.clone())
                })?;
            front.use_backends.push(UseBackend {
                backend,
                condition,
                location: Some(d.location.clone()),
            });
        }
        "monitor-uri" => front.monitor_uri = Some(as_string(single(d)?)?),
        "monitor-net" => front.monitor_net.push(as_string(single(d)?)?),
        "monitor" => {
            // `monitor fail if <acl>`
            let (head, condition) = split_condition(&d.args);
            let is_fail = head.first().map(|v| v.as_text()).as_deref() == Some("fail");
            if !is_fail {
                return Err(ParseError::at(
                    "monitor directive expects 'fail if <condition>'",
                    d.location.clone(),
                ));
            }
            let condition = condition.ok_or_else(|| {
                ParseError::at("monitor fail requires a condition", d.location.clone())
            })?;
            front.monitor_fail.push(condition.expr);
        }
        "declare" => front.declare_captures.push(lower_declare_capture(d)?),
        _ => return Ok(false),
    }
    Ok(true)
}

fn apply_frontend_block(front: &mut FrontendFacet, b: &Block) -> Result<bool, ParseError> {
    match norm_key(&b.key).as_str() {
        "bind" => front.binds.push(lower_bind(&b.args, Some(&b.body), &b.location)?),
        "route" => lower_route_block(front, b)?,
        _ => return Ok(false),
    }
    Ok(true)
}

/// `route { to BACKEND if ACL ... default: BACKEND }`
fn lower_route_block(front: &mut FrontendFacet, b: &Block) -> Result<(), ParseError> {
    for item in &b.body {
        match item {
            Item::Directive(d) => match norm_key(&d.key).as_str() {
                "to" => {
                    let (head, condition) = split_condition(&d.args);
                    let backend = head.first().map(|v| v.as_text()).ok_or_else(|| {
                        ParseError::at("route 'to' requires a backend name", d.location.clone())
                    })?;
                    front.use_backends.push(UseBackend {
                        backend,
                        condition,
                        location: Some(d.location.clone()),
                    });
                }
                "default" => front.default_backend = Some(as_string(single(d)?)?),
                other => {
                    return Err(ParseError::at(
                        format!("unknown route entry '{other}'"),
                        d.location.clone(),
                    ));
                }
            },
            other => {
                return Err(ParseError::at(
                    "unexpected item in route block",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(())
}

/// `declare capture request len 64`
fn lower_declare_capture(d: &Directive) -> Result<DeclareCapture, ParseError> {
    let words: Vec<String> = d
        .args
        .iter()
        .filter_map(|a| match a {
            Arg::Positional(v) => Some(v.as_text()),
            Arg::Named(..) => None,
        })
        .collect();
    match words.as_slice() {
        [capture, direction, len_kw, length] if capture == "capture" && len_kw == "len" => {
            let direction = match direction.as_str() {
                "request" => CaptureDirection::Request,
                "response" => CaptureDirection::Response,
                other => {
                    return Err(ParseError::at(
                        format!("capture direction must be request or response, found '{other}'"),
                        d.location.clone(),
                    ));
                }
            };
            let length = length.parse().map_err(|_| {
                ParseError::at("capture length must be an integer", d.location.clone())
            })?;
            Ok(DeclareCapture { direction, length })
        }
        _ => Err(ParseError::at(
            "declare expects 'capture request|response len <n>'",
            d.location.clone(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Backend facet
// ---------------------------------------------------------------------------

fn apply_backend_directive(back: &mut BackendFacet, d: &Directive) -> Result<bool, ParseError> {
    match norm_key(&d.key).as_str() {
        "balance" => {
            let value = join_positional(d)?;
            let algorithm = value.split_whitespace().next().unwrap_or_default();
            let base = algorithm.split('(').next().unwrap_or_default();
            if !KNOWN_BALANCE_ALGORITHMS.contains(&base) {
                return Err(ParseError::at(
                    format!("unknown balance algorithm '{algorithm}'"),
                    d.location.clone(),
                ));
            }
            back.balance = Some(Balance(value));
        }
        "hash-type" => back.hash_type = Some(join_positional(d)?),
        "hash-balance-factor" => back.hash_balance_factor = Some(as_int(single(d)?)?),
        "retry-on" => {
            let mut tokens = Vec::new();
            for part in as_string_list(single(d)?)? {
                tokens.extend(part.split(',').map(str::trim).map(String::from));
            }
            back.retry_on = tokens;
        }
        "http-reuse" => back.http_reuse = Some(as_string(single(d)?)?),
        "http-send-name-header" => back.http_send_name_header = Some(as_string(single(d)?)?),
        "load-server-state-from-file" => {
            back.load_server_state_from_file = Some(as_string(single(d)?)?)
        }
        "server-state-file-name" => back.server_state_file_name = Some(as_string(single(d)?)?),
        "dispatch" => back.dispatch = Some(as_string(single(d)?)?),
        "cookie" => back.cookie = Some(join_positional(d)?),
        "use-server" => {
            let (head, condition) = split_condition(&d.args);
            let server = head.first().map(|v| v.as_text()).ok_or_else(|| {
                ParseError::at("use-server requires a server name", d.location.clone())
            })?;
            back.use_servers.push(UseServer {
                server,
                condition,
                location: Some(d.location.clone()),
            });
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn apply_backend_block(back: &mut BackendFacet, b: &Block) -> Result<bool, ParseError> {
    match norm_key(&b.key).as_str() {
        "servers" => lower_servers_block(
            b,
            &mut back.servers,
            &mut back.server_templates,
            &mut back.server_loops,
        )?,
        "server" => back.servers.push(lower_server_block(b)?),
        "default-server" => back.default_server = Some(lower_default_server(b)?),
        "health-check" => back.health_check = Some(lower_health_check(b)?),
        "http-check" => {
            lower_rule_block(b, &mut back.http_check_rules, None, RuleList::HttpCheck)?
        }
        "tcp-check" => lower_rule_block(b, &mut back.tcp_check_rules, None, RuleList::TcpCheck)?,
        _ => return Ok(false),
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// Shared directive surface
// ---------------------------------------------------------------------------

fn apply_common_directive(settings: &mut ProxySettings, d: &Directive) -> Result<bool, ParseError> {
    match norm_key(&d.key).as_str() {
        "mode" => settings.mode = Some(lower_mode(single(d)?)?),
        "description" => settings.description = Some(as_string(single(d)?)?),
        "guid" => settings.guid = Some(as_string(single(d)?)?),
        "maxconn" => settings.maxconn = Some(as_int(single(d)?)?),
        "backlog" => settings.backlog = Some(as_int(single(d)?)?),
        "fullconn" => settings.fullconn = Some(as_int(single(d)?)?),
        "retries" => settings.retries = Some(as_int(single(d)?)?),
        "option" => settings.options.extend(as_string_list(single(d)?)?),
        "log" => settings.log.push(join_positional(d)?),
        "log-tag" => settings.log_tag = Some(as_string(single(d)?)?),
        "log-format" => settings.log_format = Some(as_string(single(d)?)?),
        "log-format-sd" => settings.log_format_sd = Some(as_string(single(d)?)?),
        "error-log-format" => settings.error_log_format = Some(as_string(single(d)?)?),
        "log-steps" => {
            let mut steps = Vec::new();
            for part in as_string_list(single(d)?)? {
                steps.extend(part.split(',').map(str::trim).map(String::from));
            }
            settings.log_steps = steps;
        }
        "timeout" => lower_timeout_map(settings, single(d)?)?,
        "timeout-connect" => settings.timeouts.connect = Some(as_duration(single(d)?)?),
        "timeout-client" => settings.timeouts.client = Some(as_duration(single(d)?)?),
        "timeout-server" => settings.timeouts.server = Some(as_duration(single(d)?)?),
        "timeout-check" => settings.timeouts.check = Some(as_duration(single(d)?)?),
        "timeout-queue" => settings.timeouts.queue = Some(as_duration(single(d)?)?),
        "timeout-http-request" => {
            settings.timeouts.http_request = Some(as_duration(single(d)?)?)
        }
        "timeout-http-keep-alive" => {
            settings.timeouts.http_keep_alive = Some(as_duration(single(d)?)?)
        }
        "timeout-tunnel" => settings.timeouts.tunnel = Some(as_duration(single(d)?)?),
        "timeout-client-fin" => settings.timeouts.client_fin = Some(as_duration(single(d)?)?),
        "timeout-server-fin" => settings.timeouts.server_fin = Some(as_duration(single(d)?)?),
        "timeout-tarpit" => settings.timeouts.tarpit = Some(as_duration(single(d)?)?),
        "force-persist" => settings.force_persist.push(lower_persist_condition(d)?),
        "ignore-persist" => settings.ignore_persist.push(lower_persist_condition(d)?),
        "persist" => settings.persist_rdp_cookie = Some(lower_persist_rdp(d)?),
        "errorloc" => lower_error_map(&mut settings.errorloc, d)?,
        "errorloc302" => lower_error_map(&mut settings.errorloc302, d)?,
        "errorloc303" => lower_error_map(&mut settings.errorloc303, d)?,
        "errorfile" => lower_error_map(&mut settings.errorfile, d)?,
        "errorfiles" => settings.errorfiles = Some(as_string(single(d)?)?),
        "stick-table" => settings.stick_tables.push(join_positional(d)?),
        "filters" | "filter" => {
            for node in list_nodes(single(d)?) {
                settings.filters.push(lower_filter(node)?);
            }
        }
        "acl" => settings.acls.push(lower_acl_directive(d)?),
        _ => return Ok(false),
    }
    Ok(true)
}

fn apply_common_block(settings: &mut ProxySettings, b: &Block) -> Result<bool, ParseError> {
    match norm_key(&b.key).as_str() {
        "http-request" => lower_rule_block(
            b,
            &mut settings.http_request_rules,
            Some(&mut settings.rule_loops),
            RuleList::HttpRequest,
        )?,
        "http-response" => lower_rule_block(
            b,
            &mut settings.http_response_rules,
            Some(&mut settings.rule_loops),
            RuleList::HttpResponse,
        )?,
        "http-after-response" => lower_rule_block(
            b,
            &mut settings.http_after_response_rules,
            Some(&mut settings.rule_loops),
            RuleList::HttpAfterResponse,
        )?,
        "tcp-request" => lower_rule_block(
            b,
            &mut settings.tcp_request_rules,
            Some(&mut settings.rule_loops),
            RuleList::TcpRequest,
        )?,
        "tcp-response" => lower_rule_block(
            b,
            &mut settings.tcp_response_rules,
            Some(&mut settings.rule_loops),
            RuleList::TcpResponse,
        )?,
        "quic-initial" => {
            lower_rule_block(b, &mut settings.quic_initial_rules, None, RuleList::HttpRequest)?
        }
        "acl" => lower_acl_block(settings, b)?,
        "compression" => settings.compression = Some(lower_compression(b)?),
        "email-alert" => settings.email_alert = Some(lower_email_alert(b)?),
        "stats" => settings.stats = Some(lower_stats(b)?),
        "timeout" => {
            for item in &b.body {
                match item {
                    Item::Directive(d) => {
                        apply_timeout_entry(settings, &norm_key(&d.key), single(d)?)?
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
        _ => return Ok(false),
    }
    Ok(true)
}

fn lower_mode(v: &ValueNode) -> Result<Mode, ParseError> {
    let text = as_string(v)?;
    text.parse::<Mode>()
        .map_err(|e| ParseError::at(e.message, v.location.clone()))
}

fn join_positional(d: &Directive) -> Result<String, ParseError> {
    let mut parts = Vec::new();
    for arg in &d.args {
        match arg {
            Arg::Positional(v) => parts.push(v.as_text()),
            Arg::Named(k, v) => parts.push(format!("{k} {}", v.as_text())),
        }
    }
    if parts.is_empty() {
        return Err(ParseError::at(
            format!("directive '{}' requires a value", d.key),
            d.location.clone(),
        ));
    }
    Ok(parts.join(" "))
}

fn lower_timeout_map(settings: &mut ProxySettings, v: &ValueNode) -> Result<(), ParseError> {
    match &v.kind {
        ValueKind::Map(entries) => {
            for (key, value) in entries {
                apply_timeout_entry(settings, &norm_key(key), value)?;
            }
            Ok(())
        }
        _ => Err(ParseError::at(
            "timeout expects a mapping of timeout names to durations",
            v.location.clone(),
        )),
    }
}

fn apply_timeout_entry(
    settings: &mut ProxySettings,
    key: &str,
    value: &ValueNode,
) -> Result<(), ParseError> {
    let duration = as_duration(value)?;
    let t = &mut settings.timeouts;
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
                value.location.clone(),
            ));
        }
    }
    Ok(())
}

/// `force-persist if <condition>` — the condition expression is stored
/// bare; the serializer re-adds the `if`.
fn lower_persist_condition(d: &Directive) -> Result<String, ParseError> {
    let (_, condition) = split_condition(&d.args);
    match condition {
        Some(c) if !c.negated => Ok(c.expr),
        Some(_) => Err(ParseError::at(
            "persist directives take an 'if' condition",
            d.location.clone(),
        )),
        None => Err(ParseError::at(
            format!("'{}' requires an 'if' condition", d.key),
            d.location.clone(),
        )),
    }
}

/// `persist rdp-cookie` / `persist rdp-cookie("name")`
fn lower_persist_rdp(d: &Directive) -> Result<PersistRdpCookie, ParseError> {
    match d.args.as_slice() {
        [Arg::Positional(v)] => match &v.kind {
            ValueKind::Ident(word) if word == "rdp-cookie" => {
                Ok(PersistRdpCookie { cookie: None })
            }
            ValueKind::Call { name, arg } if name == "rdp-cookie" => Ok(PersistRdpCookie {
                cookie: arg.as_ref().map(|a| a.as_text()),
            }),
            _ => Err(ParseError::at(
                "persist supports the rdp-cookie form",
                v.location.clone(),
            )),
        },
        _ => Err(ParseError::at(
            "persist expects 'rdp-cookie' or 'rdp-cookie(\"name\")'",
            d.location.clone(),
        )),
    }
}

/// `errorloc 503 "/errors/503.html"` or `errorloc: { 503: "/x" }`
fn lower_error_map(
    map: &mut std::collections::BTreeMap<i64, String>,
    d: &Directive,
) -> Result<(), ParseError> {
    match d.args.as_slice() {
        [Arg::Positional(v)] if matches!(v.kind, ValueKind::Map(_)) => {
            if let ValueKind::Map(entries) = &v.kind {
                for (key, value) in entries {
                    let status = key.parse().map_err(|_| {
                        ParseError::at(
                            format!("status code '{key}' must be an integer"),
                            value.location.clone(),
                        )
                    })?;
                    map.insert(status, as_string(value)?);
                }
            }
            Ok(())
        }
        [Arg::Positional(status), Arg::Positional(target)] => {
            map.insert(as_int(status)?, as_string(target)?);
            Ok(())
        }
        _ => Err(ParseError::at(
            format!("'{}' expects a status code and a target", d.key),
            d.location.clone(),
        )),
    }
}

fn list_nodes(v: &ValueNode) -> Vec<&ValueNode> {
    match &v.kind {
        ValueKind::List(items) => items.iter().collect(),
        _ => vec![v],
    }
}

/// One filter entry: `{ type: "spoe", engine: "agent", config: "/path" }`
fn lower_filter(v: &ValueNode) -> Result<Filter, ParseError> {
    let ValueKind::Map(entries) = &v.kind else {
        return Err(ParseError::at(
            "filters entries must be mappings",
            v.location.clone(),
        ));
    };
    let get = |key: &str| -> Option<&ValueNode> {
        entries
            .iter()
            .find(|(k, _)| norm_key(k) == key)
            .map(|(_, v)| v)
    };
    let kind = get("type").map(|v| v.as_text()).ok_or_else(|| {
        ParseError::at("filter entry requires a 'type'", v.location.clone())
    })?;
    let text = |key: &str| -> Result<Option<String>, ParseError> {
        get(key).map(as_string).transpose()
    };
    Ok(match norm_key(&kind).as_str() {
        "compression" => Filter::Compression,
        "spoe" => Filter::Spoe {
            engine: text("engine")?,
            config: text("config")?,
        },
        "cache" => Filter::Cache { name: text("name")? },
        "trace" => Filter::Trace { name: text("name")? },
        "bwlim-in" => Filter::BwlimIn {
            name: text("name")?,
            default_limit: text("default-limit")?,
            default_period: text("default-period")?,
            limit: text("limit")?,
            period: text("period")?,
            key: text("key")?,
            table: text("table")?,
        },
        "bwlim-out" => Filter::BwlimOut {
            name: text("name")?,
            default_limit: text("default-limit")?,
            default_period: text("default-period")?,
            limit: text("limit")?,
            period: text("period")?,
            key: text("key")?,
            table: text("table")?,
        },
        other => {
            return Err(ParseError::at(
                format!("unknown filter type '{other}'"),
                v.location.clone(),
            ));
        }
    })
}

// ---------------------------------------------------------------------------
// ACLs
// ---------------------------------------------------------------------------

/// Directive form: `acl is_api path_beg "/api"` or `acl is_api @tpl`.
fn lower_acl_directive(d: &Directive) -> Result<Acl, ParseError> {
    let mut acl = Acl {
        location: Some(d.location.clone()),
        ..Default::default()
    };
    let mut positional = d.args.iter().filter_map(|a| match a {
        Arg::Positional(v) => Some(v),
        Arg::Named(..) => None,
    });
    acl.name = positional
        .next()
        .map(|v| v.as_text())
        .ok_or_else(|| ParseError::at("acl requires a name", d.location.clone()))?;
    for v in positional {
        match &v.kind {
            ValueKind::TemplateRef(name) => acl.template_refs.push(name.clone()),
            _ if acl.criterion.is_none() => acl.criterion = Some(v.as_text()),
            _ => acl.values.push(v.as_text()),
        }
    }
    Ok(acl)
}

/// Block forms: `acl NAME { criterion values }` and the listen-style
/// `acl { NAME criterion values ... }`.
fn lower_acl_block(settings: &mut ProxySettings, b: &Block) -> Result<(), ParseError> {
    if b.args.is_empty() {
        for item in &b.body {
            match item {
                Item::Directive(d) => {
                    let mut acl = Acl {
                        name: d.key.clone(),
                        location: Some(d.location.clone()),
                        ..Default::default()
                    };
                    let mut positional = d.args.iter().filter_map(|a| match a {
                        Arg::Positional(v) => Some(v),
                        Arg::Named(..) => None,
                    });
                    acl.criterion = positional.next().map(|v| v.as_text());
                    acl.values = positional.map(|v| v.as_text()).collect();
                    settings.acls.push(acl);
                }
                other => {
                    return Err(ParseError::at(
                        "acl blocks may only contain acl entries",
                        item_location(other).clone(),
                    ));
                }
            }
        }
        return Ok(());
    }

    let name = match &b.args[0] {
        Arg::Positional(v) => v.as_text(),
        Arg::Named(..) => {
            return Err(ParseError::at("acl requires a name", b.location.clone()));
        }
    };
    let mut acl = Acl {
        name,
        location: Some(b.location.clone()),
        ..Default::default()
    };
    for item in &b.body {
        match item {
            Item::Directive(d) => match norm_key(&d.key).as_str() {
                "criterion" => acl.criterion = Some(as_string(single(d)?)?),
                "values" => acl.values = as_string_list(single(d)?)?,
                _ => {
                    // `path_beg "/api"` shorthand: the key is the criterion.
                    acl.criterion = Some(d.key.clone());
                    acl.values = d
                        .args
                        .iter()
                        .filter_map(|a| match a {
                            Arg::Positional(v) => Some(v.as_text()),
                            Arg::Named(..) => None,
                        })
                        .collect();
                }
            },
            Item::Spread { name, .. } => acl.template_refs.push(name.clone()),
            other => {
                return Err(ParseError::at(
                    "unexpected item in acl block",
                    item_location(other).clone(),
                ));
            }
        }
    }
    settings.acls.push(acl);
    Ok(())
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn lower_rule_block(
    b: &Block,
    rules: &mut Vec<Rule>,
    mut loops: Option<&mut Vec<RuleLoop>>,
    list: RuleList,
) -> Result<(), ParseError> {
    for item in &b.body {
        match item {
            Item::Directive(d) => rules.push(lower_rule(d)?),
            Item::For(f) => {
                let Some(loops) = loops.as_deref_mut() else {
                    return Err(ParseError::at(
                        "loops are not supported in this rule block",
                        f.location.clone(),
                    ));
                };
                let mut body = Vec::new();
                for inner in &f.body {
                    match inner {
                        Item::Directive(d) => body.push(lower_rule(d)?),
                        other => {
                            return Err(ParseError::at(
                                "rule loop bodies may only contain rules",
                                item_location(other).clone(),
                            ));
                        }
                    }
                }
                loops.push(RuleLoop {
                    var: f.var.clone(),
                    iterable: lower_iterable(&f.iterable)?,
                    list,
                    body,
                    location: Some(f.location.clone()),
                });
            }
            other => {
                return Err(ParseError::at(
                    "unexpected item in rule block",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(())
}

fn lower_rule(d: &Directive) -> Result<Rule, ParseError> {
    let (head, condition) = split_condition(&d.args);
    let mut rule = Rule {
        action: norm_key(&d.key),
        condition,
        location: Some(d.location.clone()),
        ..Default::default()
    };
    for v in head {
        rule.args.push(v.as_text());
    }
    for arg in &d.args {
        if let Arg::Named(key, value) = arg {
            rule.params.push((norm_key(key), as_string(value)?));
        }
    }
    Ok(rule)
}

fn lower_compression(b: &Block) -> Result<Compression, ParseError> {
    let mut c = Compression::default();
    for item in &b.body {
        match item {
            Item::Directive(d) => match norm_key(&d.key).as_str() {
                "algo" | "algorithm" => c.algo = Some(as_string(single(d)?)?),
                "type" | "types" => c.types = as_string_list(single(d)?)?,
                "offload" => c.offload = Some(as_bool(single(d)?)?),
                other => {
                    return Err(unknown_directive("compression", other, d.location.clone()));
                }
            },
            other => {
                return Err(ParseError::at(
                    "unexpected item in compression block",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(c)
}

pub(super) fn lower_email_alert(b: &Block) -> Result<EmailAlert, ParseError> {
    let mut e = EmailAlert::default();
    for item in &b.body {
        match item {
            Item::Directive(d) => match norm_key(&d.key).as_str() {
                "mailers" => e.mailers = Some(as_string(single(d)?)?),
                "from" => e.from = Some(as_string(single(d)?)?),
                "to" => e.to = Some(as_string(single(d)?)?),
                "level" => e.level = Some(as_string(single(d)?)?),
                "myhostname" => e.myhostname = Some(as_string(single(d)?)?),
                other => {
                    return Err(unknown_directive("email-alert", other, d.location.clone()));
                }
            },
            other => {
                return Err(ParseError::at(
                    "unexpected item in email-alert block",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(e)
}

fn lower_stats(b: &Block) -> Result<StatsConfig, ParseError> {
    let mut s = StatsConfig::default();
    for item in &b.body {
        match item {
            Item::Directive(d) => match norm_key(&d.key).as_str() {
                "enable" => s.enable = Some(as_bool(single(d)?)?),
                "uri" => s.uri = Some(as_string(single(d)?)?),
                "refresh" => s.refresh = Some(as_duration(single(d)?)?),
                "auth" => s.auth = Some(as_string(single(d)?)?),
                "realm" => s.realm = Some(as_string(single(d)?)?),
                "admin" => {
                    let (_, condition) = split_condition(&d.args);
                    s.admin_condition = match condition {
                        Some(Condition { expr, .. }) => Some(expr),
                        None => Some(as_string(single(d)?)?),
                    };
                }
                "hide-version" => s.hide_version = Some(as_bool(single(d)?)?),
                other => {
                    return Err(unknown_directive("stats", other, d.location.clone()));
                }
            },
            other => {
                return Err(ParseError::at(
                    "unexpected item in stats block",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(s)
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
    fn frontend_basics() {
        let ir = lower_src(
            "config t { frontend web { bind *:80\n mode: http\n default_backend: servers } }",
        );
        let fe = &ir.frontends[0];
        assert_eq!(fe.name, "web");
        assert_eq!(fe.front.binds[0].address, "*:80");
        assert_eq!(fe.settings.mode, Some(Mode::Http));
        assert_eq!(fe.front.default_backend.as_deref(), Some("servers"));
    }

    #[test]
    fn bind_with_ssl_block() {
        let ir = lower_src(
            "config t { frontend web { bind *:443 ssl { cert: \"/etc/ssl/cert.pem\"\n alpn: [\"h2\", \"http/1.1\"] } } }",
        );
        let bind = &ir.frontends[0].front.binds[0];
        assert_eq!(bind.address, "*:443");
        assert_eq!(bind.ssl, Some(true));
        assert_eq!(bind.ssl_cert.as_deref(), Some("/etc/ssl/cert.pem"));
        assert_eq!(bind.alpn, vec!["h2", "http/1.1"]);
    }

    #[test]
    fn bind_flag_options() {
        let ir = lower_src(
            "config t { frontend web { bind *:80 accept-proxy true defer-accept true maxconn 5000 } }",
        );
        let bind = &ir.frontends[0].front.binds[0];
        assert!(bind.options.contains_key("accept-proxy"));
        assert!(bind.options.contains_key("defer-accept"));
        assert_eq!(bind.options.get("maxconn").map(String::as_str), Some("5000"));
    }

    #[test]
    fn acl_forms() {
        let ir = lower_src(
            "config t { listen web { bind *:80\n acl { is_api path_beg \"/api\"\n is_static path_beg \"/static\" } } }",
        );
        let acls = &ir.listens[0].settings.acls;
        assert_eq!(acls.len(), 2);
        assert_eq!(acls[0].name, "is_api");
        assert_eq!(acls[0].criterion.as_deref(), Some("path_beg"));
        assert_eq!(acls[0].values, vec!["/api"]);

        let ir = lower_src(
            "config t { frontend web { acl is_api { path_beg \"/api\" }\n acl quick @api_tpl } }",
        );
        let acls = &ir.frontends[0].settings.acls;
        assert_eq!(acls[0].criterion.as_deref(), Some("path_beg"));
        assert_eq!(acls[1].template_refs, vec!["api_tpl"]);
    }

    #[test]
    fn route_block_lowers_to_use_backends() {
        let ir = lower_src(
            "config t { frontend web { bind *:80\n route { to api if is_api\n default: servers } }\n backend api { }\n backend servers { } }",
        );
        let front = &ir.frontends[0].front;
        assert_eq!(front.use_backends.len(), 1);
        assert_eq!(front.use_backends[0].backend, "api");
        assert_eq!(
            front.use_backends[0].condition.as_ref().unwrap().expr,
            "is_api"
        );
        assert_eq!(front.default_backend.as_deref(), Some("servers"));
    }

    #[test]
    fn http_request_rules_preserve_order_and_params() {
        let ir = lower_src(
            "config t { frontend web { bind *:80\n http-request { deny if is_blocked\n set_header header: \"X-Custom\" value: \"v\" } } }",
        );
        let rules = &ir.frontends[0].settings.http_request_rules;
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].action, "deny");
        assert_eq!(rules[0].condition.as_ref().unwrap().expr, "is_blocked");
        assert_eq!(rules[1].action, "set-header");
        assert_eq!(
            rules[1].params,
            vec![
                ("header".to_string(), "X-Custom".to_string()),
                ("value".to_string(), "v".to_string())
            ]
        );
    }

    #[test]
    fn backend_balance_and_hash() {
        let ir = lower_src(
            "config t { backend app { balance: uri\n hash-type: consistent\n hash-balance-factor: 150 } }",
        );
        let back = &ir.backends[0].back;
        assert_eq!(back.balance.as_ref().unwrap().as_str(), "uri");
        assert_eq!(back.hash_type.as_deref(), Some("consistent"));
        assert_eq!(back.hash_balance_factor, Some(150));
    }

    #[test]
    fn unknown_balance_is_rejected() {
        let node = parse_source(
            "config t { backend app { balance: quantum } }",
            "test.hap",
        )
        .unwrap();
        let err = lower(node, &mut Vec::new()).unwrap_err();
        assert!(err.message.contains("unknown balance algorithm"));
    }

    #[test]
    fn filters_list() {
        let ir = lower_src(
            "config t { frontend web { bind *:80\n filters: [ { type: \"compression\" }, { type: \"spoe\", engine: \"my_agent\", config: \"/etc/haproxy/spoe.conf\" } ] } }",
        );
        let filters = &ir.frontends[0].settings.filters;
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0], Filter::Compression);
        assert_eq!(
            filters[1],
            Filter::Spoe {
                engine: Some("my_agent".into()),
                config: Some("/etc/haproxy/spoe.conf".into())
            }
        );
    }

    #[test]
    fn timeouts_flat_and_nested() {
        let ir = lower_src(
            "config t { listen app { bind *:8080\n timeout_client: 30s\n timeout: { connect: 5s } } }",
        );
        let t = &ir.listens[0].settings.timeouts;
        assert_eq!(t.client.as_deref(), Some("30s"));
        assert_eq!(t.connect.as_deref(), Some("5s"));
    }

    #[test]
    fn email_alert_and_monitor() {
        let ir = lower_src(
            "config t { frontend web { bind *:80\n monitor_uri: \"/health\"\n monitor-net \"10.0.0.0/8\"\n monitor fail if is_maintenance\n email-alert { level: alert\n mailers: mymailers } } }",
        );
        let fe = &ir.frontends[0];
        assert_eq!(fe.front.monitor_uri.as_deref(), Some("/health"));
        assert_eq!(fe.front.monitor_net, vec!["10.0.0.0/8"]);
        assert_eq!(fe.front.monitor_fail, vec!["is_maintenance"]);
        let alert = fe.settings.email_alert.as_ref().unwrap();
        assert_eq!(alert.level.as_deref(), Some("alert"));
        assert_eq!(alert.mailers.as_deref(), Some("mymailers"));
    }

    #[test]
    fn persist_directives() {
        let ir = lower_src(
            "config t { backend app { force-persist if admin_session\n ignore-persist if health_check\n persist rdp-cookie(\"custom_rdp\") } }",
        );
        let settings = &ir.backends[0].settings;
        assert_eq!(settings.force_persist, vec!["admin_session"]);
        assert_eq!(settings.ignore_persist, vec!["health_check"]);
        assert_eq!(
            settings.persist_rdp_cookie.as_ref().unwrap().cookie.as_deref(),
            Some("custom_rdp")
        );
    }

    #[test]
    fn errorloc_positional_form() {
        let ir = lower_src(
            "config t { frontend web { bind *:80\n errorloc 503 \"/errors/503.html\"\n errorfile 503 \"/etc/haproxy/errors/503.http\" } }",
        );
        let settings = &ir.frontends[0].settings;
        assert_eq!(
            settings.errorloc.get(&503).map(String::as_str),
            Some("/errors/503.html")
        );
        assert_eq!(
            settings.errorfile.get(&503).map(String::as_str),
            Some("/etc/haproxy/errors/503.http")
        );
    }
}
