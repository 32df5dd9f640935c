//! Lowering: concrete syntax tree → `ConfigIR`.
//!
//! Lowering is a total function over grammatically valid trees; the only
//! failures it produces are semantic shape errors (unknown directives,
//! wrong argument types). Directive keys are matched after normalizing
//! `_` to `-`, so `monitor_uri` and `monitor-uri` are the same knob.

mod global;
mod proxy;
mod sections;
mod server;

use crate::ast::{Arg, ConfigNode, Directive, Item, ValueKind, ValueNode};
use crate::error::{ParseError, SourceLocation, ValidationWarning};
use crate::ir::{Condition, ConfigIR, Template, Value, Variable};
use tracing::debug;

/// Lower a parsed config to IR, accumulating non-fatal warnings.
pub fn lower(
    node: ConfigNode,
    warnings: &mut Vec<ValidationWarning>,
) -> Result<ConfigIR, ParseError> {
    let mut ir = ConfigIR::new(node.name.clone());
    debug!(config = %node.name, "lowering configuration");

    for item in &node.items {
        match item {
            Item::Directive(d) => match norm_key(&d.key).as_str() {
                "version" => ir.version = Some(as_string(single(d)?)?),
                "name" => ir.name = as_string(single(d)?)?,
                other => {
                    return Err(unknown_directive("config", other, d.location.clone()));
                }
            },
            Item::Block(b) => {
                let key = norm_key(&b.key);
                match key.as_str() {
                    "global" => {
                        ir.global = Some(global::lower_global(b)?);
                    }
                    "defaults" => {
                        ir.defaults = Some(sections::lower_defaults(b)?);
                    }
                    "frontend" => {
                        let name = block_name(b, "frontend")?;
                        ir.frontends.push(proxy::lower_frontend(name, b)?);
                    }
                    "backend" => {
                        let name = block_name(b, "backend")?;
                        ir.backends.push(proxy::lower_backend(name, b)?);
                    }
                    "listen" => {
                        let name = block_name(b, "listen")?;
                        ir.listens.push(proxy::lower_listen(name, b)?);
                    }
                    "peers" => {
                        let name = block_name(b, "peers")?;
                        ir.peers.push(sections::lower_peers(name, b)?);
                    }
                    "resolvers" => {
                        let name = block_name(b, "resolvers")?;
                        ir.resolvers.push(sections::lower_resolvers(name, b)?);
                    }
                    "mailers" => {
                        let name = block_name(b, "mailers")?;
                        ir.mailers.push(sections::lower_mailers(name, b)?);
                    }
                    "lua" => {
                        sections::lower_lua(b, &mut ir.lua_scripts)?;
                    }
                    "template" => {
                        let name = block_name(b, "template")?;
                        let template = lower_template(name.clone(), b)?;
                        ir.templates.insert(name, template);
                    }
                    "health-check-template" => {
                        let name = block_name(b, "health-check-template")?;
                        let template = lower_template(name.clone(), b)?;
                        ir.health_check_templates.insert(name, template);
                    }
                    other => {
                        return Err(unknown_directive("config", other, b.location.clone()));
                    }
                }
            }
            Item::Let(l) => {
                let value = to_ir_value(&l.value)?;
                ir.variables.insert(
                    l.name.clone(),
                    Variable {
                        name: l.name.clone(),
                        value,
                        location: Some(l.location.clone()),
                    },
                );
            }
            Item::Import { path, location } => {
                warnings.push(ValidationWarning::at(
                    format!("import '{path}' recorded but not inlined"),
                    location.clone(),
                ));
                ir.imports.push(path.clone());
            }
            Item::For(f) => {
                return Err(ParseError::at(
                    "loops are only supported inside servers and rule blocks",
                    f.location.clone(),
                ));
            }
            Item::Spread { location, .. } => {
                return Err(ParseError::at(
                    "template spreads are not valid at config level",
                    location.clone(),
                ));
            }
            Item::RawBlock(raw) => {
                return Err(ParseError::at(
                    format!("'{}' blocks are only valid inside lua sections", raw.key),
                    raw.location.clone(),
                ));
            }
        }
    }

    debug!(
        frontends = ir.frontends.len(),
        backends = ir.backends.len(),
        listens = ir.listens.len(),
        "lowering complete"
    );
    Ok(ir)
}

fn lower_template(name: String, b: &crate::ast::Block) -> Result<Template, ParseError> {
    let mut params = Vec::new();
    for item in &b.body {
        match item {
            Item::Directive(d) => {
                let value = match d.args.len() {
                    0 => Value::Bool(true),
                    1 => match &d.args[0] {
                        Arg::Positional(v) => to_ir_value(v)?,
                        Arg::Named(..) => {
                            return Err(ParseError::at(
                                "template parameters take plain values",
                                d.location.clone(),
                            ));
                        }
                    },
                    _ => Value::Str(
                        d.args
                            .iter()
                            .map(|a| match a {
                                Arg::Positional(v) => v.as_text(),
                                Arg::Named(k, v) => format!("{k} {}", v.as_text()),
                            })
                            .collect::<Vec<_>>()
                            .join(" "),
                    ),
                };
                params.push((norm_key(&d.key), value));
            }
            other => {
                return Err(ParseError::at(
                    "templates may only contain parameter assignments",
                    item_location(other).clone(),
                ));
            }
        }
    }
    Ok(Template {
        name,
        params,
        location: Some(b.location.clone()),
    })
}

pub(crate) fn item_location(item: &Item) -> &SourceLocation {
    match item {
        Item::Directive(d) => &d.location,
        Item::Block(b) => &b.location,
        Item::Spread { location, .. } => location,
        Item::For(f) => &f.location,
        Item::Let(l) => &l.location,
        Item::Import { location, .. } => location,
        Item::RawBlock(r) => &r.location,
    }
}

fn block_name(b: &crate::ast::Block, what: &str) -> Result<String, ParseError> {
    match b.args.first() {
        Some(Arg::Positional(v)) => Ok(v.as_text()),
        _ => Err(ParseError::at(
            format!("{what} section requires a name"),
            b.location.clone(),
        )),
    }
}

/// Normalize a directive key: underscores and hyphens are equivalent in
/// the DSL. Dotted free-form keys (`tune.*`, `profiling.*`, ...) keep
/// their native spelling.
pub(crate) fn norm_key(key: &str) -> String {
    if key.contains('.') {
        key.to_string()
    } else {
        key.replace('_', "-")
    }
}

pub(crate) fn is_tuning_key(key: &str) -> bool {
    key.starts_with("tune.")
        || key.starts_with("profiling.")
        || key.starts_with("httpclient.")
        || key.starts_with("debug.")
}

// ---------------------------------------------------------------------------
// Argument and value accessors
// ---------------------------------------------------------------------------

pub(crate) fn single(d: &Directive) -> Result<&ValueNode, ParseError> {
    match d.args.as_slice() {
        [Arg::Positional(v)] => Ok(v),
        _ => Err(ParseError::at(
            format!("directive '{}' expects exactly one value", d.key),
            d.location.clone(),
        )),
    }
}

pub(crate) fn as_string(v: &ValueNode) -> Result<String, ParseError> {
    match &v.kind {
        ValueKind::Str(s) | ValueKind::Ident(s) | ValueKind::Duration(s) => Ok(s.clone()),
        ValueKind::Int(n) => Ok(n.to_string()),
        ValueKind::Float(f) => Ok(f.to_string()),
        ValueKind::Bool(b) => Ok(b.to_string()),
        _ => Err(ParseError::at(
            "expected a string value",
            v.location.clone(),
        )),
    }
}

pub(crate) fn as_int(v: &ValueNode) -> Result<i64, ParseError> {
    match &v.kind {
        ValueKind::Int(n) => Ok(*n),
        ValueKind::Str(s) | ValueKind::Ident(s) => s.parse().map_err(|_| {
            ParseError::at(format!("expected an integer, found '{s}'"), v.location.clone())
        }),
        _ => Err(ParseError::at(
            "expected an integer value",
            v.location.clone(),
        )),
    }
}

pub(crate) fn as_bool(v: &ValueNode) -> Result<bool, ParseError> {
    match &v.kind {
        ValueKind::Bool(b) => Ok(*b),
        ValueKind::Ident(s) if s == "true" => Ok(true),
        ValueKind::Ident(s) if s == "false" => Ok(false),
        _ => Err(ParseError::at(
            "expected a boolean value",
            v.location.clone(),
        )),
    }
}

/// Durations keep their literal spelling; bare integers pass through so
/// `timeout connect 5000` works like the target format.
pub(crate) fn as_duration(v: &ValueNode) -> Result<String, ParseError> {
    match &v.kind {
        ValueKind::Duration(s) | ValueKind::Str(s) | ValueKind::Ident(s) => Ok(s.clone()),
        ValueKind::Int(n) => Ok(n.to_string()),
        _ => Err(ParseError::at(
            "expected a duration value",
            v.location.clone(),
        )),
    }
}

pub(crate) fn as_string_list(v: &ValueNode) -> Result<Vec<String>, ParseError> {
    match &v.kind {
        ValueKind::List(items) => items.iter().map(as_string).collect(),
        _ => Ok(vec![as_string(v)?]),
    }
}

pub(crate) fn to_ir_value(v: &ValueNode) -> Result<Value, ParseError> {
    Ok(match &v.kind {
        ValueKind::Str(s) => Value::Str(s.clone()),
        ValueKind::Ident(s) => Value::Str(s.clone()),
        ValueKind::Int(n) => Value::Int(*n),
        ValueKind::Float(f) => Value::Float(*f),
        ValueKind::Bool(b) => Value::Bool(*b),
        ValueKind::Duration(s) => Value::Duration(s.clone()),
        ValueKind::Range(a, b) => Value::Str(format!("{a}..{b}")),
        ValueKind::List(items) => {
            Value::List(items.iter().map(to_ir_value).collect::<Result<_, _>>()?)
        }
        ValueKind::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, val)| Ok((k.clone(), to_ir_value(val)?)))
                .collect::<Result<_, ParseError>>()?,
        ),
        ValueKind::EnvCall { name, default } => Value::Env {
            name: name.clone(),
            default: match default {
                Some(d) => Some(Box::new(to_ir_value(d)?)),
                None => None,
            },
        },
        ValueKind::TemplateRef(_) | ValueKind::Call { .. } => {
            return Err(ParseError::at(
                "value not allowed in this position",
                v.location.clone(),
            ));
        }
    })
}

/// Split a positional argument list at a trailing `if` / `unless` clause.
/// Returns the arguments before the clause and the parsed condition.
pub(crate) fn split_condition(args: &[Arg]) -> (Vec<&ValueNode>, Option<Condition>) {
    let mut head = Vec::new();
    let mut iter = args.iter().enumerate();
    while let Some((idx, arg)) = iter.next() {
        if let Arg::Positional(v) = arg {
            if let ValueKind::Ident(word) = &v.kind {
                if word == "if" || word == "unless" {
                    let expr = args[idx + 1..]
                        .iter()
                        .map(|a| match a {
                            Arg::Positional(v) => v.as_text(),
                            Arg::Named(k, v) => format!("{k}: {}", v.as_text()),
                        })
                        .collect::<Vec<_>>()
                        .join(" ");
                    let condition = if word == "unless" {
                        Condition::unless(expr)
                    } else {
                        Condition::if_(expr)
                    };
                    return (head, Some(condition));
                }
            }
            head.push(v);
        }
    }
    (head, None)
}

// ---------------------------------------------------------------------------
// Unknown-directive diagnostics
// ---------------------------------------------------------------------------

/// Directives that are valid somewhere in the grammar. Used to tell
/// "valid elsewhere" apart from "never heard of it".
const ALL_DIRECTIVES: &[&str] = &[
    "acl", "agent-addr", "agent-check", "agent-inter", "agent-port", "agent-send", "alpn",
    "anonkey", "backlog", "balance", "bind", "busy-polling", "ca-base", "ca-file", "check",
    "check-address", "check-port", "check-proto", "check-send-proxy", "check-sni", "chroot",
    "ciphers", "compression", "cookie", "cpu-map", "crl-file", "crt", "crt-base", "curves",
    "daemon", "declare", "default", "default-backend", "default-path", "default-server",
    "description", "deviceatlas-json-file", "deviceatlas-log-level",
    "deviceatlas-properties-cookie", "deviceatlas-separator", "disabled", "dispatch",
    "email-alert", "error-limit", "error-log-format", "errorfile", "errorfiles", "errorloc",
    "errorloc302", "errorloc303", "expect", "external-check", "fall", "fd-hard-limit",
    "filter", "filters", "force-cfg-parser-pause", "force-persist", "fullconn", "gid",
    "group", "guid", "hard-stop-after", "hash-balance-factor", "hash-type", "health-check",
    "hold-nx", "hold-obsolete", "hold-other", "hold-refused", "hold-timeout", "hold-valid",
    "http-after-response", "http-check", "http-request", "http-response", "http-reuse",
    "http-send-name-header", "id", "ignore-persist", "init-addr", "inter", "interface",
    "issuers-chain-path", "key-base", "load", "load-server-state-from-file", "log",
    "log-format", "log-format-sd", "log-send-hostname", "log-steps", "log-tag", "mailer",
    "master-worker", "max-reuse", "max-spread-checks", "maxcompcpuusage", "maxcomprate",
    "maxconn", "maxconnrate", "maxpipes", "maxqueue", "maxsessrate", "maxsslrate",
    "maxzlibmem", "method", "minconn", "mode", "monitor", "monitor-net", "monitor-uri",
    "mworker-max-reloads", "name", "nameserver", "namespace", "nbproc", "nbthread", "node",
    "numa-cpu-mapping", "observe", "on-error", "on-marked-down", "on-marked-up", "option",
    "peer", "persist", "pidfile", "pool-max-conn", "pool-purge-delay", "presetenv", "proto",
    "quic-initial", "quiet", "redir", "resetenv", "resolve-prefer", "resolve-retries",
    "resolvers", "retries", "retry-on", "rise", "route", "accepted-payload-size",
    "send-proxy", "send-proxy-v2", "server", "server-state-base", "server-state-file",
    "server-state-file-name", "server-template", "servers", "set-dumpable", "setcap",
    "setenv", "slowstart", "sni", "spread-checks", "ssl", "ssl-default-bind-ciphers",
    "ssl-default-bind-ciphersuites", "ssl-default-bind-client-sigalgs",
    "ssl-default-bind-curves", "ssl-default-bind-options", "ssl-default-bind-sigalgs",
    "ssl-default-server-ciphers", "ssl-default-server-ciphersuites",
    "ssl-default-server-client-sigalgs", "ssl-default-server-curves",
    "ssl-default-server-sigalgs", "ssl-dh-param-file", "ssl-engine", "ssl-load-extra-del-ext",
    "ssl-load-extra-files", "ssl-mode-async", "ssl-propquery", "ssl-provider",
    "ssl-provider-path", "ssl-security-level", "ssl-server-verify", "stats", "stats-socket",
    "stick-table", "strict-limits", "tcp-check", "tcp-request", "tcp-response",
    "thread", "thread-groups", "timeout", "timeout-mail", "timeout-resolve", "timeout-retry",
    "track", "ulimit-n", "unix-bind", "unsetenv", "uri", "use-backend", "use-server",
    "usesrc", "user", "verify", "version", "warn-blocked-traffic-after", "weight",
    "51degrees-cache-size", "51degrees-data-file", "51degrees-property-name-list",
    "51degrees-property-separator", "wurfl-cache-size", "wurfl-data-file",
    "wurfl-engine-mode", "wurfl-information-list", "wurfl-information-list-separator",
    "wurfl-patch-file", "wurfl-useragent-priority",
];

pub(crate) fn unknown_directive(section: &str, key: &str, location: SourceLocation) -> ParseError {
    let key = norm_key(key);
    if is_tuning_key(&key) || ALL_DIRECTIVES.contains(&key.as_str()) {
        ParseError::at(
            format!("directive '{key}' is not valid in a {section} section"),
            location,
        )
    } else {
        ParseError::at(
            format!("unknown directive '{key}' in {section} section"),
            location,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn lower_src(src: &str) -> ConfigIR {
        let node = parse_source(src, "test.hap").expect("parse");
        let mut warnings = Vec::new();
        lower(node, &mut warnings).expect("lower")
    }

    #[test]
    fn lowers_minimal_config() {
        let ir = lower_src("config minimal { global { maxconn: 1000 } }");
        assert_eq!(ir.name, "minimal");
        assert_eq!(ir.global.as_ref().unwrap().maxconn, Some(1000));
    }

    #[test]
    fn lowers_variables_and_imports() {
        let node = parse_source(
            "config t { let port = 8080\n import \"common/defaults.hcl\" }",
            "test.hap",
        )
        .unwrap();
        let mut warnings = Vec::new();
        let ir = lower(node, &mut warnings).unwrap();
        assert_eq!(ir.variables["port"].value, Value::Int(8080));
        assert_eq!(ir.imports, vec!["common/defaults.hcl"]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("not inlined"));
    }

    #[test]
    fn lowers_template_params_in_order() {
        let ir = lower_src(
            "config t { template defaults { check: true\n inter: 3s\n rise: 5 } }",
        );
        let tpl = &ir.templates["defaults"];
        assert_eq!(tpl.params.len(), 3);
        assert_eq!(tpl.params[0].0, "check");
        assert_eq!(tpl.params[1], ("inter".into(), Value::Duration("3s".into())));
    }

    #[test]
    fn unknown_config_directive_is_rejected() {
        let node = parse_source("config t { bogus_thing: 1 }", "test.hap").unwrap();
        let err = lower(node, &mut Vec::new()).unwrap_err();
        assert!(err.message.contains("unknown directive"));
    }

    #[test]
    fn misplaced_directive_gets_distinct_message() {
        let node = parse_source("config t { maxconn: 50 }", "test.hap").unwrap();
        let err = lower(node, &mut Vec::new()).unwrap_err();
        assert!(err.message.contains("not valid in a config section"));
    }
}
