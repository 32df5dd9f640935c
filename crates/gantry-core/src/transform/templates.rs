//! Template expansion: merge `@name` parameter bags into entities.
//!
//! Merge policy: fields the entity set explicitly always win. Between
//! templates, later spreads override earlier ones. Unknown template
//! references and inapplicable parameters degrade to warnings; the
//! entity proceeds unexpanded.

use crate::error::ValidationWarning;
use crate::ir::{
    Acl, BackendFacet, Balance, ConfigIR, HealthCheck, ProxySettings, Server, Template, Value,
};
use std::collections::BTreeMap;
use tracing::debug;

pub struct TemplateExpander {
    ir: ConfigIR,
}

impl TemplateExpander {
    pub fn new(ir: ConfigIR) -> Self {
        Self { ir }
    }

    pub fn expand(mut self, warnings: &mut Vec<ValidationWarning>) -> ConfigIR {
        let templates = self.ir.templates.clone();
        let health_templates = self.ir.health_check_templates.clone();
        debug!(
            templates = templates.len(),
            health_check_templates = health_templates.len(),
            "expanding template spreads"
        );

        for frontend in &mut self.ir.frontends {
            expand_settings(&mut frontend.settings, None, &templates, warnings);
        }
        for backend in &mut self.ir.backends {
            let (settings, back) = (&mut backend.settings, &mut backend.back);
            expand_settings(settings, Some(back), &templates, warnings);
            expand_backend_servers(back, &templates, &health_templates, warnings);
        }
        for listen in &mut self.ir.listens {
            let (settings, back) = (&mut listen.settings, &mut listen.back);
            expand_settings(settings, Some(back), &templates, warnings);
            expand_backend_servers(back, &templates, &health_templates, warnings);
        }
        for frontend in &mut self.ir.frontends {
            for acl in &mut frontend.settings.acls {
                expand_acl(acl, &templates, warnings);
            }
        }
        for backend in &mut self.ir.backends {
            for acl in &mut backend.settings.acls {
                expand_acl(acl, &templates, warnings);
            }
        }
        for listen in &mut self.ir.listens {
            for acl in &mut listen.settings.acls {
                expand_acl(acl, &templates, warnings);
            }
        }

        self.ir
    }
}

fn lookup<'t>(
    templates: &'t BTreeMap<String, Template>,
    name: &str,
    warnings: &mut Vec<ValidationWarning>,
) -> Option<&'t Template> {
    let found = templates.get(name);
    if found.is_none() {
        warnings.push(ValidationWarning::new(format!(
            "reference to unknown template '{name}'"
        )));
    }
    found
}

fn expand_backend_servers(
    back: &mut BackendFacet,
    templates: &BTreeMap<String, Template>,
    health_templates: &BTreeMap<String, Template>,
    warnings: &mut Vec<ValidationWarning>,
) {
    for server in &mut back.servers {
        expand_server(server, templates, warnings);
    }
    if let Some(default_server) = &mut back.default_server {
        expand_server(default_server, templates, warnings);
    }
    for tpl in &mut back.server_templates {
        if let Some(params) = &mut tpl.params {
            expand_server(params, templates, warnings);
        }
    }
    if let Some(hc) = &mut back.health_check {
        expand_health_check(hc, health_templates, templates, warnings);
    }
    // Deferred loop bodies keep their spreads; the post-unroll expander
    // pass picks them up.
}

fn expand_server(
    server: &mut Server,
    templates: &BTreeMap<String, Template>,
    warnings: &mut Vec<ValidationWarning>,
) {
    if server.template_refs.is_empty() {
        return;
    }
    let explicit = server.clone();
    for name in std::mem::take(&mut server.template_refs) {
        let Some(template) = lookup(templates, &name, warnings) else {
            continue;
        };
        for (key, value) in &template.params {
            apply_server_param(server, &explicit, key, value);
        }
    }
}

/// Apply one template parameter to a server, honoring explicit fields.
fn apply_server_param(server: &mut Server, explicit: &Server, key: &str, value: &Value) {
    macro_rules! set {
        ($field:ident, $value:expr) => {
            if explicit.$field.is_none() {
                server.$field = $value;
            }
        };
    }
    match key {
        "address" | "addr" => set!(address, value.as_str().map(String::from)),
        "port" => set!(port, value.as_i64()),
        "check" => set!(check, value.as_bool()),
        "inter" | "check-interval" => {
            set!(check_interval, Some(value.render()))
        }
        "rise" => set!(rise, value.as_i64()),
        "fall" => set!(fall, value.as_i64()),
        "check-port" => set!(check_port, value.as_i64()),
        "check-address" => set!(check_address, Some(value.render())),
        "check-sni" => set!(check_sni, Some(value.render())),
        "check-send-proxy" => set!(check_send_proxy, value.as_bool()),
        "check-proto" => set!(check_proto, Some(value.render())),
        "agent-check" => set!(agent_check, value.as_bool()),
        "agent-port" => set!(agent_port, value.as_i64()),
        "agent-inter" => set!(agent_inter, Some(value.render())),
        "agent-addr" => set!(agent_addr, Some(value.render())),
        "agent-send" => set!(agent_send, Some(value.render())),
        "weight" => set!(weight, value.as_i64()),
        "maxconn" => set!(maxconn, value.as_i64()),
        "minconn" => set!(minconn, value.as_i64()),
        "maxqueue" => set!(maxqueue, value.as_i64()),
        "max-reuse" => set!(max_reuse, value.as_i64()),
        "pool-max-conn" => set!(pool_max_conn, value.as_i64()),
        "pool-purge-delay" => set!(pool_purge_delay, Some(value.render())),
        "ssl" => set!(ssl, value.as_bool()),
        "verify" | "ssl-verify" => set!(ssl_verify, Some(value.render())),
        "sni" => set!(sni, Some(value.render())),
        "alpn" => {
            if explicit.alpn.is_empty() {
                server.alpn = match value {
                    Value::List(items) => items.iter().map(Value::render).collect(),
                    other => vec![other.render()],
                };
            }
        }
        "ca-file" => set!(ca_file, Some(value.render())),
        "crl-file" => set!(crl_file, Some(value.render())),
        "crt" => set!(crt, Some(value.render())),
        "ciphers" => set!(ciphers, Some(value.render())),
        "curves" => set!(curves, Some(value.render())),
        "send-proxy" => set!(send_proxy, value.as_bool()),
        "send-proxy-v2" => set!(send_proxy_v2, value.as_bool()),
        "slowstart" => set!(slowstart, Some(value.render())),
        "resolvers" => set!(resolvers, Some(value.render())),
        "resolve-prefer" => set!(resolve_prefer, Some(value.render())),
        "init-addr" => set!(init_addr, Some(value.render())),
        "error-limit" => set!(error_limit, value.as_i64()),
        "observe" => set!(observe, Some(value.render())),
        "on-error" => set!(on_error, Some(value.render())),
        "on-marked-down" => set!(on_marked_down, Some(value.render())),
        "on-marked-up" => set!(on_marked_up, Some(value.render())),
        "proto" => set!(proto, Some(value.render())),
        "tfo" => set!(tfo, value.as_bool()),
        "namespace" => set!(namespace, Some(value.render())),
        "usesrc" => set!(usesrc, Some(value.render())),
        "id" => set!(id, value.as_i64()),
        "cookie" => set!(cookie, Some(value.render())),
        "track" => set!(track, Some(value.render())),
        "redir" => set!(redir, Some(value.render())),
        "disabled" => set!(disabled, value.as_bool()),
        "backup" => set!(backup, value.as_bool()),
        // Unknown parameter names become free-form options unless the
        // entity already pinned them.
        other => {
            if !explicit.options.contains_key(other) {
                server.options.insert(other.to_string(), value.render());
            }
        }
    }
}

fn expand_acl(
    acl: &mut Acl,
    templates: &BTreeMap<String, Template>,
    warnings: &mut Vec<ValidationWarning>,
) {
    if acl.template_refs.is_empty() {
        return;
    }
    let explicit_criterion = acl.criterion.clone();
    let explicit_values = acl.values.clone();
    for name in std::mem::take(&mut acl.template_refs) {
        let Some(template) = lookup(templates, &name, warnings) else {
            continue;
        };
        if explicit_criterion.is_none() {
            if let Some(criterion) = template.get("criterion") {
                acl.criterion = Some(criterion.render());
            }
        }
        if explicit_values.is_empty() {
            if let Some(values) = template.get("values") {
                acl.values = match values {
                    Value::List(items) => items.iter().map(Value::render).collect(),
                    other => vec![other.render()],
                };
            }
        }
    }
}

fn expand_health_check(
    hc: &mut HealthCheck,
    health_templates: &BTreeMap<String, Template>,
    templates: &BTreeMap<String, Template>,
    warnings: &mut Vec<ValidationWarning>,
) {
    if hc.template_refs.is_empty() {
        return;
    }
    let explicit = hc.clone();
    for name in std::mem::take(&mut hc.template_refs) {
        // Health checks prefer the dedicated template namespace but fall
        // back to the shared one.
        let template = match health_templates.get(&name) {
            Some(t) => t,
            None => match lookup(templates, &name, warnings) {
                Some(t) => t,
                None => continue,
            },
        };
        for (key, value) in &template.params {
            match key.as_str() {
                "method" => {
                    if explicit.method.is_none() {
                        hc.method = Some(value.render());
                    }
                }
                "uri" => {
                    if explicit.uri.is_none() {
                        hc.uri = Some(value.render());
                    }
                }
                _ => {}
            }
        }
    }
}

fn expand_settings(
    settings: &mut ProxySettings,
    mut back: Option<&mut BackendFacet>,
    templates: &BTreeMap<String, Template>,
    warnings: &mut Vec<ValidationWarning>,
) {
    if settings.template_refs.is_empty() {
        return;
    }
    let explicit = settings.clone();
    let explicit_back = back.as_ref().map(|b| (**b).clone());
    for name in std::mem::take(&mut settings.template_refs) {
        let Some(template) = lookup(templates, &name, warnings) else {
            continue;
        };
        for (key, value) in &template.params {
            apply_settings_param(
                settings,
                &explicit,
                back.as_deref_mut(),
                explicit_back.as_ref(),
                key,
                value,
                warnings,
            );
        }
    }
}

fn apply_settings_param(
    settings: &mut ProxySettings,
    explicit: &ProxySettings,
    back: Option<&mut BackendFacet>,
    explicit_back: Option<&BackendFacet>,
    key: &str,
    value: &Value,
    warnings: &mut Vec<ValidationWarning>,
) {
    match key {
        "mode" => {
            if explicit.mode.is_none() {
                if let Ok(mode) = value.render().parse() {
                    settings.mode = Some(mode);
                }
            }
        }
        "retries" => {
            if explicit.retries.is_none() {
                settings.retries = value.as_i64();
            }
        }
        "maxconn" => {
            if explicit.maxconn.is_none() {
                settings.maxconn = value.as_i64();
            }
        }
        "backlog" => {
            if explicit.backlog.is_none() {
                settings.backlog = value.as_i64();
            }
        }
        "fullconn" => {
            if explicit.fullconn.is_none() {
                settings.fullconn = value.as_i64();
            }
        }
        "option" => {
            if explicit.options.is_empty() {
                settings.options = match value {
                    Value::List(items) => items.iter().map(Value::render).collect(),
                    other => vec![other.render()],
                };
            }
        }
        "log-format" => {
            if explicit.log_format.is_none() {
                settings.log_format = Some(value.render());
            }
        }
        "log-tag" => {
            if explicit.log_tag.is_none() {
                settings.log_tag = Some(value.render());
            }
        }
        "description" => {
            if explicit.description.is_none() {
                settings.description = Some(value.render());
            }
        }
        "balance" | "hash-type" | "hash-balance-factor" | "http-reuse" | "retry-on" => {
            let Some(back) = back else {
                warnings.push(ValidationWarning::new(format!(
                    "template parameter '{key}' is not applicable to a frontend"
                )));
                return;
            };
            let explicit_back = explicit_back.expect("facet snapshot");
            match key {
                "balance" => {
                    if explicit_back.balance.is_none() {
                        back.balance = Some(Balance(value.render()));
                    }
                }
                "hash-type" => {
                    if explicit_back.hash_type.is_none() {
                        back.hash_type = Some(value.render());
                    }
                }
                "hash-balance-factor" => {
                    if explicit_back.hash_balance_factor.is_none() {
                        back.hash_balance_factor = value.as_i64();
                    }
                }
                "http-reuse" => {
                    if explicit_back.http_reuse.is_none() {
                        back.http_reuse = Some(value.render());
                    }
                }
                "retry-on" => {
                    if explicit_back.retry_on.is_empty() {
                        back.retry_on = match value {
                            Value::List(items) => items.iter().map(Value::render).collect(),
                            other => other
                                .render()
                                .split(',')
                                .map(|s| s.trim().to_string())
                                .collect(),
                        };
                    }
                }
                _ => unreachable!(),
            }
        }
        other => {
            warnings.push(ValidationWarning::new(format!(
                "ignoring unknown template parameter '{other}'"
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower;
    use crate::parser::parse_source;

    fn expand_src(src: &str) -> (ConfigIR, Vec<ValidationWarning>) {
        let node = parse_source(src, "test.hap").unwrap();
        let mut warnings = Vec::new();
        let ir = lower(node, &mut warnings).unwrap();
        let ir = TemplateExpander::new(ir).expand(&mut warnings);
        (ir, warnings)
    }

    #[test]
    fn basic_server_expansion() {
        let (ir, _) = expand_src(
            "config t { template server_defaults { check: true\n inter: 3s\n rise: 5\n fall: 2 }\n backend b { servers { server web1 { address: \"10.0.1.1\"\n port: 8080\n @server_defaults } } } }",
        );
        let server = &ir.backends[0].back.servers[0];
        assert_eq!(server.check, Some(true));
        assert_eq!(server.check_interval.as_deref(), Some("3s"));
        assert_eq!(server.rise, Some(5));
        assert_eq!(server.fall, Some(2));
        assert!(server.template_refs.is_empty());
    }

    #[test]
    fn explicit_fields_win_over_templates() {
        let (ir, _) = expand_src(
            "config t { template defaults { check: true\n rise: 5\n fall: 2 }\n backend b { servers { server web1 { address: \"10.0.1.1\"\n port: 8080\n rise: 3\n @defaults } } } }",
        );
        let server = &ir.backends[0].back.servers[0];
        assert_eq!(server.check, Some(true));
        assert_eq!(server.rise, Some(3));
        assert_eq!(server.fall, Some(2));
    }

    #[test]
    fn later_templates_override_earlier_for_unset_fields() {
        let (ir, _) = expand_src(
            "config t { template first { weight: 50\n rise: 5 }\n template second { weight: 100 }\n backend b { servers { server web1 { address: \"10.0.1.1\"\n port: 8080\n @first\n @second } } } }",
        );
        let server = &ir.backends[0].back.servers[0];
        assert_eq!(server.weight, Some(100));
        assert_eq!(server.rise, Some(5));
    }

    #[test]
    fn unknown_template_is_a_warning() {
        let (ir, warnings) = expand_src(
            "config t { backend b { servers { server web1 { address: \"10.0.1.1\"\n port: 8080\n @missing } } } }",
        );
        let server = &ir.backends[0].back.servers[0];
        assert_eq!(server.check, None);
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("unknown template 'missing'")));
    }

    #[test]
    fn acl_template_copies_criterion_and_values() {
        let (ir, _) = expand_src(
            "config t { template api_acl { criterion: \"path_beg\"\n values: [\"/api/\"] }\n frontend web { bind *:80\n acl is_api @api_acl } }",
        );
        let acl = &ir.frontends[0].settings.acls[0];
        assert_eq!(acl.name, "is_api");
        assert_eq!(acl.criterion.as_deref(), Some("path_beg"));
        assert_eq!(acl.values, vec!["/api/"]);
    }

    #[test]
    fn backend_template_applies_balance_and_retries() {
        let (ir, _) = expand_src(
            "config t { template production_backend { balance: leastconn\n retries: 5 }\n backend api { @production_backend\n servers { server api1 { address: \"10.0.1.1\"\n port: 8080 } } } }",
        );
        let backend = &ir.backends[0];
        assert_eq!(backend.back.balance.as_ref().unwrap().as_str(), "leastconn");
        assert_eq!(backend.settings.retries, Some(5));
    }

    #[test]
    fn backend_template_explicit_override() {
        let (ir, _) = expand_src(
            "config t { template standard { balance: roundrobin\n retries: 3 }\n backend api { @standard\n retries: 5\n servers { server api1 { address: \"10.0.1.1\"\n port: 8080 } } } }",
        );
        let backend = &ir.backends[0];
        assert_eq!(backend.back.balance.as_ref().unwrap().as_str(), "roundrobin");
        assert_eq!(backend.settings.retries, Some(5));
    }

    #[test]
    fn expansion_is_idempotent() {
        let (ir, _) = expand_src(
            "config t { template d { check: true }\n backend b { servers { server s { address: \"10.0.0.1\"\n port: 80\n @d } } } }",
        );
        let again = TemplateExpander::new(ir.clone()).expand(&mut Vec::new());
        assert_eq!(ir, again);
    }
}
