//! String-field traversal over the IR.
//!
//! The variable resolver and the loop unroller both need to rewrite every
//! string-bearing field of (part of) the IR. This module centralizes the
//! field enumeration so the two stages cannot drift apart. Deferred loop
//! bodies are deliberately NOT visited by the whole-tree walk: their
//! interpolations refer to the loop variable, which is only bound when
//! the unroller clones the body.

use crate::error::{ParseError, SourceLocation};
use crate::ir::{
    Acl, Bind, Compression, ConfigIR, Defaults, EmailAlert, Filter, Frontend, Global,
    HealthCheck, Listen, ProxySettings, Rule, Server, ServerTemplate, StatsConfig, Timeouts,
    Value,
};
use std::collections::BTreeMap;

/// Callback applied to every visited string. The location is the nearest
/// enclosing node's position, for error attribution.
pub(crate) type VisitFn<'a> =
    &'a mut dyn FnMut(&mut String, Option<&SourceLocation>) -> Result<(), ParseError>;

pub(crate) trait VisitStrings {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError>;
}

fn v(s: &mut String, loc: Option<&SourceLocation>, f: VisitFn<'_>) -> Result<(), ParseError> {
    f(s, loc)
}

fn vo(
    s: &mut Option<String>,
    loc: Option<&SourceLocation>,
    f: VisitFn<'_>,
) -> Result<(), ParseError> {
    if let Some(s) = s.as_mut() {
        f(s, loc)?;
    }
    Ok(())
}

fn vl(
    list: &mut [String],
    loc: Option<&SourceLocation>,
    f: VisitFn<'_>,
) -> Result<(), ParseError> {
    for s in list {
        f(s, loc)?;
    }
    Ok(())
}

fn v_pairs(
    pairs: &mut [(String, String)],
    loc: Option<&SourceLocation>,
    f: VisitFn<'_>,
) -> Result<(), ParseError> {
    for (_, value) in pairs {
        f(value, loc)?;
    }
    Ok(())
}

fn v_map(
    map: &mut BTreeMap<String, String>,
    loc: Option<&SourceLocation>,
    f: VisitFn<'_>,
) -> Result<(), ParseError> {
    for value in map.values_mut() {
        f(value, loc)?;
    }
    Ok(())
}

fn v_status_map(
    map: &mut BTreeMap<i64, String>,
    loc: Option<&SourceLocation>,
    f: VisitFn<'_>,
) -> Result<(), ParseError> {
    for value in map.values_mut() {
        f(value, loc)?;
    }
    Ok(())
}

pub(crate) fn visit_value(
    value: &mut Value,
    loc: Option<&SourceLocation>,
    f: VisitFn<'_>,
) -> Result<(), ParseError> {
    match value {
        Value::Str(s) => f(s, loc)?,
        Value::List(items) => {
            for item in items {
                visit_value(item, loc, f)?;
            }
        }
        Value::Map(entries) => {
            for (_, item) in entries {
                visit_value(item, loc, f)?;
            }
        }
        _ => {}
    }
    Ok(())
}

impl VisitStrings for ConfigIR {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        if let Some(global) = &mut self.global {
            global.visit_strings(f)?;
        }
        if let Some(defaults) = &mut self.defaults {
            defaults.visit_strings(f)?;
        }
        for fe in &mut self.frontends {
            fe.visit_strings(f)?;
        }
        for be in &mut self.backends {
            be.visit_strings(f)?;
        }
        for li in &mut self.listens {
            li.visit_strings(f)?;
        }
        // Peers / resolvers / mailers hold addresses that may interpolate.
        for peers in &mut self.peers {
            let loc = peers.location.clone();
            for peer in &mut peers.peers {
                v(&mut peer.address, loc.as_ref(), f)?;
            }
        }
        for resolvers in &mut self.resolvers {
            let loc = resolvers.location.clone();
            for ns in &mut resolvers.nameservers {
                v(&mut ns.address, loc.as_ref(), f)?;
            }
        }
        for mailers in &mut self.mailers {
            let loc = mailers.location.clone();
            for mailer in &mut mailers.mailers {
                v(&mut mailer.address, loc.as_ref(), f)?;
            }
        }
        Ok(())
    }
}

impl VisitStrings for Global {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        let loc = self.location.clone();
        let loc = loc.as_ref();
        vo(&mut self.user, loc, f)?;
        vo(&mut self.group, loc, f)?;
        vo(&mut self.node, loc, f)?;
        vo(&mut self.description, loc, f)?;
        vo(&mut self.pidfile, loc, f)?;
        vo(&mut self.chroot, loc, f)?;
        vo(&mut self.setcap, loc, f)?;
        vo(&mut self.default_path, loc, f)?;
        vo(&mut self.log_tag, loc, f)?;
        vo(&mut self.log_send_hostname, loc, f)?;
        vo(&mut self.ca_base, loc, f)?;
        vo(&mut self.crt_base, loc, f)?;
        vo(&mut self.key_base, loc, f)?;
        vo(&mut self.issuers_chain_path, loc, f)?;
        vo(&mut self.ssl_default_bind_ciphers, loc, f)?;
        vo(&mut self.ssl_default_bind_ciphersuites, loc, f)?;
        vl(&mut self.ssl_default_bind_options, loc, f)?;
        vo(&mut self.ssl_default_bind_curves, loc, f)?;
        vo(&mut self.ssl_default_bind_sigalgs, loc, f)?;
        vo(&mut self.ssl_default_bind_client_sigalgs, loc, f)?;
        vo(&mut self.ssl_default_server_ciphers, loc, f)?;
        vo(&mut self.ssl_default_server_ciphersuites, loc, f)?;
        vo(&mut self.ssl_default_server_curves, loc, f)?;
        vo(&mut self.ssl_default_server_sigalgs, loc, f)?;
        vo(&mut self.ssl_default_server_client_sigalgs, loc, f)?;
        vo(&mut self.ssl_dh_param_file, loc, f)?;
        vo(&mut self.ssl_engine, loc, f)?;
        vo(&mut self.ssl_server_verify, loc, f)?;
        vo(&mut self.ssl_provider, loc, f)?;
        vo(&mut self.ssl_provider_path, loc, f)?;
        vo(&mut self.ssl_propquery, loc, f)?;
        vo(&mut self.ssl_load_extra_del_ext, loc, f)?;
        vo(&mut self.ssl_load_extra_files, loc, f)?;
        vo(&mut self.server_state_base, loc, f)?;
        vo(&mut self.server_state_file, loc, f)?;
        vo(&mut self.unix_bind, loc, f)?;
        vo(&mut self.hard_stop_after, loc, f)?;
        vo(&mut self.warn_blocked_traffic_after, loc, f)?;
        for target in &mut self.log_targets {
            v(&mut target.address, loc, f)?;
            vo(&mut target.facility, loc, f)?;
            vo(&mut target.level, loc, f)?;
            vo(&mut target.min_level, loc, f)?;
        }
        for socket in &mut self.stats_sockets {
            v(&mut socket.path, loc, f)?;
            vo(&mut socket.level, loc, f)?;
            vo(&mut socket.mode, loc, f)?;
            vo(&mut socket.user, loc, f)?;
            vo(&mut socket.group, loc, f)?;
            vo(&mut socket.process, loc, f)?;
        }
        if let Some(d) = &mut self.fiftyone_degrees {
            vo(&mut d.data_file, loc, f)?;
            vl(&mut d.property_name_list, loc, f)?;
            vo(&mut d.property_separator, loc, f)?;
        }
        if let Some(d) = &mut self.deviceatlas {
            vo(&mut d.json_file, loc, f)?;
            vo(&mut d.separator, loc, f)?;
            vo(&mut d.properties_cookie, loc, f)?;
        }
        if let Some(w) = &mut self.wurfl {
            vo(&mut w.data_file, loc, f)?;
            vl(&mut w.information_list, loc, f)?;
            vo(&mut w.information_list_separator, loc, f)?;
            vo(&mut w.patch_file, loc, f)?;
            vo(&mut w.engine_mode, loc, f)?;
            vo(&mut w.useragent_priority, loc, f)?;
        }
        v_pairs(&mut self.setenv, loc, f)?;
        v_pairs(&mut self.presetenv, loc, f)?;
        vl(&mut self.resetenv, loc, f)?;
        vl(&mut self.unsetenv, loc, f)?;
        for (_, cpus) in &mut self.cpu_map {
            f(cpus, loc)?;
        }
        for value in self.tuning.values_mut() {
            visit_value(value, loc, f)?;
        }
        Ok(())
    }
}

impl VisitStrings for Defaults {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        let loc = self.location.clone();
        let loc = loc.as_ref();
        self.timeouts.visit_strings_at(loc, f)?;
        vl(&mut self.options, loc, f)?;
        vl(&mut self.log, loc, f)?;
        vo(&mut self.log_format, loc, f)?;
        vo(&mut self.log_format_sd, loc, f)?;
        vo(&mut self.error_log_format, loc, f)?;
        vo(&mut self.log_tag, loc, f)?;
        vl(&mut self.log_steps, loc, f)?;
        if let Some(alert) = &mut self.email_alert {
            alert.visit_strings_at(loc, f)?;
        }
        if let Some(persist) = &mut self.persist_rdp_cookie {
            vo(&mut persist.cookie, loc, f)?;
        }
        Ok(())
    }
}

impl Timeouts {
    fn visit_strings_at(
        &mut self,
        loc: Option<&SourceLocation>,
        f: VisitFn<'_>,
    ) -> Result<(), ParseError> {
        vo(&mut self.connect, loc, f)?;
        vo(&mut self.client, loc, f)?;
        vo(&mut self.server, loc, f)?;
        vo(&mut self.check, loc, f)?;
        vo(&mut self.queue, loc, f)?;
        vo(&mut self.http_request, loc, f)?;
        vo(&mut self.http_keep_alive, loc, f)?;
        vo(&mut self.tunnel, loc, f)?;
        vo(&mut self.client_fin, loc, f)?;
        vo(&mut self.server_fin, loc, f)?;
        vo(&mut self.tarpit, loc, f)
    }
}

impl EmailAlert {
    fn visit_strings_at(
        &mut self,
        loc: Option<&SourceLocation>,
        f: VisitFn<'_>,
    ) -> Result<(), ParseError> {
        vo(&mut self.mailers, loc, f)?;
        vo(&mut self.from, loc, f)?;
        vo(&mut self.to, loc, f)?;
        vo(&mut self.level, loc, f)?;
        vo(&mut self.myhostname, loc, f)
    }
}

impl VisitStrings for Acl {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        let loc = self.location.clone();
        let loc = loc.as_ref();
        vo(&mut self.criterion, loc, f)?;
        vl(&mut self.values, loc, f)
    }
}

impl VisitStrings for Rule {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        let loc = self.location.clone();
        let loc = loc.as_ref();
        vl(&mut self.args, loc, f)?;
        v_pairs(&mut self.params, loc, f)?;
        if let Some(condition) = &mut self.condition {
            f(&mut condition.expr, loc)?;
        }
        Ok(())
    }
}

impl VisitStrings for StatsConfig {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        vo(&mut self.uri, None, f)?;
        vo(&mut self.refresh, None, f)?;
        vo(&mut self.auth, None, f)?;
        vo(&mut self.realm, None, f)?;
        vo(&mut self.admin_condition, None, f)
    }
}

impl VisitStrings for Compression {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        vo(&mut self.algo, None, f)?;
        vl(&mut self.types, None, f)
    }
}

impl VisitStrings for Filter {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        match self {
            Filter::Compression => Ok(()),
            Filter::Spoe { engine, config } => {
                vo(engine, None, f)?;
                vo(config, None, f)
            }
            Filter::Cache { name } | Filter::Trace { name } => vo(name, None, f),
            Filter::BwlimIn {
                name,
                default_limit,
                default_period,
                limit,
                period,
                key,
                table,
            }
            | Filter::BwlimOut {
                name,
                default_limit,
                default_period,
                limit,
                period,
                key,
                table,
            } => {
                vo(name, None, f)?;
                vo(default_limit, None, f)?;
                vo(default_period, None, f)?;
                vo(limit, None, f)?;
                vo(period, None, f)?;
                vo(key, None, f)?;
                vo(table, None, f)
            }
        }
    }
}

impl VisitStrings for ProxySettings {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        vo(&mut self.description, None, f)?;
        vo(&mut self.guid, None, f)?;
        vl(&mut self.options, None, f)?;
        self.timeouts.visit_strings_at(None, f)?;
        vl(&mut self.log, None, f)?;
        vo(&mut self.log_tag, None, f)?;
        vo(&mut self.log_format, None, f)?;
        vo(&mut self.log_format_sd, None, f)?;
        vo(&mut self.error_log_format, None, f)?;
        vl(&mut self.log_steps, None, f)?;
        for acl in &mut self.acls {
            acl.visit_strings(f)?;
        }
        for rule in self
            .http_request_rules
            .iter_mut()
            .chain(&mut self.http_response_rules)
            .chain(&mut self.http_after_response_rules)
            .chain(&mut self.tcp_request_rules)
            .chain(&mut self.tcp_response_rules)
            .chain(&mut self.quic_initial_rules)
        {
            rule.visit_strings(f)?;
        }
        // rule_loops are skipped: their bodies interpolate the loop
        // variable and are rewritten by the unroller.
        for filter in &mut self.filters {
            filter.visit_strings(f)?;
        }
        vl(&mut self.stick_tables, None, f)?;
        if let Some(c) = &mut self.compression {
            c.visit_strings(f)?;
        }
        if let Some(alert) = &mut self.email_alert {
            alert.visit_strings_at(None, f)?;
        }
        if let Some(persist) = &mut self.persist_rdp_cookie {
            vo(&mut persist.cookie, None, f)?;
        }
        vl(&mut self.force_persist, None, f)?;
        vl(&mut self.ignore_persist, None, f)?;
        v_status_map(&mut self.errorloc, None, f)?;
        v_status_map(&mut self.errorloc302, None, f)?;
        v_status_map(&mut self.errorloc303, None, f)?;
        v_status_map(&mut self.errorfile, None, f)?;
        vo(&mut self.errorfiles, None, f)?;
        if let Some(stats) = &mut self.stats {
            stats.visit_strings(f)?;
        }
        Ok(())
    }
}

impl VisitStrings for Bind {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        let loc = self.location.clone();
        let loc = loc.as_ref();
        v(&mut self.address, loc, f)?;
        vo(&mut self.ssl_cert, loc, f)?;
        vl(&mut self.alpn, loc, f)?;
        v_map(&mut self.options, loc, f)
    }
}

impl VisitStrings for Server {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        let loc = self.location.clone();
        let loc = loc.as_ref();
        v(&mut self.name, loc, f)?;
        vo(&mut self.address, loc, f)?;
        vo(&mut self.check_interval, loc, f)?;
        vo(&mut self.check_address, loc, f)?;
        vo(&mut self.check_sni, loc, f)?;
        vo(&mut self.check_proto, loc, f)?;
        vo(&mut self.agent_inter, loc, f)?;
        vo(&mut self.agent_addr, loc, f)?;
        vo(&mut self.agent_send, loc, f)?;
        vo(&mut self.pool_purge_delay, loc, f)?;
        vo(&mut self.ssl_verify, loc, f)?;
        vo(&mut self.sni, loc, f)?;
        vl(&mut self.alpn, loc, f)?;
        vo(&mut self.ca_file, loc, f)?;
        vo(&mut self.crl_file, loc, f)?;
        vo(&mut self.crt, loc, f)?;
        vo(&mut self.ciphers, loc, f)?;
        vo(&mut self.curves, loc, f)?;
        vo(&mut self.slowstart, loc, f)?;
        vo(&mut self.resolvers, loc, f)?;
        vo(&mut self.resolve_prefer, loc, f)?;
        vo(&mut self.init_addr, loc, f)?;
        vo(&mut self.observe, loc, f)?;
        vo(&mut self.on_error, loc, f)?;
        vo(&mut self.on_marked_down, loc, f)?;
        vo(&mut self.on_marked_up, loc, f)?;
        vo(&mut self.proto, loc, f)?;
        vo(&mut self.namespace, loc, f)?;
        vo(&mut self.usesrc, loc, f)?;
        vo(&mut self.cookie, loc, f)?;
        vo(&mut self.track, loc, f)?;
        vo(&mut self.redir, loc, f)?;
        v_map(&mut self.options, loc, f)
    }
}

impl VisitStrings for ServerTemplate {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        let loc = self.location.clone();
        let loc = loc.as_ref();
        v(&mut self.prefix, loc, f)?;
        vo(&mut self.fqdn, loc, f)?;
        if let Some(params) = &mut self.params {
            params.visit_strings(f)?;
        }
        Ok(())
    }
}

impl VisitStrings for Frontend {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        self.settings.visit_strings(f)?;
        visit_frontend_facet(&mut self.front, f)
    }
}

impl VisitStrings for crate::ir::Backend {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        self.settings.visit_strings(f)?;
        visit_backend_facet(&mut self.back, f)
    }
}

impl VisitStrings for Listen {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        self.settings.visit_strings(f)?;
        visit_frontend_facet(&mut self.front, f)?;
        visit_backend_facet(&mut self.back, f)
    }
}

fn visit_frontend_facet(
    front: &mut crate::ir::FrontendFacet,
    f: VisitFn<'_>,
) -> Result<(), ParseError> {
    for bind in &mut front.binds {
        bind.visit_strings(f)?;
    }
    vo(&mut front.default_backend, None, f)?;
    for ub in &mut front.use_backends {
        let loc = ub.location.clone();
        v(&mut ub.backend, loc.as_ref(), f)?;
        if let Some(condition) = &mut ub.condition {
            f(&mut condition.expr, loc.as_ref())?;
        }
    }
    vo(&mut front.monitor_uri, None, f)?;
    vl(&mut front.monitor_net, None, f)?;
    vl(&mut front.monitor_fail, None, f)?;
    Ok(())
}

fn visit_backend_facet(
    back: &mut crate::ir::BackendFacet,
    f: VisitFn<'_>,
) -> Result<(), ParseError> {
    if let Some(balance) = &mut back.balance {
        f(&mut balance.0, None)?;
    }
    vo(&mut back.hash_type, None, f)?;
    for server in &mut back.servers {
        server.visit_strings(f)?;
    }
    if let Some(default_server) = &mut back.default_server {
        default_server.visit_strings(f)?;
    }
    for tpl in &mut back.server_templates {
        tpl.visit_strings(f)?;
    }
    // server_loops are skipped: see module docs.
    if let Some(hc) = &mut back.health_check {
        let loc = hc.location.clone();
        let loc = loc.as_ref();
        vo(&mut hc.method, loc, f)?;
        vo(&mut hc.uri, loc, f)?;
        v_pairs(&mut hc.headers, loc, f)?;
    }
    for rule in back
        .http_check_rules
        .iter_mut()
        .chain(&mut back.tcp_check_rules)
    {
        rule.visit_strings(f)?;
    }
    vo(&mut back.dispatch, None, f)?;
    vo(&mut back.cookie, None, f)?;
    vo(&mut back.http_reuse, None, f)?;
    vl(&mut back.retry_on, None, f)?;
    vo(&mut back.http_send_name_header, None, f)?;
    vo(&mut back.load_server_state_from_file, None, f)?;
    vo(&mut back.server_state_file_name, None, f)?;
    for us in &mut back.use_servers {
        let loc = us.location.clone();
        v(&mut us.server, loc.as_ref(), f)?;
        if let Some(condition) = &mut us.condition {
            f(&mut condition.expr, loc.as_ref())?;
        }
    }
    Ok(())
}

impl VisitStrings for HealthCheck {
    fn visit_strings(&mut self, f: VisitFn<'_>) -> Result<(), ParseError> {
        let loc = self.location.clone();
        let loc = loc.as_ref();
        vo(&mut self.method, loc, f)?;
        vo(&mut self.uri, loc, f)?;
        v_pairs(&mut self.headers, loc, f)
    }
}
