//! HAProxy native-format serializer.
//!
//! A pure function of the validated IR: two runs over equal inputs
//! produce byte-identical text. Scalar directives follow a fixed
//! canonical order per section; list-valued directives keep their source
//! order. Durations are emitted exactly as typed.

use crate::error::CodeGenerationError;
use crate::ir::{
    Bind, ConfigIR, Defaults, EmailAlert, ExpectKind, Filter, Frontend, Global, HealthCheck,
    Listen, LuaSource, Mailers, Peers, PersistRdpCookie, ProxySettings, Resolvers, Rule, Server,
    Timeouts, Value,
};

/// Serializer knobs supplied by the caller. `lua_dir` is the directory
/// inline Lua scripts will be extracted to; emitted `lua-load` lines
/// reference it.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub lua_dir: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            lua_dir: "lua".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct HaproxyGenerator {
    options: GeneratorOptions,
}

struct Writer {
    out: String,
}

impl Writer {
    fn new() -> Self {
        Self { out: String::new() }
    }

    fn section(&mut self, header: &str) {
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        self.out.push_str(header);
        self.out.push('\n');
    }

    fn comment(&mut self, text: &str) {
        self.out.push_str("# ");
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn line(&mut self, text: impl AsRef<str>) {
        self.out.push_str("    ");
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn finish(self) -> String {
        self.out
    }
}

impl HaproxyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: GeneratorOptions) -> Self {
        Self { options }
    }

    pub fn generate(&self, ir: &ConfigIR) -> Result<String, CodeGenerationError> {
        check_invariants(ir)?;

        let mut w = Writer::new();
        w.comment(&format!("Generated HAProxy configuration: {}", ir.name));
        if let Some(version) = &ir.version {
            w.comment(&format!("Version: {version}"));
        }

        if ir.global.is_some() || !ir.lua_scripts.is_empty() {
            self.emit_global(&mut w, ir);
        }
        if let Some(defaults) = &ir.defaults {
            emit_defaults(&mut w, defaults);
        }
        for peers in &ir.peers {
            emit_peers(&mut w, peers);
        }
        for resolvers in &ir.resolvers {
            emit_resolvers(&mut w, resolvers);
        }
        for mailers in &ir.mailers {
            emit_mailers(&mut w, mailers);
        }
        for frontend in &ir.frontends {
            emit_frontend(&mut w, frontend);
        }
        for backend in &ir.backends {
            emit_backend(&mut w, backend)?;
        }
        for listen in &ir.listens {
            emit_listen(&mut w, listen)?;
        }

        Ok(w.finish())
    }

    fn emit_global(&self, w: &mut Writer, ir: &ConfigIR) {
        let default_global = Global::default();
        let g = ir.global.as_ref().unwrap_or(&default_global);
        w.section("global");

        // Process
        flag(w, "daemon", g.daemon);
        flag(w, "master-worker", g.master_worker);
        flag(w, "quiet", g.quiet);
        flag(w, "zero-warning", g.zero_warning);
        flag(w, "set-dumpable", g.set_dumpable);
        flag(w, "external-check", g.external_check);
        flag(w, "busy-polling", g.busy_polling);
        flag(w, "force-cfg-parser-pause", g.force_cfg_parser_pause);
        kv(w, "user", &g.user);
        kv(w, "group", &g.group);
        kn(w, "uid", g.uid);
        kn(w, "gid", g.gid);
        kv(w, "node", &g.node);
        kv(w, "description", &g.description);
        kv(w, "pidfile", &g.pidfile);
        kv(w, "chroot", &g.chroot);
        kv(w, "setcap", &g.setcap);
        kv(w, "default-path", &g.default_path);
        kv(w, "hard-stop-after", &g.hard_stop_after);
        kn(w, "mworker-max-reloads", g.mworker_max_reloads);
        kn(w, "ulimit-n", g.ulimit_n);
        kn(w, "anonkey", g.anonkey);

        // Limits
        kn(w, "maxconn", g.maxconn);
        kn(w, "maxconnrate", g.maxconnrate);
        kn(w, "maxsessrate", g.maxsessrate);
        kn(w, "maxsslrate", g.maxsslrate);
        kn(w, "maxpipes", g.maxpipes);
        kn(w, "fd-hard-limit", g.fd_hard_limit);
        kn(w, "maxzlibmem", g.maxzlibmem);
        kn(w, "maxcomprate", g.maxcomprate);
        kn(w, "maxcompcpuusage", g.maxcompcpuusage);
        on_off(w, "strict-limits", g.strict_limits);
        kn(w, "nbproc", g.nbproc);
        kn(w, "nbthread", g.nbthread);
        kn(w, "thread-groups", g.thread_groups);
        on_off(w, "numa-cpu-mapping", g.numa_cpu_mapping);
        kn(w, "spread-checks", g.spread_checks);
        kn(w, "max-spread-checks", g.max_spread_checks);
        kv(w, "warn-blocked-traffic-after", &g.warn_blocked_traffic_after);

        // Logging
        for target in &g.log_targets {
            let mut parts = vec!["log".to_string(), target.address.clone()];
            parts.extend(target.facility.iter().cloned());
            parts.extend(target.level.iter().cloned());
            parts.extend(target.min_level.iter().cloned());
            w.line(parts.join(" "));
        }
        kv(w, "log-tag", &g.log_tag);
        kv(w, "log-send-hostname", &g.log_send_hostname);

        // SSL defaults
        kv(w, "ca-base", &g.ca_base);
        kv(w, "crt-base", &g.crt_base);
        kv(w, "key-base", &g.key_base);
        kv(w, "issuers-chain-path", &g.issuers_chain_path);
        kv(w, "ssl-default-bind-ciphers", &g.ssl_default_bind_ciphers);
        kv(
            w,
            "ssl-default-bind-ciphersuites",
            &g.ssl_default_bind_ciphersuites,
        );
        if !g.ssl_default_bind_options.is_empty() {
            w.line(format!(
                "ssl-default-bind-options {}",
                g.ssl_default_bind_options.join(" ")
            ));
        }
        kv(w, "ssl-default-bind-curves", &g.ssl_default_bind_curves);
        kv(w, "ssl-default-bind-sigalgs", &g.ssl_default_bind_sigalgs);
        kv(
            w,
            "ssl-default-bind-client-sigalgs",
            &g.ssl_default_bind_client_sigalgs,
        );
        kv(w, "ssl-default-server-ciphers", &g.ssl_default_server_ciphers);
        kv(
            w,
            "ssl-default-server-ciphersuites",
            &g.ssl_default_server_ciphersuites,
        );
        kv(w, "ssl-default-server-curves", &g.ssl_default_server_curves);
        kv(w, "ssl-default-server-sigalgs", &g.ssl_default_server_sigalgs);
        kv(
            w,
            "ssl-default-server-client-sigalgs",
            &g.ssl_default_server_client_sigalgs,
        );
        kv(w, "ssl-dh-param-file", &g.ssl_dh_param_file);
        kv(w, "ssl-engine", &g.ssl_engine);
        flag(w, "ssl-mode-async", g.ssl_mode_async);
        kv(w, "ssl-server-verify", &g.ssl_server_verify);
        kn(w, "ssl-security-level", g.ssl_security_level);
        kv(w, "ssl-provider", &g.ssl_provider);
        kv(w, "ssl-provider-path", &g.ssl_provider_path);
        kv(w, "ssl-propquery", &g.ssl_propquery);
        kv(w, "ssl-load-extra-del-ext", &g.ssl_load_extra_del_ext);
        kv(w, "ssl-load-extra-files", &g.ssl_load_extra_files);

        // Device detection
        if let Some(d) = &g.fiftyone_degrees {
            kv(w, "51degrees-data-file", &d.data_file);
            if !d.property_name_list.is_empty() {
                w.line(format!(
                    "51degrees-property-name-list {}",
                    d.property_name_list.join(",")
                ));
            }
            kv(w, "51degrees-property-separator", &d.property_separator);
            kn(w, "51degrees-cache-size", d.cache_size);
        }
        if let Some(d) = &g.deviceatlas {
            kv(w, "deviceatlas-json-file", &d.json_file);
            kn(w, "deviceatlas-log-level", d.log_level);
            kv(w, "deviceatlas-separator", &d.separator);
            kv(w, "deviceatlas-properties-cookie", &d.properties_cookie);
        }
        if let Some(d) = &g.wurfl {
            kv(w, "wurfl-data-file", &d.data_file);
            if !d.information_list.is_empty() {
                w.line(format!(
                    "wurfl-information-list {}",
                    d.information_list.join(",")
                ));
            }
            kv(
                w,
                "wurfl-information-list-separator",
                &d.information_list_separator,
            );
            kv(w, "wurfl-patch-file", &d.patch_file);
            kn(w, "wurfl-cache-size", d.cache_size);
            kv(w, "wurfl-engine-mode", &d.engine_mode);
            kv(w, "wurfl-useragent-priority", &d.useragent_priority);
        }

        // Free-form tuning knobs, in key order
        for (key, value) in &g.tuning {
            w.line(render_tuning(key, value));
        }

        // Runtime API sockets
        for socket in &g.stats_sockets {
            let mut parts = vec!["stats".to_string(), "socket".to_string(), socket.path.clone()];
            if let Some(level) = &socket.level {
                parts.push("level".into());
                parts.push(level.clone());
            }
            if let Some(mode) = &socket.mode {
                parts.push("mode".into());
                parts.push(mode.clone());
            }
            if let Some(user) = &socket.user {
                parts.push("user".into());
                parts.push(user.clone());
            }
            if let Some(group) = &socket.group {
                parts.push("group".into());
                parts.push(group.clone());
            }
            if let Some(process) = &socket.process {
                parts.push("process".into());
                parts.push(process.clone());
            }
            w.line(parts.join(" "));
        }

        // Server state
        kv(w, "server-state-base", &g.server_state_base);
        kv(w, "server-state-file", &g.server_state_file);

        // Environment
        for (key, value) in &g.setenv {
            w.line(format!("setenv {key} {value}"));
        }
        for (key, value) in &g.presetenv {
            w.line(format!("presetenv {key} {value}"));
        }
        for name in &g.resetenv {
            w.line(format!("resetenv {name}"));
        }
        for name in &g.unsetenv {
            w.line(format!("unsetenv {name}"));
        }

        // CPU pinning
        for (key, cpus) in &g.cpu_map {
            w.line(format!("cpu-map {key} {cpus}"));
        }
        if let Some(unix_bind) = &g.unix_bind {
            w.line(format!("unix-bind {unix_bind}"));
        }

        // Embedded scripts
        for script in &ir.lua_scripts {
            match script.source_type {
                LuaSource::Inline => w.line(format!(
                    "lua-load {}/{}.lua",
                    self.options.lua_dir, script.name
                )),
                LuaSource::File => w.line(format!("lua-load {}", script.content)),
            }
        }
    }
}

fn check_invariants(ir: &ConfigIR) -> Result<(), CodeGenerationError> {
    for backend in &ir.backends {
        if !backend.back.server_loops.is_empty() {
            return Err(CodeGenerationError::new(format!(
                "backend '{}' still carries unexpanded loops",
                backend.name
            )));
        }
    }
    for listen in &ir.listens {
        if !listen.back.server_loops.is_empty() {
            return Err(CodeGenerationError::new(format!(
                "listen '{}' still carries unexpanded loops",
                listen.name
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Small emission helpers
// ---------------------------------------------------------------------------

fn kv(w: &mut Writer, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        w.line(format!("{key} {value}"));
    }
}

fn kn(w: &mut Writer, key: &str, value: Option<i64>) {
    if let Some(value) = value {
        w.line(format!("{key} {value}"));
    }
}

/// Bare keyword when true, nothing when false.
fn flag(w: &mut Writer, key: &str, value: Option<bool>) {
    if value == Some(true) {
        w.line(key);
    }
}

/// Explicit-state boolean: `key on` / `key off`.
fn on_off(w: &mut Writer, key: &str, value: Option<bool>) {
    if let Some(value) = value {
        w.line(format!("{key} {}", if value { "on" } else { "off" }));
    }
}

/// Tuning knobs: booleans are `on`/`off`, except bare-keyword
/// `profiling.*` switches; everything else is emitted verbatim.
fn render_tuning(key: &str, value: &Value) -> String {
    match value {
        Value::Bool(b) => {
            if key.starts_with("profiling.") {
                if *b {
                    key.to_string()
                } else {
                    format!("{key} off")
                }
            } else {
                format!("{key} {}", if *b { "on" } else { "off" })
            }
        }
        other => format!("{key} {}", other.render()),
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn emit_defaults(w: &mut Writer, d: &Defaults) {
    w.section("defaults");
    if let Some(mode) = d.mode {
        w.line(format!("mode {mode}"));
    }
    for log in &d.log {
        w.line(format!("log {log}"));
    }
    kv(w, "log-tag", &d.log_tag);
    kv(w, "log-format", &d.log_format);
    kv(w, "log-format-sd", &d.log_format_sd);
    kv(w, "error-log-format", &d.error_log_format);
    if !d.log_steps.is_empty() {
        w.line(format!("log-steps {}", d.log_steps.join(",")));
    }
    for option in &d.options {
        w.line(format!("option {option}"));
    }
    kn(w, "retries", d.retries);
    emit_timeouts(w, &d.timeouts);
    if let Some(alert) = &d.email_alert {
        emit_email_alert(w, alert);
    }
    if let Some(persist) = &d.persist_rdp_cookie {
        emit_persist(w, persist);
    }
}

fn emit_timeouts(w: &mut Writer, t: &Timeouts) {
    kv(w, "timeout connect", &t.connect);
    kv(w, "timeout client", &t.client);
    kv(w, "timeout server", &t.server);
    kv(w, "timeout check", &t.check);
    kv(w, "timeout queue", &t.queue);
    kv(w, "timeout http-request", &t.http_request);
    kv(w, "timeout http-keep-alive", &t.http_keep_alive);
    kv(w, "timeout tunnel", &t.tunnel);
    kv(w, "timeout client-fin", &t.client_fin);
    kv(w, "timeout server-fin", &t.server_fin);
    kv(w, "timeout tarpit", &t.tarpit);
}

fn emit_email_alert(w: &mut Writer, alert: &EmailAlert) {
    kv(w, "email-alert mailers", &alert.mailers);
    kv(w, "email-alert from", &alert.from);
    kv(w, "email-alert to", &alert.to);
    kv(w, "email-alert level", &alert.level);
    kv(w, "email-alert myhostname", &alert.myhostname);
}

fn emit_persist(w: &mut Writer, persist: &PersistRdpCookie) {
    match &persist.cookie {
        Some(name) => w.line(format!("persist rdp-cookie({name})")),
        None => w.line("persist rdp-cookie"),
    }
}

// ---------------------------------------------------------------------------
// Auxiliary sections
// ---------------------------------------------------------------------------

fn emit_peers(w: &mut Writer, peers: &Peers) {
    w.section(&format!("peers {}", peers.name));
    flag(w, "disabled", peers.disabled);
    for peer in &peers.peers {
        w.line(format!("peer {} {}:{}", peer.name, peer.address, peer.port));
    }
}

fn emit_resolvers(w: &mut Writer, r: &Resolvers) {
    w.section(&format!("resolvers {}", r.name));
    for ns in &r.nameservers {
        w.line(format!("nameserver {} {}:{}", ns.name, ns.address, ns.port));
    }
    kn(w, "accepted_payload_size", r.accepted_payload_size);
    kn(w, "resolve_retries", r.resolve_retries);
    kv(w, "hold nx", &r.hold_nx);
    kv(w, "hold valid", &r.hold_valid);
    kv(w, "hold timeout", &r.hold_timeout);
    kv(w, "hold obsolete", &r.hold_obsolete);
    kv(w, "hold refused", &r.hold_refused);
    kv(w, "hold other", &r.hold_other);
    kv(w, "timeout resolve", &r.timeout_resolve);
    kv(w, "timeout retry", &r.timeout_retry);
    flag(w, "parse-resolv-conf", r.parse_resolv_conf);
}

fn emit_mailers(w: &mut Writer, m: &Mailers) {
    w.section(&format!("mailers {}", m.name));
    kv(w, "timeout mail", &m.timeout_mail);
    for mailer in &m.mailers {
        w.line(format!(
            "mailer {} {}:{}",
            mailer.name, mailer.address, mailer.port
        ));
    }
}

// ---------------------------------------------------------------------------
// Proxy sections
// ---------------------------------------------------------------------------

fn emit_frontend(w: &mut Writer, frontend: &Frontend) {
    w.section(&format!("frontend {}", frontend.name));
    emit_binds(w, &frontend.front.binds);
    emit_settings_head(w, &frontend.settings);
    emit_monitoring(w, &frontend.front);
    emit_settings_body(w, &frontend.settings);
    emit_routing(w, &frontend.front);
    emit_settings_tail(w, &frontend.settings);
}

fn emit_backend(w: &mut Writer, backend: &crate::ir::Backend) -> Result<(), CodeGenerationError> {
    w.section(&format!("backend {}", backend.name));
    emit_backend_head(w, &backend.back);
    emit_settings_head(w, &backend.settings);
    emit_settings_body(w, &backend.settings);
    emit_backend_body(w, &backend.back, &backend.name)?;
    emit_settings_tail(w, &backend.settings);
    Ok(())
}

fn emit_listen(w: &mut Writer, listen: &Listen) -> Result<(), CodeGenerationError> {
    w.section(&format!("listen {}", listen.name));
    emit_binds(w, &listen.front.binds);
    emit_backend_head(w, &listen.back);
    emit_settings_head(w, &listen.settings);
    emit_monitoring(w, &listen.front);
    emit_settings_body(w, &listen.settings);
    emit_routing(w, &listen.front);
    emit_backend_body(w, &listen.back, &listen.name)?;
    emit_settings_tail(w, &listen.settings);
    Ok(())
}

/// Mode, capacities, stats — the scalar head of every proxy section.
fn emit_settings_head(w: &mut Writer, s: &ProxySettings) {
    if let Some(mode) = s.mode {
        w.line(format!("mode {mode}"));
    }
    kn(w, "maxconn", s.maxconn);
    kn(w, "backlog", s.backlog);
    kn(w, "fullconn", s.fullconn);
    kn(w, "retries", s.retries);
    if let Some(stats) = &s.stats {
        if stats.enable == Some(true) {
            w.line("stats enable");
        }
        kv(w, "stats uri", &stats.uri);
        kv(w, "stats refresh", &stats.refresh);
        kv(w, "stats auth", &stats.auth);
        kv(w, "stats realm", &stats.realm);
        if let Some(condition) = &stats.admin_condition {
            w.line(format!("stats admin if {condition}"));
        }
        if stats.hide_version == Some(true) {
            w.line("stats hide-version");
        }
    }
}

/// Balance and connection management, only meaningful with a backend
/// facet present.
fn emit_backend_head(w: &mut Writer, b: &crate::ir::BackendFacet) {
    if let Some(balance) = &b.balance {
        w.line(format!("balance {}", balance.as_str()));
    }
    kv(w, "hash-type", &b.hash_type);
    kn(w, "hash-balance-factor", b.hash_balance_factor);
    kv(w, "http-reuse", &b.http_reuse);
    if !b.retry_on.is_empty() {
        w.line(format!("retry-on {}", b.retry_on.join(",")));
    }
    kv(w, "http-send-name-header", &b.http_send_name_header);
    kv(w, "load-server-state-from-file", &b.load_server_state_from_file);
    kv(w, "server-state-file-name", &b.server_state_file_name);
    kv(w, "dispatch", &b.dispatch);
    kv(w, "cookie", &b.cookie);
}

/// Timeouts, options, logging, filters, rules — shared middle part.
fn emit_settings_body(w: &mut Writer, s: &ProxySettings) {
    emit_timeouts(w, &s.timeouts);
    for option in &s.options {
        w.line(format!("option {option}"));
    }
    for log in &s.log {
        w.line(format!("log {log}"));
    }
    kv(w, "log-tag", &s.log_tag);
    kv(w, "log-format", &s.log_format);
    kv(w, "log-format-sd", &s.log_format_sd);
    kv(w, "error-log-format", &s.error_log_format);
    if !s.log_steps.is_empty() {
        w.line(format!("log-steps {}", s.log_steps.join(",")));
    }
    if let Some(compression) = &s.compression {
        if let Some(algo) = &compression.algo {
            w.line(format!("compression algo {algo}"));
        }
        if !compression.types.is_empty() {
            w.line(format!("compression type {}", compression.types.join(" ")));
        }
        if compression.offload == Some(true) {
            w.line("compression offload");
        }
    }
    for filter in &s.filters {
        w.line(render_filter(filter));
    }
    for table in &s.stick_tables {
        w.line(format!("stick-table {table}"));
    }
    for acl in &s.acls {
        let mut parts = vec!["acl".to_string(), acl.name.clone()];
        if let Some(criterion) = &acl.criterion {
            parts.push(criterion.clone());
        }
        parts.extend(acl.values.iter().cloned());
        w.line(parts.join(" "));
    }
    for rule in &s.http_request_rules {
        w.line(render_rule("http-request", rule));
    }
    for rule in &s.http_response_rules {
        w.line(render_rule("http-response", rule));
    }
    for rule in &s.http_after_response_rules {
        w.line(render_rule("http-after-response", rule));
    }
    for rule in &s.tcp_request_rules {
        w.line(render_rule("tcp-request", rule));
    }
    for rule in &s.tcp_response_rules {
        w.line(render_rule("tcp-response", rule));
    }
    for rule in &s.quic_initial_rules {
        w.line(render_rule("quic-initial", rule));
    }
}

/// Persist directives, error pages, email alerts, trailing metadata.
fn emit_settings_tail(w: &mut Writer, s: &ProxySettings) {
    for condition in &s.force_persist {
        w.line(format!("force-persist if {condition}"));
    }
    for condition in &s.ignore_persist {
        w.line(format!("ignore-persist if {condition}"));
    }
    if let Some(persist) = &s.persist_rdp_cookie {
        emit_persist(w, persist);
    }
    for (status, uri) in &s.errorloc {
        w.line(format!("errorloc {status} \"{uri}\""));
    }
    for (status, uri) in &s.errorloc302 {
        w.line(format!("errorloc302 {status} {uri}"));
    }
    for (status, uri) in &s.errorloc303 {
        w.line(format!("errorloc303 {status} {uri}"));
    }
    for (status, path) in &s.errorfile {
        w.line(format!("errorfile {status} {path}"));
    }
    kv(w, "errorfiles", &s.errorfiles);
    if let Some(alert) = &s.email_alert {
        emit_email_alert(w, alert);
    }
    kv(w, "description", &s.description);
    kv(w, "guid", &s.guid);
}

fn emit_monitoring(w: &mut Writer, front: &crate::ir::FrontendFacet) {
    kv(w, "monitor-uri", &front.monitor_uri);
    for net in &front.monitor_net {
        w.line(format!("monitor-net {net}"));
    }
    for condition in &front.monitor_fail {
        w.line(format!("monitor fail if {condition}"));
    }
    for capture in &front.declare_captures {
        w.line(format!(
            "declare capture {} len {}",
            capture.direction.as_str(),
            capture.length
        ));
    }
}

fn emit_routing(w: &mut Writer, front: &crate::ir::FrontendFacet) {
    for ub in &front.use_backends {
        let mut line = format!("use_backend {}", ub.backend);
        if let Some(condition) = &ub.condition {
            line.push_str(&format!(" {} {}", condition.keyword(), condition.expr));
        }
        w.line(line);
    }
    if let Some(target) = &front.default_backend {
        w.line(format!("default_backend {target}"));
    }
}

fn emit_backend_body(
    w: &mut Writer,
    b: &crate::ir::BackendFacet,
    section: &str,
) -> Result<(), CodeGenerationError> {
    if let Some(hc) = &b.health_check {
        emit_health_check(w, hc);
    }
    for rule in &b.http_check_rules {
        w.line(render_rule("http-check", rule));
    }
    for rule in &b.tcp_check_rules {
        w.line(render_rule("tcp-check", rule));
    }
    for us in &b.use_servers {
        let mut line = format!("use-server {}", us.server);
        if let Some(condition) = &us.condition {
            line.push_str(&format!(" {} {}", condition.keyword(), condition.expr));
        }
        w.line(line);
    }
    if let Some(default_server) = &b.default_server {
        let flags = server_flags(default_server);
        if flags.is_empty() {
            w.line("default-server");
        } else {
            w.line(format!("default-server {flags}"));
        }
    }
    for tpl in &b.server_templates {
        let mut line = format!("server-template {} {}", tpl.prefix, tpl.count);
        if let Some(fqdn) = &tpl.fqdn {
            match tpl.port {
                Some(port) => line.push_str(&format!(" {fqdn}:{port}")),
                None => line.push_str(&format!(" {fqdn}")),
            }
        }
        if let Some(params) = &tpl.params {
            let flags = server_flags(params);
            if !flags.is_empty() {
                line.push(' ');
                line.push_str(&flags);
            }
        }
        w.line(line);
    }
    for server in &b.servers {
        w.line(render_server(server, section)?);
    }
    Ok(())
}

fn emit_health_check(w: &mut Writer, hc: &HealthCheck) {
    if hc.method.is_some() || hc.uri.is_some() {
        let mut send = String::from("http-check send");
        if let Some(method) = &hc.method {
            send.push_str(&format!(" meth {method}"));
        }
        if let Some(uri) = &hc.uri {
            send.push_str(&format!(" uri {uri}"));
        }
        for (name, value) in &hc.headers {
            send.push_str(&format!(" hdr {name} {value}"));
        }
        w.line("option httpchk");
        w.line(send);
    }
    if let Some(expect) = &hc.expect {
        let negation = if expect.negated { "! " } else { "" };
        let body = match &expect.kind {
            ExpectKind::Status(status) => format!("status {status}"),
            ExpectKind::String(value) => format!("string {value}"),
            ExpectKind::Rstring(value) => format!("rstring {value}"),
            ExpectKind::Rstatus(value) => format!("rstatus {value}"),
        };
        w.line(format!("http-check expect {negation}{body}"));
    }
}

fn emit_binds(w: &mut Writer, binds: &[Bind]) {
    for bind in binds {
        let mut line = format!("bind {}", bind.address);
        if bind.ssl == Some(true) {
            line.push_str(" ssl");
        }
        if let Some(cert) = &bind.ssl_cert {
            line.push_str(&format!(" crt {cert}"));
        }
        if !bind.alpn.is_empty() {
            line.push_str(&format!(" alpn {}", bind.alpn.join(",")));
        }
        for (key, value) in &bind.options {
            if value.is_empty() {
                line.push_str(&format!(" {key}"));
            } else {
                line.push_str(&format!(" {key} {value}"));
            }
        }
        w.line(line);
    }
}

// ---------------------------------------------------------------------------
// Servers
// ---------------------------------------------------------------------------

fn render_server(server: &Server, section: &str) -> Result<String, CodeGenerationError> {
    let address = server.address.as_deref().ok_or_else(|| {
        CodeGenerationError::new(format!(
            "server '{}' in '{section}' has no address",
            server.name
        ))
    })?;
    let mut line = format!("server {} {address}", server.name);
    if let Some(port) = server.port {
        line.push_str(&format!(":{port}"));
    }
    let flags = server_flags(server);
    if !flags.is_empty() {
        line.push(' ');
        line.push_str(&flags);
    }
    Ok(line)
}

/// Canonical flag order shared by `server`, `default-server` and
/// `server-template` lines.
fn server_flags(s: &Server) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut push = |text: String| parts.push(text);

    // Check cluster
    if s.check == Some(true) {
        push("check".into());
    }
    if s.check_send_proxy == Some(true) {
        push("check-send-proxy".into());
    }
    if let Some(inter) = &s.check_interval {
        push(format!("inter {inter}"));
    }
    if let Some(rise) = s.rise {
        push(format!("rise {rise}"));
    }
    if let Some(fall) = s.fall {
        push(format!("fall {fall}"));
    }
    if let Some(port) = s.check_port {
        push(format!("port {port}"));
    }
    if let Some(addr) = &s.check_address {
        push(format!("addr {addr}"));
    }
    if let Some(sni) = &s.check_sni {
        push(format!("check-sni {sni}"));
    }
    if let Some(proto) = &s.check_proto {
        push(format!("check-proto {proto}"));
    }

    // Agent cluster
    if s.agent_check == Some(true) {
        push("agent-check".into());
    }
    if let Some(port) = s.agent_port {
        push(format!("agent-port {port}"));
    }
    if let Some(inter) = &s.agent_inter {
        push(format!("agent-inter {inter}"));
    }
    if let Some(addr) = &s.agent_addr {
        push(format!("agent-addr {addr}"));
    }
    if let Some(send) = &s.agent_send {
        push(format!("agent-send {send}"));
    }

    // Capacity
    if let Some(weight) = s.weight {
        push(format!("weight {weight}"));
    }
    if let Some(minconn) = s.minconn {
        push(format!("minconn {minconn}"));
    }
    if let Some(maxconn) = s.maxconn {
        push(format!("maxconn {maxconn}"));
    }
    if let Some(maxqueue) = s.maxqueue {
        push(format!("maxqueue {maxqueue}"));
    }
    if let Some(max_reuse) = s.max_reuse {
        push(format!("max-reuse {max_reuse}"));
    }
    if let Some(pool_max) = s.pool_max_conn {
        push(format!("pool-max-conn {pool_max}"));
    }
    if let Some(delay) = &s.pool_purge_delay {
        push(format!("pool-purge-delay {delay}"));
    }

    // TLS cluster
    if s.ssl == Some(true) {
        push("ssl".into());
    }
    if let Some(verify) = &s.ssl_verify {
        push(format!("verify {verify}"));
    }
    if let Some(sni) = &s.sni {
        push(format!("sni {sni}"));
    }
    if !s.alpn.is_empty() {
        push(format!("alpn {}", s.alpn.join(",")));
    }
    if let Some(ca) = &s.ca_file {
        push(format!("ca-file {ca}"));
    }
    if let Some(crl) = &s.crl_file {
        push(format!("crl-file {crl}"));
    }
    if let Some(crt) = &s.crt {
        push(format!("crt {crt}"));
    }
    if let Some(ciphers) = &s.ciphers {
        push(format!("ciphers {ciphers}"));
    }
    if let Some(curves) = &s.curves {
        push(format!("curves {curves}"));
    }

    // PROXY protocol
    if s.send_proxy == Some(true) {
        push("send-proxy".into());
    }
    if s.send_proxy_v2 == Some(true) {
        push("send-proxy-v2".into());
    }

    if let Some(slowstart) = &s.slowstart {
        push(format!("slowstart {slowstart}"));
    }

    // DNS
    if let Some(resolvers) = &s.resolvers {
        push(format!("resolvers {resolvers}"));
    }
    if let Some(prefer) = &s.resolve_prefer {
        push(format!("resolve-prefer {prefer}"));
    }
    if let Some(init) = &s.init_addr {
        push(format!("init-addr {init}"));
    }

    // Error policy
    if let Some(limit) = s.error_limit {
        push(format!("error-limit {limit}"));
    }
    if let Some(observe) = &s.observe {
        push(format!("observe {observe}"));
    }
    if let Some(on_error) = &s.on_error {
        push(format!("on-error {on_error}"));
    }
    if let Some(down) = &s.on_marked_down {
        push(format!("on-marked-down {down}"));
    }
    if let Some(up) = &s.on_marked_up {
        push(format!("on-marked-up {up}"));
    }

    // Protocol plumbing
    if let Some(proto) = &s.proto {
        push(format!("proto {proto}"));
    }
    if s.tfo == Some(true) {
        push("tfo".into());
    }
    if let Some(namespace) = &s.namespace {
        push(format!("namespace {namespace}"));
    }
    if let Some(usesrc) = &s.usesrc {
        push(format!("usesrc {usesrc}"));
    }

    // Identity
    if let Some(id) = s.id {
        push(format!("id {id}"));
    }
    if let Some(cookie) = &s.cookie {
        push(format!("cookie {cookie}"));
    }
    if let Some(track) = &s.track {
        push(format!("track {track}"));
    }
    if let Some(redir) = &s.redir {
        push(format!("redir {redir}"));
    }

    // Free-form extras, key order
    for (key, value) in &s.options {
        if value.is_empty() {
            push(key.clone());
        } else {
            push(format!("{key} {value}"));
        }
    }

    // State
    if s.disabled == Some(true) {
        push("disabled".into());
    }
    if s.backup == Some(true) {
        push("backup".into());
    }

    parts.join(" ")
}

// ---------------------------------------------------------------------------
// Rules and filters
// ---------------------------------------------------------------------------

fn render_filter(filter: &Filter) -> String {
    let mut parts = vec!["filter".to_string()];
    match filter {
        Filter::Compression => parts.push("compression".into()),
        Filter::Spoe { engine, config } => {
            parts.push("spoe".into());
            if let Some(engine) = engine {
                parts.push("engine".into());
                parts.push(engine.clone());
            }
            if let Some(config) = config {
                parts.push("config".into());
                parts.push(config.clone());
            }
        }
        Filter::Cache { name } => {
            parts.push("cache".into());
            if let Some(name) = name {
                parts.push(name.clone());
            }
        }
        Filter::Trace { name } => {
            parts.push("trace".into());
            if let Some(name) = name {
                parts.push("name".into());
                parts.push(name.clone());
            }
        }
        Filter::BwlimIn {
            name,
            default_limit,
            default_period,
            limit,
            period,
            key,
            table,
        } => {
            parts.push("bwlim-in".into());
            push_bwlim(&mut parts, name, default_limit, default_period, limit, period, key, table);
        }
        Filter::BwlimOut {
            name,
            default_limit,
            default_period,
            limit,
            period,
            key,
            table,
        } => {
            parts.push("bwlim-out".into());
            push_bwlim(&mut parts, name, default_limit, default_period, limit, period, key, table);
        }
    }
    parts.join(" ")
}

#[allow(clippy::too_many_arguments)]
fn push_bwlim(
    parts: &mut Vec<String>,
    name: &Option<String>,
    default_limit: &Option<String>,
    default_period: &Option<String>,
    limit: &Option<String>,
    period: &Option<String>,
    key: &Option<String>,
    table: &Option<String>,
) {
    if let Some(name) = name {
        parts.push(name.clone());
    }
    if let Some(value) = default_limit {
        parts.push("default-limit".into());
        parts.push(value.clone());
    }
    if let Some(value) = default_period {
        parts.push("default-period".into());
        parts.push(value.clone());
    }
    if let Some(value) = limit {
        parts.push("limit".into());
        parts.push(value.clone());
    }
    if let Some(value) = period {
        parts.push("period".into());
        parts.push(value.clone());
    }
    if let Some(value) = key {
        parts.push("key".into());
        parts.push(value.clone());
    }
    if let Some(value) = table {
        parts.push("table".into());
        parts.push(value.clone());
    }
}

/// Parameters whose values the target expects quoted.
const QUOTED_PARAMS: &[&str] = &["content-type", "string", "lf-string"];

fn param<'r>(rule: &'r Rule, names: &[&str]) -> Option<&'r str> {
    rule.params
        .iter()
        .find(|(k, _)| names.contains(&k.as_str()))
        .map(|(_, v)| v.as_str())
}

fn render_rule(list: &str, rule: &Rule) -> String {
    let mut parts = vec![list.to_string(), rule.action.clone()];

    match rule.action.as_str() {
        "set-header" | "add-header" => {
            if let Some(name) = param(rule, &["name", "header"]) {
                parts.push(name.to_string());
            }
            if let Some(value) = param(rule, &["value", "fmt"]) {
                parts.push(value.to_string());
            }
        }
        "del-header" => {
            if let Some(name) = param(rule, &["name", "header"]) {
                parts.push(name.to_string());
            }
        }
        "set-path" | "set-uri" | "set-method" | "set-query" | "set-status" => {
            parts.extend(rule.args.iter().cloned());
            if let Some(value) = param(
                rule,
                &["path", "uri", "method", "query", "status", "value", "fmt"],
            ) {
                parts.push(value.to_string());
            }
        }
        "set-var" => {
            if let Some(name) = param(rule, &["name", "var"]) {
                // set-var names its target in the action itself
                let last = parts.len() - 1;
                parts[last] = format!("set-var({name})");
            }
            parts.extend(rule.args.iter().cloned());
            if let Some(expr) = param(rule, &["expr", "value", "fmt"]) {
                parts.push(expr.to_string());
            }
        }
        _ => {
            parts.extend(rule.args.iter().cloned());
            for (key, value) in &rule.params {
                if value == "true" {
                    parts.push(key.clone());
                    continue;
                }
                if value == "false" {
                    continue;
                }
                parts.push(key.clone());
                if QUOTED_PARAMS.contains(&key.as_str()) {
                    parts.push(format!("\"{value}\""));
                } else {
                    parts.push(value.clone());
                }
            }
        }
    }

    if let Some(condition) = &rule.condition {
        parts.push(condition.keyword().to_string());
        parts.push(condition.expr.clone());
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        Acl, Backend, Balance, Bind, Condition, Frontend, Mode, Rule, Server, ServerTemplate,
    };

    fn generate(ir: &ConfigIR) -> String {
        HaproxyGenerator::new().generate(ir).expect("generate")
    }

    #[test]
    fn minimal_config_header() {
        let mut ir = ConfigIR::new("minimal");
        ir.version = Some("2.0".into());
        let output = generate(&ir);
        assert!(output.contains("# Generated HAProxy configuration: minimal"));
        assert!(output.contains("# Version: 2.0"));
    }

    #[test]
    fn global_section() {
        let mut ir = ConfigIR::new("test");
        ir.global = Some(Global {
            daemon: Some(true),
            maxconn: Some(10000),
            user: Some("haproxy".into()),
            group: Some("haproxy".into()),
            ..Default::default()
        });
        let output = generate(&ir);
        assert!(output.contains("global"));
        assert!(output.contains("    daemon"));
        assert!(output.contains("    maxconn 10000"));
        assert!(output.contains("    user haproxy"));
        assert!(output.contains("    group haproxy"));
    }

    #[test]
    fn explicit_state_booleans() {
        let mut ir = ConfigIR::new("test");
        ir.global = Some(Global {
            strict_limits: Some(true),
            numa_cpu_mapping: Some(false),
            ssl_mode_async: Some(true),
            ..Default::default()
        });
        let output = generate(&ir);
        assert!(output.contains("strict-limits on"));
        assert!(output.contains("numa-cpu-mapping off"));
        assert!(output.contains("    ssl-mode-async\n"));
    }

    #[test]
    fn tuning_knob_conventions() {
        let mut ir = ConfigIR::new("test");
        let mut global = Global::default();
        global
            .tuning
            .insert("tune.lua.bool-sample-conversion".into(), Value::Bool(true));
        global
            .tuning
            .insert("tune.lua.burst-timeout".into(), Value::Int(1000));
        global
            .tuning
            .insert("tune.lua.log.stderr".into(), Value::Str("auto".into()));
        global
            .tuning
            .insert("profiling.tasks.on".into(), Value::Bool(true));
        ir.global = Some(global);
        let output = generate(&ir);
        assert!(output.contains("tune.lua.bool-sample-conversion on"));
        assert!(output.contains("tune.lua.burst-timeout 1000"));
        assert!(output.contains("tune.lua.log.stderr auto"));
        assert!(output.contains("    profiling.tasks.on\n"));
    }

    #[test]
    fn defaults_section() {
        let mut ir = ConfigIR::new("test");
        ir.defaults = Some(Defaults {
            mode: Some(Mode::Http),
            retries: Some(3),
            timeouts: Timeouts {
                connect: Some("5s".into()),
                client: Some("50s".into()),
                server: Some("50s".into()),
                ..Default::default()
            },
            log: vec!["global".into()],
            options: vec!["httplog".into(), "dontlognull".into()],
            ..Default::default()
        });
        let output = generate(&ir);
        assert!(output.contains("defaults"));
        assert!(output.contains("mode http"));
        assert!(output.contains("retries 3"));
        assert!(output.contains("timeout connect 5s"));
        assert!(output.contains("timeout client 50s"));
        assert!(output.contains("timeout server 50s"));
        assert!(output.contains("log global"));
        assert!(output.contains("option httplog"));
        assert!(output.contains("option dontlognull"));
    }

    #[test]
    fn frontend_basics() {
        let mut ir = ConfigIR::new("test");
        let mut frontend = Frontend {
            name: "web".into(),
            ..Default::default()
        };
        frontend.front.binds.push(Bind::new("*:80"));
        frontend.settings.mode = Some(Mode::Http);
        frontend.front.default_backend = Some("servers".into());
        ir.frontends.push(frontend);
        let mut backend = Backend {
            name: "servers".into(),
            ..Default::default()
        };
        backend.back.balance = Some(Balance("roundrobin".into()));
        ir.backends.push(backend);

        let output = generate(&ir);
        assert!(output.contains("frontend web"));
        assert!(output.contains("bind *:80"));
        assert!(output.contains("mode http"));
        assert!(output.contains("default_backend servers"));
        assert!(output.contains("backend servers"));
        assert!(output.contains("balance roundrobin"));
    }

    #[test]
    fn frontend_acl_line() {
        let mut ir = ConfigIR::new("test");
        let mut frontend = Frontend {
            name: "web".into(),
            ..Default::default()
        };
        frontend.front.binds.push(Bind::new("*:80"));
        frontend.settings.acls.push(Acl {
            name: "is_api".into(),
            criterion: Some("path_beg".into()),
            values: vec!["/api".into()],
            ..Default::default()
        });
        ir.frontends.push(frontend);
        let output = generate(&ir);
        assert!(output.contains("acl is_api path_beg /api"));
    }

    #[test]
    fn http_request_rule_with_condition() {
        let mut ir = ConfigIR::new("test");
        let mut frontend = Frontend {
            name: "web".into(),
            ..Default::default()
        };
        frontend.front.binds.push(Bind::new("*:80"));
        let mut rule = Rule::new("deny");
        rule.params.push(("status".into(), "403".into()));
        rule.condition = Some(Condition::if_("is_blocked"));
        frontend.settings.http_request_rules.push(rule);
        ir.frontends.push(frontend);
        let output = generate(&ir);
        assert!(output.contains("http-request deny status 403 if is_blocked"));
    }

    #[test]
    fn server_lines_with_check_cluster() {
        let mut ir = ConfigIR::new("test");
        let mut backend = Backend {
            name: "servers".into(),
            ..Default::default()
        };
        backend.back.balance = Some(Balance("roundrobin".into()));
        backend.back.servers.push(Server {
            name: "web1".into(),
            address: Some("10.0.1.1".into()),
            port: Some(8080),
            check: Some(true),
            check_interval: Some("3s".into()),
            rise: Some(5),
            fall: Some(2),
            ..Default::default()
        });
        backend.back.servers.push(Server {
            name: "web2".into(),
            address: Some("10.0.1.2".into()),
            port: Some(8080),
            check: Some(true),
            ..Default::default()
        });
        ir.backends.push(backend);
        let output = generate(&ir);
        assert!(output.contains("server web1 10.0.1.1:8080 check inter 3s rise 5 fall 2"));
        assert!(output.contains("server web2 10.0.1.2:8080 check"));
    }

    #[test]
    fn server_ssl_weight_backup() {
        let mut ir = ConfigIR::new("test");
        let mut backend = Backend {
            name: "servers".into(),
            ..Default::default()
        };
        backend.back.servers.push(Server {
            name: "web1".into(),
            address: Some("10.0.1.1".into()),
            port: Some(443),
            ssl: Some(true),
            ssl_verify: Some("none".into()),
            ..Default::default()
        });
        backend.back.servers.push(Server {
            name: "backup1".into(),
            address: Some("10.0.2.1".into()),
            port: Some(8080),
            backup: Some(true),
            ..Default::default()
        });
        backend.back.servers.push(Server {
            name: "weighted".into(),
            address: Some("10.0.3.1".into()),
            port: Some(8080),
            weight: Some(100),
            maxconn: Some(500),
            ..Default::default()
        });
        ir.backends.push(backend);
        let output = generate(&ir);
        assert!(output.contains("server web1 10.0.1.1:443 ssl verify none"));
        assert!(output.contains("server backup1 10.0.2.1:8080 backup"));
        assert!(output.contains("server weighted 10.0.3.1:8080 weight 100 maxconn 500"));
    }

    #[test]
    fn health_check_emission() {
        let mut ir = ConfigIR::new("test");
        let mut backend = Backend {
            name: "servers".into(),
            ..Default::default()
        };
        backend.back.balance = Some(Balance("roundrobin".into()));
        backend.back.health_check = Some(HealthCheck {
            method: Some("GET".into()),
            uri: Some("/health".into()),
            expect: Some(crate::ir::Expect {
                negated: false,
                kind: ExpectKind::Status(200),
            }),
            ..Default::default()
        });
        ir.backends.push(backend);
        let output = generate(&ir);
        assert!(output.contains("http-check send meth GET uri /health"));
        assert!(output.contains("http-check expect status 200"));
    }

    #[test]
    fn negated_expect() {
        let mut ir = ConfigIR::new("test");
        let mut backend = Backend {
            name: "servers".into(),
            ..Default::default()
        };
        backend.back.health_check = Some(HealthCheck {
            expect: Some(crate::ir::Expect {
                negated: true,
                kind: ExpectKind::Rstatus("^5[0-9][0-9]$".into()),
            }),
            ..Default::default()
        });
        ir.backends.push(backend);
        let output = generate(&ir);
        assert!(output.contains("http-check expect ! rstatus ^5[0-9][0-9]$"));
    }

    #[test]
    fn server_template_line() {
        let mut ir = ConfigIR::new("test");
        let mut backend = Backend {
            name: "servers".into(),
            ..Default::default()
        };
        backend.back.server_templates.push(ServerTemplate {
            prefix: "web".into(),
            count: 5,
            fqdn: Some("web-{id}.internal.example.com".into()),
            port: Some(8080),
            ..Default::default()
        });
        ir.backends.push(backend);
        let output = generate(&ir);
        assert!(output.contains("server-template web 5 web-{id}.internal.example.com:8080"));
    }

    #[test]
    fn bind_line_with_tls_material() {
        let mut ir = ConfigIR::new("test");
        let mut frontend = Frontend {
            name: "web".into(),
            ..Default::default()
        };
        let mut bind = Bind::new("*:443");
        bind.ssl = Some(true);
        bind.ssl_cert = Some("/etc/ssl/cert.pem".into());
        bind.alpn = vec!["h2".into(), "http/1.1".into()];
        frontend.front.binds.push(bind);
        ir.frontends.push(frontend);
        let output = generate(&ir);
        assert!(output.contains("bind *:443 ssl crt /etc/ssl/cert.pem alpn h2,http/1.1"));
    }

    #[test]
    fn peers_resolvers_mailers() {
        let mut ir = ConfigIR::new("test");
        ir.peers.push(crate::ir::Peers {
            name: "mypeers".into(),
            peers: vec![crate::ir::PeerEntry {
                name: "haproxy1".into(),
                address: "10.0.0.1".into(),
                port: 1024,
            }],
            ..Default::default()
        });
        ir.resolvers.push(crate::ir::Resolvers {
            name: "mydns".into(),
            nameservers: vec![crate::ir::Nameserver {
                name: "dns1".into(),
                address: "8.8.8.8".into(),
                port: 53,
            }],
            hold_nx: Some("30s".into()),
            timeout_resolve: Some("1s".into()),
            ..Default::default()
        });
        ir.mailers.push(crate::ir::Mailers {
            name: "alerts".into(),
            timeout_mail: Some("10s".into()),
            mailers: vec![crate::ir::MailerEntry {
                name: "smtp1".into(),
                address: "smtp.example.com".into(),
                port: 587,
            }],
            ..Default::default()
        });
        let output = generate(&ir);
        assert!(output.contains("peers mypeers"));
        assert!(output.contains("peer haproxy1 10.0.0.1:1024"));
        assert!(output.contains("resolvers mydns"));
        assert!(output.contains("nameserver dns1 8.8.8.8:53"));
        assert!(output.contains("hold nx 30s"));
        assert!(output.contains("timeout resolve 1s"));
        assert!(output.contains("mailers alerts"));
        assert!(output.contains("timeout mail 10s"));
        assert!(output.contains("mailer smtp1 smtp.example.com:587"));
    }

    #[test]
    fn determinism() {
        let mut ir = ConfigIR::new("test");
        let mut backend = Backend {
            name: "servers".into(),
            ..Default::default()
        };
        backend.back.balance = Some(Balance("leastconn".into()));
        backend.back.servers.push(Server {
            name: "s1".into(),
            address: Some("10.0.0.1".into()),
            port: Some(80),
            ..Default::default()
        });
        ir.backends.push(backend);
        let first = generate(&ir);
        let second = generate(&ir);
        assert_eq!(first, second);
    }

    #[test]
    fn server_without_address_is_a_codegen_error() {
        let mut ir = ConfigIR::new("test");
        let mut backend = Backend {
            name: "servers".into(),
            ..Default::default()
        };
        backend.back.servers.push(Server {
            name: "s1".into(),
            ..Default::default()
        });
        ir.backends.push(backend);
        let err = HaproxyGenerator::new().generate(&ir).unwrap_err();
        assert!(err.message.contains("has no address"));
    }

    #[test]
    fn inline_lua_references_extraction_dir() {
        let mut ir = ConfigIR::new("test");
        ir.lua_scripts.push(crate::ir::LuaScript {
            name: "hello".into(),
            source_type: LuaSource::Inline,
            content: "core.log(core.info, \"hi\")".into(),
            location: None,
        });
        let output = HaproxyGenerator::with_options(GeneratorOptions {
            lua_dir: "/etc/haproxy/lua".into(),
        })
        .generate(&ir)
        .unwrap();
        assert!(output.contains("lua-load /etc/haproxy/lua/hello.lua"));
    }
}
