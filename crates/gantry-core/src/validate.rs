//! Semantic validation of the fully transformed IR.
//!
//! Fatal rules: referential integrity (`default_backend`, `use_backend`,
//! `use-server`), duplicate identifiers, mode/option compatibility,
//! health-check parameters, numeric ranges. Non-fatal advisories (empty
//! backends, bind-less frontends, unused templates and variables) are
//! collected as warnings.

use crate::error::{ValidationError, ValidationWarning};
use crate::ir::{
    BackendFacet, ConfigIR, Frontend, FrontendFacet, HealthCheck, Mode, ProxySettings, Server,
};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

const HTTP_ONLY_OPTIONS: &[&str] = &[
    "httplog",
    "forwardfor",
    "http-server-close",
    "http-keep-alive",
    "httpchk",
];

const TCP_ONLY_OPTIONS: &[&str] = &["tcplog"];

const VALID_CHECK_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "TRACE", "CONNECT",
];

pub struct SemanticValidator<'ir> {
    ir: &'ir ConfigIR,
    pub warnings: Vec<ValidationWarning>,
}

impl<'ir> SemanticValidator<'ir> {
    pub fn new(ir: &'ir ConfigIR) -> Self {
        Self {
            ir,
            warnings: Vec::new(),
        }
    }

    /// Validate the IR. On success the IR is returned unchanged; the
    /// accumulated warnings stay on the validator.
    pub fn validate(&mut self) -> Result<&'ir ConfigIR, ValidationError> {
        debug!(config = %self.ir.name, "running semantic validation");
        self.check_unique_section_names()?;
        let backends: BTreeSet<&str> = self.ir.backend_names().collect();

        for frontend in &self.ir.frontends {
            self.check_frontend(frontend, &backends)?;
        }
        for backend in &self.ir.backends {
            self.check_backend_like(
                &backend.name,
                &backend.settings,
                &backend.back,
                "backend",
            )?;
        }
        for listen in &self.ir.listens {
            self.check_front_facet_refs(&listen.name, &listen.front, &backends)?;
            self.check_backend_like(&listen.name, &listen.settings, &listen.back, "listen")?;
            self.check_mode_options(&listen.name, &listen.settings)?;
        }
        for frontend in &self.ir.frontends {
            self.check_mode_options(&frontend.name, &frontend.settings)?;
        }
        for backend in &self.ir.backends {
            self.check_mode_options(&backend.name, &backend.settings)?;
        }

        self.collect_advisories();
        Ok(self.ir)
    }

    fn check_unique_section_names(&self) -> Result<(), ValidationError> {
        fn check_kind<'a>(
            kind: &str,
            names: impl Iterator<Item = (&'a str, Option<&'a crate::error::SourceLocation>)>,
        ) -> Result<(), ValidationError> {
            let mut seen = HashSet::new();
            for (name, location) in names {
                if !seen.insert(name) {
                    let mut err =
                        ValidationError::new(format!("duplicate {kind} name '{name}'"));
                    err.location = location.cloned();
                    return Err(err);
                }
            }
            Ok(())
        }
        check_kind(
            "frontend",
            self.ir
                .frontends
                .iter()
                .map(|f| (f.name.as_str(), f.location.as_ref())),
        )?;
        check_kind(
            "backend",
            self.ir
                .backends
                .iter()
                .map(|b| (b.name.as_str(), b.location.as_ref())),
        )?;
        check_kind(
            "listen",
            self.ir
                .listens
                .iter()
                .map(|l| (l.name.as_str(), l.location.as_ref())),
        )?;
        check_kind(
            "peers",
            self.ir
                .peers
                .iter()
                .map(|p| (p.name.as_str(), p.location.as_ref())),
        )?;
        check_kind(
            "resolvers",
            self.ir
                .resolvers
                .iter()
                .map(|r| (r.name.as_str(), r.location.as_ref())),
        )?;
        check_kind(
            "mailers",
            self.ir
                .mailers
                .iter()
                .map(|m| (m.name.as_str(), m.location.as_ref())),
        )?;
        Ok(())
    }

    fn check_frontend(
        &self,
        frontend: &Frontend,
        backends: &BTreeSet<&str>,
    ) -> Result<(), ValidationError> {
        self.check_front_facet_refs(&frontend.name, &frontend.front, backends)
    }

    fn check_front_facet_refs(
        &self,
        name: &str,
        front: &FrontendFacet,
        backends: &BTreeSet<&str>,
    ) -> Result<(), ValidationError> {
        if let Some(target) = &front.default_backend {
            if !backends.contains(target.as_str()) {
                return Err(ValidationError::new(format!(
                    "frontend '{name}': default_backend '{target}' does not exist"
                )));
            }
        }
        for ub in &front.use_backends {
            if !backends.contains(ub.backend.as_str()) {
                let mut err = ValidationError::new(format!(
                    "frontend '{name}': use_backend references non-existent backend '{}'",
                    ub.backend
                ));
                err.location = ub.location.clone();
                return Err(err);
            }
        }
        Ok(())
    }

    fn check_backend_like(
        &self,
        name: &str,
        _settings: &ProxySettings,
        back: &BackendFacet,
        kind: &str,
    ) -> Result<(), ValidationError> {
        // Duplicate server names.
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for server in &back.servers {
            if !seen.insert(server.name.as_str()) {
                duplicates.push(server.name.as_str());
            }
        }
        if !duplicates.is_empty() {
            return Err(ValidationError::new(format!(
                "{kind} '{name}' has duplicate server names: {}",
                duplicates.join(", ")
            )));
        }

        // Duplicate explicit server ids.
        let mut ids = HashSet::new();
        for server in &back.servers {
            if let Some(id) = server.id {
                if !ids.insert(id) {
                    return Err(ValidationError::new(format!(
                        "{kind} '{name}' has duplicate server id {id}"
                    )));
                }
            }
        }

        // use-server targets must be declared in this section.
        let server_names: HashSet<&str> =
            back.servers.iter().map(|s| s.name.as_str()).collect();
        for us in &back.use_servers {
            if !server_names.contains(us.server.as_str()) {
                let mut err = ValidationError::new(format!(
                    "{kind} '{name}': use-server references unknown server '{}'",
                    us.server
                ));
                err.location = us.location.clone();
                return Err(err);
            }
        }

        for server in &back.servers {
            self.check_server_ranges(name, kind, server)?;
        }
        if let Some(default_server) = &back.default_server {
            self.check_server_ranges(name, kind, default_server)?;
        }

        if let Some(hc) = &back.health_check {
            self.check_health_check(name, kind, hc)?;
        }

        if let Some(factor) = back.hash_balance_factor {
            if !(100..=65535).contains(&factor) {
                return Err(ValidationError::new(format!(
                    "{kind} '{name}': hash-balance-factor {factor} out of range [100, 65535]"
                )));
            }
        }

        Ok(())
    }

    fn check_server_ranges(
        &self,
        section: &str,
        kind: &str,
        server: &Server,
    ) -> Result<(), ValidationError> {
        let describe = |what: &str| {
            if server.name.is_empty() {
                format!("{kind} '{section}' default-server: {what}")
            } else {
                format!("{kind} '{section}' server '{}': {what}", server.name)
            }
        };
        if let Some(weight) = server.weight {
            if !(0..=256).contains(&weight) {
                let mut err =
                    ValidationError::new(describe(&format!("weight {weight} out of range [0, 256]")));
                err.location = server.location.clone();
                return Err(err);
            }
        }
        if let Some(rise) = server.rise {
            if rise < 1 {
                let mut err = ValidationError::new(describe(&format!("rise {rise} must be >= 1")));
                err.location = server.location.clone();
                return Err(err);
            }
        }
        if let Some(fall) = server.fall {
            if fall < 1 {
                let mut err = ValidationError::new(describe(&format!("fall {fall} must be >= 1")));
                err.location = server.location.clone();
                return Err(err);
            }
        }
        if let Some(port) = server.port {
            if !(1..=65535).contains(&port) {
                let mut err =
                    ValidationError::new(describe(&format!("port {port} out of range [1, 65535]")));
                err.location = server.location.clone();
                return Err(err);
            }
        }
        Ok(())
    }

    fn check_health_check(
        &self,
        section: &str,
        kind: &str,
        hc: &HealthCheck,
    ) -> Result<(), ValidationError> {
        if let Some(method) = &hc.method {
            if !VALID_CHECK_METHODS.contains(&method.as_str()) {
                let mut err = ValidationError::new(format!(
                    "{kind} '{section}': invalid health check method '{method}'"
                ));
                err.location = hc.location.clone();
                return Err(err);
            }
        }
        if let Some(expect) = &hc.expect {
            if let crate::ir::ExpectKind::Status(status) = expect.kind {
                if !(100..=599).contains(&status) {
                    let mut err = ValidationError::new(format!(
                        "{kind} '{section}': invalid health check expect status {status}"
                    ));
                    err.location = hc.location.clone();
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// HTTP-only options are rejected in TCP mode and vice versa.
    fn check_mode_options(
        &self,
        name: &str,
        settings: &ProxySettings,
    ) -> Result<(), ValidationError> {
        let Some(mode) = settings.mode else {
            return Ok(());
        };
        for option in &settings.options {
            let option_word = option.split_whitespace().next().unwrap_or_default();
            match mode {
                Mode::Tcp => {
                    if HTTP_ONLY_OPTIONS.contains(&option_word) {
                        return Err(ValidationError::new(format!(
                            "section '{name}': HTTP option '{option_word}' used in TCP mode"
                        )));
                    }
                }
                Mode::Http => {
                    if TCP_ONLY_OPTIONS.contains(&option_word) {
                        return Err(ValidationError::new(format!(
                            "section '{name}': TCP option '{option_word}' used in HTTP mode"
                        )));
                    }
                }
                Mode::Health => {}
            }
        }
        Ok(())
    }

    fn collect_advisories(&mut self) {
        for backend in &self.ir.backends {
            if backend.back.servers.is_empty()
                && backend.back.server_templates.is_empty()
                && backend.back.dispatch.is_none()
            {
                self.warnings.push(ValidationWarning::new(format!(
                    "backend '{}' has no servers defined",
                    backend.name
                )));
            }
        }
        for frontend in &self.ir.frontends {
            if frontend.front.binds.is_empty() {
                self.warnings.push(ValidationWarning::new(format!(
                    "frontend '{}' has no bind directives",
                    frontend.name
                )));
            }
        }

    }
}

/// Convenience wrapper: validate and hand back warnings.
pub fn validate(ir: &ConfigIR) -> Result<Vec<ValidationWarning>, ValidationError> {
    let mut validator = SemanticValidator::new(ir);
    validator.validate()?;
    Ok(validator.warnings)
}

/// Advisories that can only be computed on the pre-transform IR, where
/// `@name` spreads and `${...}` markers are still present: templates
/// nothing spreads, variables nothing interpolates.
pub fn unused_definition_warnings(ir: &ConfigIR) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let referenced = referenced_template_names(ir);
    for name in ir.templates.keys() {
        if !referenced.contains(name.as_str()) {
            warnings.push(ValidationWarning::new(format!(
                "template '{name}' is defined but never referenced"
            )));
        }
    }

    let used = referenced_variable_names(ir);
    for name in ir.variables.keys() {
        if !used.contains(name.as_str()) {
            warnings.push(ValidationWarning::new(format!(
                "variable '{name}' is defined but never used"
            )));
        }
    }

    warnings
}

fn referenced_template_names(ir: &ConfigIR) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let from_back = |back: &BackendFacet, names: &mut BTreeSet<String>| {
        for server in &back.servers {
            names.extend(server.template_refs.iter().cloned());
        }
        if let Some(ds) = &back.default_server {
            names.extend(ds.template_refs.iter().cloned());
        }
        for lp in &back.server_loops {
            for server in &lp.body {
                names.extend(server.template_refs.iter().cloned());
            }
        }
        if let Some(hc) = &back.health_check {
            names.extend(hc.template_refs.iter().cloned());
        }
    };
    let from_settings = |settings: &ProxySettings, names: &mut BTreeSet<String>| {
        names.extend(settings.template_refs.iter().cloned());
        for acl in &settings.acls {
            names.extend(acl.template_refs.iter().cloned());
        }
    };
    for frontend in &ir.frontends {
        from_settings(&frontend.settings, &mut names);
    }
    for backend in &ir.backends {
        from_settings(&backend.settings, &mut names);
        from_back(&backend.back, &mut names);
    }
    for listen in &ir.listens {
        from_settings(&listen.settings, &mut names);
        from_back(&listen.back, &mut names);
    }
    names
}

/// Identifiers mentioned inside `${...}` markers anywhere in the IR,
/// including deferred loop bodies and other variables' values.
fn referenced_variable_names(ir: &ConfigIR) -> BTreeSet<String> {
    use crate::transform::visit::VisitStrings;

    let mut texts: Vec<String> = Vec::new();
    let mut scratch = ir.clone();
    scratch
        .visit_strings(&mut |s, _| {
            texts.push(s.clone());
            Ok(())
        })
        .ok();
    for backend in &ir.backends {
        collect_loop_texts(&backend.back, &backend.settings, &mut texts);
    }
    for listen in &ir.listens {
        collect_loop_texts(&listen.back, &listen.settings, &mut texts);
    }
    for frontend in &ir.frontends {
        for lp in &frontend.settings.rule_loops {
            for rule in &lp.body {
                texts.extend(rule.args.iter().cloned());
                texts.extend(rule.params.iter().map(|(_, v)| v.clone()));
            }
        }
    }
    for variable in ir.variables.values() {
        collect_value_texts(&variable.value, &mut texts);
    }

    let mut names = BTreeSet::new();
    for text in texts {
        collect_marker_identifiers(&text, &mut names);
    }
    names
}

fn collect_loop_texts(back: &BackendFacet, settings: &ProxySettings, texts: &mut Vec<String>) {
    for lp in &back.server_loops {
        for server in &lp.body {
            let mut clone = server.clone();
            use crate::transform::visit::VisitStrings;
            clone
                .visit_strings(&mut |s, _| {
                    texts.push(s.clone());
                    Ok(())
                })
                .ok();
        }
    }
    for lp in &settings.rule_loops {
        for rule in &lp.body {
            texts.extend(rule.args.iter().cloned());
            texts.extend(rule.params.iter().map(|(_, v)| v.clone()));
        }
    }
}

fn collect_value_texts(value: &crate::ir::Value, texts: &mut Vec<String>) {
    match value {
        crate::ir::Value::Str(s) => texts.push(s.clone()),
        crate::ir::Value::List(items) => {
            for item in items {
                collect_value_texts(item, texts);
            }
        }
        crate::ir::Value::Map(entries) => {
            for (_, item) in entries {
                collect_value_texts(item, texts);
            }
        }
        _ => {}
    }
}

/// Pull bare identifiers out of every `${...}` occurrence in `text`.
fn collect_marker_identifiers(text: &str, out: &mut BTreeSet<String>) {
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else { break };
        let expr = &after[..end];
        let mut ident = String::new();
        for c in expr.chars().chain(std::iter::once(' ')) {
            if c.is_ascii_alphanumeric() || c == '_' {
                ident.push(c);
            } else {
                if !ident.is_empty() && !ident.chars().next().unwrap().is_ascii_digit() {
                    out.insert(std::mem::take(&mut ident));
                } else {
                    ident.clear();
                }
            }
        }
        rest = &after[end + 1..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower;
    use crate::parser::parse_source;
    use crate::transform;

    fn validated(src: &str) -> Result<Vec<ValidationWarning>, ValidationError> {
        let node = parse_source(src, "test.hap").unwrap();
        let mut warnings = Vec::new();
        let ir = lower(node, &mut warnings).unwrap();
        let ir = transform::run_all(ir, &mut warnings).unwrap();
        validate(&ir)
    }

    #[test]
    fn valid_configuration_passes() {
        let warnings = validated(
            "config t { frontend web { bind *:80\n default_backend: servers }\n backend servers { balance: roundrobin\n servers { server web1 { address: \"10.0.1.1\"\n port: 8080 } } } }",
        )
        .unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_default_backend_is_fatal() {
        let err = validated(
            "config t { frontend web { bind *:80\n default_backend: nonexistent }\n backend servers { balance: roundrobin } }",
        )
        .unwrap_err();
        assert!(err
            .message
            .contains("default_backend 'nonexistent' does not exist"));
    }

    #[test]
    fn missing_use_backend_target_is_fatal() {
        let err = validated(
            "config t { frontend web { bind *:80\n route { to nonexistent if is_api\n default: servers }\n acl is_api { path_beg \"/api\" } }\n backend servers { balance: roundrobin } }",
        )
        .unwrap_err();
        assert!(err
            .message
            .contains("non-existent backend 'nonexistent'"));
    }

    #[test]
    fn listens_satisfy_backend_references() {
        let warnings = validated(
            "config t { frontend web { bind *:80\n default_backend: app }\n listen app { bind *:8080\n servers { server s1 { address: \"10.0.0.1\"\n port: 80 } } } }",
        )
        .unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn duplicate_server_names_are_fatal() {
        let err = validated(
            "config t { backend servers { balance: roundrobin\n servers { server web1 { address: \"10.0.1.1\"\n port: 8080 }\n server web1 { address: \"10.0.1.2\"\n port: 8080 } } } }",
        )
        .unwrap_err();
        assert!(err.message.contains("duplicate server names: web1"));
    }

    #[test]
    fn duplicate_server_ids_are_fatal() {
        let err = validated(
            "config t { backend servers { servers { server a { address: \"10.0.0.1\"\n port: 80\n id: 7 }\n server b { address: \"10.0.0.2\"\n port: 80\n id: 7 } } } }",
        )
        .unwrap_err();
        assert!(err.message.contains("duplicate server id 7"));
    }

    #[test]
    fn http_option_in_tcp_mode_is_fatal() {
        let err = validated(
            "config t { frontend web { bind *:80\n mode: tcp\n option: [\"httplog\", \"forwardfor\"] }\n backend servers { balance: roundrobin\n mode: tcp } }",
        )
        .unwrap_err();
        assert!(err
            .message
            .contains("HTTP option 'httplog' used in TCP mode"));
    }

    #[test]
    fn tcp_option_in_http_mode_is_fatal() {
        let err = validated(
            "config t { frontend web { bind *:80\n mode: http\n option: [\"tcplog\"] } }",
        )
        .unwrap_err();
        assert!(err.message.contains("TCP option 'tcplog' used in HTTP mode"));
    }

    #[test]
    fn invalid_health_check_method() {
        let err = validated(
            "config t { backend servers { balance: roundrobin\n health-check { method: \"INVALID\"\n uri: \"/health\"\n expect: status 200 }\n servers { server s { address: \"10.0.0.1\"\n port: 80 } } } }",
        )
        .unwrap_err();
        assert!(err
            .message
            .contains("invalid health check method 'INVALID'"));
    }

    #[test]
    fn out_of_range_expect_status() {
        let err = validated(
            "config t { backend servers { balance: roundrobin\n health-check { method: \"GET\"\n uri: \"/health\"\n expect: status 999 }\n servers { server s { address: \"10.0.0.1\"\n port: 80 } } } }",
        )
        .unwrap_err();
        assert!(err
            .message
            .contains("invalid health check expect status 999"));
    }

    #[test]
    fn weight_out_of_range() {
        let err = validated(
            "config t { backend servers { servers { server s { address: \"10.0.0.1\"\n port: 80\n weight: 300 } } } }",
        )
        .unwrap_err();
        assert!(err.message.contains("weight 300 out of range"));
    }

    #[test]
    fn hash_balance_factor_range() {
        let err = validated(
            "config t { backend servers { balance: uri\n hash-type: consistent\n hash-balance-factor: 50\n servers { server s { address: \"10.0.0.1\"\n port: 80 } } } }",
        )
        .unwrap_err();
        assert!(err.message.contains("hash-balance-factor 50 out of range"));
    }

    #[test]
    fn use_server_must_target_declared_server() {
        let err = validated(
            "config t { backend api { balance: roundrobin\n use-server s2 if is_special\n acl is_special { src \"10.0.1.0/24\" }\n servers { server s1 { address: \"10.0.0.1\"\n port: 80 } } } }",
        )
        .unwrap_err();
        assert!(err.message.contains("unknown server 's2'"));
    }

    #[test]
    fn advisory_warnings() {
        let warnings = validated(
            "config t { frontend web { default_backend: servers }\n backend servers { balance: roundrobin } }",
        )
        .unwrap();
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("no servers defined")));
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("no bind directives")));
    }

    #[test]
    fn duplicate_backend_names_are_fatal() {
        let err = validated(
            "config t { backend app { balance: roundrobin }\n backend app { balance: roundrobin } }",
        )
        .unwrap_err();
        assert!(err.message.contains("duplicate backend name 'app'"));
    }
}
