//! Loop unrolling: replace deferred `for` bodies with their expansions.
//!
//! Each iteration binds the loop variable in a copy of the variable table
//! and re-runs interpolation over a clone of the body, so `${i}`-style
//! references resolve against the current binding. Expanded entities are
//! appended after the statically declared ones.

use crate::error::ParseError;
use crate::ir::{
    BackendFacet, ConfigIR, LoopIterable, ProxySettings, Rule, RuleList, Server, Value,
};
use crate::transform::variables::{substitute, VarTable};
use crate::transform::visit::VisitStrings;
use tracing::debug;

pub struct LoopUnroller {
    ir: ConfigIR,
}

impl LoopUnroller {
    pub fn new(ir: ConfigIR) -> Self {
        Self { ir }
    }

    pub fn unroll(mut self) -> Result<ConfigIR, ParseError> {
        let table: VarTable = self
            .ir
            .variables
            .iter()
            .map(|(name, var)| (name.clone(), var.value.clone()))
            .collect();

        for frontend in &mut self.ir.frontends {
            unroll_rule_loops(&mut frontend.settings, &table)?;
        }
        for backend in &mut self.ir.backends {
            unroll_rule_loops(&mut backend.settings, &table)?;
            unroll_server_loops(&mut backend.back, &table)?;
        }
        for listen in &mut self.ir.listens {
            unroll_rule_loops(&mut listen.settings, &table)?;
            unroll_server_loops(&mut listen.back, &table)?;
        }
        Ok(self.ir)
    }
}

fn iterations(iterable: &LoopIterable) -> Vec<Value> {
    match iterable {
        LoopIterable::Range(a, b) => {
            if a > b {
                Vec::new()
            } else {
                (*a..=*b).map(Value::Int).collect()
            }
        }
        LoopIterable::List(values) => values.clone(),
    }
}

fn unroll_server_loops(back: &mut BackendFacet, table: &VarTable) -> Result<(), ParseError> {
    if back.server_loops.is_empty() {
        return Ok(());
    }
    for lp in std::mem::take(&mut back.server_loops) {
        let bindings = iterations(&lp.iterable);
        debug!(var = %lp.var, count = bindings.len(), "unrolling server loop");
        for binding in bindings {
            let mut bound = table.clone();
            bound.insert(lp.var.clone(), binding.clone());
            for server in &lp.body {
                let mut clone: Server = server.clone();
                clone
                    .visit_strings(&mut |s, loc| {
                        let (next, changed) = substitute(s, &bound, loc)?;
                        if changed {
                            *s = next;
                        }
                        Ok(())
                    })
                    .map_err(|e| iteration_error(&lp.var, &binding, e))?;
                back.servers.push(clone);
            }
        }
    }
    Ok(())
}

fn unroll_rule_loops(settings: &mut ProxySettings, table: &VarTable) -> Result<(), ParseError> {
    if settings.rule_loops.is_empty() {
        return Ok(());
    }
    for lp in std::mem::take(&mut settings.rule_loops) {
        let bindings = iterations(&lp.iterable);
        debug!(var = %lp.var, count = bindings.len(), "unrolling rule loop");
        for binding in bindings {
            let mut bound = table.clone();
            bound.insert(lp.var.clone(), binding.clone());
            for rule in &lp.body {
                let mut clone: Rule = rule.clone();
                clone
                    .visit_strings(&mut |s, loc| {
                        let (next, changed) = substitute(s, &bound, loc)?;
                        if changed {
                            *s = next;
                        }
                        Ok(())
                    })
                    .map_err(|e| iteration_error(&lp.var, &binding, e))?;
                let target = match lp.list {
                    RuleList::HttpRequest => &mut settings.http_request_rules,
                    RuleList::HttpResponse => &mut settings.http_response_rules,
                    RuleList::HttpAfterResponse => &mut settings.http_after_response_rules,
                    RuleList::TcpRequest => &mut settings.tcp_request_rules,
                    RuleList::TcpResponse => &mut settings.tcp_response_rules,
                    // Check rules never defer loops today; route any
                    // stragglers to the request list rather than drop them.
                    RuleList::HttpCheck | RuleList::TcpCheck => {
                        &mut settings.http_request_rules
                    }
                };
                target.push(clone);
            }
        }
    }
    Ok(())
}

fn iteration_error(var: &str, binding: &Value, inner: ParseError) -> ParseError {
    ParseError {
        message: format!(
            "in loop over '{var}' (iteration {var}={}): {}",
            binding.render(),
            inner.message
        ),
        location: inner.location,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower;
    use crate::parser::parse_source;
    use crate::transform::{TemplateExpander, VariableResolver};

    fn unroll_src(src: &str) -> Result<ConfigIR, ParseError> {
        let node = parse_source(src, "test.hap").unwrap();
        let ir = lower(node, &mut Vec::new()).unwrap();
        let ir = VariableResolver::new(ir).resolve()?;
        LoopUnroller::new(ir).unroll()
    }

    #[test]
    fn basic_range_loop() {
        let ir = unroll_src(
            "config t { backend b { servers { for i in [1..3] { server \"web${i}\" { address: \"10.0.1.${i}\"\n port: 8080 } } } } }",
        )
        .unwrap();
        let servers = &ir.backends[0].back.servers;
        assert_eq!(servers.len(), 3);
        assert_eq!(servers[0].name, "web1");
        assert_eq!(servers[0].address.as_deref(), Some("10.0.1.1"));
        assert_eq!(servers[1].name, "web2");
        assert_eq!(servers[2].name, "web3");
        assert_eq!(servers[2].address.as_deref(), Some("10.0.1.3"));
        assert!(ir.backends[0].back.server_loops.is_empty());
    }

    #[test]
    fn range_is_inclusive() {
        let ir = unroll_src(
            "config t { backend b { servers { for i in [5..7] { server \"web${i}\" { address: \"10.0.1.${i}\"\n port: 8080 } } } } }",
        )
        .unwrap();
        let servers = &ir.backends[0].back.servers;
        assert_eq!(servers.len(), 3);
        assert_eq!(servers[0].name, "web5");
        assert_eq!(servers[2].name, "web7");
    }

    #[test]
    fn empty_range_expands_to_nothing() {
        let ir = unroll_src(
            "config t { backend b { servers { for i in [3..1] { server \"web${i}\" { address: \"x\"\n port: 80 } } } } }",
        )
        .unwrap();
        assert!(ir.backends[0].back.servers.is_empty());
    }

    #[test]
    fn arithmetic_with_loop_variable() {
        let ir = unroll_src(
            "config t { backend b { servers { for i in [1..3] { server \"web${i}\" { address: \"10.0.1.${10 + i}\"\n port: 8080 } } } } }",
        )
        .unwrap();
        let servers = &ir.backends[0].back.servers;
        assert_eq!(servers[0].address.as_deref(), Some("10.0.1.11"));
        assert_eq!(servers[1].address.as_deref(), Some("10.0.1.12"));
        assert_eq!(servers[2].address.as_deref(), Some("10.0.1.13"));
    }

    #[test]
    fn list_iterable() {
        let ir = unroll_src(
            "config t { backend b { servers { for region in [\"us-east\", \"us-west\"] { server \"${region}-srv\" { address: \"${region}.example.com\"\n port: 8080 } } } } }",
        )
        .unwrap();
        let servers = &ir.backends[0].back.servers;
        assert_eq!(servers[0].name, "us-east-srv");
        assert_eq!(servers[0].address.as_deref(), Some("us-east.example.com"));
        assert_eq!(servers[1].name, "us-west-srv");
    }

    #[test]
    fn loop_servers_append_after_static_ones() {
        let ir = unroll_src(
            "config t { backend b { servers { server static1 { address: \"10.0.0.1\"\n port: 8080 }\n for i in [1..2] { server \"web${i}\" { address: \"10.0.1.${i}\"\n port: 8080 } }\n server static2 { address: \"10.0.0.2\"\n port: 8080 } } } }",
        )
        .unwrap();
        let names: Vec<&str> = ir.backends[0]
            .back
            .servers
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["static1", "static2", "web1", "web2"]);
    }

    #[test]
    fn spreads_survive_unrolling_and_expand_afterwards() {
        let src = "config t { template defaults { check: true\n inter: 3s }\n backend b { servers { for i in [1..2] { server \"web${i}\" { address: \"10.0.1.${i}\"\n port: 8080\n @defaults } } } } }";
        let ir = unroll_src(src).unwrap();
        assert_eq!(ir.backends[0].back.servers[0].template_refs, vec!["defaults"]);
        let ir = TemplateExpander::new(ir).expand(&mut Vec::new());
        for server in &ir.backends[0].back.servers {
            assert_eq!(server.check, Some(true));
            assert_eq!(server.check_interval.as_deref(), Some("3s"));
        }
    }

    #[test]
    fn undefined_reference_in_loop_body_cites_iteration() {
        let err = unroll_src(
            "config t { backend b { servers { for i in [1..2] { server \"web${i}\" { address: \"${missing}\"\n port: 80 } } } } }",
        )
        .unwrap_err();
        assert!(err.message.contains("in loop over 'i'"));
        assert!(err.message.contains("Undefined variable 'missing'"));
    }
}
