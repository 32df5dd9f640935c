//! Variable resolution: `env(...)` evaluation and `${expr}` substitution.
//!
//! Substitution runs to a fixed point bounded by a small iteration cap;
//! exceeding the cap means the variable graph is cyclic and resolution
//! fails. The process environment is read once, when the resolver starts.

use crate::error::{ParseError, SourceLocation};
use crate::ir::{ConfigIR, Value};
use crate::transform::visit::{visit_value, VisitStrings};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

/// Fixed-point iteration cap; beyond this the reference graph is
/// considered cyclic.
const MAX_PASSES: usize = 8;

static MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]*)\}").expect("interpolation marker regex"));

pub(crate) type VarTable = BTreeMap<String, Value>;

pub struct VariableResolver {
    ir: ConfigIR,
}

impl VariableResolver {
    pub fn new(ir: ConfigIR) -> Self {
        Self { ir }
    }

    pub fn resolve(mut self) -> Result<ConfigIR, ParseError> {
        self.resolve_env_calls()?;
        self.resolve_variable_table()?;

        let table = table_of(&self.ir);
        debug!(variables = table.len(), "resolving interpolation markers");

        for _ in 0..MAX_PASSES {
            let mut changed = false;
            self.ir.visit_strings(&mut |s, loc| {
                let (next, did_change) = substitute(s, &table, loc)?;
                if did_change {
                    *s = next;
                    changed = true;
                }
                Ok(())
            })?;
            if !changed {
                return Ok(self.ir);
            }
        }

        // Still rewriting after the cap: some marker keeps reappearing.
        let mut cyclic = None;
        self.ir.visit_strings(&mut |s, loc| {
            if cyclic.is_none() && s.contains("${") {
                cyclic = Some((s.clone(), loc.cloned()));
            }
            Ok(())
        })?;
        match cyclic {
            Some((text, loc)) => Err(located(
                format!("cannot resolve interpolation in '{text}': probable cyclic variable reference"),
                loc,
            )),
            None => Ok(self.ir),
        }
    }

    /// Step 1: read the process environment for every `env(...)` value.
    fn resolve_env_calls(&mut self) -> Result<(), ParseError> {
        for variable in self.ir.variables.values_mut() {
            let loc = variable.location.clone();
            resolve_env_value(&mut variable.value, loc.as_ref())?;
        }
        Ok(())
    }

    /// Step 2: resolve references between variables to a fixed point.
    fn resolve_variable_table(&mut self) -> Result<(), ParseError> {
        for _ in 0..MAX_PASSES {
            let snapshot = table_of(&self.ir);
            let mut changed = false;
            for variable in self.ir.variables.values_mut() {
                let loc = variable.location.clone();
                visit_value(&mut variable.value, loc.as_ref(), &mut |s, loc| {
                    let (next, did_change) = substitute(s, &snapshot, loc)?;
                    if did_change {
                        *s = next;
                        changed = true;
                    }
                    Ok(())
                })?;
            }
            if !changed {
                return Ok(());
            }
        }
        let offender = self
            .ir
            .variables
            .values()
            .find(|v| v.value.has_markers());
        match offender {
            Some(v) => Err(located(
                format!("cyclic variable reference involving '{}'", v.name),
                v.location.clone(),
            )),
            None => Ok(()),
        }
    }
}

fn table_of(ir: &ConfigIR) -> VarTable {
    ir.variables
        .iter()
        .map(|(name, var)| (name.clone(), var.value.clone()))
        .collect()
}

fn located(message: String, loc: Option<SourceLocation>) -> ParseError {
    ParseError {
        message,
        location: loc,
    }
}

fn resolve_env_value(value: &mut Value, loc: Option<&SourceLocation>) -> Result<(), ParseError> {
    match value {
        Value::Env { name, default } => {
            match std::env::var(&*name) {
                Ok(found) => *value = Value::Str(found),
                Err(_) => match default.take() {
                    Some(d) => *value = *d,
                    None => {
                        return Err(located(
                            format!("undefined environment variable '{name}'"),
                            loc.cloned(),
                        ));
                    }
                },
            }
            Ok(())
        }
        Value::List(items) => {
            for item in items {
                resolve_env_value(item, loc)?;
            }
            Ok(())
        }
        Value::Map(entries) => {
            for (_, item) in entries {
                resolve_env_value(item, loc)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Replace every `${expr}` in `text`. Returns the rewritten string and
/// whether anything changed.
pub(crate) fn substitute(
    text: &str,
    table: &VarTable,
    loc: Option<&SourceLocation>,
) -> Result<(String, bool), ParseError> {
    if !text.contains("${") {
        return Ok((text.to_string(), false));
    }
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut changed = false;
    for caps in MARKER.captures_iter(text) {
        let whole = caps.get(0).expect("whole match");
        let expr = caps.get(1).expect("expression group").as_str();
        out.push_str(&text[last..whole.start()]);
        out.push_str(&eval_expr(expr, table, loc)?);
        last = whole.end();
        changed = true;
    }
    out.push_str(&text[last..]);
    Ok((out, changed))
}

// ---------------------------------------------------------------------------
// Expression evaluation: identifiers, integer literals, + - * / %
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum ExprToken {
    Ident(String),
    Int(i64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
}

fn eval_expr(
    expr: &str,
    table: &VarTable,
    loc: Option<&SourceLocation>,
) -> Result<String, ParseError> {
    let expr = expr.trim();
    let tokens = tokenize_expr(expr, loc)?;

    // The common case: a bare variable reference. Strings pass through
    // without numeric coercion.
    if let [ExprToken::Ident(name)] = tokens.as_slice() {
        let value = table.get(name).ok_or_else(|| {
            located(format!("Undefined variable '{name}'"), loc.cloned())
        })?;
        return Ok(value.render());
    }

    let mut parser = ExprParser {
        tokens: &tokens,
        pos: 0,
        table,
        loc,
    };
    let value = parser.expr()?;
    if parser.pos != tokens.len() {
        return Err(located(
            format!("malformed interpolation expression '{expr}'"),
            loc.cloned(),
        ));
    }
    Ok(value.to_string())
}

fn tokenize_expr(
    expr: &str,
    loc: Option<&SourceLocation>,
) -> Result<Vec<ExprToken>, ParseError> {
    let mut tokens = Vec::new();
    let bytes = expr.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' => i += 1,
            b'+' => {
                tokens.push(ExprToken::Plus);
                i += 1;
            }
            b'-' => {
                tokens.push(ExprToken::Minus);
                i += 1;
            }
            b'*' => {
                tokens.push(ExprToken::Star);
                i += 1;
            }
            b'/' => {
                tokens.push(ExprToken::Slash);
                i += 1;
            }
            b'%' => {
                tokens.push(ExprToken::Percent);
                i += 1;
            }
            b'(' => {
                tokens.push(ExprToken::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(ExprToken::RParen);
                i += 1;
            }
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let literal = &expr[start..i];
                tokens.push(ExprToken::Int(literal.parse().map_err(|_| {
                    located(format!("invalid integer '{literal}'"), loc.cloned())
                })?));
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push(ExprToken::Ident(expr[start..i].to_string()));
            }
            other => {
                return Err(located(
                    format!(
                        "unexpected character '{}' in interpolation expression",
                        other as char
                    ),
                    loc.cloned(),
                ));
            }
        }
    }
    if tokens.is_empty() {
        return Err(located(
            "empty interpolation expression".to_string(),
            loc.cloned(),
        ));
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    tokens: &'a [ExprToken],
    pos: usize,
    table: &'a VarTable,
    loc: Option<&'a SourceLocation>,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&ExprToken> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&ExprToken> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expr(&mut self) -> Result<i64, ParseError> {
        let mut acc = self.term()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                ExprToken::Plus => {
                    self.bump();
                    acc += self.term()?;
                }
                ExprToken::Minus => {
                    self.bump();
                    acc -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<i64, ParseError> {
        let mut acc = self.factor()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                ExprToken::Star => {
                    self.bump();
                    acc *= self.factor()?;
                }
                ExprToken::Slash => {
                    self.bump();
                    let rhs = self.factor()?;
                    if rhs == 0 {
                        return Err(located(
                            "division by zero in interpolation expression".into(),
                            self.loc.cloned(),
                        ));
                    }
                    acc /= rhs;
                }
                ExprToken::Percent => {
                    self.bump();
                    let rhs = self.factor()?;
                    if rhs == 0 {
                        return Err(located(
                            "division by zero in interpolation expression".into(),
                            self.loc.cloned(),
                        ));
                    }
                    acc %= rhs;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<i64, ParseError> {
        match self.bump().cloned() {
            Some(ExprToken::Int(n)) => Ok(n),
            Some(ExprToken::Minus) => Ok(-self.factor()?),
            Some(ExprToken::Ident(name)) => {
                let value = self.table.get(&name).ok_or_else(|| {
                    located(format!("Undefined variable '{name}'"), self.loc.cloned())
                })?;
                value.as_i64().ok_or_else(|| {
                    located(
                        format!("variable '{name}' is not numeric"),
                        self.loc.cloned(),
                    )
                })
            }
            Some(ExprToken::LParen) => {
                let value = self.expr()?;
                match self.bump() {
                    Some(ExprToken::RParen) => Ok(value),
                    _ => Err(located(
                        "missing ')' in interpolation expression".into(),
                        self.loc.cloned(),
                    )),
                }
            }
            _ => Err(located(
                "malformed interpolation expression".into(),
                self.loc.cloned(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower;
    use crate::parser::parse_source;

    fn resolve_src(src: &str) -> Result<ConfigIR, ParseError> {
        let node = parse_source(src, "test.hap").unwrap();
        let ir = lower(node, &mut Vec::new()).unwrap();
        VariableResolver::new(ir).resolve()
    }

    #[test]
    fn substitutes_server_address() {
        let ir = resolve_src(
            "config t { let host = \"10.0.1.1\"\n backend b { servers { server s1 { address: \"${host}\"\n port: 8080 } } } }",
        )
        .unwrap();
        assert_eq!(
            ir.backends[0].back.servers[0].address.as_deref(),
            Some("10.0.1.1")
        );
    }

    #[test]
    fn substitutes_bind_address_fragments() {
        let ir = resolve_src(
            "config t { let listen_ip = \"0.0.0.0\"\n let listen_port = \"8080\"\n frontend web { bind ${listen_ip}:${listen_port} } }",
        )
        .unwrap();
        assert_eq!(ir.frontends[0].front.binds[0].address, "0.0.0.0:8080");
    }

    #[test]
    fn nested_variable_reference_resolves() {
        let ir = resolve_src(
            "config t { let port = 8080\n let addr = \"10.0.1.1:${port}\"\n backend b { servers { server s1 { address: \"${addr}\"\n port: 8080 } } } }",
        )
        .unwrap();
        assert_eq!(
            ir.backends[0].back.servers[0].address.as_deref(),
            Some("10.0.1.1:8080")
        );
    }

    #[test]
    fn boolean_and_number_render_as_text() {
        let ir = resolve_src(
            "config t { let flag = true\n let port = 8080\n backend b { servers { server s1 { address: \"10.0.1.1:${port}\"\n port: 8080\n verify: \"${flag}\" } } } }",
        )
        .unwrap();
        let server = &ir.backends[0].back.servers[0];
        assert_eq!(server.address.as_deref(), Some("10.0.1.1:8080"));
        assert_eq!(server.ssl_verify.as_deref(), Some("true"));
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let err = resolve_src(
            "config t { backend b { servers { server s1 { address: \"${missing}\"\n port: 80 } } } }",
        )
        .unwrap_err();
        assert!(err.message.contains("Undefined variable 'missing'"));
    }

    #[test]
    fn cyclic_reference_is_detected() {
        let err = resolve_src(
            "config t { let a = \"${b}\"\n let b = \"${a}\"\n backend x { servers { server s1 { address: \"${a}\"\n port: 80 } } } }",
        )
        .unwrap_err();
        assert!(err.message.contains("cyclic"));
    }

    #[test]
    fn arithmetic_in_markers() {
        let mut table = VarTable::new();
        table.insert("i".into(), Value::Int(2));
        let (out, changed) = substitute("10.0.1.${10 + i}", &table, None).unwrap();
        assert!(changed);
        assert_eq!(out, "10.0.1.12");
        let (out, _) = substitute("${i * 3}", &table, None).unwrap();
        assert_eq!(out, "6");
        let (out, _) = substitute("${(i + 1) % 2}", &table, None).unwrap();
        assert_eq!(out, "1");
    }

    #[test]
    fn env_call_with_default() {
        let ir = resolve_src(
            "config t { let host = env(\"GANTRY_TEST_UNSET_VAR\", \"default.example.com\")\n backend b { servers { server s1 { address: \"${host}\"\n port: 80 } } } }",
        )
        .unwrap();
        assert_eq!(
            ir.variables["host"].value,
            Value::Str("default.example.com".into())
        );
        assert_eq!(
            ir.backends[0].back.servers[0].address.as_deref(),
            Some("default.example.com")
        );
    }

    #[test]
    fn env_call_without_default_errors_when_unset() {
        let err = resolve_src(
            "config t { let host = env(\"GANTRY_TEST_DEFINITELY_UNSET\")\n backend b { } }",
        )
        .unwrap_err();
        assert!(err.message.contains("undefined environment variable"));
    }

    #[test]
    fn resolver_is_idempotent_on_marker_free_input() {
        let src = "config t { backend b { servers { server s1 { address: \"10.0.0.1\"\n port: 80 } } } }";
        let once = resolve_src(src).unwrap();
        let twice = VariableResolver::new(once.clone()).resolve().unwrap();
        assert_eq!(once, twice);
    }
}
