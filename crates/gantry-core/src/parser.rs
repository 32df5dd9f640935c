//! Recursive-descent parser: source text → concrete syntax tree.
//!
//! The grammar is line-oriented: positional directives end at the newline,
//! while bracketed values (lists, mappings, blocks) may span lines freely.
//! Address-like tokens (`*:80`, `10.0.1.1:8080`) are glued back together
//! from adjacent fragments, so `key: value` (spaced colon) and `host:port`
//! (tight colon) never collide.

use crate::ast::{
    Arg, Block, ConfigNode, Directive, ForNode, Item, LetNode, RawBlock, ValueKind, ValueNode,
};
use crate::error::{ParseError, SourceLocation};
use crate::lexer::{Lexer, Token, TokenKind};
use std::collections::VecDeque;

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    buffer: VecDeque<Token>,
}

/// Parse a complete `config` unit from source text.
pub fn parse_source(source: &str, file: &str) -> Result<ConfigNode, ParseError> {
    if source.trim().is_empty() {
        return Err(ParseError::at(
            "empty configuration source",
            SourceLocation::new(file, 1, 1),
        ));
    }
    let mut parser = Parser::new(source, file);
    parser.parse_config()
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, file: &str) -> Self {
        Self {
            lexer: Lexer::new(source, file),
            buffer: VecDeque::new(),
        }
    }

    fn fill(&mut self, n: usize) -> Result<(), ParseError> {
        while self.buffer.len() < n {
            let tok = self.lexer.next_token()?;
            self.buffer.push_back(tok);
        }
        Ok(())
    }

    fn peek(&mut self) -> Result<&Token, ParseError> {
        self.fill(1)?;
        Ok(&self.buffer[0])
    }

    fn peek2(&mut self) -> Result<&Token, ParseError> {
        self.fill(2)?;
        Ok(&self.buffer[1])
    }

    fn peek3(&mut self) -> Result<&Token, ParseError> {
        self.fill(3)?;
        Ok(&self.buffer[2])
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        self.fill(1)?;
        Ok(self.buffer.pop_front().expect("buffer filled"))
    }

    fn loc(&self, tok: &Token) -> SourceLocation {
        tok.location(self.lexer.file())
    }

    fn skip_newlines(&mut self) -> Result<(), ParseError> {
        while self.peek()?.kind == TokenKind::Newline {
            self.next()?;
        }
        Ok(())
    }

    fn expect_lbrace(&mut self, what: &str) -> Result<Token, ParseError> {
        self.skip_newlines()?;
        let tok = self.next()?;
        if tok.kind != TokenKind::LBrace {
            return Err(ParseError::at(
                format!("expected '{{' to open {what}, found {}", tok.kind.describe()),
                self.loc(&tok),
            ));
        }
        Ok(tok)
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Token), ParseError> {
        let tok = self.next()?;
        match &tok.kind {
            TokenKind::Ident(s) => Ok((s.clone(), tok.clone())),
            TokenKind::Str(s) => Ok((s.clone(), tok.clone())),
            other => Err(ParseError::at(
                format!("expected {what}, found {}", other.describe()),
                self.loc(&tok),
            )),
        }
    }

    pub fn parse_config(&mut self) -> Result<ConfigNode, ParseError> {
        self.skip_newlines()?;
        let kw = self.next()?;
        match &kw.kind {
            TokenKind::Ident(s) if s == "config" => {}
            other => {
                return Err(ParseError::at(
                    format!("expected 'config' keyword, found {}", other.describe()),
                    self.loc(&kw),
                ));
            }
        }
        let (name, _) = self.expect_ident("configuration name")?;
        self.expect_lbrace("config block")?;
        let items = self.parse_items(false)?;
        self.skip_newlines()?;
        let end = self.next()?;
        if end.kind != TokenKind::Eof {
            return Err(ParseError::at(
                format!(
                    "unexpected {} after end of config block",
                    end.kind.describe()
                ),
                self.loc(&end),
            ));
        }
        Ok(ConfigNode {
            name,
            items,
            location: self.loc(&kw),
        })
    }

    /// Parse items until the closing `}` of the current block. The closing
    /// brace is consumed. `lua_body` switches `inline NAME { ... }` into
    /// raw-capture mode.
    fn parse_items(&mut self, lua_body: bool) -> Result<Vec<Item>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines()?;
            let tok = self.peek()?.clone();
            match &tok.kind {
                TokenKind::RBrace => {
                    self.next()?;
                    return Ok(items);
                }
                TokenKind::Eof => {
                    return Err(ParseError::at(
                        "unexpected end of input: unbalanced braces",
                        self.loc(&tok),
                    ));
                }
                TokenKind::Spread(name) => {
                    let name = name.clone();
                    self.next()?;
                    items.push(Item::Spread {
                        name,
                        location: self.loc(&tok),
                    });
                }
                TokenKind::Ident(word) => {
                    let word = word.clone();
                    match word.as_str() {
                        "for" => items.push(self.parse_for()?),
                        "let" => items.push(self.parse_let()?),
                        "import" => {
                            self.next()?;
                            let path_tok = self.next()?;
                            let path = match &path_tok.kind {
                                TokenKind::Str(s) => s.clone(),
                                other => {
                                    return Err(ParseError::at(
                                        format!(
                                            "expected quoted path after 'import', found {}",
                                            other.describe()
                                        ),
                                        self.loc(&path_tok),
                                    ));
                                }
                            };
                            items.push(Item::Import {
                                path,
                                location: self.loc(&tok),
                            });
                        }
                        "inline" if lua_body => {
                            items.push(self.parse_inline_raw()?);
                        }
                        _ => items.push(self.parse_directive_or_block(word, tok)?),
                    }
                }
                other => {
                    return Err(ParseError::at(
                        format!("unexpected {} at start of directive", other.describe()),
                        self.loc(&tok),
                    ));
                }
            }
        }
    }

    fn parse_inline_raw(&mut self) -> Result<Item, ParseError> {
        let kw = self.next()?; // 'inline'
        let (name, _) = self.expect_ident("script name after 'inline'")?;
        let brace = self.next()?;
        if brace.kind != TokenKind::LBrace {
            return Err(ParseError::at(
                format!(
                    "expected '{{' to open inline script body, found {}",
                    brace.kind.describe()
                ),
                self.loc(&brace),
            ));
        }
        debug_assert!(self.buffer.is_empty(), "raw capture requires empty lookahead");
        let raw = self.lexer.capture_raw_block()?;
        Ok(Item::RawBlock(RawBlock {
            key: "inline".into(),
            name,
            raw,
            location: self.loc(&kw),
        }))
    }

    fn parse_for(&mut self) -> Result<Item, ParseError> {
        let kw = self.next()?; // 'for'
        let (var, _) = self.expect_ident("loop variable")?;
        let (in_kw, in_tok) = self.expect_ident("'in' keyword")?;
        if in_kw != "in" {
            return Err(ParseError::at(
                format!("expected 'in' after loop variable, found '{in_kw}'"),
                self.loc(&in_tok),
            ));
        }
        let iterable = self.parse_value()?;
        self.expect_lbrace("loop body")?;
        let body = self.parse_items(false)?;
        Ok(Item::For(ForNode {
            var,
            iterable,
            body,
            location: self.loc(&kw),
        }))
    }

    fn parse_let(&mut self) -> Result<Item, ParseError> {
        let kw = self.next()?; // 'let'
        let (name, _) = self.expect_ident("variable name")?;
        let eq = self.next()?;
        if eq.kind != TokenKind::Equals {
            return Err(ParseError::at(
                format!(
                    "expected '=' after variable name, found {}",
                    eq.kind.describe()
                ),
                self.loc(&eq),
            ));
        }
        let value = self.parse_value()?;
        Ok(Item::Let(LetNode {
            name,
            value,
            location: self.loc(&kw),
        }))
    }

    /// `key` has been peeked but not consumed. Decide between the colon
    /// directive, positional directive, and block forms.
    fn parse_directive_or_block(&mut self, key: String, key_tok: Token) -> Result<Item, ParseError> {
        self.next()?; // key
        let location = self.loc(&key_tok);

        if self.peek()?.kind == TokenKind::Colon {
            self.next()?; // ':'
            let args = self.parse_colon_values()?;
            if self.peek()?.kind == TokenKind::LBrace && args.is_empty() {
                // `key: {` — mapping value on its own supported via parse_value
                let value = self.parse_value()?;
                return Ok(Item::Directive(Directive {
                    key,
                    args: vec![Arg::Positional(value)],
                    location,
                }));
            }
            return Ok(Item::Directive(Directive { key, args, location }));
        }

        let args = self.parse_args_until_line_end()?;

        if self.peek()?.kind == TokenKind::LBrace {
            self.next()?; // '{'
            let body = self.parse_items(key == "lua")?;
            return Ok(Item::Block(Block {
                key,
                args,
                body,
                location,
            }));
        }

        Ok(Item::Directive(Directive { key, args, location }))
    }

    /// Read directive arguments until newline, `{`, `}` or EOF.
    fn parse_args_until_line_end(&mut self) -> Result<Vec<Arg>, ParseError> {
        let mut args = Vec::new();
        loop {
            match self.peek()?.kind {
                TokenKind::Newline | TokenKind::RBrace | TokenKind::LBrace | TokenKind::Eof => {
                    return Ok(args);
                }
                TokenKind::Comma => {
                    self.next()?;
                }
                _ => args.push(self.parse_arg()?),
            }
        }
    }

    /// Read the values of a `key: ...` directive. Unlike positional
    /// directives, a following `name:` pair on the same line starts a new
    /// directive (`{ address: "x" port: 8080 }` on one line), so an
    /// identifier followed by a spaced colon acts as a boundary. Tight
    /// `host:port` tokens are still consumed as glued values.
    fn parse_colon_values(&mut self) -> Result<Vec<Arg>, ParseError> {
        let mut args = Vec::new();
        loop {
            match self.peek()?.kind {
                TokenKind::Newline | TokenKind::RBrace | TokenKind::LBrace | TokenKind::Eof => {
                    return Ok(args);
                }
                TokenKind::Comma => {
                    self.next()?;
                }
                TokenKind::Ident(_) => {
                    let first = self.peek()?.clone();
                    let second = self.peek2()?.clone();
                    if second.kind == TokenKind::Colon {
                        let third = self.peek3()?.clone();
                        let glued = second.start == first.end
                            && third.start == second.end
                            && matches!(
                                third.kind,
                                TokenKind::Ident(_) | TokenKind::Int(_) | TokenKind::Duration(_)
                            );
                        if !glued {
                            return Ok(args);
                        }
                    }
                    args.push(self.parse_arg()?);
                }
                _ => args.push(self.parse_arg()?),
            }
        }
    }

    fn parse_arg(&mut self) -> Result<Arg, ParseError> {
        let tok = self.peek()?.clone();
        if let TokenKind::Ident(_) = &tok.kind {
            // Named argument: ident followed by a colon with a spaced value.
            let glued = self.read_glued_word()?;
            if self.peek()?.kind == TokenKind::Colon {
                self.next()?; // ':'
                let value = self.parse_value()?;
                return Ok(Arg::Named(glued.0, value));
            }
            // `name(...)` call form.
            if self.peek()?.kind == TokenKind::LParen {
                self.next()?; // '('
                let arg = if self.peek()?.kind == TokenKind::RParen {
                    None
                } else {
                    Some(Box::new(self.parse_value()?))
                };
                let close = self.next()?;
                if close.kind != TokenKind::RParen {
                    return Err(ParseError::at(
                        format!("expected ')', found {}", close.kind.describe()),
                        self.loc(&close),
                    ));
                }
                return Ok(Arg::Positional(ValueNode {
                    kind: ValueKind::Call {
                        name: glued.0,
                        arg,
                    },
                    location: glued.1,
                }));
            }
            let kind = match glued.0.as_str() {
                "true" => ValueKind::Bool(true),
                "false" => ValueKind::Bool(false),
                _ => ValueKind::Ident(glued.0),
            };
            return Ok(Arg::Positional(ValueNode {
                kind,
                location: glued.1,
            }));
        }
        Ok(Arg::Positional(self.parse_value()?))
    }

    /// Read an ident token, gluing tight `:`-joined fragments back into a
    /// single word (`*:80`, `10.0.1.1:8080`). A colon is only glued when
    /// both sides touch it, so `port: 8080` stays a named argument.
    fn read_glued_word(&mut self) -> Result<(String, SourceLocation), ParseError> {
        let tok = self.next()?;
        let location = self.loc(&tok);
        let mut word = match &tok.kind {
            TokenKind::Ident(s) => s.clone(),
            other => {
                return Err(ParseError::at(
                    format!("expected identifier, found {}", other.describe()),
                    location,
                ));
            }
        };
        let mut end = tok.end;
        loop {
            let colon = self.peek()?.clone();
            if colon.kind != TokenKind::Colon || colon.start != end {
                break;
            }
            let after = self.peek2()?.clone();
            let fragment = match &after.kind {
                TokenKind::Ident(s) if after.start == colon.end => s.clone(),
                TokenKind::Int(n) if after.start == colon.end => n.to_string(),
                TokenKind::Duration(s) if after.start == colon.end => s.clone(),
                _ => break,
            };
            self.next()?; // ':'
            self.next()?; // fragment
            word.push(':');
            word.push_str(&fragment);
            end = after.end;
        }
        Ok((word, location))
    }

    fn parse_value(&mut self) -> Result<ValueNode, ParseError> {
        self.skip_newlines()?;
        let tok = self.peek()?.clone();
        let location = self.loc(&tok);
        match &tok.kind {
            TokenKind::LBracket => {
                self.next()?;
                let mut items = Vec::new();
                loop {
                    self.skip_newlines()?;
                    match self.peek()?.kind {
                        TokenKind::RBracket => {
                            self.next()?;
                            break;
                        }
                        TokenKind::Comma => {
                            self.next()?;
                        }
                        TokenKind::Eof => {
                            return Err(ParseError::at("unterminated list", location));
                        }
                        _ => items.push(self.parse_value()?),
                    }
                }
                Ok(ValueNode {
                    kind: ValueKind::List(items),
                    location,
                })
            }
            TokenKind::LBrace => {
                self.next()?;
                let mut entries = Vec::new();
                loop {
                    self.skip_newlines()?;
                    let key_tok = self.next()?;
                    let key = match &key_tok.kind {
                        TokenKind::RBrace => break,
                        TokenKind::Comma => continue,
                        TokenKind::Ident(s) => s.clone(),
                        TokenKind::Str(s) => s.clone(),
                        TokenKind::Int(n) => n.to_string(),
                        other => {
                            return Err(ParseError::at(
                                format!("expected mapping key, found {}", other.describe()),
                                self.loc(&key_tok),
                            ));
                        }
                    };
                    let colon = self.next()?;
                    if colon.kind != TokenKind::Colon {
                        return Err(ParseError::at(
                            format!(
                                "expected ':' after mapping key '{key}', found {}",
                                colon.kind.describe()
                            ),
                            self.loc(&colon),
                        ));
                    }
                    let value = self.parse_value()?;
                    entries.push((key, value));
                }
                Ok(ValueNode {
                    kind: ValueKind::Map(entries),
                    location,
                })
            }
            TokenKind::Str(s) => {
                let s = s.clone();
                self.next()?;
                Ok(ValueNode {
                    kind: ValueKind::Str(s),
                    location,
                })
            }
            TokenKind::Int(n) => {
                let n = *n;
                self.next()?;
                Ok(ValueNode {
                    kind: ValueKind::Int(n),
                    location,
                })
            }
            TokenKind::Float(f) => {
                let f = *f;
                self.next()?;
                Ok(ValueNode {
                    kind: ValueKind::Float(f),
                    location,
                })
            }
            TokenKind::Duration(d) => {
                let d = d.clone();
                self.next()?;
                Ok(ValueNode {
                    kind: ValueKind::Duration(d),
                    location,
                })
            }
            TokenKind::Range(a, b) => {
                let (a, b) = (*a, *b);
                self.next()?;
                Ok(ValueNode {
                    kind: ValueKind::Range(a, b),
                    location,
                })
            }
            TokenKind::Spread(name) => {
                let name = name.clone();
                self.next()?;
                Ok(ValueNode {
                    kind: ValueKind::TemplateRef(name),
                    location,
                })
            }
            TokenKind::Ident(word) if word == "env" => {
                self.next()?;
                if self.peek()?.kind != TokenKind::LParen {
                    return Ok(ValueNode {
                        kind: ValueKind::Ident("env".into()),
                        location,
                    });
                }
                self.next()?; // '('
                let name_tok = self.next()?;
                let name = match &name_tok.kind {
                    TokenKind::Str(s) => s.clone(),
                    TokenKind::Ident(s) => s.clone(),
                    other => {
                        return Err(ParseError::at(
                            format!(
                                "expected environment variable name, found {}",
                                other.describe()
                            ),
                            self.loc(&name_tok),
                        ));
                    }
                };
                let default = if self.peek()?.kind == TokenKind::Comma {
                    self.next()?;
                    Some(Box::new(self.parse_value()?))
                } else {
                    None
                };
                let close = self.next()?;
                if close.kind != TokenKind::RParen {
                    return Err(ParseError::at(
                        format!("expected ')' to close env(), found {}", close.kind.describe()),
                        self.loc(&close),
                    ));
                }
                Ok(ValueNode {
                    kind: ValueKind::EnvCall {
                        name,
                        default,
                    },
                    location,
                })
            }
            TokenKind::Ident(_) => {
                let (word, location) = self.read_glued_word()?;
                let kind = match word.as_str() {
                    "true" => ValueKind::Bool(true),
                    "false" => ValueKind::Bool(false),
                    _ => ValueKind::Ident(word),
                };
                Ok(ValueNode { kind, location })
            }
            other => Err(ParseError::at(
                format!("expected value, found {}", other.describe()),
                location,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ConfigNode {
        parse_source(src, "test.hap").expect("parse failed")
    }

    fn parse_err(src: &str) -> ParseError {
        parse_source(src, "test.hap").expect_err("expected parse error")
    }

    #[test]
    fn minimal_config() {
        let node = parse("config minimal { global { maxconn: 1000 } }");
        assert_eq!(node.name, "minimal");
        assert_eq!(node.items.len(), 1);
        match &node.items[0] {
            Item::Block(b) => {
                assert_eq!(b.key, "global");
                assert_eq!(b.body.len(), 1);
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn empty_source_is_an_error() {
        let err = parse_err("   \n  ");
        assert!(err.message.contains("empty"));
    }

    #[test]
    fn unbalanced_braces_report_error() {
        let err = parse_err("config t { global { maxconn: 1 }");
        assert!(err.message.contains("unbalanced"));
    }

    #[test]
    fn bind_address_glues() {
        let node = parse("config t { frontend web { bind *:80 } }");
        let frontend = match &node.items[0] {
            Item::Block(b) => b,
            _ => panic!(),
        };
        match &frontend.body[0] {
            Item::Directive(d) => {
                assert_eq!(d.key, "bind");
                assert_eq!(d.args.len(), 1);
                match &d.args[0] {
                    Arg::Positional(v) => assert_eq!(v.as_text(), "*:80"),
                    _ => panic!("expected positional"),
                }
            }
            other => panic!("expected directive, got {other:?}"),
        }
    }

    #[test]
    fn named_args_in_inline_server() {
        let node =
            parse("config t { backend b { servers { server s1 address: \"10.0.1.1\" port: 8080 } } }");
        let backend = match &node.items[0] {
            Item::Block(b) => b,
            _ => panic!(),
        };
        let servers = match &backend.body[0] {
            Item::Block(b) => b,
            _ => panic!(),
        };
        let server = match &servers.body[0] {
            Item::Directive(d) => d,
            other => panic!("expected directive, got {other:?}"),
        };
        assert_eq!(server.key, "server");
        assert!(matches!(&server.args[0], Arg::Positional(v) if v.as_text() == "s1"));
        assert!(matches!(&server.args[1], Arg::Named(k, _) if k == "address"));
        assert!(matches!(&server.args[2], Arg::Named(k, _) if k == "port"));
    }

    #[test]
    fn let_binding_with_env_default() {
        let node = parse("config t { let port = env(\"PORT\", 8080) }");
        match &node.items[0] {
            Item::Let(l) => {
                assert_eq!(l.name, "port");
                match &l.value.kind {
                    ValueKind::EnvCall { name, default } => {
                        assert_eq!(name, "PORT");
                        assert!(default.is_some());
                    }
                    other => panic!("expected env call, got {other:?}"),
                }
            }
            other => panic!("expected let, got {other:?}"),
        }
    }

    #[test]
    fn for_loop_over_bracketed_range() {
        let node = parse(
            "config t { backend b { servers { for i in [1..3] { server \"web${i}\" { port: 8080 } } } } }",
        );
        let backend = match &node.items[0] {
            Item::Block(b) => b,
            _ => panic!(),
        };
        let servers = match &backend.body[0] {
            Item::Block(b) => b,
            _ => panic!(),
        };
        match &servers.body[0] {
            Item::For(f) => {
                assert_eq!(f.var, "i");
                match &f.iterable.kind {
                    ValueKind::List(items) => {
                        assert_eq!(items.len(), 1);
                        assert!(matches!(items[0].kind, ValueKind::Range(1, 3)));
                    }
                    other => panic!("expected list iterable, got {other:?}"),
                }
                assert_eq!(f.body.len(), 1);
            }
            other => panic!("expected for, got {other:?}"),
        }
    }

    #[test]
    fn spread_value_in_acl_directive() {
        let node = parse("config t { frontend f { acl is_api @api_tpl } }");
        let frontend = match &node.items[0] {
            Item::Block(b) => b,
            _ => panic!(),
        };
        match &frontend.body[0] {
            Item::Directive(d) => {
                assert_eq!(d.key, "acl");
                assert!(matches!(
                    &d.args[1],
                    Arg::Positional(v) if matches!(&v.kind, ValueKind::TemplateRef(n) if n == "api_tpl")
                ));
            }
            other => panic!("expected directive, got {other:?}"),
        }
    }

    #[test]
    fn lua_inline_captures_raw_body() {
        let node = parse(
            "config t { lua { inline hello { core.log(core.info, \"Hello, World!\") } } }",
        );
        let lua = match &node.items[0] {
            Item::Block(b) => b,
            _ => panic!(),
        };
        match &lua.body[0] {
            Item::RawBlock(raw) => {
                assert_eq!(raw.name, "hello");
                assert!(raw.raw.contains("core.log"));
            }
            other => panic!("expected raw block, got {other:?}"),
        }
    }

    #[test]
    fn call_value_for_persist_cookie() {
        let node = parse("config t { defaults { persist rdp-cookie(\"custom_rdp\") } }");
        let defaults = match &node.items[0] {
            Item::Block(b) => b,
            _ => panic!(),
        };
        match &defaults.body[0] {
            Item::Directive(d) => {
                assert_eq!(d.key, "persist");
                match &d.args[0] {
                    Arg::Positional(v) => match &v.kind {
                        ValueKind::Call { name, arg } => {
                            assert_eq!(name, "rdp-cookie");
                            assert_eq!(arg.as_ref().unwrap().as_text(), "custom_rdp");
                        }
                        other => panic!("expected call, got {other:?}"),
                    },
                    _ => panic!(),
                }
            }
            other => panic!("expected directive, got {other:?}"),
        }
    }

    #[test]
    fn timeout_mapping_value() {
        let node = parse("config t { defaults { timeout: { connect: 5s\n client: 50s } } }");
        let defaults = match &node.items[0] {
            Item::Block(b) => b,
            _ => panic!(),
        };
        match &defaults.body[0] {
            Item::Directive(d) => {
                assert_eq!(d.key, "timeout");
                match &d.args[0] {
                    Arg::Positional(v) => match &v.kind {
                        ValueKind::Map(entries) => {
                            assert_eq!(entries.len(), 2);
                            assert_eq!(entries[0].0, "connect");
                        }
                        other => panic!("expected map, got {other:?}"),
                    },
                    _ => panic!(),
                }
            }
            other => panic!("expected directive, got {other:?}"),
        }
    }

    #[test]
    fn single_line_block_body_splits_directives() {
        let node =
            parse("config t { backend b { servers { server s1 { address: \"10.0.1.1\" port: 8080 } } } }");
        let backend = match &node.items[0] {
            Item::Block(b) => b,
            _ => panic!(),
        };
        let servers = match &backend.body[0] {
            Item::Block(b) => b,
            _ => panic!(),
        };
        let server = match &servers.body[0] {
            Item::Block(b) => b,
            other => panic!("expected block, got {other:?}"),
        };
        assert_eq!(server.body.len(), 2, "address and port must be separate");
    }

    #[test]
    fn import_statement() {
        let node = parse("config t { import \"common/defaults.hcl\" }");
        assert!(matches!(
            &node.items[0],
            Item::Import { path, .. } if path == "common/defaults.hcl"
        ));
    }

    #[test]
    fn missing_identifier_is_an_error() {
        let err = parse_err("config { }");
        assert!(err.message.contains("configuration name"));
    }
}
