use crate::ast::*;
use crate::errors::ParseError;
use crate::lexer;
use crate::token::{Token, TokenKind};

/// Parse a `.act` source file into an untyped AST.
///
/// # Parameters
/// - `source`: UTF-8 specification text.
/// - `filename`: Logical filename used in diagnostics.
pub fn parse(source: &str, filename: &str) -> Result<RawAct, ParseError> {
    let tokens = lexer::lex(source, filename)?;
    Parser {
        tokens,
        pos: 0,
        source,
        filename,
    }
    .parse_act()
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a str,
    filename: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn expect_ident(&mut self) -> Result<Spanned<String>, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                let tok = self.advance();
                Ok(Spanned::new(name, tok.span))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let tok = self.peek();
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: tok.kind.describe(),
            span: tok.span.into(),
            src: miette::NamedSource::new(self.filename, self.source.to_owned()),
        }
    }

    fn syntax(&self, message: impl Into<String>, span: Span) -> ParseError {
        ParseError::syntax(message, span, self.source, self.filename)
    }

    // -----------------------------------------------------------------
    // Top level
    // -----------------------------------------------------------------

    fn parse_act(mut self) -> Result<RawAct, ParseError> {
        let mut behaviours = Vec::new();
        while !self.at(&TokenKind::Eof) {
            behaviours.push(self.parse_behaviour()?);
        }
        if behaviours.is_empty() {
            return Err(self.syntax("empty specification", self.peek().span));
        }
        Ok(RawAct { behaviours })
    }

    fn parse_behaviour(&mut self) -> Result<RawBehaviour, ParseError> {
        let start = self.expect(TokenKind::Behaviour)?.span;
        let name = self.expect_ident()?;
        self.expect(TokenKind::Of)?;
        let contract = self.expect_ident()?;
        let interface = self.parse_interface()?;
        let iffs = self.parse_iff_blocks()?;

        if self.at(&TokenKind::Creates) || interface.name.node == "constructor" {
            let creates = if self.at(&TokenKind::Creates) {
                self.parse_creates()?
            } else {
                Vec::new()
            };
            let mut ext_storage = Vec::new();
            if self.eat(&TokenKind::Storage) {
                while matches!(self.peek_kind(), TokenKind::Ident(_)) {
                    ext_storage.push(self.parse_storage_entry()?);
                }
                if ext_storage.is_empty() {
                    return Err(self.syntax("empty storage block", self.prev_span()));
                }
            }
            let ensures = self.parse_ensures()?;
            let invariants = if self.eat(&TokenKind::Invariants) {
                self.parse_expr_list()?
            } else {
                Vec::new()
            };
            let span = start.join(self.prev_span());
            Ok(RawBehaviour::Definition(Definition {
                name,
                contract,
                interface,
                iffs,
                creates,
                ext_storage,
                ensures,
                invariants,
                span,
            }))
        } else {
            let cases = self.parse_cases()?;
            let ensures = self.parse_ensures()?;
            if self.at(&TokenKind::Invariants) {
                return Err(self.syntax(
                    "invariants are only allowed on constructor definitions",
                    self.peek().span,
                ));
            }
            let span = start.join(self.prev_span());
            Ok(RawBehaviour::Transition(Transition {
                name,
                contract,
                interface,
                iffs,
                cases,
                ensures,
                span,
            }))
        }
    }

    fn prev_span(&self) -> Span {
        if self.pos == 0 {
            self.peek().span
        } else {
            self.tokens[self.pos - 1].span
        }
    }

    fn parse_interface(&mut self) -> Result<Interface, ParseError> {
        let start = self.expect(TokenKind::Interface)?.span;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let mut decls = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                let abi = self.parse_abi_type()?;
                let arg = self.expect_ident()?;
                decls.push(Decl { abi, name: arg });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(TokenKind::RParen)?.span;
        Ok(Interface {
            name,
            decls,
            span: start.join(end),
        })
    }

    fn parse_abi_type(&mut self) -> Result<AbiType, ParseError> {
        let abi = match self.peek_kind() {
            TokenKind::UIntType(n) => AbiType::UInt(*n),
            TokenKind::IntType(n) => AbiType::Int(*n),
            TokenKind::BytesType(n) => AbiType::Bytes(*n),
            TokenKind::Address => AbiType::Address,
            TokenKind::Bool => AbiType::Bool,
            TokenKind::StringType => AbiType::String,
            _ => return Err(self.unexpected("ABI type")),
        };
        self.advance();
        Ok(abi)
    }

    fn at_abi_type(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::UIntType(_)
                | TokenKind::IntType(_)
                | TokenKind::BytesType(_)
                | TokenKind::Address
                | TokenKind::Bool
                | TokenKind::StringType
        )
    }

    // -----------------------------------------------------------------
    // Blocks
    // -----------------------------------------------------------------

    fn parse_iff_blocks(&mut self) -> Result<Vec<IffBlock>, ParseError> {
        let mut blocks = Vec::new();
        loop {
            if self.at(&TokenKind::Iff) {
                let start = self.advance().span;
                let exprs = self.parse_expr_list()?;
                if exprs.is_empty() {
                    return Err(self.syntax("empty iff block", start));
                }
                let span = start.join(exprs.last().map(|e| e.span()).unwrap_or(start));
                blocks.push(IffBlock {
                    range: None,
                    exprs,
                    span,
                });
            } else if self.at(&TokenKind::IffInRange) {
                let start = self.advance().span;
                let abi = self.parse_abi_type()?;
                let exprs = self.parse_expr_list()?;
                if exprs.is_empty() {
                    return Err(self.syntax("empty iff in range block", start));
                }
                let span = start.join(exprs.last().map(|e| e.span()).unwrap_or(start));
                blocks.push(IffBlock {
                    range: Some(abi),
                    exprs,
                    span,
                });
            } else {
                return Ok(blocks);
            }
        }
    }

    fn parse_ensures(&mut self) -> Result<Vec<Expr>, ParseError> {
        if self.eat(&TokenKind::Ensures) {
            let exprs = self.parse_expr_list()?;
            if exprs.is_empty() {
                return Err(self.syntax("empty ensures block", self.prev_span()));
            }
            Ok(exprs)
        } else {
            Ok(Vec::new())
        }
    }

    fn parse_creates(&mut self) -> Result<Vec<Assign>, ParseError> {
        self.expect(TokenKind::Creates)?;
        let mut assigns = Vec::new();
        while self.at_abi_type() || self.at(&TokenKind::Mapping) {
            assigns.push(self.parse_assign()?);
        }
        if assigns.is_empty() {
            return Err(self.syntax("empty creates block", self.prev_span()));
        }
        Ok(assigns)
    }

    fn parse_assign(&mut self) -> Result<Assign, ParseError> {
        let start = self.peek().span;
        let slot = self.parse_slot_type()?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::Assign)?;
        let rhs = match self.peek_kind() {
            TokenKind::LBrack => {
                let mut pairs = Vec::new();
                self.advance();
                if !self.at(&TokenKind::RBrack) {
                    loop {
                        let key = self.parse_expr()?;
                        self.expect(TokenKind::Assign)?;
                        let val = self.parse_expr()?;
                        pairs.push((key, val));
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBrack)?;
                AssignRhs::MappingLit(pairs)
            }
            TokenKind::LBrace => {
                let mut fields = Vec::new();
                self.advance();
                if !self.at(&TokenKind::RBrace) {
                    loop {
                        let field = self.expect_ident()?;
                        self.expect(TokenKind::Assign)?;
                        let val = self.parse_expr()?;
                        fields.push((field, val));
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBrace)?;
                AssignRhs::StructLit(fields)
            }
            _ => AssignRhs::Expr(self.parse_expr()?),
        };
        let span = start.join(self.prev_span());
        Ok(Assign {
            slot,
            name,
            rhs,
            span,
        })
    }

    fn parse_slot_type(&mut self) -> Result<SlotType, ParseError> {
        if self.eat(&TokenKind::Mapping) {
            self.expect(TokenKind::LParen)?;
            let mut keys = vec![self.parse_abi_type()?];
            self.expect(TokenKind::Arrow)?;
            let value = loop {
                if self.eat(&TokenKind::Mapping) {
                    self.expect(TokenKind::LParen)?;
                    keys.push(self.parse_abi_type()?);
                    self.expect(TokenKind::Arrow)?;
                } else {
                    break self.parse_abi_type()?;
                }
            };
            for _ in 0..keys.len() {
                self.expect(TokenKind::RParen)?;
            }
            Ok(SlotType::Mapping { keys, value })
        } else {
            Ok(SlotType::Value(self.parse_abi_type()?))
        }
    }

    // -----------------------------------------------------------------
    // Cases and posts
    // -----------------------------------------------------------------

    fn parse_cases(&mut self) -> Result<Cases, ParseError> {
        if self.at(&TokenKind::Case) {
            Ok(Cases::Branches(self.parse_branches()?))
        } else {
            Ok(Cases::Direct(self.parse_post()?))
        }
    }

    fn parse_branches(&mut self) -> Result<Vec<Branch>, ParseError> {
        let mut branches = Vec::new();
        while self.at(&TokenKind::Case) {
            let start = self.advance().span;
            let guard = if self.at(&TokenKind::Underscore) {
                CaseGuard::Wildcard(self.advance().span)
            } else {
                CaseGuard::Cond(self.parse_expr()?)
            };
            self.expect(TokenKind::Colon)?;
            let body = if self.at(&TokenKind::Case) {
                CaseBody::Nested(self.parse_branches()?)
            } else {
                CaseBody::Leaf(self.parse_post()?)
            };
            let span = start.join(self.prev_span());
            branches.push(Branch { guard, body, span });
        }
        Ok(branches)
    }

    fn parse_post(&mut self) -> Result<Post, ParseError> {
        let start = self.peek().span;
        if self.eat(&TokenKind::Noop) {
            return Ok(Post {
                storage: Vec::new(),
                returns: None,
                span: start,
            });
        }
        let mut storage = Vec::new();
        if self.eat(&TokenKind::Storage) {
            while matches!(self.peek_kind(), TokenKind::Ident(_)) {
                storage.push(self.parse_storage_entry()?);
            }
            if storage.is_empty() {
                return Err(self.syntax("empty storage block", self.prev_span()));
            }
        }
        let returns = if self.eat(&TokenKind::Returns) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        if storage.is_empty() && returns.is_none() {
            return Err(self.unexpected("`storage`, `returns` or `noop`"));
        }
        let span = start.join(self.prev_span());
        Ok(Post {
            storage,
            returns,
            span,
        })
    }

    fn parse_storage_entry(&mut self) -> Result<StorageEntry, ParseError> {
        let entry = self.parse_entry()?;
        let rhs = if self.eat(&TokenKind::Arrow) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let span = entry.span.join(rhs.as_ref().map(|e| e.span()).unwrap_or(entry.span));
        Ok(StorageEntry { entry, rhs, span })
    }

    fn parse_entry(&mut self) -> Result<Entry, ParseError> {
        let name = self.expect_ident()?;
        let start = name.span;
        let mut indices = Vec::new();
        while self.at(&TokenKind::LBrack) {
            let open = self.advance().span;
            let first = self.parse_expr()?;
            if self.eat(&TokenKind::DotDot) {
                let hi = self.parse_expr()?;
                let close = self.expect(TokenKind::RBrack)?.span;
                indices.push(Index::Slice {
                    lo: first,
                    hi,
                    span: open.join(close),
                });
            } else {
                self.expect(TokenKind::RBrack)?;
                indices.push(Index::Key(first));
            }
        }
        let contract = if self.eat(&TokenKind::At) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        let span = start.join(self.prev_span());
        Ok(Entry {
            name,
            indices,
            contract,
            span,
        })
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn starts_expr(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Number(_)
                | TokenKind::StrLit(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Env(_)
                | TokenKind::Ident(_)
                | TokenKind::LParen
                | TokenKind::If
                | TokenKind::Not
        )
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = Vec::new();
        while self.starts_expr() {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let rhs = self.parse_and()?;
            let span = lhs.span().join(rhs.span());
            lhs = Expr::Or(span, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            let rhs = self.parse_not()?;
            let span = lhs.span().join(rhs.span());
            lhs = Expr::And(span, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.at(&TokenKind::Not) {
            let start = self.advance().span;
            let inner = self.parse_not()?;
            let span = start.join(inner.span());
            Ok(Expr::Not(span, Box::new(inner)))
        } else {
            self.parse_cmp()
        }
    }

    fn parse_cmp(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_cat()?;
        let op = match self.peek_kind() {
            TokenKind::EqEq => Expr::Eq,
            TokenKind::NEq => Expr::NEq,
            TokenKind::Lt => Expr::Lt,
            TokenKind::Gt => Expr::Gt,
            TokenKind::LEq => Expr::LEq,
            TokenKind::GEq => Expr::GEq,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_cat()?;
        let span = lhs.span().join(rhs.span());
        Ok(op(span, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_cat(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_add()?;
        while self.eat(&TokenKind::Cat) {
            let rhs = self.parse_add()?;
            let span = lhs.span().join(rhs.span());
            lhs = Expr::Cat(span, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => Expr::Add,
                TokenKind::Minus => Expr::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_mul()?;
            let span = lhs.span().join(rhs.span());
            lhs = op(span, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_mul(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_pow()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => Expr::Mul,
                TokenKind::Slash => Expr::Div,
                TokenKind::Percent => Expr::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_pow()?;
            let span = lhs.span().join(rhs.span());
            lhs = op(span, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_pow(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_atom()?;
        if self.eat(&TokenKind::Caret) {
            let rhs = self.parse_pow()?;
            let span = lhs.span().join(rhs.span());
            Ok(Expr::Pow(span, Box::new(lhs), Box::new(rhs)))
        } else {
            Ok(lhs)
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Number(n) => {
                let span = self.advance().span;
                Ok(Expr::IntLit(span, n))
            }
            TokenKind::StrLit(s) => {
                let span = self.advance().span;
                Ok(Expr::StrLit(span, s))
            }
            TokenKind::True => {
                let span = self.advance().span;
                Ok(Expr::BoolLit(span, true))
            }
            TokenKind::False => {
                let span = self.advance().span;
                Ok(Expr::BoolLit(span, false))
            }
            TokenKind::Env(e) => {
                let span = self.advance().span;
                Ok(Expr::Env(span, e))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::If => {
                let start = self.advance().span;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::Then)?;
                let then = self.parse_expr()?;
                self.expect(TokenKind::Else)?;
                let els = self.parse_expr()?;
                let span = start.join(els.span());
                Ok(Expr::Ite(span, Box::new(cond), Box::new(then), Box::new(els)))
            }
            TokenKind::Ident(name) => {
                // `pre(..)` / `post(..)` timing wrappers around an entry.
                if (name == "pre" || name == "post")
                    && self.tokens.get(self.pos + 1).map(|t| &t.kind) == Some(&TokenKind::LParen)
                {
                    let time = if name == "pre" {
                        EntryTime::Pre
                    } else {
                        EntryTime::Post
                    };
                    let start = self.advance().span;
                    self.expect(TokenKind::LParen)?;
                    let mut entry = self.parse_entry()?;
                    let close = self.expect(TokenKind::RParen)?.span;
                    entry.span = start.join(close);
                    return Ok(Expr::Entry(time, entry));
                }
                let entry = self.parse_entry()?;
                Ok(Expr::Entry(EntryTime::Untimed, entry))
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}
