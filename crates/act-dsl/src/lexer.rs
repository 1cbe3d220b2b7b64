use logos::Logos;
use num::BigInt;

use crate::ast::{EthEnv, LineIndex, Span};
use crate::errors::ParseError;
use crate::token::{Token, TokenKind};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
enum RawToken {
    #[token("behaviour")]
    #[token("behavior")]
    Behaviour,
    #[token("of")]
    Of,
    #[token("interface")]
    Interface,
    #[token("creates")]
    Creates,
    #[token("case")]
    Case,
    #[token("returns")]
    Returns,
    #[token("storage")]
    Storage,
    #[regex(r"iff[ \t\r\n]+in[ \t\r\n]+range")]
    IffInRange,
    #[token("iff")]
    Iff,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("mapping")]
    Mapping,
    #[token("ensures")]
    Ensures,
    #[token("invariants")]
    Invariants,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("at")]
    At,
    #[token("noop")]
    Noop,

    #[token("uint", |_| 256u16)]
    #[regex(r"uint[0-9]+", |lex| lex.slice()[4..].parse::<u16>().ok())]
    UIntType(u16),
    #[token("int", |_| 256u16)]
    #[regex(r"int[0-9]+", |lex| lex.slice()[3..].parse::<u16>().ok())]
    IntType(u16),
    #[regex(r"bytes[0-9]+", |lex| lex.slice()[5..].parse::<u16>().ok())]
    BytesType(u16),
    #[token("address")]
    Address,
    #[token("bool")]
    Bool,
    #[token("string")]
    StringType,

    #[token("CALLER", |_| EthEnv::Caller)]
    #[token("CALLVALUE", |_| EthEnv::Callvalue)]
    #[token("CALLDEPTH", |_| EthEnv::Calldepth)]
    #[token("ORIGIN", |_| EthEnv::Origin)]
    #[token("BLOCKHASH", |_| EthEnv::Blockhash)]
    #[token("BLOCKNUMBER", |_| EthEnv::Blocknumber)]
    #[token("DIFFICULTY", |_| EthEnv::Difficulty)]
    #[token("CHAINID", |_| EthEnv::Chainid)]
    #[token("GASLIMIT", |_| EthEnv::Gaslimit)]
    #[token("COINBASE", |_| EthEnv::Coinbase)]
    #[token("TIMESTAMP", |_| EthEnv::Timestamp)]
    #[token("THIS", |_| EthEnv::This)]
    #[token("NONCE", |_| EthEnv::Nonce)]
    Env(EthEnv),

    #[token(":=")]
    Assign,
    #[token("=>")]
    Arrow,
    #[token("==")]
    EqEq,
    #[token("=/=")]
    NEq,
    #[token(">=")]
    GEq,
    #[token("<=")]
    LEq,
    #[token("++")]
    Cat,
    #[token("..")]
    DotDot,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBrack,
    #[token("]")]
    RBrack,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("_", priority = 10)]
    Underscore,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<BigInt>().ok())]
    Number(Option<BigInt>),
    #[regex(r#""[^"\n]*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    StrLit(String),
}

fn abi_width_ok(bits: u16) -> bool {
    bits >= 8 && bits <= 256 && bits % 8 == 0
}

fn bytes_width_ok(n: u16) -> bool {
    n >= 1 && n <= 32
}

/// Tokenise a source file into a position-tagged token stream ending with
/// an `Eof` token. Comments and whitespace are discarded.
pub fn lex(source: &str, filename: &str) -> Result<Vec<Token>, ParseError> {
    let index = LineIndex::new(source);
    let mut tokens = Vec::new();
    let mut raw = RawToken::lexer(source);

    while let Some(next) = raw.next() {
        let span = Span::new(raw.span().start, raw.span().end);
        let (line, col) = index.line_col(span.start);
        let kind = match next {
            Ok(RawToken::Behaviour) => TokenKind::Behaviour,
            Ok(RawToken::Of) => TokenKind::Of,
            Ok(RawToken::Interface) => TokenKind::Interface,
            Ok(RawToken::Creates) => TokenKind::Creates,
            Ok(RawToken::Case) => TokenKind::Case,
            Ok(RawToken::Returns) => TokenKind::Returns,
            Ok(RawToken::Storage) => TokenKind::Storage,
            Ok(RawToken::IffInRange) => TokenKind::IffInRange,
            Ok(RawToken::Iff) => TokenKind::Iff,
            Ok(RawToken::And) => TokenKind::And,
            Ok(RawToken::Or) => TokenKind::Or,
            Ok(RawToken::Not) => TokenKind::Not,
            Ok(RawToken::True) => TokenKind::True,
            Ok(RawToken::False) => TokenKind::False,
            Ok(RawToken::Mapping) => TokenKind::Mapping,
            Ok(RawToken::Ensures) => TokenKind::Ensures,
            Ok(RawToken::Invariants) => TokenKind::Invariants,
            Ok(RawToken::If) => TokenKind::If,
            Ok(RawToken::Then) => TokenKind::Then,
            Ok(RawToken::Else) => TokenKind::Else,
            Ok(RawToken::At) => TokenKind::At,
            Ok(RawToken::Noop) => TokenKind::Noop,

            Ok(RawToken::UIntType(bits)) => {
                if !abi_width_ok(bits) {
                    return Err(ParseError::lex(
                        format!("invalid integer width `uint{bits}`"),
                        span,
                        source,
                        filename,
                    ));
                }
                TokenKind::UIntType(bits)
            }
            Ok(RawToken::IntType(bits)) => {
                if !abi_width_ok(bits) {
                    return Err(ParseError::lex(
                        format!("invalid integer width `int{bits}`"),
                        span,
                        source,
                        filename,
                    ));
                }
                TokenKind::IntType(bits)
            }
            Ok(RawToken::BytesType(n)) => {
                if !bytes_width_ok(n) {
                    return Err(ParseError::lex(
                        format!("invalid bytes width `bytes{n}`"),
                        span,
                        source,
                        filename,
                    ));
                }
                TokenKind::BytesType(n)
            }
            Ok(RawToken::Address) => TokenKind::Address,
            Ok(RawToken::Bool) => TokenKind::Bool,
            Ok(RawToken::StringType) => TokenKind::StringType,

            Ok(RawToken::Env(e)) => TokenKind::Env(e),

            Ok(RawToken::Assign) => TokenKind::Assign,
            Ok(RawToken::Arrow) => TokenKind::Arrow,
            Ok(RawToken::EqEq) => TokenKind::EqEq,
            Ok(RawToken::NEq) => TokenKind::NEq,
            Ok(RawToken::GEq) => TokenKind::GEq,
            Ok(RawToken::LEq) => TokenKind::LEq,
            Ok(RawToken::Cat) => TokenKind::Cat,
            Ok(RawToken::DotDot) => TokenKind::DotDot,
            Ok(RawToken::Lt) => TokenKind::Lt,
            Ok(RawToken::Gt) => TokenKind::Gt,
            Ok(RawToken::Plus) => TokenKind::Plus,
            Ok(RawToken::Minus) => TokenKind::Minus,
            Ok(RawToken::Star) => TokenKind::Star,
            Ok(RawToken::Slash) => TokenKind::Slash,
            Ok(RawToken::Percent) => TokenKind::Percent,
            Ok(RawToken::Caret) => TokenKind::Caret,
            Ok(RawToken::LParen) => TokenKind::LParen,
            Ok(RawToken::RParen) => TokenKind::RParen,
            Ok(RawToken::LBrack) => TokenKind::LBrack,
            Ok(RawToken::RBrack) => TokenKind::RBrack,
            Ok(RawToken::LBrace) => TokenKind::LBrace,
            Ok(RawToken::RBrace) => TokenKind::RBrace,
            Ok(RawToken::Comma) => TokenKind::Comma,
            Ok(RawToken::Colon) => TokenKind::Colon,
            Ok(RawToken::Underscore) => TokenKind::Underscore,

            Ok(RawToken::Ident(s)) => TokenKind::Ident(s),
            Ok(RawToken::Number(Some(n))) => TokenKind::Number(n),
            Ok(RawToken::Number(None)) => {
                return Err(ParseError::lex(
                    "invalid integer literal",
                    span,
                    source,
                    filename,
                ));
            }
            Ok(RawToken::StrLit(s)) => TokenKind::StrLit(s),

            Err(_) => {
                return Err(ParseError::lex("unexpected character", span, source, filename));
            }
        };
        tokens.push(Token { kind, span, line, col });
    }

    let end = Span::new(source.len(), source.len());
    let (line, col) = index.line_col(source.len());
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: end,
        line,
        col,
    });
    Ok(tokens)
}
