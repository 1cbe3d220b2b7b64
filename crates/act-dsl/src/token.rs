use num::BigInt;

use crate::ast::{EthEnv, Span};

/// A lexed token with its byte span and 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Behaviour,
    Of,
    Interface,
    Creates,
    Case,
    Returns,
    Storage,
    IffInRange,
    Iff,
    And,
    Or,
    Not,
    True,
    False,
    Mapping,
    Ensures,
    Invariants,
    If,
    Then,
    Else,
    At,
    Noop,

    // ABI type lexemes; `uint`/`int` without a width default to 256.
    UIntType(u16),
    IntType(u16),
    BytesType(u16),
    Address,
    Bool,
    StringType,

    // Environment identifiers
    Env(EthEnv),

    // Symbols
    Assign,  // :=
    Arrow,   // =>
    EqEq,    // ==
    NEq,     // =/=
    GEq,     // >=
    LEq,     // <=
    Cat,     // ++
    DotDot,  // ..
    Lt,      // <
    Gt,      // >
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %
    Caret,   // ^
    LParen,  // (
    RParen,  // )
    LBrack,  // [
    RBrack,  // ]
    LBrace,  // {
    RBrace,  // }
    Comma,   // ,
    Colon,   // :
    Underscore,

    // Literals / identifiers
    Ident(String),
    Number(BigInt),
    StrLit(String),

    Eof,
}

impl TokenKind {
    /// Human-oriented description used in "expected X, found Y" messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("identifier `{s}`"),
            TokenKind::Number(n) => format!("number `{n}`"),
            TokenKind::StrLit(_) => "string literal".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            other => format!("`{other}`"),
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Behaviour => write!(f, "behaviour"),
            TokenKind::Of => write!(f, "of"),
            TokenKind::Interface => write!(f, "interface"),
            TokenKind::Creates => write!(f, "creates"),
            TokenKind::Case => write!(f, "case"),
            TokenKind::Returns => write!(f, "returns"),
            TokenKind::Storage => write!(f, "storage"),
            TokenKind::IffInRange => write!(f, "iff in range"),
            TokenKind::Iff => write!(f, "iff"),
            TokenKind::And => write!(f, "and"),
            TokenKind::Or => write!(f, "or"),
            TokenKind::Not => write!(f, "not"),
            TokenKind::True => write!(f, "true"),
            TokenKind::False => write!(f, "false"),
            TokenKind::Mapping => write!(f, "mapping"),
            TokenKind::Ensures => write!(f, "ensures"),
            TokenKind::Invariants => write!(f, "invariants"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Then => write!(f, "then"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::At => write!(f, "at"),
            TokenKind::Noop => write!(f, "noop"),
            TokenKind::UIntType(n) => write!(f, "uint{n}"),
            TokenKind::IntType(n) => write!(f, "int{n}"),
            TokenKind::BytesType(n) => write!(f, "bytes{n}"),
            TokenKind::Address => write!(f, "address"),
            TokenKind::Bool => write!(f, "bool"),
            TokenKind::StringType => write!(f, "string"),
            TokenKind::Env(e) => write!(f, "{e}"),
            TokenKind::Assign => write!(f, ":="),
            TokenKind::Arrow => write!(f, "=>"),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::NEq => write!(f, "=/="),
            TokenKind::GEq => write!(f, ">="),
            TokenKind::LEq => write!(f, "<="),
            TokenKind::Cat => write!(f, "++"),
            TokenKind::DotDot => write!(f, ".."),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBrack => write!(f, "["),
            TokenKind::RBrack => write!(f, "]"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Underscore => write!(f, "_"),
            TokenKind::Ident(s) => write!(f, "{s}"),
            TokenKind::Number(n) => write!(f, "{n}"),
            TokenKind::StrLit(s) => write!(f, "\"{s}\""),
            TokenKind::Eof => write!(f, "<eof>"),
        }
    }
}
