use num::BigInt;

/// Source span for error reporting, in byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both operands.
    pub fn join(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(s: Span) -> Self {
        (s.start, s.end.saturating_sub(s.start)).into()
    }
}

/// A spanned AST node.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Line-start table for translating byte offsets to 1-based line/column.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = self.starts.partition_point(|&s| s <= offset);
        let col = offset - self.starts[line - 1] + 1;
        (line, col)
    }
}

/// EVM environment identifiers available in expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EthEnv {
    Caller,
    Callvalue,
    Calldepth,
    Origin,
    Blockhash,
    Blocknumber,
    Difficulty,
    Chainid,
    Gaslimit,
    Coinbase,
    Timestamp,
    This,
    Nonce,
}

impl EthEnv {
    pub const ALL: [EthEnv; 13] = [
        EthEnv::Caller,
        EthEnv::Callvalue,
        EthEnv::Calldepth,
        EthEnv::Origin,
        EthEnv::Blockhash,
        EthEnv::Blocknumber,
        EthEnv::Difficulty,
        EthEnv::Chainid,
        EthEnv::Gaslimit,
        EthEnv::Coinbase,
        EthEnv::Timestamp,
        EthEnv::This,
        EthEnv::Nonce,
    ];

    /// The identifier as it appears in source text.
    pub fn source_name(&self) -> &'static str {
        match self {
            EthEnv::Caller => "CALLER",
            EthEnv::Callvalue => "CALLVALUE",
            EthEnv::Calldepth => "CALLDEPTH",
            EthEnv::Origin => "ORIGIN",
            EthEnv::Blockhash => "BLOCKHASH",
            EthEnv::Blocknumber => "BLOCKNUMBER",
            EthEnv::Difficulty => "DIFFICULTY",
            EthEnv::Chainid => "CHAINID",
            EthEnv::Gaslimit => "GASLIMIT",
            EthEnv::Coinbase => "COINBASE",
            EthEnv::Timestamp => "TIMESTAMP",
            EthEnv::This => "THIS",
            EthEnv::Nonce => "NONCE",
        }
    }
}

impl std::fmt::Display for EthEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source_name())
    }
}

/// Solidity ABI types accepted in interfaces, mappings and `iff in range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbiType {
    UInt(u16),
    Int(u16),
    Address,
    Bool,
    Bytes(u16),
    String,
}

impl std::fmt::Display for AbiType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbiType::UInt(n) => write!(f, "uint{n}"),
            AbiType::Int(n) => write!(f, "int{n}"),
            AbiType::Address => write!(f, "address"),
            AbiType::Bool => write!(f, "bool"),
            AbiType::Bytes(n) => write!(f, "bytes{n}"),
            AbiType::String => write!(f, "string"),
        }
    }
}

/// Declared shape of a storage slot: a single value or an n-ary mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotType {
    Value(AbiType),
    Mapping { keys: Vec<AbiType>, value: AbiType },
}

impl std::fmt::Display for SlotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotType::Value(abi) => write!(f, "{abi}"),
            SlotType::Mapping { keys, value } => {
                for k in keys {
                    write!(f, "mapping({k} => ")?;
                }
                write!(f, "{value}")?;
                for _ in keys {
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

/// A full specification file: a sequence of behaviours and definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAct {
    pub behaviours: Vec<RawBehaviour>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawBehaviour {
    /// A guarded state transition.
    Transition(Transition),
    /// A constructor definition with a `creates` block.
    Definition(Definition),
}

impl RawBehaviour {
    pub fn contract(&self) -> &str {
        match self {
            RawBehaviour::Transition(t) => &t.contract.node,
            RawBehaviour::Definition(d) => &d.contract.node,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub name: Spanned<String>,
    pub contract: Spanned<String>,
    pub interface: Interface,
    pub iffs: Vec<IffBlock>,
    pub cases: Cases,
    pub ensures: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: Spanned<String>,
    pub contract: Spanned<String>,
    pub interface: Interface,
    pub iffs: Vec<IffBlock>,
    pub creates: Vec<Assign>,
    /// `storage` block on a constructor: rewrites of other contracts'
    /// slots constrained at creation time.
    pub ext_storage: Vec<StorageEntry>,
    pub ensures: Vec<Expr>,
    pub invariants: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub name: Spanned<String>,
    pub decls: Vec<Decl>,
    pub span: Span,
}

/// A calldata declaration, e.g. `uint256 value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub abi: AbiType,
    pub name: Spanned<String>,
}

/// One `iff` block; `range` is set for `iff in range <type>` blocks, whose
/// expressions each become an in-range predicate rather than a plain guard.
#[derive(Debug, Clone, PartialEq)]
pub struct IffBlock {
    pub range: Option<AbiType>,
    pub exprs: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cases {
    /// No `case` keyword: a single unguarded body.
    Direct(Post),
    Branches(Vec<Branch>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub guard: CaseGuard,
    pub body: CaseBody,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseGuard {
    Cond(Expr),
    Wildcard(Span),
}

impl CaseGuard {
    pub fn span(&self) -> Span {
        match self {
            CaseGuard::Cond(e) => e.span(),
            CaseGuard::Wildcard(s) => *s,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseBody {
    Leaf(Post),
    Nested(Vec<Branch>),
}

/// The effect part of a case: storage entries and an optional return value.
/// `noop` parses to an empty `Post`.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub storage: Vec<StorageEntry>,
    pub returns: Option<Expr>,
    pub span: Span,
}

/// One line of a `storage` block. Without a rhs the reference is constrained
/// read-only (pre-state equals post-state).
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEntry {
    pub entry: Entry,
    pub rhs: Option<Expr>,
    pub span: Span,
}

/// A raw named reference with index accesses, before name resolution
/// decides whether it denotes calldata or a storage slot. `contract` is
/// set for cross-contract references written `name at Contract`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub name: Spanned<String>,
    pub indices: Vec<Index>,
    pub contract: Option<Spanned<String>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    /// A mapping key access `[e]`.
    Key(Expr),
    /// A bytestring slice `[lo..hi]`.
    Slice { lo: Expr, hi: Expr, span: Span },
}

/// Explicit timing wrapper on an entry: bare, `pre(..)` or `post(..)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryTime {
    Untimed,
    Pre,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub slot: SlotType,
    pub name: Spanned<String>,
    pub rhs: AssignRhs,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignRhs {
    Expr(Expr),
    /// Mapping initialization `[k := v, …]`.
    MappingLit(Vec<(Expr, Expr)>),
    /// Struct initialization `{f := v, …}`; reserved, rejected downstream.
    StructLit(Vec<(Spanned<String>, Expr)>),
}

/// Untyped expression; every node carries its source span.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Span, Box<Expr>, Box<Expr>),
    Or(Span, Box<Expr>, Box<Expr>),
    Not(Span, Box<Expr>),
    Eq(Span, Box<Expr>, Box<Expr>),
    NEq(Span, Box<Expr>, Box<Expr>),
    Lt(Span, Box<Expr>, Box<Expr>),
    Gt(Span, Box<Expr>, Box<Expr>),
    LEq(Span, Box<Expr>, Box<Expr>),
    GEq(Span, Box<Expr>, Box<Expr>),
    Add(Span, Box<Expr>, Box<Expr>),
    Sub(Span, Box<Expr>, Box<Expr>),
    Mul(Span, Box<Expr>, Box<Expr>),
    Div(Span, Box<Expr>, Box<Expr>),
    Mod(Span, Box<Expr>, Box<Expr>),
    Pow(Span, Box<Expr>, Box<Expr>),
    Cat(Span, Box<Expr>, Box<Expr>),
    Ite(Span, Box<Expr>, Box<Expr>, Box<Expr>),
    IntLit(Span, BigInt),
    BoolLit(Span, bool),
    StrLit(Span, String),
    Env(Span, EthEnv),
    Entry(EntryTime, Entry),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::And(s, ..)
            | Expr::Or(s, ..)
            | Expr::Not(s, ..)
            | Expr::Eq(s, ..)
            | Expr::NEq(s, ..)
            | Expr::Lt(s, ..)
            | Expr::Gt(s, ..)
            | Expr::LEq(s, ..)
            | Expr::GEq(s, ..)
            | Expr::Add(s, ..)
            | Expr::Sub(s, ..)
            | Expr::Mul(s, ..)
            | Expr::Div(s, ..)
            | Expr::Mod(s, ..)
            | Expr::Pow(s, ..)
            | Expr::Cat(s, ..)
            | Expr::Ite(s, ..)
            | Expr::IntLit(s, ..)
            | Expr::BoolLit(s, ..)
            | Expr::StrLit(s, ..)
            | Expr::Env(s, ..) => *s,
            Expr::Entry(_, e) => e.span,
        }
    }
}
