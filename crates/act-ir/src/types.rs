use act_dsl::ast::{AbiType, EthEnv};
use num::BigInt;

use crate::storage::{Rewrite, StorageItem, StorageUpdate};
use crate::store::Store;
use crate::timing::{set_time, Timing};

/// Runtime type witness carried by every typed expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActType {
    Integer,
    Boolean,
    ByteStr,
    Contract,
}

impl ActType {
    /// Stable tag used in JSON output.
    pub fn tag(&self) -> &'static str {
        match self {
            ActType::Integer => "AInteger",
            ActType::Boolean => "ABoolean",
            ActType::ByteStr => "AByteStr",
            ActType::Contract => "AContract",
        }
    }
}

impl std::fmt::Display for ActType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActType::Integer => write!(f, "integer"),
            ActType::Boolean => write!(f, "boolean"),
            ActType::ByteStr => write!(f, "bytestring"),
            ActType::Contract => write!(f, "contract"),
        }
    }
}

/// Typed, timing-annotated expression. Monomorphic nodes fix their operand
/// types; polymorphic nodes (`Eq`, `NEq`, `Ite`, `Var`, `Env`, `TEntry`)
/// carry an explicit [`ActType`] tag. Nodes are built through the smart
/// constructors below, which check that operand tags agree.
#[derive(Debug, Clone, PartialEq)]
pub enum Exp {
    // Booleans
    And(Box<Exp>, Box<Exp>),
    Or(Box<Exp>, Box<Exp>),
    Not(Box<Exp>),
    LitBool(bool),
    Lt(Box<Exp>, Box<Exp>),
    Le(Box<Exp>, Box<Exp>),
    Gt(Box<Exp>, Box<Exp>),
    Ge(Box<Exp>, Box<Exp>),
    Eq(ActType, Box<Exp>, Box<Exp>),
    NEq(ActType, Box<Exp>, Box<Exp>),
    /// The integer expression lies within the value range of the ABI type.
    InRange(AbiType, Box<Exp>),

    // Integers
    Add(Box<Exp>, Box<Exp>),
    Sub(Box<Exp>, Box<Exp>),
    Mul(Box<Exp>, Box<Exp>),
    Div(Box<Exp>, Box<Exp>),
    Mod(Box<Exp>, Box<Exp>),
    Pow(Box<Exp>, Box<Exp>),
    LitInt(BigInt),

    // Bytestrings
    Cat(Box<Exp>, Box<Exp>),
    Slice(Box<Exp>, Box<Exp>, Box<Exp>),
    LitBytes(String),

    // Polymorphic
    Env(ActType, EthEnv),
    Ite(ActType, Box<Exp>, Box<Exp>, Box<Exp>),
    /// A calldata argument.
    Var(ActType, String),
    /// The only construct that reads storage.
    TEntry(Timing, StorageItem),
    /// Contract creation; never evaluable, unsupported by the encoder.
    Create(String, Vec<Exp>),
}

#[allow(clippy::should_implement_trait)]
impl Exp {
    pub fn type_of(&self) -> ActType {
        match self {
            Exp::And(..)
            | Exp::Or(..)
            | Exp::Not(..)
            | Exp::LitBool(..)
            | Exp::Lt(..)
            | Exp::Le(..)
            | Exp::Gt(..)
            | Exp::Ge(..)
            | Exp::Eq(..)
            | Exp::NEq(..)
            | Exp::InRange(..) => ActType::Boolean,
            Exp::Add(..)
            | Exp::Sub(..)
            | Exp::Mul(..)
            | Exp::Div(..)
            | Exp::Mod(..)
            | Exp::Pow(..)
            | Exp::LitInt(..) => ActType::Integer,
            Exp::Cat(..) | Exp::Slice(..) | Exp::LitBytes(..) => ActType::ByteStr,
            Exp::Env(t, _) | Exp::Ite(t, ..) | Exp::Var(t, _) => *t,
            Exp::TEntry(_, item) => item.ty,
            Exp::Create(..) => ActType::Contract,
        }
    }

    fn bool2(l: Exp, r: Exp) -> (Box<Exp>, Box<Exp>) {
        debug_assert_eq!(l.type_of(), ActType::Boolean);
        debug_assert_eq!(r.type_of(), ActType::Boolean);
        (Box::new(l), Box::new(r))
    }

    fn int2(l: Exp, r: Exp) -> (Box<Exp>, Box<Exp>) {
        debug_assert_eq!(l.type_of(), ActType::Integer);
        debug_assert_eq!(r.type_of(), ActType::Integer);
        (Box::new(l), Box::new(r))
    }

    pub fn and(l: Exp, r: Exp) -> Exp {
        let (l, r) = Self::bool2(l, r);
        Exp::And(l, r)
    }

    pub fn or(l: Exp, r: Exp) -> Exp {
        let (l, r) = Self::bool2(l, r);
        Exp::Or(l, r)
    }

    pub fn not(e: Exp) -> Exp {
        debug_assert_eq!(e.type_of(), ActType::Boolean);
        Exp::Not(Box::new(e))
    }

    pub fn lt(l: Exp, r: Exp) -> Exp {
        let (l, r) = Self::int2(l, r);
        Exp::Lt(l, r)
    }

    pub fn le(l: Exp, r: Exp) -> Exp {
        let (l, r) = Self::int2(l, r);
        Exp::Le(l, r)
    }

    pub fn gt(l: Exp, r: Exp) -> Exp {
        let (l, r) = Self::int2(l, r);
        Exp::Gt(l, r)
    }

    pub fn ge(l: Exp, r: Exp) -> Exp {
        let (l, r) = Self::int2(l, r);
        Exp::Ge(l, r)
    }

    pub fn eq(l: Exp, r: Exp) -> Exp {
        let t = l.type_of();
        debug_assert_eq!(t, r.type_of());
        Exp::Eq(t, Box::new(l), Box::new(r))
    }

    pub fn neq(l: Exp, r: Exp) -> Exp {
        let t = l.type_of();
        debug_assert_eq!(t, r.type_of());
        Exp::NEq(t, Box::new(l), Box::new(r))
    }

    pub fn in_range(abi: AbiType, e: Exp) -> Exp {
        debug_assert_eq!(e.type_of(), ActType::Integer);
        Exp::InRange(abi, Box::new(e))
    }

    pub fn add(l: Exp, r: Exp) -> Exp {
        let (l, r) = Self::int2(l, r);
        Exp::Add(l, r)
    }

    pub fn sub(l: Exp, r: Exp) -> Exp {
        let (l, r) = Self::int2(l, r);
        Exp::Sub(l, r)
    }

    pub fn mul(l: Exp, r: Exp) -> Exp {
        let (l, r) = Self::int2(l, r);
        Exp::Mul(l, r)
    }

    pub fn div(l: Exp, r: Exp) -> Exp {
        let (l, r) = Self::int2(l, r);
        Exp::Div(l, r)
    }

    pub fn modulo(l: Exp, r: Exp) -> Exp {
        let (l, r) = Self::int2(l, r);
        Exp::Mod(l, r)
    }

    pub fn pow(l: Exp, r: Exp) -> Exp {
        let (l, r) = Self::int2(l, r);
        Exp::Pow(l, r)
    }

    pub fn int(n: impl Into<BigInt>) -> Exp {
        Exp::LitInt(n.into())
    }

    pub fn cat(l: Exp, r: Exp) -> Exp {
        debug_assert_eq!(l.type_of(), ActType::ByteStr);
        debug_assert_eq!(r.type_of(), ActType::ByteStr);
        Exp::Cat(Box::new(l), Box::new(r))
    }

    pub fn slice(base: Exp, lo: Exp, hi: Exp) -> Exp {
        debug_assert_eq!(base.type_of(), ActType::ByteStr);
        let (lo, hi) = Self::int2(lo, hi);
        Exp::Slice(Box::new(base), lo, hi)
    }

    pub fn ite(c: Exp, t: Exp, e: Exp) -> Exp {
        debug_assert_eq!(c.type_of(), ActType::Boolean);
        let ty = t.type_of();
        debug_assert_eq!(ty, e.type_of());
        Exp::Ite(ty, Box::new(c), Box::new(t), Box::new(e))
    }

    /// Conjunction of a list; the empty list is `true`.
    pub fn conj(exprs: impl IntoIterator<Item = Exp>) -> Exp {
        let mut it = exprs.into_iter();
        match it.next() {
            None => Exp::LitBool(true),
            Some(first) => it.fold(first, Exp::and),
        }
    }

    /// Disjunction of a list; the empty list is `false`.
    pub fn disj(exprs: impl IntoIterator<Item = Exp>) -> Exp {
        let mut it = exprs.into_iter();
        match it.next() {
            None => Exp::LitBool(false),
            Some(first) => it.fold(first, Exp::or),
        }
    }

    /// Rebuild the expression, replacing every `TEntry` node by `f`'s result.
    pub fn map_entries(&self, f: &dyn Fn(Timing, StorageItem) -> Exp) -> Exp {
        let go = |e: &Exp| e.map_entries(f);
        match self {
            Exp::And(l, r) => Exp::And(Box::new(go(l)), Box::new(go(r))),
            Exp::Or(l, r) => Exp::Or(Box::new(go(l)), Box::new(go(r))),
            Exp::Not(e) => Exp::Not(Box::new(go(e))),
            Exp::LitBool(b) => Exp::LitBool(*b),
            Exp::Lt(l, r) => Exp::Lt(Box::new(go(l)), Box::new(go(r))),
            Exp::Le(l, r) => Exp::Le(Box::new(go(l)), Box::new(go(r))),
            Exp::Gt(l, r) => Exp::Gt(Box::new(go(l)), Box::new(go(r))),
            Exp::Ge(l, r) => Exp::Ge(Box::new(go(l)), Box::new(go(r))),
            Exp::Eq(t, l, r) => Exp::Eq(*t, Box::new(go(l)), Box::new(go(r))),
            Exp::NEq(t, l, r) => Exp::NEq(*t, Box::new(go(l)), Box::new(go(r))),
            Exp::InRange(abi, e) => Exp::InRange(*abi, Box::new(go(e))),
            Exp::Add(l, r) => Exp::Add(Box::new(go(l)), Box::new(go(r))),
            Exp::Sub(l, r) => Exp::Sub(Box::new(go(l)), Box::new(go(r))),
            Exp::Mul(l, r) => Exp::Mul(Box::new(go(l)), Box::new(go(r))),
            Exp::Div(l, r) => Exp::Div(Box::new(go(l)), Box::new(go(r))),
            Exp::Mod(l, r) => Exp::Mod(Box::new(go(l)), Box::new(go(r))),
            Exp::Pow(l, r) => Exp::Pow(Box::new(go(l)), Box::new(go(r))),
            Exp::LitInt(n) => Exp::LitInt(n.clone()),
            Exp::Cat(l, r) => Exp::Cat(Box::new(go(l)), Box::new(go(r))),
            Exp::Slice(b, lo, hi) => {
                Exp::Slice(Box::new(go(b)), Box::new(go(lo)), Box::new(go(hi)))
            }
            Exp::LitBytes(s) => Exp::LitBytes(s.clone()),
            Exp::Env(t, e) => Exp::Env(*t, *e),
            Exp::Ite(t, c, a, b) => {
                Exp::Ite(*t, Box::new(go(c)), Box::new(go(a)), Box::new(go(b)))
            }
            Exp::Var(t, name) => Exp::Var(*t, name.clone()),
            Exp::TEntry(timing, item) => f(*timing, item.clone()),
            Exp::Create(c, args) => {
                Exp::Create(c.clone(), args.iter().map(go).collect())
            }
        }
    }
}

/// A typed interface signature; calldata SMT constants are named
/// `<interface-name>_<arg-name>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub name: String,
    pub args: Vec<(String, AbiType)>,
}

impl std::fmt::Display for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|(name, abi)| format!("{abi} {name}"))
            .collect();
        write!(f, "{}({})", self.name, args.join(", "))
    }
}

/// Whether a claim describes the succeeding path (preconditions hold) or
/// the reverting path (some precondition fails).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Pass,
    Fail,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Pass => write!(f, "pass"),
            Mode::Fail => write!(f, "fail"),
        }
    }
}

/// A single split claim of a source transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Behaviour {
    pub name: String,
    pub mode: Mode,
    pub contract: String,
    pub interface: Interface,
    /// Untimed boolean guards from the `iff` blocks (negated for `Fail`).
    pub preconditions: Vec<Exp>,
    /// Untimed boolean guard of the normalized case.
    pub case_conditions: Vec<Exp>,
    /// Timed boolean postconditions from `ensures`.
    pub postconditions: Vec<Exp>,
    pub state_updates: Vec<Rewrite>,
    pub returns: Option<Exp>,
}

/// A constructor claim.
#[derive(Debug, Clone, PartialEq)]
pub struct Constructor {
    pub contract: String,
    pub mode: Mode,
    pub interface: Interface,
    pub preconditions: Vec<Exp>,
    pub postconditions: Vec<Exp>,
    pub invariants: Vec<Invariant>,
    pub initial_storage: Vec<StorageUpdate>,
    pub ext_storage: Vec<Rewrite>,
}

/// A contract invariant, to be proven inductive: established by the
/// constructor and preserved by every behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct Invariant {
    pub contract: String,
    /// Constructor preconditions assumed when establishing the invariant.
    pub preconditions: Vec<Exp>,
    /// In-range predicates for the storage locations the predicate reads.
    pub storage_bounds: Vec<Exp>,
    /// The invariant predicate, untimed.
    pub predicate: Exp,
}

impl Invariant {
    /// The timed forms of the predicate: evaluated over the pre-state and
    /// over the post-state.
    pub fn predicate_pair(&self) -> (Exp, Exp) {
        (
            set_time(&self.predicate, Timing::Pre),
            set_time(&self.predicate, Timing::Post),
        )
    }
}

/// All claims of one contract: the constructor claims (`Pass`, plus `Fail`
/// when the definition has preconditions) and the split behaviours.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    pub constructors: Vec<Constructor>,
    pub behaviours: Vec<Behaviour>,
}

impl Contract {
    pub fn name(&self) -> &str {
        &self.constructors[0].contract
    }

    pub fn invariants(&self) -> &[Invariant] {
        &self.constructors[0].invariants
    }
}

/// The fully typechecked program.
#[derive(Debug, Clone, PartialEq)]
pub struct Act {
    pub store: Store,
    pub contracts: Vec<Contract>,
}
