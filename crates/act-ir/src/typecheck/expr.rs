use indexmap::IndexMap;

use act_dsl::ast::{AbiType, Entry, EntryTime, Expr, Index, SlotType, Span};

use crate::abi;
use crate::env as ethenv;
use crate::errors::{ErrCtx, TypeError};
use crate::storage::{StorageItem, StorageRef};
use crate::store::{SlotMap, Store};
use crate::timing::Timing;
use crate::types::{ActType, Exp};

/// Whether the surrounding context demands untimed references (preconditions,
/// case guards, update right-hand sides) or permits explicit `pre`/`post`
/// (postconditions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimeMode {
    Untimed,
    Timed,
}

/// Checking environment: the contract under check, its slot declarations,
/// the global store and the calldata arguments in scope.
pub(crate) struct ExprEnv<'a> {
    pub contract: &'a str,
    pub slots: &'a SlotMap,
    pub store: &'a Store,
    pub calldata: IndexMap<String, AbiType>,
}

/// The type an untyped node would naturally elaborate to, for mismatch
/// messages when the expected type rules it out entirely.
fn natural_type(e: &Expr) -> &'static str {
    match e {
        Expr::And(..)
        | Expr::Or(..)
        | Expr::Not(..)
        | Expr::Eq(..)
        | Expr::NEq(..)
        | Expr::Lt(..)
        | Expr::Gt(..)
        | Expr::LEq(..)
        | Expr::GEq(..)
        | Expr::BoolLit(..) => "boolean",
        Expr::Add(..)
        | Expr::Sub(..)
        | Expr::Mul(..)
        | Expr::Div(..)
        | Expr::Mod(..)
        | Expr::Pow(..)
        | Expr::IntLit(..) => "integer",
        Expr::Cat(..) | Expr::StrLit(..) => "bytestring",
        Expr::Ite(..) | Expr::Env(..) | Expr::Entry(..) => "expression",
    }
}

/// Bidirectional expression checking: elaborate `e` at the expected
/// act-type, producing a typed expression whose entries respect `mode`.
pub(crate) fn check_expr(
    env: &ExprEnv<'_>,
    ctx: &ErrCtx<'_>,
    e: &Expr,
    expected: ActType,
    mode: TimeMode,
) -> Result<Exp, TypeError> {
    use ActType::*;

    let chk = |e: &Expr, t: ActType| check_expr(env, ctx, e, t, mode);

    match (e, expected) {
        // Boolean connectives
        (Expr::And(_, l, r), Boolean) => Ok(Exp::and(chk(l, Boolean)?, chk(r, Boolean)?)),
        (Expr::Or(_, l, r), Boolean) => Ok(Exp::or(chk(l, Boolean)?, chk(r, Boolean)?)),
        (Expr::Not(_, x), Boolean) => Ok(Exp::not(chk(x, Boolean)?)),
        (Expr::BoolLit(_, b), Boolean) => Ok(Exp::LitBool(*b)),

        // Comparisons constrain their operands to integers.
        (Expr::Lt(_, l, r), Boolean) => Ok(Exp::lt(chk(l, Integer)?, chk(r, Integer)?)),
        (Expr::Gt(_, l, r), Boolean) => Ok(Exp::gt(chk(l, Integer)?, chk(r, Integer)?)),
        (Expr::LEq(_, l, r), Boolean) => Ok(Exp::le(chk(l, Integer)?, chk(r, Integer)?)),
        (Expr::GEq(_, l, r), Boolean) => Ok(Exp::ge(chk(l, Integer)?, chk(r, Integer)?)),

        // Polymorphic equality: harmonize as integer, then boolean, then
        // bytestring; first success wins.
        (Expr::Eq(_, l, r), Boolean) => harmonize(env, ctx, l, r, mode, Exp::eq),
        (Expr::NEq(_, l, r), Boolean) => harmonize(env, ctx, l, r, mode, Exp::neq),

        // Integer arithmetic
        (Expr::Add(_, l, r), Integer) => Ok(Exp::add(chk(l, Integer)?, chk(r, Integer)?)),
        (Expr::Sub(_, l, r), Integer) => Ok(Exp::sub(chk(l, Integer)?, chk(r, Integer)?)),
        (Expr::Mul(_, l, r), Integer) => Ok(Exp::mul(chk(l, Integer)?, chk(r, Integer)?)),
        (Expr::Div(_, l, r), Integer) => Ok(Exp::div(chk(l, Integer)?, chk(r, Integer)?)),
        (Expr::Mod(_, l, r), Integer) => Ok(Exp::modulo(chk(l, Integer)?, chk(r, Integer)?)),
        (Expr::Pow(_, l, r), Integer) => Ok(Exp::pow(chk(l, Integer)?, chk(r, Integer)?)),
        (Expr::IntLit(_, n), Integer) => Ok(Exp::LitInt(n.clone())),

        // Bytestrings
        (Expr::Cat(_, l, r), ByteStr) => Ok(Exp::cat(chk(l, ByteStr)?, chk(r, ByteStr)?)),
        (Expr::StrLit(_, s), ByteStr) => Ok(Exp::LitBytes(s.clone())),

        // Conditionals check the condition as boolean and both branches at
        // the expected type.
        (Expr::Ite(_, c, t, f), _) => Ok(Exp::ite(
            chk(c, Boolean)?,
            chk(t, expected)?,
            chk(f, expected)?,
        )),

        // Environment lookups have a fixed type.
        (Expr::Env(span, v), _) => {
            let ty = ethenv::env_type(*v);
            if ty == expected {
                Ok(Exp::Env(ty, *v))
            } else {
                Err(TypeError::TypeMismatch {
                    expected: expected.to_string(),
                    found: ty.to_string(),
                    span: ctx.at(*span),
                    src: ctx.src(),
                })
            }
        }

        (Expr::Entry(time, entry), _) => {
            let exp = resolve_entry(env, ctx, *time, entry, mode)?;
            let found = exp.type_of();
            if found == expected {
                Ok(exp)
            } else {
                Err(TypeError::TypeMismatch {
                    expected: expected.to_string(),
                    found: found.to_string(),
                    span: ctx.at(entry.span),
                    src: ctx.src(),
                })
            }
        }

        // Anything else is a shape the expected type rules out.
        (other, _) => Err(TypeError::TypeMismatch {
            expected: expected.to_string(),
            found: natural_type(other).to_string(),
            span: ctx.at(other.span()),
            src: ctx.src(),
        }),
    }
}

fn harmonize(
    env: &ExprEnv<'_>,
    ctx: &ErrCtx<'_>,
    l: &Expr,
    r: &Expr,
    mode: TimeMode,
    build: fn(Exp, Exp) -> Exp,
) -> Result<Exp, TypeError> {
    let mut failures = Vec::new();
    for ty in [ActType::Integer, ActType::Boolean, ActType::ByteStr] {
        match (
            check_expr(env, ctx, l, ty, mode),
            check_expr(env, ctx, r, ty, mode),
        ) {
            (Ok(tl), Ok(tr)) => return Ok(build(tl, tr)),
            (le, re) => failures.extend(le.err().into_iter().chain(re.err())),
        }
    }
    // Resolution and timing failures hold at every candidate type; surface
    // them rather than a spurious harmonization error.
    let resolution = failures.into_iter().find(|e| {
        matches!(
            e,
            TypeError::UnknownName { .. }
                | TypeError::AmbiguousName { .. }
                | TypeError::ArityMismatch { .. }
                | TypeError::TimingMismatch { .. }
        )
    });
    Err(resolution.unwrap_or(TypeError::CannotHarmonize {
        span: ctx.at(l.span()),
        src: ctx.src(),
    }))
}

/// Resolve a raw entry against calldata and the store.
pub(crate) fn resolve_entry(
    env: &ExprEnv<'_>,
    ctx: &ErrCtx<'_>,
    time: EntryTime,
    entry: &Entry,
    mode: TimeMode,
) -> Result<Exp, TypeError> {
    let timing = match time {
        EntryTime::Untimed => Timing::Neither,
        EntryTime::Pre => Timing::Pre,
        EntryTime::Post => Timing::Post,
    };
    if mode == TimeMode::Untimed && timing != Timing::Neither {
        return Err(TypeError::TimingMismatch {
            needed: Timing::Neither,
            span: ctx.at(entry.span),
            src: ctx.src(),
        });
    }

    // Split a trailing slice off the key accesses.
    let (keys, slice) = split_indices(ctx, entry)?;

    if let Some(contract) = &entry.contract {
        // Explicitly qualified: resolve in the named contract's store.
        let Some(slot) = env.store.slot(&contract.node, &entry.name.node) else {
            let (name, span) = if env.store.contains_contract(&contract.node) {
                (entry.name.node.clone(), entry.name.span)
            } else {
                (contract.node.clone(), contract.span)
            };
            return Err(TypeError::UnknownName {
                name,
                span: ctx.at(span),
                src: ctx.src(),
            });
        };
        let item = slot_item(env, ctx, &contract.node, entry, slot, &keys, mode)?;
        return apply_slice(env, ctx, Exp::TEntry(timing, item), slice, entry.span, mode);
    }

    let slot = env.slots.get(&entry.name.node);
    let calldata = env.calldata.get(&entry.name.node).copied();

    match (slot, calldata) {
        (Some(_), Some(_)) => Err(TypeError::AmbiguousName {
            name: entry.name.node.clone(),
            span: ctx.at(entry.name.span),
            src: ctx.src(),
        }),
        (None, Some(abi)) => {
            // Calldata arguments carry no timing.
            if timing != Timing::Neither {
                return Err(TypeError::TimingMismatch {
                    needed: Timing::Neither,
                    span: ctx.at(entry.span),
                    src: ctx.src(),
                });
            }
            if !keys.is_empty() {
                return Err(TypeError::ArityMismatch {
                    name: entry.name.node.clone(),
                    expected: 0,
                    found: keys.len(),
                    span: ctx.at(entry.span),
                    src: ctx.src(),
                });
            }
            let var = Exp::Var(abi::act_type(abi), entry.name.node.clone());
            apply_slice(env, ctx, var, slice, entry.span, mode)
        }
        (Some(slot), None) => {
            let slot = slot.clone();
            let item = slot_item(env, ctx, env.contract, entry, &slot, &keys, mode)?;
            apply_slice(env, ctx, Exp::TEntry(timing, item), slice, entry.span, mode)
        }
        (None, None) => Err(TypeError::UnknownName {
            name: entry.name.node.clone(),
            span: ctx.at(entry.name.span),
            src: ctx.src(),
        }),
    }
}

type SliceBounds<'a> = Option<(&'a Expr, &'a Expr, Span)>;

fn split_indices<'e>(
    ctx: &ErrCtx<'_>,
    entry: &'e Entry,
) -> Result<(Vec<&'e Expr>, SliceBounds<'e>), TypeError> {
    let mut keys = Vec::new();
    let mut slice = None;
    for (i, ix) in entry.indices.iter().enumerate() {
        match ix {
            Index::Key(k) => {
                if slice.is_some() {
                    return Err(TypeError::ArityMismatch {
                        name: entry.name.node.clone(),
                        expected: keys.len(),
                        found: entry.indices.len(),
                        span: ctx.at(entry.span),
                        src: ctx.src(),
                    });
                }
                keys.push(k);
            }
            Index::Slice { lo, hi, span } => {
                if i != entry.indices.len() - 1 {
                    return Err(TypeError::ArityMismatch {
                        name: entry.name.node.clone(),
                        expected: entry.indices.len() - 1,
                        found: entry.indices.len(),
                        span: ctx.at(*span),
                        src: ctx.src(),
                    });
                }
                slice = Some((lo, hi, *span));
            }
        }
    }
    Ok((keys, slice))
}

fn slot_item(
    env: &ExprEnv<'_>,
    ctx: &ErrCtx<'_>,
    contract: &str,
    entry: &Entry,
    slot: &SlotType,
    keys: &[&Expr],
    mode: TimeMode,
) -> Result<StorageItem, TypeError> {
    let base = StorageRef::Var {
        contract: contract.to_string(),
        name: entry.name.node.clone(),
        span: entry.name.span,
    };
    match slot {
        SlotType::Value(abi) => {
            if !keys.is_empty() {
                return Err(TypeError::ArityMismatch {
                    name: entry.name.node.clone(),
                    expected: 0,
                    found: keys.len(),
                    span: ctx.at(entry.span),
                    src: ctx.src(),
                });
            }
            Ok(StorageItem {
                ty: abi::act_type(*abi),
                abi: *abi,
                reference: base,
            })
        }
        SlotType::Mapping {
            keys: key_types,
            value,
        } => {
            if keys.len() != key_types.len() {
                return Err(TypeError::ArityMismatch {
                    name: entry.name.node.clone(),
                    expected: key_types.len(),
                    found: keys.len(),
                    span: ctx.at(entry.span),
                    src: ctx.src(),
                });
            }
            let mut indices = Vec::with_capacity(keys.len());
            for (k, kt) in keys.iter().zip(key_types) {
                indices.push(check_expr(env, ctx, k, abi::act_type(*kt), mode)?);
            }
            Ok(StorageItem {
                ty: abi::act_type(*value),
                abi: *value,
                reference: StorageRef::Mapping {
                    base: Box::new(base),
                    indices,
                    span: entry.span,
                },
            })
        }
    }
}

fn apply_slice(
    env: &ExprEnv<'_>,
    ctx: &ErrCtx<'_>,
    base: Exp,
    slice: SliceBounds<'_>,
    span: Span,
    mode: TimeMode,
) -> Result<Exp, TypeError> {
    match slice {
        None => Ok(base),
        Some((lo, hi, _)) => {
            if base.type_of() != ActType::ByteStr {
                return Err(TypeError::TypeMismatch {
                    expected: "bytestring".to_string(),
                    found: base.type_of().to_string(),
                    span: ctx.at(span),
                    src: ctx.src(),
                });
            }
            let lo = check_expr(env, ctx, lo, ActType::Integer, mode)?;
            let hi = check_expr(env, ctx, hi, ActType::Integer, mode)?;
            Ok(Exp::slice(base, lo, hi))
        }
    }
}
