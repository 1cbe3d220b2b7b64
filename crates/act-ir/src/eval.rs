use num::{BigInt, Signed, ToPrimitive, Zero};

use crate::abi;
use crate::types::{Exp, ActType};

/// A fully evaluated constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(BigInt),
    Bool(bool),
    Bytes(String),
}

impl Value {
    pub fn type_of(&self) -> ActType {
        match self {
            Value::Int(_) => ActType::Integer,
            Value::Bool(_) => ActType::Boolean,
            Value::Bytes(_) => ActType::ByteStr,
        }
    }
}

/// Constant-fold an expression. Returns `Some` only when every leaf is a
/// literal: environment lookups, calldata, storage entries and `Create`
/// make an expression symbolic. Arithmetic is over unbounded integers;
/// concatenation and slicing are bytewise.
pub fn eval(e: &Exp) -> Option<Value> {
    match e {
        Exp::And(l, r) => Some(Value::Bool(eval_bool(l)? && eval_bool(r)?)),
        Exp::Or(l, r) => Some(Value::Bool(eval_bool(l)? || eval_bool(r)?)),
        Exp::Not(x) => Some(Value::Bool(!eval_bool(x)?)),
        Exp::LitBool(b) => Some(Value::Bool(*b)),

        Exp::Lt(l, r) => Some(Value::Bool(eval_int(l)? < eval_int(r)?)),
        Exp::Le(l, r) => Some(Value::Bool(eval_int(l)? <= eval_int(r)?)),
        Exp::Gt(l, r) => Some(Value::Bool(eval_int(l)? > eval_int(r)?)),
        Exp::Ge(l, r) => Some(Value::Bool(eval_int(l)? >= eval_int(r)?)),
        Exp::Eq(_, l, r) => Some(Value::Bool(eval(l)? == eval(r)?)),
        Exp::NEq(_, l, r) => Some(Value::Bool(eval(l)? != eval(r)?)),
        Exp::InRange(abi, x) => {
            let v = eval_int(x)?;
            let (lo, hi) = abi::bounds(*abi)?;
            Some(Value::Bool(lo <= v && v <= hi))
        }

        Exp::Add(l, r) => Some(Value::Int(eval_int(l)? + eval_int(r)?)),
        Exp::Sub(l, r) => Some(Value::Int(eval_int(l)? - eval_int(r)?)),
        Exp::Mul(l, r) => Some(Value::Int(eval_int(l)? * eval_int(r)?)),
        Exp::Div(l, r) => {
            let d = eval_int(r)?;
            if d.is_zero() {
                None
            } else {
                Some(Value::Int(eval_int(l)? / d))
            }
        }
        Exp::Mod(l, r) => {
            let d = eval_int(r)?;
            if d.is_zero() {
                None
            } else {
                Some(Value::Int(eval_int(l)? % d))
            }
        }
        Exp::Pow(l, r) => {
            let exp = eval_int(r)?;
            if exp.is_negative() {
                return None;
            }
            let exp = exp.to_u32()?;
            Some(Value::Int(eval_int(l)?.pow(exp)))
        }
        Exp::LitInt(n) => Some(Value::Int(n.clone())),

        Exp::Cat(l, r) => {
            let mut s = eval_bytes(l)?;
            s.push_str(&eval_bytes(r)?);
            Some(Value::Bytes(s))
        }
        Exp::Slice(b, lo, hi) => {
            let s = eval_bytes(b)?;
            let lo = eval_int(lo)?.to_usize()?;
            let hi = eval_int(hi)?.to_usize()?;
            s.get(lo..hi).map(|sub| Value::Bytes(sub.to_string()))
        }
        Exp::LitBytes(s) => Some(Value::Bytes(s.clone())),

        Exp::Ite(_, c, t, f) => {
            if eval_bool(c)? {
                eval(t)
            } else {
                eval(f)
            }
        }

        Exp::Env(..) | Exp::Var(..) | Exp::TEntry(..) | Exp::Create(..) => None,
    }
}

/// Evaluate to an integer, when the expression is a concrete integer.
pub fn eval_int(e: &Exp) -> Option<BigInt> {
    match eval(e)? {
        Value::Int(n) => Some(n),
        _ => None,
    }
}

fn eval_bool(e: &Exp) -> Option<bool> {
    match eval(e)? {
        Value::Bool(b) => Some(b),
        _ => None,
    }
}

fn eval_bytes(e: &Exp) -> Option<String> {
    match eval(e)? {
        Value::Bytes(s) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageItem, StorageRef};
    use crate::timing::Timing;
    use act_dsl::ast::{AbiType, EthEnv, Span};

    #[test]
    fn arithmetic_is_unbounded() {
        let e = Exp::pow(Exp::int(2), Exp::int(256));
        assert_eq!(
            eval_int(&e).unwrap().to_string(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639936"
        );
    }

    #[test]
    fn division_by_zero_is_not_a_value() {
        assert_eq!(eval(&Exp::div(Exp::int(1), Exp::int(0))), None);
        assert_eq!(eval(&Exp::modulo(Exp::int(1), Exp::int(0))), None);
    }

    #[test]
    fn negative_exponent_is_not_a_value() {
        assert_eq!(eval(&Exp::pow(Exp::int(2), Exp::int(-1))), None);
    }

    #[test]
    fn environment_reads_are_symbolic() {
        let e = Exp::add(Exp::int(1), Exp::Env(ActType::Integer, EthEnv::Callvalue));
        assert_eq!(eval(&e), None);
    }

    #[test]
    fn storage_entries_are_symbolic() {
        let item = StorageItem {
            ty: ActType::Integer,
            abi: AbiType::UInt(256),
            reference: StorageRef::Var {
                contract: "C".into(),
                name: "x".into(),
                span: Span::new(0, 0),
            },
        };
        let e = Exp::mul(Exp::int(0), Exp::TEntry(Timing::Neither, item));
        // Even a zero factor does not make a storage read concrete.
        assert_eq!(eval(&e), None);
    }

    #[test]
    fn create_is_never_evaluable() {
        assert_eq!(eval(&Exp::Create("C".into(), vec![])), None);
    }

    #[test]
    fn bytes_concat_and_slice() {
        let e = Exp::cat(Exp::LitBytes("ab".into()), Exp::LitBytes("cd".into()));
        assert_eq!(eval(&e), Some(Value::Bytes("abcd".into())));
        let sliced = Exp::slice(e, Exp::int(1), Exp::int(3));
        assert_eq!(eval(&sliced), Some(Value::Bytes("bc".into())));
    }

    #[test]
    fn slice_out_of_bounds_is_not_a_value() {
        let e = Exp::slice(Exp::LitBytes("ab".into()), Exp::int(0), Exp::int(5));
        assert_eq!(eval(&e), None);
    }

    #[test]
    fn in_range_folds_against_abi_bounds() {
        let inside = Exp::in_range(AbiType::UInt(8), Exp::int(255));
        let outside = Exp::in_range(AbiType::UInt(8), Exp::int(256));
        assert_eq!(eval(&inside), Some(Value::Bool(true)));
        assert_eq!(eval(&outside), Some(Value::Bool(false)));
    }

    #[test]
    fn ite_selects_branch() {
        let e = Exp::ite(Exp::LitBool(false), Exp::int(1), Exp::int(2));
        assert_eq!(eval_int(&e), Some(BigInt::from(2)));
    }
}
