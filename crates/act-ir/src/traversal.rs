//! Pure folds over typed expressions: collectors for storage locations,
//! environment reads, calldata references and created contract names.
//! All collectors preserve first-occurrence order and de-duplicate.

use act_dsl::ast::{Entry, EthEnv, Expr, Index, Span};

use crate::storage::{StorageLocation, StorageRef};
use crate::timing::Timing;
use crate::types::{ActType, Exp};

/// Visit every node of the expression tree in pre-order, descending into
/// mapping index sub-expressions.
pub fn visit(e: &Exp, f: &mut impl FnMut(&Exp)) {
    f(e);
    match e {
        Exp::And(l, r)
        | Exp::Or(l, r)
        | Exp::Lt(l, r)
        | Exp::Le(l, r)
        | Exp::Gt(l, r)
        | Exp::Ge(l, r)
        | Exp::Eq(_, l, r)
        | Exp::NEq(_, l, r)
        | Exp::Add(l, r)
        | Exp::Sub(l, r)
        | Exp::Mul(l, r)
        | Exp::Div(l, r)
        | Exp::Mod(l, r)
        | Exp::Pow(l, r)
        | Exp::Cat(l, r) => {
            visit(l, f);
            visit(r, f);
        }
        Exp::Not(x) | Exp::InRange(_, x) => visit(x, f),
        Exp::Slice(b, lo, hi) => {
            visit(b, f);
            visit(lo, f);
            visit(hi, f);
        }
        Exp::Ite(_, c, t, e2) => {
            visit(c, f);
            visit(t, f);
            visit(e2, f);
        }
        Exp::TEntry(_, item) => visit_ref(&item.reference, f),
        Exp::Create(_, args) => {
            for a in args {
                visit(a, f);
            }
        }
        Exp::LitBool(_)
        | Exp::LitInt(_)
        | Exp::LitBytes(_)
        | Exp::Env(..)
        | Exp::Var(..) => {}
    }
}

fn visit_ref(r: &StorageRef, f: &mut impl FnMut(&Exp)) {
    match r {
        StorageRef::Var { .. } => {}
        StorageRef::Mapping { base, indices, .. } => {
            visit_ref(base, f);
            for ix in indices {
                visit(ix, f);
            }
        }
        StorageRef::Field { base, .. } => visit_ref(base, f),
    }
}

/// Every storage entry in the expression, with its timing, in occurrence
/// order (not de-duplicated).
pub fn entries(e: &Exp) -> Vec<(Timing, StorageLocation)> {
    let mut out = Vec::new();
    visit(e, &mut |node| {
        if let Exp::TEntry(t, item) = node {
            out.push((*t, item.clone()));
        }
    });
    out
}

/// Distinct storage locations referenced by the expression, ignoring
/// timing, in first-occurrence order.
pub fn locations(e: &Exp) -> Vec<StorageLocation> {
    let mut out: Vec<StorageLocation> = Vec::new();
    visit(e, &mut |node| {
        if let Exp::TEntry(_, item) = node {
            if !out.contains(item) {
                out.push(item.clone());
            }
        }
    });
    out
}

/// Distinct storage locations over several expressions.
pub fn locations_many<'a>(es: impl IntoIterator<Item = &'a Exp>) -> Vec<StorageLocation> {
    let mut out: Vec<StorageLocation> = Vec::new();
    for e in es {
        for loc in locations(e) {
            if !out.contains(&loc) {
                out.push(loc);
            }
        }
    }
    out
}

/// Distinct environment variables read by the expression.
pub fn eth_envs(e: &Exp) -> Vec<EthEnv> {
    let mut out: Vec<EthEnv> = Vec::new();
    visit(e, &mut |node| {
        if let Exp::Env(_, v) = node {
            if !out.contains(v) {
                out.push(*v);
            }
        }
    });
    out
}

/// Distinct environment variables over several expressions.
pub fn eth_envs_many<'a>(es: impl IntoIterator<Item = &'a Exp>) -> Vec<EthEnv> {
    let mut out: Vec<EthEnv> = Vec::new();
    for e in es {
        for v in eth_envs(e) {
            if !out.contains(&v) {
                out.push(v);
            }
        }
    }
    out
}

/// Distinct calldata references with their act-types.
pub fn calldata_vars(e: &Exp) -> Vec<(String, ActType)> {
    let mut out: Vec<(String, ActType)> = Vec::new();
    visit(e, &mut |node| {
        if let Exp::Var(t, name) = node {
            if !out.iter().any(|(n, _)| n == name) {
                out.push((name.clone(), *t));
            }
        }
    });
    out
}

/// Contract names mentioned by `Create` nodes.
pub fn created_contracts(e: &Exp) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    visit(e, &mut |node| {
        if let Exp::Create(c, _) = node {
            if !out.contains(c) {
                out.push(c.clone());
            }
        }
    });
    out
}

/// Identifiers with their source positions in an untyped expression, in
/// occurrence order. Used for diagnostics and tooling over raw ASTs.
pub fn idents_with_pos(e: &Expr) -> Vec<(String, Span)> {
    let mut out = Vec::new();
    collect_idents(e, &mut out);
    out
}

fn collect_idents(e: &Expr, out: &mut Vec<(String, Span)>) {
    match e {
        Expr::And(_, l, r)
        | Expr::Or(_, l, r)
        | Expr::Eq(_, l, r)
        | Expr::NEq(_, l, r)
        | Expr::Lt(_, l, r)
        | Expr::Gt(_, l, r)
        | Expr::LEq(_, l, r)
        | Expr::GEq(_, l, r)
        | Expr::Add(_, l, r)
        | Expr::Sub(_, l, r)
        | Expr::Mul(_, l, r)
        | Expr::Div(_, l, r)
        | Expr::Mod(_, l, r)
        | Expr::Pow(_, l, r)
        | Expr::Cat(_, l, r) => {
            collect_idents(l, out);
            collect_idents(r, out);
        }
        Expr::Not(_, x) => collect_idents(x, out),
        Expr::Ite(_, c, t, f) => {
            collect_idents(c, out);
            collect_idents(t, out);
            collect_idents(f, out);
        }
        Expr::Entry(_, entry) => collect_entry_idents(entry, out),
        Expr::IntLit(..) | Expr::BoolLit(..) | Expr::StrLit(..) | Expr::Env(..) => {}
    }
}

fn collect_entry_idents(entry: &Entry, out: &mut Vec<(String, Span)>) {
    out.push((entry.name.node.clone(), entry.name.span));
    for ix in &entry.indices {
        match ix {
            Index::Key(k) => collect_idents(k, out),
            Index::Slice { lo, hi, .. } => {
                collect_idents(lo, out);
                collect_idents(hi, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageItem;
    use act_dsl::ast::AbiType;

    fn var(name: &str) -> StorageItem {
        StorageItem {
            ty: ActType::Integer,
            abi: AbiType::UInt(256),
            reference: StorageRef::Var {
                contract: "C".into(),
                name: name.into(),
                span: Span::new(0, 0),
            },
        }
    }

    #[test]
    fn locations_are_deduplicated_in_order() {
        let x = Exp::TEntry(Timing::Neither, var("x"));
        let y = Exp::TEntry(Timing::Neither, var("y"));
        let e = Exp::and(
            Exp::lt(x.clone(), y.clone()),
            Exp::lt(y.clone(), x.clone()),
        );
        let locs = locations(&e);
        assert_eq!(locs.len(), 2);
        assert_eq!(locs[0].slot_name(), "x");
        assert_eq!(locs[1].slot_name(), "y");
    }

    #[test]
    fn same_slot_different_indices_are_distinct_locations() {
        let base = || {
            Box::new(StorageRef::Var {
                contract: "C".into(),
                name: "m".into(),
                span: Span::new(0, 0),
            })
        };
        let at = |k: i64| {
            Exp::TEntry(
                Timing::Neither,
                StorageItem {
                    ty: ActType::Integer,
                    abi: AbiType::UInt(256),
                    reference: StorageRef::Mapping {
                        base: base(),
                        indices: vec![Exp::int(k)],
                        span: Span::new(0, 0),
                    },
                },
            )
        };
        let e = Exp::eq(at(1), at(2));
        assert_eq!(locations(&e).len(), 2);
    }

    #[test]
    fn envs_inside_mapping_indices_are_found() {
        let item = StorageItem {
            ty: ActType::Integer,
            abi: AbiType::UInt(256),
            reference: StorageRef::Mapping {
                base: Box::new(StorageRef::Var {
                    contract: "C".into(),
                    name: "m".into(),
                    span: Span::new(0, 0),
                }),
                indices: vec![Exp::Env(ActType::Integer, EthEnv::Caller)],
                span: Span::new(0, 0),
            },
        };
        let e = Exp::TEntry(Timing::Neither, item);
        assert_eq!(eth_envs(&e), vec![EthEnv::Caller]);
    }

    #[test]
    fn created_contract_names() {
        let e = Exp::Create("Registry".into(), vec![Exp::int(1)]);
        assert_eq!(created_contracts(&e), vec!["Registry".to_string()]);
    }

    #[test]
    fn collectors_are_idempotent() {
        let x = Exp::TEntry(Timing::Neither, var("x"));
        let e = Exp::add(x.clone(), x.clone());
        assert_eq!(locations(&e), locations(&e));
        assert_eq!(locations(&e).len(), 1);
    }
}
