//! Grammar round-trip property: for any expression tree, pretty-printing and
//! reparsing yields the same tree (modulo positions), observed through the
//! printer itself.

use act_dsl::ast::{CaseGuard, Cases, Entry, EntryTime, EthEnv, Expr, Index, RawBehaviour, Span};
use act_dsl::fmt::format_expr;
use act_dsl::parser::parse;
use num::BigInt;
use proptest::prelude::*;

fn sp() -> Span {
    Span::new(0, 0)
}

fn ident() -> impl Strategy<Value = String> {
    // Simple names that cannot collide with keywords or env identifiers.
    "[a-z][a-z0-9]{0,6}".prop_map(|s| format!("v{s}"))
}

fn env() -> impl Strategy<Value = EthEnv> {
    prop::sample::select(EthEnv::ALL.to_vec())
}

fn leaf() -> impl Strategy<Value = Expr> {
    prop_oneof![
        (0u128..=u128::MAX).prop_map(|n| Expr::IntLit(sp(), BigInt::from(n))),
        any::<bool>().prop_map(|b| Expr::BoolLit(sp(), b)),
        env().prop_map(|e| Expr::Env(sp(), e)),
        ident().prop_map(|name| {
            Expr::Entry(
                EntryTime::Untimed,
                Entry {
                    name: act_dsl::ast::Spanned::new(name, sp()),
                    indices: vec![],
                    contract: None,
                    span: sp(),
                },
            )
        }),
    ]
}

fn expr() -> impl Strategy<Value = Expr> {
    leaf().prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Expr::And(sp(), Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Expr::Or(sp(), Box::new(l), Box::new(r))),
            inner.clone().prop_map(|e| Expr::Not(sp(), Box::new(e))),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Expr::Eq(sp(), Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Expr::Lt(sp(), Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Expr::Add(sp(), Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Expr::Sub(sp(), Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Expr::Mul(sp(), Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Expr::Pow(sp(), Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone(), inner.clone()).prop_map(|(c, t, f)| Expr::Ite(
                sp(),
                Box::new(c),
                Box::new(t),
                Box::new(f)
            )),
            (inner.clone(), ident()).prop_map(|(k, name)| {
                Expr::Entry(
                    EntryTime::Untimed,
                    Entry {
                        name: act_dsl::ast::Spanned::new(name, sp()),
                        indices: vec![Index::Key(k)],
                        contract: None,
                        span: sp(),
                    },
                )
            }),
        ]
    })
}

fn reparse_single_guard(printed: &str) -> Expr {
    let source = format!("behaviour f of C\ninterface f()\ncase {printed}:\n  returns 0\n");
    let act = parse(&source, "prop.act").expect("generated expression should parse");
    let RawBehaviour::Transition(t) = &act.behaviours[0] else {
        panic!("expected transition");
    };
    let Cases::Branches(branches) = &t.cases else {
        panic!("expected branches");
    };
    let CaseGuard::Cond(e) = &branches[0].guard else {
        panic!("expected condition");
    };
    e.clone()
}

proptest! {
    #[test]
    fn print_parse_print_is_stable(e in expr()) {
        let printed = format_expr(&e);
        let reparsed = reparse_single_guard(&printed);
        prop_assert_eq!(format_expr(&reparsed), printed);
    }
}
