//! Canonical pretty-printer for the untyped AST.
//!
//! Printing an AST and reparsing the output yields an AST equal to the
//! original modulo source positions; the grammar round-trip tests rely on
//! this.

use std::fmt::Write;

use crate::ast::*;

pub fn format_act(act: &RawAct) -> String {
    let mut out = String::new();
    for (i, b) in act.behaviours.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        match b {
            RawBehaviour::Transition(t) => format_transition(&mut out, t),
            RawBehaviour::Definition(d) => format_definition(&mut out, d),
        }
    }
    out
}

fn format_transition(out: &mut String, t: &Transition) {
    let _ = writeln!(out, "behaviour {} of {}", t.name.node, t.contract.node);
    format_interface(out, &t.interface);
    format_iffs(out, &t.iffs);
    match &t.cases {
        Cases::Direct(post) => format_post(out, post, ""),
        Cases::Branches(branches) => format_branches(out, branches, ""),
    }
    format_expr_block(out, "ensures", &t.ensures);
}

fn format_definition(out: &mut String, d: &Definition) {
    let _ = writeln!(out, "behaviour {} of {}", d.name.node, d.contract.node);
    format_interface(out, &d.interface);
    format_iffs(out, &d.iffs);
    if !d.creates.is_empty() {
        let _ = writeln!(out, "creates");
        for a in &d.creates {
            let _ = writeln!(out, "  {}", format_assign(a));
        }
    }
    if !d.ext_storage.is_empty() {
        let _ = writeln!(out, "storage");
        for entry in &d.ext_storage {
            match &entry.rhs {
                Some(rhs) => {
                    let _ = writeln!(
                        out,
                        "  {} => {}",
                        format_entry(&entry.entry),
                        format_expr(rhs)
                    );
                }
                None => {
                    let _ = writeln!(out, "  {}", format_entry(&entry.entry));
                }
            }
        }
    }
    format_expr_block(out, "ensures", &d.ensures);
    format_expr_block(out, "invariants", &d.invariants);
}

fn format_interface(out: &mut String, iface: &Interface) {
    let decls: Vec<String> = iface
        .decls
        .iter()
        .map(|d| format!("{} {}", d.abi, d.name.node))
        .collect();
    let _ = writeln!(out, "interface {}({})", iface.name.node, decls.join(", "));
}

fn format_iffs(out: &mut String, iffs: &[IffBlock]) {
    for block in iffs {
        match block.range {
            Some(abi) => {
                let _ = writeln!(out, "iff in range {abi}");
            }
            None => {
                let _ = writeln!(out, "iff");
            }
        }
        for e in &block.exprs {
            let _ = writeln!(out, "  {}", format_expr(e));
        }
    }
}

fn format_expr_block(out: &mut String, keyword: &str, exprs: &[Expr]) {
    if exprs.is_empty() {
        return;
    }
    let _ = writeln!(out, "{keyword}");
    for e in exprs {
        let _ = writeln!(out, "  {}", format_expr(e));
    }
}

fn format_branches(out: &mut String, branches: &[Branch], indent: &str) {
    for b in branches {
        let guard = match &b.guard {
            CaseGuard::Cond(e) => format_expr(e),
            CaseGuard::Wildcard(_) => "_".to_string(),
        };
        let _ = writeln!(out, "{indent}case {guard}:");
        match &b.body {
            CaseBody::Leaf(post) => format_post(out, post, &format!("{indent}  ")),
            CaseBody::Nested(inner) => format_branches(out, inner, &format!("{indent}  ")),
        }
    }
}

fn format_post(out: &mut String, post: &Post, indent: &str) {
    if post.storage.is_empty() && post.returns.is_none() {
        let _ = writeln!(out, "{indent}noop");
        return;
    }
    if !post.storage.is_empty() {
        let _ = writeln!(out, "{indent}storage");
        for entry in &post.storage {
            match &entry.rhs {
                Some(rhs) => {
                    let _ = writeln!(
                        out,
                        "{indent}  {} => {}",
                        format_entry(&entry.entry),
                        format_expr(rhs)
                    );
                }
                None => {
                    let _ = writeln!(out, "{indent}  {}", format_entry(&entry.entry));
                }
            }
        }
    }
    if let Some(r) = &post.returns {
        let _ = writeln!(out, "{indent}returns {}", format_expr(r));
    }
}

fn format_assign(a: &Assign) -> String {
    let rhs = match &a.rhs {
        AssignRhs::Expr(e) => format_expr(e),
        AssignRhs::MappingLit(pairs) => {
            let inner: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("{} := {}", format_expr(k), format_expr(v)))
                .collect();
            format!("[{}]", inner.join(", "))
        }
        AssignRhs::StructLit(fields) => {
            let inner: Vec<String> = fields
                .iter()
                .map(|(f, v)| format!("{} := {}", f.node, format_expr(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    };
    format!("{} {} := {}", a.slot, a.name.node, rhs)
}

fn format_entry(e: &Entry) -> String {
    let mut s = e.name.node.clone();
    for idx in &e.indices {
        match idx {
            Index::Key(k) => {
                let _ = write!(s, "[{}]", format_expr(k));
            }
            Index::Slice { lo, hi, .. } => {
                let _ = write!(s, "[{}..{}]", format_expr(lo), format_expr(hi));
            }
        }
    }
    if let Some(c) = &e.contract {
        let _ = write!(s, " at {}", c.node);
    }
    s
}

// Operator precedence levels matching the parser; higher binds tighter.
fn prec(e: &Expr) -> u8 {
    match e {
        Expr::Ite(..) => 0,
        Expr::Or(..) => 1,
        Expr::And(..) => 2,
        Expr::Not(..) => 3,
        Expr::Eq(..)
        | Expr::NEq(..)
        | Expr::Lt(..)
        | Expr::Gt(..)
        | Expr::LEq(..)
        | Expr::GEq(..) => 4,
        Expr::Cat(..) => 5,
        Expr::Add(..) | Expr::Sub(..) => 6,
        Expr::Mul(..) | Expr::Div(..) | Expr::Mod(..) => 7,
        Expr::Pow(..) => 8,
        _ => 10,
    }
}

fn child(e: &Expr, min_prec: u8) -> String {
    if prec(e) < min_prec {
        format!("({})", format_expr(e))
    } else {
        format_expr(e)
    }
}

pub fn format_expr(e: &Expr) -> String {
    match e {
        // Left-associative: the right operand needs parens at equal level.
        Expr::Or(_, l, r) => format!("{} or {}", child(l, 1), child(r, 2)),
        Expr::And(_, l, r) => format!("{} and {}", child(l, 2), child(r, 3)),
        Expr::Not(_, x) => format!("not {}", child(x, 3)),
        // Non-associative comparisons: both sides need a higher level.
        Expr::Eq(_, l, r) => format!("{} == {}", child(l, 5), child(r, 5)),
        Expr::NEq(_, l, r) => format!("{} =/= {}", child(l, 5), child(r, 5)),
        Expr::Lt(_, l, r) => format!("{} < {}", child(l, 5), child(r, 5)),
        Expr::Gt(_, l, r) => format!("{} > {}", child(l, 5), child(r, 5)),
        Expr::LEq(_, l, r) => format!("{} <= {}", child(l, 5), child(r, 5)),
        Expr::GEq(_, l, r) => format!("{} >= {}", child(l, 5), child(r, 5)),
        Expr::Cat(_, l, r) => format!("{} ++ {}", child(l, 5), child(r, 6)),
        Expr::Add(_, l, r) => format!("{} + {}", child(l, 6), child(r, 7)),
        Expr::Sub(_, l, r) => format!("{} - {}", child(l, 6), child(r, 7)),
        Expr::Mul(_, l, r) => format!("{} * {}", child(l, 7), child(r, 8)),
        Expr::Div(_, l, r) => format!("{} / {}", child(l, 7), child(r, 8)),
        Expr::Mod(_, l, r) => format!("{} % {}", child(l, 7), child(r, 8)),
        // Right-associative.
        Expr::Pow(_, l, r) => format!("{} ^ {}", child(l, 9), child(r, 8)),
        Expr::Ite(_, c, t, f) => format!(
            "if {} then {} else {}",
            format_expr(c),
            format_expr(t),
            format_expr(f)
        ),
        Expr::IntLit(_, n) => n.to_string(),
        Expr::BoolLit(_, b) => b.to_string(),
        Expr::StrLit(_, s) => format!("\"{s}\""),
        Expr::Env(_, env) => env.to_string(),
        Expr::Entry(time, entry) => match time {
            EntryTime::Untimed => format_entry(entry),
            EntryTime::Pre => format!("pre({})", format_entry(entry)),
            EntryTime::Post => format!("post({})", format_entry(entry)),
        },
    }
}
