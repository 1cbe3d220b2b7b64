use act_dsl::ast::{Branch, CaseBody, CaseGuard, Cases, Post};

use crate::errors::{ErrCtx, TypeError};
use crate::types::{ActType, Exp};

use super::expr::{check_expr, ExprEnv, TimeMode};

/// Flatten a case tree into a list of (guard, body) pairs.
///
/// A direct (caseless) body becomes a single case guarded by `true`. In a
/// branch list the final wildcard's guard becomes the negation of the
/// disjunction of its siblings' guards; a wildcard anywhere else is an
/// error. Nested branch guards are conjoined with their ancestors'.
pub(crate) fn normalize<'c>(
    env: &ExprEnv<'_>,
    ctx: &ErrCtx<'_>,
    cases: &'c Cases,
    errors: &mut Vec<TypeError>,
) -> Vec<(Exp, &'c Post)> {
    match cases {
        Cases::Direct(post) => vec![(Exp::LitBool(true), post)],
        Cases::Branches(branches) => normalize_branches(env, ctx, branches, errors),
    }
}

fn normalize_branches<'c>(
    env: &ExprEnv<'_>,
    ctx: &ErrCtx<'_>,
    branches: &'c [Branch],
    errors: &mut Vec<TypeError>,
) -> Vec<(Exp, &'c Post)> {
    let mut sibling_guards: Vec<Exp> = Vec::new();
    let mut out = Vec::new();

    for (i, branch) in branches.iter().enumerate() {
        let guard = match &branch.guard {
            CaseGuard::Cond(e) => {
                match check_expr(env, ctx, e, ActType::Boolean, TimeMode::Untimed) {
                    Ok(g) => g,
                    Err(err) => {
                        errors.push(err);
                        Exp::LitBool(true)
                    }
                }
            }
            CaseGuard::Wildcard(span) => {
                if i != branches.len() - 1 {
                    errors.push(TypeError::WildcardNotLast {
                        span: ctx.at(*span),
                        src: ctx.src(),
                    });
                }
                Exp::not(Exp::disj(sibling_guards.clone()))
            }
        };

        match &branch.body {
            CaseBody::Leaf(post) => out.push((guard.clone(), post)),
            CaseBody::Nested(inner) => {
                for (g, post) in normalize_branches(env, ctx, inner, errors) {
                    out.push((Exp::and(guard.clone(), g), post));
                }
            }
        }

        if matches!(branch.guard, CaseGuard::Cond(_)) {
            sibling_guards.push(guard);
        }
    }

    out
}
