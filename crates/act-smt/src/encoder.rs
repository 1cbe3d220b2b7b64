//! SMT-LIB2 query synthesis: postcondition queries for every claim and
//! inductive invariant queries (constructor establishment plus preservation
//! by each behaviour). A query is unsatisfiable exactly when the property
//! holds.

use indexmap::IndexMap;

use act_ir::errors::InternalError;
use act_ir::eval;
use act_ir::storage::{Rewrite, StorageItem, StorageRef};
use act_ir::timing::{set_time, Timing};
use act_ir::traversal;
use act_ir::types::{Act, ActType, Behaviour, Constructor, Exp, Interface, Invariant};
use act_ir::{abi, env as ethenv};
use num::BigInt;

use crate::sorts::{sort_of, sort_of_abi, sort_of_slot};

/// A single proof obligation: SMT-LIB2 script (declarations then
/// assertions, one command per line) and the model fields to read back on
/// `sat`.
#[derive(Debug, Clone)]
pub struct Query {
    pub name: String,
    pub script: Vec<String>,
    pub model: ModelSpec,
}

/// One value to extract from a satisfying assignment.
#[derive(Debug, Clone)]
pub struct ModelField {
    /// The term passed to `(get-value …)`.
    pub smt_expr: String,
    /// How the field renders in the counterexample report.
    pub display: String,
    pub ty: ActType,
}

/// Model fields grouped the way the counterexample report prints them.
#[derive(Debug, Clone, Default)]
pub struct ModelSpec {
    pub calldata: Vec<ModelField>,
    pub environment: Vec<ModelField>,
    pub prestate: Vec<ModelField>,
    pub poststate: Vec<ModelField>,
}

/// Generate every query of the program: postcondition queries for each
/// constructor and behaviour claim, then the invariant query group per
/// contract.
pub fn queries(act: &Act) -> Result<Vec<Query>, InternalError> {
    let mut out = Vec::new();
    for contract in &act.contracts {
        for ctor in &contract.constructors {
            for (i, post) in ctor.postconditions.iter().enumerate() {
                out.push(constructor_postcondition(act, ctor, i, post)?);
            }
        }
        for (j, b) in contract.behaviours.iter().enumerate() {
            for (i, post) in b.postconditions.iter().enumerate() {
                out.push(behaviour_postcondition(act, b, j, i, post)?);
            }
        }
        for (i, inv) in contract.invariants().iter().enumerate() {
            out.push(invariant_constructor(act, &contract.constructors[0], inv, i)?);
            for (j, b) in contract.behaviours.iter().enumerate() {
                out.push(invariant_behaviour(act, inv, i, b, j)?);
            }
        }
    }
    tracing::debug!(count = out.len(), "synthesized SMT queries");
    Ok(out)
}

// ---------------------------------------------------------------------
// Individual query shapes
// ---------------------------------------------------------------------

fn constructor_postcondition(
    act: &Act,
    ctor: &Constructor,
    i: usize,
    post: &Exp,
) -> Result<Query, InternalError> {
    let mut assertions = Vec::new();
    for p in &ctor.preconditions {
        assertions.push(set_time(p, Timing::Pre));
    }
    assertions.extend(initial_update_assertions(&ctor.initial_storage));
    assertions.extend(rewrite_assertions(&ctor.ext_storage));
    assertions.push(Exp::not(post.clone()));

    build_query(
        act,
        format!(
            "{}.constructor.{}.postcondition[{}]",
            ctor.contract, ctor.mode, i
        ),
        &ctor.interface,
        assertions,
    )
}

fn behaviour_postcondition(
    act: &Act,
    b: &Behaviour,
    j: usize,
    i: usize,
    post: &Exp,
) -> Result<Query, InternalError> {
    let mut assertions = Vec::new();
    for p in b.preconditions.iter().chain(&b.case_conditions) {
        assertions.push(set_time(p, Timing::Pre));
    }
    assertions.extend(rewrite_assertions(&b.state_updates));
    assertions.push(Exp::not(post.clone()));

    build_query(
        act,
        format!(
            "{}.{}[{}].{}.postcondition[{}]",
            b.contract, b.name, j, b.mode, i
        ),
        &b.interface,
        assertions,
    )
}

/// The base case of the induction: the constructor establishes the
/// invariant in the post-state.
fn invariant_constructor(
    act: &Act,
    ctor: &Constructor,
    inv: &Invariant,
    i: usize,
) -> Result<Query, InternalError> {
    let (_, inv_post) = inv.predicate_pair();
    let mut assertions = Vec::new();
    assertions.extend(initial_update_assertions(&ctor.initial_storage));
    assertions.extend(rewrite_assertions(&ctor.ext_storage));
    for p in ctor.preconditions.iter().chain(&inv.preconditions) {
        assertions.push(set_time(p, Timing::Pre));
    }
    for bound in &inv.storage_bounds {
        assertions.push(set_time(bound, Timing::Post));
    }
    assertions.push(Exp::not(inv_post));

    build_query(
        act,
        format!("{}.invariant[{}].constructor", inv.contract, i),
        &ctor.interface,
        assertions,
    )
}

/// The inductive step: assuming the invariant over the pre-state, the
/// behaviour's updates preserve it in the post-state. Invariant locations
/// the behaviour does not touch are constrained read-only.
fn invariant_behaviour(
    act: &Act,
    inv: &Invariant,
    i: usize,
    b: &Behaviour,
    j: usize,
) -> Result<Query, InternalError> {
    let (inv_pre, inv_post) = inv.predicate_pair();
    let mut assertions = vec![inv_pre];
    for bound in &inv.storage_bounds {
        assertions.push(set_time(bound, Timing::Pre));
    }
    for p in b.preconditions.iter().chain(&b.case_conditions) {
        assertions.push(set_time(p, Timing::Pre));
    }
    assertions.extend(rewrite_assertions(&b.state_updates));

    // Frame: invariant slots not written by this behaviour keep their value.
    let touched: Vec<(String, String)> = b
        .state_updates
        .iter()
        .map(|rw| rw.location().slot_id())
        .collect();
    for loc in traversal::locations(&inv.predicate) {
        if !touched.contains(&loc.slot_id()) {
            assertions.push(constant_assertion(&loc.map_indices(&|ix| set_time(ix, Timing::Pre))));
        }
    }

    assertions.push(Exp::not(inv_post));

    build_query(
        act,
        format!(
            "{}.invariant[{}].{}[{}].{}",
            inv.contract, i, b.name, j, b.mode
        ),
        &b.interface,
        assertions,
    )
}

// ---------------------------------------------------------------------
// Assertion forms
// ---------------------------------------------------------------------

fn initial_update_assertions(updates: &[act_ir::storage::StorageUpdate]) -> Vec<Exp> {
    updates
        .iter()
        .map(|u| Exp::eq(u.item.entry(Timing::Post), u.rhs.clone()))
        .collect()
}

fn rewrite_assertions(rewrites: &[Rewrite]) -> Vec<Exp> {
    rewrites
        .iter()
        .map(|rw| match rw {
            Rewrite::Update(u) => Exp::eq(u.item.entry(Timing::Post), u.rhs.clone()),
            Rewrite::Constant(loc) => constant_assertion(loc),
        })
        .collect()
}

fn constant_assertion(loc: &StorageItem) -> Exp {
    Exp::eq(loc.entry(Timing::Pre), loc.entry(Timing::Post))
}

// ---------------------------------------------------------------------
// Script assembly
// ---------------------------------------------------------------------

fn build_query(
    act: &Act,
    name: String,
    interface: &Interface,
    assertions: Vec<Exp>,
) -> Result<Query, InternalError> {
    let mut script = Vec::new();

    // Storage declarations: exactly the slot/timing pairs the assertions
    // reference. Slots only created by a constructor naturally appear in
    // their `Post` form alone.
    let mut slots: IndexMap<(String, String), (bool, bool)> = IndexMap::new();
    let mut entry_fields: Vec<(Timing, StorageItem)> = Vec::new();
    for a in &assertions {
        for (timing, item) in traversal::entries(a) {
            let flags = slots.entry(item.slot_id()).or_insert((false, false));
            match timing {
                Timing::Pre => flags.0 = true,
                Timing::Post => flags.1 = true,
                Timing::Neither => {
                    return Err(InternalError::Assertion(
                        "untimed storage reference reached the SMT encoder".into(),
                    ))
                }
            }
            if !entry_fields
                .iter()
                .any(|(t, it)| *t == timing && *it == item)
            {
                entry_fields.push((timing, item));
            }
        }
    }

    script.push("; storage".to_string());
    for ((contract, slot_name), (pre, post)) in slots.iter() {
        let Some(slot) = act.store.slot(contract, slot_name) else {
            return Err(InternalError::Assertion(format!(
                "slot {contract}.{slot_name} missing from the store"
            )));
        };
        let sort = sort_of_slot(slot)?;
        if *pre {
            script.push(format!("(declare-const {contract}_{slot_name}_Pre {sort})"));
        }
        if *post {
            script.push(format!("(declare-const {contract}_{slot_name}_Post {sort})"));
        }
    }

    script.push("; calldata".to_string());
    let mut calldata_fields = Vec::new();
    for (arg, abi) in &interface.args {
        let sort = sort_of_abi(*abi)?;
        let smt_name = calldata_name(&interface.name, arg);
        script.push(format!("(declare-const {smt_name} {sort})"));
        calldata_fields.push(ModelField {
            smt_expr: smt_name,
            display: arg.clone(),
            ty: abi::act_type(*abi),
        });
    }

    script.push("; environment".to_string());
    let mut env_fields = Vec::new();
    for v in traversal::eth_envs_many(assertions.iter()) {
        let ty = ethenv::env_type(v);
        script.push(format!(
            "(declare-const {} {})",
            ethenv::smt_name(v),
            sort_of(ty)?
        ));
        env_fields.push(ModelField {
            smt_expr: ethenv::smt_name(v).to_string(),
            display: v.source_name().to_string(),
            ty,
        });
    }

    script.push("; assertions".to_string());
    for a in &assertions {
        let encoded = encode(a, &interface.name)?;
        let line = format!("(assert {encoded})");
        if !script.contains(&line) {
            script.push(line);
        }
    }

    // Model fields for each referenced location, pre and/or post.
    let mut model = ModelSpec {
        calldata: calldata_fields,
        environment: env_fields,
        ..ModelSpec::default()
    };
    for (timing, item) in entry_fields {
        let field = ModelField {
            smt_expr: encode_ref(&item.reference, timing, &interface.name)?,
            display: display_location(&item, &interface.name)?,
            ty: item.ty,
        };
        match timing {
            Timing::Pre => model.prestate.push(field),
            Timing::Post => model.poststate.push(field),
            Timing::Neither => unreachable!("rejected above"),
        }
    }

    Ok(Query {
        name,
        script,
        model,
    })
}

fn calldata_name(iface: &str, arg: &str) -> String {
    format!("{iface}_{arg}")
}

fn display_location(item: &StorageItem, iface: &str) -> Result<String, InternalError> {
    let mut s = item.slot_name().to_string();
    for ix in item.reference.indices() {
        s.push('[');
        s.push_str(&encode(ix, iface)?);
        s.push(']');
    }
    Ok(s)
}

// ---------------------------------------------------------------------
// Expression encoding
// ---------------------------------------------------------------------

fn int_lit(n: &BigInt) -> String {
    if n.sign() == num::bigint::Sign::Minus {
        format!("(- {})", -n)
    } else {
        n.to_string()
    }
}

fn str_lit(s: &str) -> String {
    // SMT-LIB escapes a quote by doubling it.
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Print a typed expression as an SMT-LIB2 term. Storage references must
/// carry a `Pre` or `Post` timing by this point.
pub fn encode(e: &Exp, iface: &str) -> Result<String, InternalError> {
    let bin = |op: &str, l: &Exp, r: &Exp| -> Result<String, InternalError> {
        Ok(format!("({op} {} {})", encode(l, iface)?, encode(r, iface)?))
    };
    match e {
        Exp::And(l, r) => bin("and", l, r),
        Exp::Or(l, r) => bin("or", l, r),
        Exp::Not(x) => Ok(format!("(not {})", encode(x, iface)?)),
        Exp::LitBool(b) => Ok(b.to_string()),
        Exp::Lt(l, r) => bin("<", l, r),
        Exp::Le(l, r) => bin("<=", l, r),
        Exp::Gt(l, r) => bin(">", l, r),
        Exp::Ge(l, r) => bin(">=", l, r),
        Exp::Eq(_, l, r) => bin("=", l, r),
        Exp::NEq(_, l, r) => Ok(format!(
            "(not (= {} {}))",
            encode(l, iface)?,
            encode(r, iface)?
        )),
        Exp::InRange(abi_ty, x) => {
            let Some((lo, hi)) = abi::bounds(*abi_ty) else {
                return Err(InternalError::Assertion(format!(
                    "in-range predicate over unbounded type {abi_ty}"
                )));
            };
            let inner = encode(x, iface)?;
            Ok(format!(
                "(and (<= {} {inner}) (<= {inner} {}))",
                int_lit(&lo),
                int_lit(&hi)
            ))
        }
        Exp::Add(l, r) => bin("+", l, r),
        Exp::Sub(l, r) => bin("-", l, r),
        Exp::Mul(l, r) => bin("*", l, r),
        Exp::Div(l, r) => bin("div", l, r),
        Exp::Mod(l, r) => bin("mod", l, r),
        Exp::Pow(base, exp) => {
            // No symbolic exponentiation in the logic: fold a fully concrete
            // power, otherwise expand a concrete exponent into a product.
            if let Some(v) = eval::eval_int(e) {
                return Ok(int_lit(&v));
            }
            let Some(n) = eval::eval_int(exp) else {
                return Err(InternalError::SymbolicExponent);
            };
            let Ok(n) = u32::try_from(&n) else {
                return Err(InternalError::SymbolicExponent);
            };
            let b = encode(base, iface)?;
            Ok(match n {
                0 => "1".to_string(),
                1 => b,
                _ => format!("(* {})", vec![b; n as usize].join(" ")),
            })
        }
        Exp::LitInt(n) => Ok(int_lit(n)),
        Exp::Cat(l, r) => bin("str.++", l, r),
        Exp::Slice(..) => match eval::eval(e) {
            Some(eval::Value::Bytes(s)) => Ok(str_lit(&s)),
            _ => Err(InternalError::SymbolicSlice),
        },
        Exp::LitBytes(s) => Ok(str_lit(s)),
        Exp::Env(_, v) => Ok(ethenv::smt_name(*v).to_string()),
        Exp::Ite(_, c, t, f) => Ok(format!(
            "(ite {} {} {})",
            encode(c, iface)?,
            encode(t, iface)?,
            encode(f, iface)?
        )),
        Exp::Var(_, name) => Ok(calldata_name(iface, name)),
        Exp::TEntry(timing, item) => encode_ref(&item.reference, *timing, iface),
        Exp::Create(..) => Err(InternalError::ExtCreates),
    }
}

fn encode_ref(r: &StorageRef, timing: Timing, iface: &str) -> Result<String, InternalError> {
    let suffix = match timing {
        Timing::Pre => "Pre",
        Timing::Post => "Post",
        Timing::Neither => {
            return Err(InternalError::Assertion(
                "untimed storage reference reached the SMT encoder".into(),
            ))
        }
    };
    match r {
        StorageRef::Var { contract, name, .. } => Ok(format!("{contract}_{name}_{suffix}")),
        StorageRef::Mapping { base, indices, .. } => {
            let mut term = encode_ref(base, timing, iface)?;
            for ix in indices {
                term = format!("(select {term} {})", encode(ix, iface)?);
            }
            Ok(term)
        }
        StorageRef::Field { .. } => Err(InternalError::FieldAccess),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use act_dsl::ast::{AbiType, Span};
    use act_dsl::parser::parse;
    use act_ir::typecheck::typecheck;

    fn compile(src: &str) -> Act {
        let raw = parse(src, "t.act").unwrap();
        typecheck(&raw, src, "t.act").unwrap()
    }

    const TOKEN: &str = r#"
behaviour init of Token
interface constructor(uint256 _totalSupply)

creates
  uint256 totalSupply := _totalSupply
  mapping(address => uint256) balanceOf := [CALLER := _totalSupply]

invariants
  totalSupply >= 0

behaviour transfer of Token
interface transfer(uint256 value, address to)

iff
  CALLVALUE == 0

iff in range uint256
  balanceOf[CALLER] - value
  balanceOf[to] + value

case CALLER =/= to:

   storage
     balanceOf[CALLER] => balanceOf[CALLER] - value
     balanceOf[to] => balanceOf[to] + value

   returns 1

case _:

   returns 1

ensures
  post(totalSupply) == pre(totalSupply)
"#;

    #[test]
    fn token_queries_cover_postconditions_and_invariants() {
        let act = compile(TOKEN);
        let qs = queries(&act).unwrap();
        let names: Vec<&str> = qs.iter().map(|q| q.name.as_str()).collect();
        // 2 pass cases x 1 ensures, plus invariant ctor + 4 behaviour claims.
        assert!(names.contains(&"Token.transfer[0].pass.postcondition[0]"));
        assert!(names.contains(&"Token.invariant[0].constructor"));
        assert!(names.contains(&"Token.invariant[0].transfer[0].pass"));
        assert!(names.contains(&"Token.invariant[0].transfer[2].fail"));
        assert_eq!(qs.len(), 2 + 1 + 4);
    }

    #[test]
    fn update_assertions_bind_the_post_state() {
        let act = compile(TOKEN);
        let qs = queries(&act).unwrap();
        let q = qs
            .iter()
            .find(|q| q.name == "Token.transfer[0].pass.postcondition[0]")
            .unwrap();
        let script = q.script.join("\n");
        assert!(script.contains(
            "(assert (= (select Token_balanceOf_Post transfer_to) \
             (+ (select Token_balanceOf_Pre transfer_to) transfer_value)))"
        ));
        // The negated postcondition closes the query.
        assert!(script
            .contains("(assert (not (= Token_totalSupply_Post Token_totalSupply_Pre)))"));
    }

    #[test]
    fn declarations_cover_storage_calldata_environment() {
        let act = compile(TOKEN);
        let qs = queries(&act).unwrap();
        let q = qs
            .iter()
            .find(|q| q.name == "Token.transfer[0].pass.postcondition[0]")
            .unwrap();
        let script = q.script.join("\n");
        assert!(script.contains("(declare-const Token_balanceOf_Pre (Array Int Int))"));
        assert!(script.contains("(declare-const Token_balanceOf_Post (Array Int Int))"));
        assert!(script.contains("(declare-const transfer_value Int)"));
        assert!(script.contains("(declare-const transfer_to Int)"));
        assert!(script.contains("(declare-const caller Int)"));
        assert!(script.contains("(declare-const callvalue Int)"));
    }

    #[test]
    fn constructor_created_slots_have_only_a_post_form() {
        let act = compile(TOKEN);
        let qs = queries(&act).unwrap();
        let q = qs
            .iter()
            .find(|q| q.name == "Token.invariant[0].constructor")
            .unwrap();
        let script = q.script.join("\n");
        assert!(script.contains("Token_totalSupply_Post"));
        assert!(!script.contains("Token_totalSupply_Pre"));
    }

    #[test]
    fn untouched_invariant_locations_are_framed_constant() {
        let act = compile(TOKEN);
        let qs = queries(&act).unwrap();
        // Neither transfer case writes totalSupply, so it is framed.
        let q = qs
            .iter()
            .find(|q| q.name == "Token.invariant[0].transfer[0].pass")
            .unwrap();
        let script = q.script.join("\n");
        assert!(script.contains("(assert (= Token_totalSupply_Pre Token_totalSupply_Post))"));
    }

    #[test]
    fn negative_literals_use_prefix_minus() {
        assert_eq!(int_lit(&BigInt::from(-5)), "(- 5)");
        assert_eq!(int_lit(&BigInt::from(5)), "5");
        assert_eq!(int_lit(&BigInt::from(0)), "0");
    }

    #[test]
    fn concrete_exponents_expand_to_products() {
        let e = Exp::pow(Exp::Var(ActType::Integer, "x".into()), Exp::int(3));
        assert_eq!(encode(&e, "f").unwrap(), "(* f_x f_x f_x)");
        let e = Exp::pow(Exp::Var(ActType::Integer, "x".into()), Exp::int(1));
        assert_eq!(encode(&e, "f").unwrap(), "f_x");
        let e = Exp::pow(Exp::Var(ActType::Integer, "x".into()), Exp::int(0));
        assert_eq!(encode(&e, "f").unwrap(), "1");
    }

    #[test]
    fn fully_concrete_powers_fold_to_literals() {
        let e = Exp::pow(Exp::int(2), Exp::int(256));
        assert_eq!(
            encode(&e, "f").unwrap(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639936"
        );
    }

    #[test]
    fn symbolic_exponents_are_internal_errors() {
        let e = Exp::pow(Exp::int(2), Exp::Var(ActType::Integer, "n".into()));
        assert!(matches!(
            encode(&e, "f"),
            Err(InternalError::SymbolicExponent)
        ));
    }

    #[test]
    fn field_access_is_an_internal_error() {
        let item = StorageItem {
            ty: ActType::Integer,
            abi: AbiType::UInt(256),
            reference: StorageRef::Field {
                base: Box::new(StorageRef::Var {
                    contract: "C".into(),
                    name: "s".into(),
                    span: Span::new(0, 0),
                }),
                name: "x".into(),
                span: Span::new(0, 0),
            },
        };
        let e = item.entry(Timing::Pre);
        assert!(matches!(encode(&e, "f"), Err(InternalError::FieldAccess)));
    }

    #[test]
    fn create_is_an_internal_error() {
        let e = Exp::Create("C".into(), vec![]);
        assert!(matches!(encode(&e, "f"), Err(InternalError::ExtCreates)));
    }

    #[test]
    fn untimed_entries_are_rejected_by_the_encoder() {
        let item = StorageItem {
            ty: ActType::Integer,
            abi: AbiType::UInt(256),
            reference: StorageRef::Var {
                contract: "C".into(),
                name: "x".into(),
                span: Span::new(0, 0),
            },
        };
        let e = item.entry(Timing::Neither);
        assert!(matches!(encode(&e, "f"), Err(InternalError::Assertion(_))));
    }

    #[test]
    fn string_literals_are_quoted_and_escaped() {
        assert_eq!(str_lit("abc"), "\"abc\"");
        assert_eq!(str_lit("a\"b"), "\"a\"\"b\"");
    }
}
