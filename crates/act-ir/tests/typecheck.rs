use act_dsl::parser::parse;
use act_ir::errors::{CheckFailure, InternalError, TypeError};
use act_ir::storage::Rewrite;
use act_ir::timing::Timing;
use act_ir::traversal;
use act_ir::typecheck::typecheck;
use act_ir::types::{Act, Exp, Mode};

const TOKEN: &str = r#"
behaviour init of Token
interface constructor(uint256 _totalSupply)

creates
  string name := "Token"
  string symbol := "TKN"
  uint256 totalSupply := _totalSupply
  mapping(address => uint256) balanceOf := [CALLER := _totalSupply]
  mapping(address => mapping(address => uint256)) allowance := []

invariants
  totalSupply <= 115792089237316195423570985008687907853269984665640564039457584007913129639935

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
"#;

fn check(src: &str) -> Result<Act, CheckFailure> {
    let raw = parse(src, "test.act").expect("parse");
    typecheck(&raw, src, "test.act")
}

fn user_errors(src: &str) -> Vec<TypeError> {
    match check(src) {
        Err(CheckFailure::User(errs)) => errs.errors,
        other => panic!("expected user errors, got {other:?}"),
    }
}

#[test]
fn token_spec_typechecks() {
    let act = check(TOKEN).expect("token spec should typecheck");
    let slots: Vec<&String> = act.store.contract("Token").unwrap().keys().collect();
    assert_eq!(slots, ["name", "symbol", "totalSupply", "balanceOf", "allowance"]);

    let token = &act.contracts[0];
    assert_eq!(token.name(), "Token");
    // Constructor has no iff preconditions: a single pass claim.
    assert_eq!(token.constructors.len(), 1);
    assert_eq!(token.constructors[0].mode, Mode::Pass);
    assert_eq!(token.constructors[0].initial_storage.len(), 4);
    assert_eq!(token.invariants().len(), 1);

    // transfer: two cases, each split into pass and fail.
    assert_eq!(token.behaviours.len(), 4);
    let passes: Vec<_> = token
        .behaviours
        .iter()
        .filter(|b| b.mode == Mode::Pass)
        .collect();
    let fails: Vec<_> = token
        .behaviours
        .iter()
        .filter(|b| b.mode == Mode::Fail)
        .collect();
    assert_eq!(passes.len(), 2);
    assert_eq!(fails.len(), 2);
    assert_eq!(passes[0].state_updates.len(), 2);
    assert!(passes[0].returns.is_some());
}

#[test]
fn wildcard_case_guard_is_negation_of_prior_guards() {
    let act = check(TOKEN).unwrap();
    let passes: Vec<_> = act.contracts[0]
        .behaviours
        .iter()
        .filter(|b| b.mode == Mode::Pass)
        .collect();
    let first_guard = passes[0].case_conditions[0].clone();
    let wildcard_guard = &passes[1].case_conditions[0];
    assert_eq!(wildcard_guard, &Exp::not(first_guard));
}

#[test]
fn claim_splitting_negates_the_iff_conjunction() {
    let act = check(TOKEN).unwrap();
    let token = &act.contracts[0];
    let pass = token
        .behaviours
        .iter()
        .find(|b| b.mode == Mode::Pass)
        .unwrap();
    let fail = token
        .behaviours
        .iter()
        .find(|b| b.mode == Mode::Fail)
        .unwrap();

    // Same normalized case guard on both claims.
    assert_eq!(pass.case_conditions, fail.case_conditions);
    // The fail precondition is exactly the negated conjunction of the pass
    // preconditions, so the two claims partition the case guard.
    assert_eq!(
        fail.preconditions,
        vec![Exp::not(Exp::conj(pass.preconditions.clone()))]
    );
    // Fail claims keep only read-only locations and drop effects.
    assert!(fail
        .state_updates
        .iter()
        .all(|rw| matches!(rw, Rewrite::Constant(_))));
    assert_eq!(
        fail.state_updates.len(),
        pass.state_updates.len(),
        "every pass location is constrained constant on the fail path"
    );
    assert!(fail.returns.is_none());
    assert!(fail.postconditions.is_empty());
}

#[test]
fn ensures_expressions_carry_no_untimed_entries() {
    let src = r#"
behaviour init of C
interface constructor()
creates
  uint256 x := 0

behaviour step of C
interface step()
storage
  x => x + 1
ensures
  post(x) == pre(x) + 1
  x >= 0
"#;
    let act = check(src).unwrap();
    let step = act.contracts[0]
        .behaviours
        .iter()
        .find(|b| b.mode == Mode::Pass)
        .unwrap();
    for post in &step.postconditions {
        for (timing, _) in traversal::entries(post) {
            assert_ne!(timing, Timing::Neither);
        }
    }
    // A bare reference in ensures denotes the post-state.
    let bare = &step.postconditions[1];
    assert!(traversal::entries(bare)
        .iter()
        .all(|(t, _)| *t == Timing::Post));
}

#[test]
fn update_right_hand_sides_read_the_pre_state() {
    let act = check(TOKEN).unwrap();
    let pass = act.contracts[0]
        .behaviours
        .iter()
        .find(|b| b.mode == Mode::Pass)
        .unwrap();
    for rw in &pass.state_updates {
        if let Rewrite::Update(u) = rw {
            assert!(traversal::entries(&u.rhs)
                .iter()
                .all(|(t, _)| *t == Timing::Pre));
        }
    }
}

#[test]
fn duplicate_slot_reports_both_declarations() {
    let errors = user_errors(r#"
behaviour init of C
interface constructor()
creates
  uint256 x := 1
  uint256 x := 1
"#);
    let dups: Vec<_> = errors
        .iter()
        .filter(|e| matches!(e, TypeError::DuplicateSlot { .. }))
        .collect();
    assert_eq!(dups.len(), 2);
}

#[test]
fn storage_read_in_creates_is_rejected() {
    let errors = user_errors(r#"
behaviour init of C
interface constructor()
creates
  mapping(address => uint256) balanceOf := []
  uint256 x := balanceOf[CALLER]
"#);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], TypeError::StorageReadInCreates { .. }));
}

#[test]
fn pre_in_a_precondition_needs_an_untimed_variable() {
    let errors = user_errors(r#"
behaviour init of Token
interface constructor()
creates
  mapping(address => uint256) balanceOf := []

behaviour f of Token
interface f()
iff
  pre(balanceOf[CALLER]) >= 0
returns 1
"#);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "Neither variable needed here");
}

#[test]
fn calldata_references_cannot_be_timed() {
    let errors = user_errors(r#"
behaviour init of C
interface constructor()
creates
  uint256 x := 0

behaviour f of C
interface f(uint256 v)
storage
  x => v
ensures
  pre(v) == v
"#);
    assert!(errors
        .iter()
        .any(|e| e.to_string() == "Neither variable needed here"));
}

#[test]
fn ambiguous_names_are_rejected() {
    let errors = user_errors(r#"
behaviour init of C
interface constructor()
creates
  uint256 x := 0

behaviour f of C
interface f(uint256 x)
iff
  x >= 0
returns 1
"#);
    assert!(matches!(errors[0], TypeError::AmbiguousName { .. }));
}

#[test]
fn unknown_names_are_rejected() {
    let errors = user_errors(r#"
behaviour init of C
interface constructor()
creates
  uint256 x := 0

behaviour f of C
interface f()
returns y
"#);
    assert!(matches!(errors[0], TypeError::UnknownName { .. }));
}

#[test]
fn mapping_arity_is_enforced() {
    let errors = user_errors(r#"
behaviour init of C
interface constructor()
creates
  mapping(address => uint256) m := []

behaviour f of C
interface f(address a, address b)
returns m[a][b]
"#);
    assert!(matches!(
        errors[0],
        TypeError::ArityMismatch {
            expected: 1,
            found: 2,
            ..
        }
    ));
}

#[test]
fn index_types_must_match_key_types() {
    let errors = user_errors(r#"
behaviour init of C
interface constructor()
creates
  mapping(bool => uint256) m := []

behaviour f of C
interface f()
returns m[5]
"#);
    assert!(matches!(errors[0], TypeError::TypeMismatch { .. }));
}

#[test]
fn wildcard_must_be_the_final_case() {
    let errors = user_errors(r#"
behaviour init of C
interface constructor()
creates
  uint256 x := 0

behaviour f of C
interface f()
case _:
  returns 0
case x > 0:
  returns 1
"#);
    assert!(errors
        .iter()
        .any(|e| matches!(e, TypeError::WildcardNotLast { .. })));
}

#[test]
fn behaviours_require_a_constructor() {
    let errors = user_errors(r#"
behaviour f of Ghost
interface f()
returns 1
"#);
    assert!(matches!(errors[0], TypeError::MissingConstructor { .. }));
}

#[test]
fn duplicate_behaviour_signatures_are_rejected() {
    let errors = user_errors(r#"
behaviour init of C
interface constructor()
creates
  uint256 x := 0

behaviour f of C
interface f()
returns 1

behaviour f of C
interface f()
returns 2
"#);
    assert!(errors
        .iter()
        .any(|e| matches!(e, TypeError::DuplicateBehaviour { .. })));
}

#[test]
fn equality_operands_must_harmonize() {
    let errors = user_errors(r#"
behaviour init of C
interface constructor()
creates
  uint256 x := 0

behaviour f of C
interface f()
iff
  1 == true
returns 1
"#);
    assert!(matches!(errors[0], TypeError::CannotHarmonize { .. }));
}

#[test]
fn update_rhs_must_match_slot_type() {
    let errors = user_errors(r#"
behaviour init of C
interface constructor()
creates
  uint256 x := 0

behaviour f of C
interface f()
storage
  x => true
"#);
    assert!(matches!(errors[0], TypeError::TypeMismatch { .. }));
}

#[test]
fn independent_errors_accumulate() {
    let errors = user_errors(r#"
behaviour init of C
interface constructor()
creates
  uint256 x := 0

behaviour f of C
interface f()
iff
  y > 0
  z > 0
returns 1
"#);
    assert_eq!(errors.len(), 2);
}

#[test]
fn struct_assignment_is_an_internal_error() {
    let src = r#"
behaviour init of C
interface constructor()
creates
  uint256 p := {a := 1, b := 2}
"#;
    match check(src) {
        Err(CheckFailure::Internal(InternalError::StructAssignment)) => {}
        other => panic!("expected internal error, got {other:?}"),
    }
}

#[test]
fn invariant_storage_bounds_cover_referenced_integer_locations() {
    let act = check(TOKEN).unwrap();
    let inv = &act.contracts[0].invariants()[0];
    assert_eq!(inv.storage_bounds.len(), 1);
    assert!(matches!(inv.storage_bounds[0], Exp::InRange(..)));
    let (pre, post) = inv.predicate_pair();
    assert!(traversal::entries(&pre).iter().all(|(t, _)| *t == Timing::Pre));
    assert!(traversal::entries(&post)
        .iter()
        .all(|(t, _)| *t == Timing::Post));
}

#[test]
fn polymorphic_nodes_carry_consistent_type_tags() {
    let act = check(TOKEN).unwrap();
    let mut exprs: Vec<Exp> = Vec::new();
    for c in &act.contracts {
        for ctor in &c.constructors {
            exprs.extend(ctor.preconditions.iter().cloned());
            exprs.extend(ctor.postconditions.iter().cloned());
            exprs.extend(ctor.initial_storage.iter().map(|u| u.rhs.clone()));
        }
        for b in &c.behaviours {
            exprs.extend(b.preconditions.iter().cloned());
            exprs.extend(b.case_conditions.iter().cloned());
            exprs.extend(b.postconditions.iter().cloned());
            exprs.extend(b.returns.iter().cloned());
        }
        for inv in c.invariants() {
            exprs.push(inv.predicate.clone());
        }
    }
    assert!(!exprs.is_empty());
    for e in &exprs {
        traversal::visit(e, &mut |node| match node {
            Exp::Eq(t, l, r) | Exp::NEq(t, l, r) => {
                assert_eq!(l.type_of(), *t);
                assert_eq!(r.type_of(), *t);
            }
            Exp::Ite(t, c, a, b) => {
                assert_eq!(c.type_of(), act_ir::types::ActType::Boolean);
                assert_eq!(a.type_of(), *t);
                assert_eq!(b.type_of(), *t);
            }
            _ => {}
        });
    }
}

#[test]
fn type_json_has_program_shape() {
    let act = check(TOKEN).unwrap();
    let v = act_ir::json::act_json(&act);
    assert_eq!(v["kind"], "Program");
    assert_eq!(v["store"]["Token"]["totalSupply"], "uint256");
    assert_eq!(v["store"]["Token"]["balanceOf"]["mapping"]["value"], "uint256");
    let contracts = v["contracts"].as_array().unwrap();
    assert_eq!(contracts.len(), 1);
    assert_eq!(contracts[0]["constructor"]["kind"], "Constructor");
    assert_eq!(contracts[0]["behaviors"].as_array().unwrap().len(), 4);
}
