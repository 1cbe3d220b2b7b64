//! End-to-end scenarios. Tests that need a live solver are ignored by
//! default; run them with `cargo test -- --ignored` on a machine with z3
//! on PATH.

use act_engine::pipeline::{build_queries, compile, prove, PipelineError, ProveOptions};

const TOKEN: &str = r#"
behaviour init of Token
interface constructor(uint256 _totalSupply)

iff in range uint256
  _totalSupply

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

ensures
  post(totalSupply) == pre(totalSupply)
"#;

const AMM: &str = r#"
behaviour init of Amm
interface constructor(uint256 _x, uint256 _y)

iff in range uint256
  _x
  _y

creates
  uint256 x := _x
  uint256 y := _y

behaviour swap0 of Amm
interface swap0(uint256 amt)

iff
  amt > 0
  x + amt > 0
  y >= (y * amt) / (x + amt)

iff in range uint256
  x + amt
  y * amt

storage
  x => x + amt
  y => y - (y * amt) / (x + amt)

ensures
  pre(x) * pre(y) <= post(x) * post(y)
"#;

#[test]
fn token_compiles_and_yields_queries() {
    let (act, queries) = build_queries(TOKEN, "token.act").unwrap();
    let token = &act.contracts[0];
    assert_eq!(token.name(), "Token");
    // Postconditions: 2 pass cases x 1 ensures. Invariant group: 1
    // constructor sub-query + one per split behaviour claim (4).
    assert_eq!(queries.len(), 2 + 1 + 4);
    // The invariant pipeline groups the constructor sub-query before the
    // behaviour sub-queries, in source order.
    let inv_names: Vec<&str> = queries
        .iter()
        .map(|q| q.name.as_str())
        .filter(|n| n.contains("invariant"))
        .collect();
    assert_eq!(inv_names[0], "Token.invariant[0].constructor");
    assert!(inv_names[1..].iter().all(|n| n.contains("transfer")));
}

#[test]
fn amm_compiles_and_yields_the_constant_product_query() {
    let (_, queries) = build_queries(AMM, "amm.act").unwrap();
    let q = queries
        .iter()
        .find(|q| q.name == "Amm.swap0[0].pass.postcondition[0]")
        .unwrap();
    let script = q.script.join("\n");
    assert!(script.contains("(declare-const Amm_x_Pre Int)"));
    assert!(script.contains("(declare-const Amm_x_Post Int)"));
    assert!(script.contains(
        "(assert (not (<= (* Amm_x_Pre Amm_y_Pre) (* Amm_x_Post Amm_y_Post))))"
    ));
}

#[test]
fn type_errors_stop_the_pipeline_before_queries() {
    let src = r#"
behaviour init of C
interface constructor()
creates
  uint256 x := 1
  uint256 x := 1
"#;
    match build_queries(src, "dup.act") {
        Err(PipelineError::Type(errs)) => assert_eq!(errs.errors.len(), 2),
        other => panic!("expected type errors, got {other:?}"),
    }
}

#[test]
fn parse_errors_surface_as_parse_failures() {
    match compile("behaviour of", "bad.act") {
        Err(PipelineError::Parse(_)) => {}
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn internal_errors_are_distinguished() {
    let src = r#"
behaviour init of C
interface constructor()
creates
  uint256 p := {a := 1}
"#;
    let err = compile(src, "struct.act").unwrap_err();
    assert!(err.is_internal());
    assert!(err.to_string().starts_with("internal error:"));
}

#[test]
#[ignore = "requires z3 on PATH"]
fn token_transfer_proves_clean() {
    let report = prove(TOKEN, "token.act", &ProveOptions::default()).unwrap();
    assert!(report.all_hold(), "unexpected failures:\n{report}");
}

#[test]
#[ignore = "requires z3 on PATH"]
fn tightened_precondition_still_proves_clean() {
    // The overflow guard strengthened from 2^256 to 2^128: strictly fewer
    // reachable states, so every claim still holds.
    let mutated = TOKEN.replace(
        "iff in range uint256\n  balanceOf[CALLER] - value\n  balanceOf[to] + value",
        "iff in range uint256\n  balanceOf[CALLER] - value\niff\n  balanceOf[to] + value < 340282366920938463463374607431768211456",
    );
    assert_ne!(mutated, TOKEN);
    let report = prove(&mutated, "token.act", &ProveOptions::default()).unwrap();
    assert!(report.all_hold(), "unexpected failures:\n{report}");
}

#[test]
#[ignore = "requires z3 on PATH"]
fn amm_constant_product_holds() {
    let report = prove(AMM, "amm.act", &ProveOptions::default()).unwrap();
    assert!(report.all_hold(), "unexpected failures:\n{report}");
}

#[test]
#[ignore = "requires z3 on PATH"]
fn broken_postcondition_yields_a_counterexample() {
    let broken = r#"
behaviour init of C
interface constructor(uint256 _x)

creates
  uint256 x := _x

behaviour bump of C
interface bump(uint256 n)

storage
  x => x + n

ensures
  post(x) == pre(x)
"#;
    let report = prove(broken, "broken.act", &ProveOptions::default()).unwrap();
    assert!(!report.all_hold());
    let text = report.to_string();
    assert!(text.contains("violated"));
    assert!(text.contains("Counterexample:"));
}
