use std::fmt;

use serde_json::{json, Value};

use crate::counterexample::Counterexample;

/// Outcome of a single proof obligation.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// The negated property was unsatisfiable.
    Holds,
    /// The solver produced a satisfying assignment.
    Violated(Counterexample),
    /// `unknown` or `timeout` from the solver.
    Unknown(String),
    /// The solver misbehaved on this query.
    SolverError(String),
}

impl Verdict {
    /// Stable machine-readable class for this verdict.
    pub fn class(&self) -> &'static str {
        match self {
            Verdict::Holds => "holds",
            Verdict::Violated(_) => "violated",
            Verdict::Unknown(_) => "unknown",
            Verdict::SolverError(_) => "solver_error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClaimResult {
    pub query: String,
    pub verdict: Verdict,
}

/// All query verdicts of one prove run.
#[derive(Debug, Clone, Default)]
pub struct ProveReport {
    pub results: Vec<ClaimResult>,
}

impl ProveReport {
    /// True when every obligation was discharged.
    pub fn all_hold(&self) -> bool {
        self.results
            .iter()
            .all(|r| matches!(r.verdict, Verdict::Holds))
    }

    pub fn to_json(&self) -> Value {
        json!({
            "kind": "ProveReport",
            "holds": self.all_hold(),
            "results": self.results.iter().map(|r| json!({
                "query": r.query,
                "verdict": r.verdict.class(),
                "detail": match &r.verdict {
                    Verdict::Holds => Value::Null,
                    Verdict::Violated(cex) => json!(cex.to_string()),
                    Verdict::Unknown(reason) => json!(reason),
                    Verdict::SolverError(message) => json!(message),
                },
            })).collect::<Vec<_>>(),
        })
    }
}

impl fmt::Display for ProveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.results {
            match &r.verdict {
                Verdict::Holds => writeln!(f, "{}: holds", r.query)?,
                Verdict::Violated(cex) => {
                    writeln!(f, "{}: violated", r.query)?;
                    write!(f, "{cex}")?;
                }
                Verdict::Unknown(reason) => writeln!(f, "{}: unknown ({reason})", r.query)?,
                Verdict::SolverError(message) => {
                    writeln!(f, "{}: solver error ({message})", r.query)?
                }
            }
        }
        let failing = self
            .results
            .iter()
            .filter(|r| !matches!(r.verdict, Verdict::Holds))
            .count();
        if failing == 0 {
            write!(f, "RESULT: all {} claims hold", self.results.len())
        } else {
            write!(
                f,
                "RESULT: {failing} of {} claims could not be proven",
                self.results.len()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ProveReport {
        ProveReport {
            results: vec![
                ClaimResult {
                    query: "Token.transfer[0].pass.postcondition[0]".into(),
                    verdict: Verdict::Holds,
                },
                ClaimResult {
                    query: "Token.invariant[0].constructor".into(),
                    verdict: Verdict::Unknown("timeout".into()),
                },
            ],
        }
    }

    #[test]
    fn all_hold_requires_every_claim() {
        assert!(!report().all_hold());
        let ok = ProveReport {
            results: vec![ClaimResult {
                query: "q".into(),
                verdict: Verdict::Holds,
            }],
        };
        assert!(ok.all_hold());
    }

    #[test]
    fn empty_report_holds() {
        assert!(ProveReport::default().all_hold());
    }

    #[test]
    fn display_lists_each_query_and_a_summary() {
        let text = report().to_string();
        assert!(text.contains("Token.transfer[0].pass.postcondition[0]: holds"));
        assert!(text.contains("Token.invariant[0].constructor: unknown (timeout)"));
        assert!(text.contains("RESULT: 1 of 2 claims could not be proven"));
    }

    #[test]
    fn json_report_carries_verdict_classes() {
        let v = report().to_json();
        assert_eq!(v["holds"], false);
        assert_eq!(v["results"][0]["verdict"], "holds");
        assert_eq!(v["results"][1]["verdict"], "unknown");
    }
}
