//! Long-lived external solver sessions over SMT-LIB2 pipes.
//!
//! One subprocess per session. Every query replays on a `(reset)` solver,
//! line by line under `print-success`, followed by `(check-sat)` and, on
//! `sat`, `(get-value …)` extraction of the counter-model.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};

use num::BigInt;
use thiserror::Error;

use act_ir::types::ActType;

use crate::encoder::{ModelField, ModelSpec, Query};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverChoice {
    Z3,
    Cvc4,
}

impl std::fmt::Display for SolverChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverChoice::Z3 => write!(f, "z3"),
            SolverChoice::Cvc4 => write!(f, "cvc4"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub solver: SolverChoice,
    pub timeout_ms: u64,
    pub debug: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            solver: SolverChoice::Z3,
            timeout_ms: 20_000,
            debug: false,
        }
    }
}

impl SolverConfig {
    fn command(&self) -> (&'static str, Vec<String>) {
        match self.solver {
            SolverChoice::Z3 => ("z3", vec!["-in".to_string(), format!("-t:{}", self.timeout_ms)]),
            SolverChoice::Cvc4 => (
                "cvc4",
                vec![
                    "--lang=smt".to_string(),
                    "--interactive".to_string(),
                    "--no-interactive-prompt".to_string(),
                    "--produce-models".to_string(),
                    format!("--tlimit-per={}", self.timeout_ms),
                ],
            ),
        }
    }
}

/// Session lifecycle: `Starting → Ready ⇄ Busy → … → Stopped`. Any
/// declaration or I/O failure tears the subprocess down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Starting,
    Ready,
    Busy,
    Stopped,
}

impl std::fmt::Display for SolverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverState::Starting => write!(f, "starting"),
            SolverState::Ready => write!(f, "ready"),
            SolverState::Busy => write!(f, "busy"),
            SolverState::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("failed to spawn solver `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("failed to capture solver {0}")]
    Pipe(&'static str),
    #[error("solver I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("solver rejected `{sent}`: {got}")]
    Rejected { sent: String, got: String },
    #[error("no response from solver for `{sent}`{}", stderr_note(.stderr))]
    Closed { sent: String, stderr: String },
    #[error("solver session is {0}, expected ready")]
    NotReady(SolverState),
}

fn stderr_note(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(" (stderr: {stderr})")
    }
}

/// Outcome of `(check-sat)` for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckSatResult {
    Sat,
    Unsat,
    /// `unknown` or `timeout`; the solver stayed healthy.
    Unknown(String),
    /// An unrecognised response line; the session stays usable.
    Error(String),
}

/// A concrete model value, reinterpreted by act-type.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelValue {
    Int(BigInt),
    Bool(bool),
    Bytes(String),
}

impl std::fmt::Display for ModelValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelValue::Int(n) => write!(f, "{n}"),
            ModelValue::Bool(b) => write!(f, "{b}"),
            ModelValue::Bytes(s) => write!(f, "\"{s}\""),
        }
    }
}

/// A counter-model, grouped the way the report prints it.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub calldata: Vec<(String, ModelValue)>,
    pub environment: Vec<(String, ModelValue)>,
    pub prestate: Vec<(String, ModelValue)>,
    pub poststate: Vec<(String, ModelValue)>,
}

/// A running solver subprocess. The stdin/stdout pipes are owned
/// exclusively by this driver for the whole session.
pub struct Solver {
    config: SolverConfig,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: BufReader<ChildStderr>,
    state: SolverState,
}

impl Solver {
    /// Spawn a solver and run the preamble. The session is `Ready` on
    /// success; any unexpected preamble response aborts.
    pub fn spawn(config: SolverConfig) -> Result<Self, SolverError> {
        let (cmd, args) = config.command();
        tracing::debug!(solver = %config.solver, ?args, "spawning solver");
        let mut child = Command::new(cmd)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SolverError::Spawn {
                command: cmd.to_string(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(SolverError::Pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(SolverError::Pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(SolverError::Pipe("stderr"))?;

        let mut solver = Self {
            config,
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr: BufReader::new(stderr),
            state: SolverState::Starting,
        };

        match solver.preamble() {
            Ok(()) => {
                solver.state = SolverState::Ready;
                Ok(solver)
            }
            Err(e) => {
                solver.teardown();
                Err(e)
            }
        }
    }

    fn preamble(&mut self) -> Result<(), SolverError> {
        self.expect_success("(set-option :print-success true)")?;
        self.expect_success("(set-logic ALL)")
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    /// Run a single query: `(reset)`, replay the script line by line, then
    /// `(check-sat)`. The session returns to `Ready` unless a declaration
    /// or I/O error tears it down.
    pub fn run_query(&mut self, query: &Query) -> Result<CheckSatResult, SolverError> {
        if self.state != SolverState::Ready {
            return Err(SolverError::NotReady(self.state));
        }
        self.state = SolverState::Busy;
        let result = self.run_query_inner(query);
        match &result {
            Ok(_) => self.state = SolverState::Ready,
            Err(_) => self.teardown(),
        }
        result
    }

    fn run_query_inner(&mut self, query: &Query) -> Result<CheckSatResult, SolverError> {
        tracing::debug!(query = %query.name, "running query");
        self.reset()?;
        for line in &query.script {
            if line.starts_with(';') {
                continue;
            }
            self.expect_success(line)?;
        }
        let verdict = self.command("(check-sat)")?;
        Ok(match verdict.as_str() {
            "sat" => CheckSatResult::Sat,
            "unsat" => CheckSatResult::Unsat,
            "unknown" | "timeout" => CheckSatResult::Unknown(verdict),
            _ => CheckSatResult::Error(verdict),
        })
    }

    /// `(reset)` clears options on conforming solvers, so `print-success`
    /// is re-armed behind an `(echo)` barrier that soaks up whatever the
    /// solver decided to answer in between.
    fn reset(&mut self) -> Result<(), SolverError> {
        self.send("(reset)")?;
        self.send("(set-option :print-success true)")?;
        self.send("(echo \"ready\")")?;
        loop {
            let line = self.recv("(echo \"ready\")")?;
            if line.contains("ready") {
                break;
            }
        }
        self.expect_success("(set-logic ALL)")
    }

    /// Read back a model after `sat`, one `(get-value …)` per field.
    pub fn model(&mut self, spec: &ModelSpec) -> Result<Model, SolverError> {
        if self.state != SolverState::Ready {
            return Err(SolverError::NotReady(self.state));
        }
        Ok(Model {
            calldata: self.fields(&spec.calldata)?,
            environment: self.fields(&spec.environment)?,
            prestate: self.fields(&spec.prestate)?,
            poststate: self.fields(&spec.poststate)?,
        })
    }

    fn fields(&mut self, fields: &[ModelField]) -> Result<Vec<(String, ModelValue)>, SolverError> {
        let mut out = Vec::with_capacity(fields.len());
        for f in fields {
            let sent = format!("(get-value ({}))", f.smt_expr);
            let response = self.command(&sent)?;
            let Some(raw) = extract_value(&response) else {
                return Err(SolverError::Rejected {
                    sent,
                    got: response,
                });
            };
            let Some(value) = reinterpret(&raw, f.ty) else {
                return Err(SolverError::Rejected { sent, got: raw });
            };
            out.push((f.display.clone(), value));
        }
        Ok(out)
    }

    fn send(&mut self, line: &str) -> Result<(), SolverError> {
        if self.config.debug {
            tracing::debug!(">> {line}");
        }
        writeln!(self.stdin, "{line}")?;
        self.stdin.flush()?;
        Ok(())
    }

    fn recv(&mut self, sent: &str) -> Result<String, SolverError> {
        let mut line = String::new();
        self.stdout.read_line(&mut line)?;
        if line.is_empty() {
            let mut err = String::new();
            let _ = self.stderr.read_line(&mut err);
            return Err(SolverError::Closed {
                sent: sent.to_string(),
                stderr: err.trim().to_string(),
            });
        }
        let line = line.trim().to_string();
        if self.config.debug {
            tracing::debug!("<< {line}");
        }
        Ok(line)
    }

    fn command(&mut self, line: &str) -> Result<String, SolverError> {
        self.send(line)?;
        self.recv(line)
    }

    fn expect_success(&mut self, line: &str) -> Result<(), SolverError> {
        let got = self.command(line)?;
        if got == "success" {
            Ok(())
        } else {
            Err(SolverError::Rejected {
                sent: line.to_string(),
                got,
            })
        }
    }

    /// Tear the subprocess down: close the pipes and reap the child. Safe
    /// to call repeatedly.
    pub fn stop(&mut self) {
        if self.state != SolverState::Stopped {
            self.teardown();
        }
    }

    fn teardown(&mut self) {
        let _ = writeln!(self.stdin, "(exit)");
        let _ = self.stdin.flush();
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.state = SolverState::Stopped;
    }
}

impl Drop for Solver {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------

/// Strip a `((expr value))` get-value response down to the value text.
/// Parenthesized negative numerals unwrap to plain `-N` form.
fn extract_value(response: &str) -> Option<String> {
    let inner = strip_parens(response.trim())?;
    let inner = strip_parens(inner.trim())?;
    let parts = split_sexprs(inner);
    let last = parts.last()?;
    Some(unwrap_negative(last))
}

fn strip_parens(s: &str) -> Option<&str> {
    s.strip_prefix('(')?.strip_suffix(')')
}

/// Split a string into top-level s-expression chunks, respecting nesting
/// and string literals.
fn split_sexprs(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut chars: VecDeque<char> = s.chars().collect();
    while let Some(c) = chars.pop_front() {
        match c {
            '"' => {
                in_string = !in_string;
                buf.push(c);
            }
            '(' if !in_string => {
                depth += 1;
                buf.push(c);
            }
            ')' if !in_string => {
                depth = depth.saturating_sub(1);
                buf.push(c);
            }
            c if c.is_whitespace() && !in_string && depth == 0 => {
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
            }
            c => buf.push(c),
        }
    }
    if !buf.is_empty() {
        out.push(buf);
    }
    out
}

fn unwrap_negative(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(inner) = trimmed.strip_prefix("(-").and_then(|r| r.strip_suffix(')')) {
        format!("-{}", inner.trim())
    } else {
        trimmed.to_string()
    }
}

/// Reinterpret a raw model value per act-type: numeric read for integers,
/// `true`/`false` for booleans, literal bytes for bytestrings.
fn reinterpret(raw: &str, ty: ActType) -> Option<ModelValue> {
    match ty {
        ActType::Integer => raw.parse::<BigInt>().ok().map(ModelValue::Int),
        ActType::Boolean => match raw {
            "true" => Some(ModelValue::Bool(true)),
            "false" => Some(ModelValue::Bool(false)),
            _ => None,
        },
        ActType::ByteStr => Some(ModelValue::Bytes(
            raw.trim_matches('"').replace("\"\"", "\""),
        )),
        ActType::Contract => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_simple_value() {
        assert_eq!(extract_value("((x 42))"), Some("42".to_string()));
    }

    #[test]
    fn extract_negative_value() {
        assert_eq!(extract_value("((x (- 7)))"), Some("-7".to_string()));
    }

    #[test]
    fn extract_value_of_select_expression() {
        assert_eq!(
            extract_value("(((select Token_balanceOf_Pre caller) 17))"),
            Some("17".to_string())
        );
    }

    #[test]
    fn extract_nested_select_value() {
        assert_eq!(
            extract_value("(((select (select Token_allowance_Pre a) b) (- 3)))"),
            Some("-3".to_string())
        );
    }

    #[test]
    fn extract_string_value() {
        assert_eq!(
            extract_value("((Token_name_Post \"Token\"))"),
            Some("\"Token\"".to_string())
        );
    }

    #[test]
    fn malformed_responses_are_none() {
        assert_eq!(extract_value("error"), None);
        assert_eq!(extract_value("(unbalanced"), None);
    }

    #[test]
    fn reinterpret_by_act_type() {
        assert_eq!(
            reinterpret("42", ActType::Integer),
            Some(ModelValue::Int(BigInt::from(42)))
        );
        assert_eq!(
            reinterpret("-7", ActType::Integer),
            Some(ModelValue::Int(BigInt::from(-7)))
        );
        assert_eq!(
            reinterpret("true", ActType::Boolean),
            Some(ModelValue::Bool(true))
        );
        assert_eq!(
            reinterpret("\"abc\"", ActType::ByteStr),
            Some(ModelValue::Bytes("abc".to_string()))
        );
        assert_eq!(reinterpret("notabool", ActType::Boolean), None);
    }

    #[test]
    fn z3_arguments_carry_the_timeout() {
        let config = SolverConfig {
            solver: SolverChoice::Z3,
            timeout_ms: 1234,
            debug: false,
        };
        let (cmd, args) = config.command();
        assert_eq!(cmd, "z3");
        assert_eq!(args, vec!["-in".to_string(), "-t:1234".to_string()]);
    }

    #[test]
    fn cvc4_arguments_follow_the_interactive_profile() {
        let config = SolverConfig {
            solver: SolverChoice::Cvc4,
            timeout_ms: 500,
            debug: false,
        };
        let (cmd, args) = config.command();
        assert_eq!(cmd, "cvc4");
        assert_eq!(
            args,
            vec![
                "--lang=smt".to_string(),
                "--interactive".to_string(),
                "--no-interactive-prompt".to_string(),
                "--produce-models".to_string(),
                "--tlimit-per=500".to_string(),
            ]
        );
    }

    #[test]
    fn spawning_a_missing_binary_is_a_spawn_error() {
        let config = SolverConfig {
            solver: SolverChoice::Z3,
            timeout_ms: 10,
            debug: false,
        };
        // Only meaningful when z3 is absent; emulate by spawning directly.
        let err = Command::new("definitely-not-a-solver-binary")
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|source| SolverError::Spawn {
                command: "definitely-not-a-solver-binary".to_string(),
                source,
            })
            .unwrap_err();
        assert!(matches!(err, SolverError::Spawn { .. }));
        let _ = config;
    }

    #[test]
    #[ignore = "requires z3 on PATH"]
    fn z3_session_answers_sat_and_unsat() {
        use crate::encoder::{ModelSpec, Query};

        let mut solver = Solver::spawn(SolverConfig::default()).unwrap();
        assert_eq!(solver.state(), SolverState::Ready);

        let sat = Query {
            name: "sat".into(),
            script: vec![
                "(declare-const x Int)".into(),
                "(assert (> x 41))".into(),
            ],
            model: ModelSpec::default(),
        };
        assert_eq!(solver.run_query(&sat).unwrap(), CheckSatResult::Sat);

        let unsat = Query {
            name: "unsat".into(),
            script: vec![
                "(declare-const x Int)".into(),
                "(assert (> x 0))".into(),
                "(assert (< x 0))".into(),
            ],
            model: ModelSpec::default(),
        };
        assert_eq!(solver.run_query(&unsat).unwrap(), CheckSatResult::Unsat);

        // Idempotence: the same query twice yields the same verdict.
        assert_eq!(solver.run_query(&unsat).unwrap(), CheckSatResult::Unsat);
        solver.stop();
        assert_eq!(solver.state(), SolverState::Stopped);
    }

    #[test]
    #[ignore = "requires z3 on PATH"]
    fn z3_model_extraction_reads_typed_values() {
        use crate::encoder::{ModelField, ModelSpec, Query};

        let mut solver = Solver::spawn(SolverConfig::default()).unwrap();
        let query = Query {
            name: "model".into(),
            script: vec![
                "(declare-const x Int)".into(),
                "(declare-const b Bool)".into(),
                "(assert (= x (- 5)))".into(),
                "(assert b)".into(),
            ],
            model: ModelSpec {
                calldata: vec![
                    ModelField {
                        smt_expr: "x".into(),
                        display: "x".into(),
                        ty: ActType::Integer,
                    },
                    ModelField {
                        smt_expr: "b".into(),
                        display: "b".into(),
                        ty: ActType::Boolean,
                    },
                ],
                ..ModelSpec::default()
            },
        };
        assert_eq!(solver.run_query(&query).unwrap(), CheckSatResult::Sat);
        let model = solver.model(&query.model).unwrap();
        assert_eq!(
            model.calldata[0],
            ("x".to_string(), ModelValue::Int(BigInt::from(-5)))
        );
        assert_eq!(
            model.calldata[1],
            ("b".to_string(), ModelValue::Bool(true))
        );
    }
}
