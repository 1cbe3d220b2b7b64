//! End-to-end pipeline: parse → store discovery → typecheck → query
//! synthesis → solver session → verdicts.

use miette::Diagnostic;
use thiserror::Error;
use tracing::info;

use act_dsl::errors::ParseError;
use act_ir::errors::{CheckFailure, InternalError, TypeErrors};
use act_ir::types::Act;
use act_smt::encoder::{self, Query};
use act_smt::solver::{CheckSatResult, Solver, SolverConfig, SolverError};

use crate::counterexample::Counterexample;
use crate::result::{ClaimResult, ProveReport, Verdict};

pub use act_smt::solver::SolverChoice;

/// Options for a prove run, mirrored by the CLI flags.
#[derive(Debug, Clone)]
pub struct ProveOptions {
    pub solver: SolverChoice,
    pub timeout_ms: u64,
    pub debug: bool,
}

impl Default for ProveOptions {
    fn default() -> Self {
        Self {
            solver: SolverChoice::Z3,
            timeout_ms: 20_000,
            debug: false,
        }
    }
}

impl ProveOptions {
    fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            solver: self.solver,
            timeout_ms: self.timeout_ms,
            debug: self.debug,
        }
    }
}

/// A failure that stops the pipeline before any verdict is produced.
/// Solver trouble never lands here; it is reported per query.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Type(#[from] TypeErrors),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Internal(#[from] InternalError),
}

impl From<CheckFailure> for PipelineError {
    fn from(f: CheckFailure) -> Self {
        match f {
            CheckFailure::User(errs) => PipelineError::Type(errs),
            CheckFailure::Internal(e) => PipelineError::Internal(e),
        }
    }
}

impl PipelineError {
    /// Internal errors exit distinctly from user diagnostics.
    pub fn is_internal(&self) -> bool {
        matches!(self, PipelineError::Internal(_))
    }
}

/// Parse and typecheck a source file into the typed IR.
pub fn compile(source: &str, filename: &str) -> Result<Act, PipelineError> {
    let raw = act_dsl::parse(source, filename)?;
    let act = act_ir::typecheck(&raw, source, filename)?;
    info!(
        contracts = act.contracts.len(),
        "typechecked specification"
    );
    Ok(act)
}

/// Compile and synthesize every proof obligation, without running a solver.
pub fn build_queries(source: &str, filename: &str) -> Result<(Act, Vec<Query>), PipelineError> {
    let act = compile(source, filename)?;
    let queries = encoder::queries(&act)?;
    Ok((act, queries))
}

/// Compile a specification and discharge every claim against one solver
/// session. Queries run strictly sequentially; a solver failure settles
/// only the query it hit, and the session is respawned for the rest.
pub fn prove(
    source: &str,
    filename: &str,
    options: &ProveOptions,
) -> Result<ProveReport, PipelineError> {
    let (_, queries) = build_queries(source, filename)?;
    info!(queries = queries.len(), solver = %options.solver, "running prove");

    let mut session = match Solver::spawn(options.solver_config()) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!("solver failed to start: {e}");
            None
        }
    };

    let mut results = Vec::with_capacity(queries.len());
    for query in &queries {
        let verdict = match session.as_mut() {
            None => Verdict::SolverError("solver session unavailable".to_string()),
            Some(solver) => match solver.run_query(query) {
                Ok(CheckSatResult::Unsat) => Verdict::Holds,
                Ok(CheckSatResult::Sat) => match solver.model(&query.model) {
                    Ok(model) => Verdict::Violated(Counterexample { model }),
                    Err(e) => solver_failure(&mut session, options, e),
                },
                Ok(CheckSatResult::Unknown(reason)) => Verdict::Unknown(reason),
                Ok(CheckSatResult::Error(line)) => Verdict::SolverError(line),
                Err(e) => solver_failure(&mut session, options, e),
            },
        };
        info!(query = %query.name, verdict = verdict.class(), "query finished");
        results.push(ClaimResult {
            query: query.name.clone(),
            verdict,
        });
    }

    Ok(ProveReport { results })
}

/// Record the failure and replace a torn-down session so the remaining
/// queries still get their turn.
fn solver_failure(
    session: &mut Option<Solver>,
    options: &ProveOptions,
    error: SolverError,
) -> Verdict {
    let message = error.to_string();
    let stopped = session
        .as_ref()
        .map(|s| s.state() == act_smt::solver::SolverState::Stopped)
        .unwrap_or(true);
    if stopped {
        *session = Solver::spawn(options.solver_config()).ok();
    }
    Verdict::SolverError(message)
}
