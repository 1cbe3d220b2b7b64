//! Proving pipeline for Act specifications.

pub mod counterexample;
pub mod pipeline;
pub mod result;

pub use counterexample::Counterexample;
pub use pipeline::{build_queries, compile, prove, PipelineError, ProveOptions, SolverChoice};
pub use result::{ClaimResult, ProveReport, Verdict};
