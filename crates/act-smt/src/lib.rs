//! SMT obligation generation and solver integration for Act.
//!
//! [`encoder`] turns typed claims into SMT-LIB2 queries whose
//! unsatisfiability implies the property: postcondition queries per claim
//! and inductive invariant queries (constructor plus each behaviour).
//! [`solver`] drives a persistent Z3 or CVC4 subprocess over pipes and
//! extracts counter-models on `sat`.

pub mod encoder;
pub mod solver;
pub mod sorts;

pub use encoder::{queries, Query};
pub use solver::{CheckSatResult, Model, ModelValue, Solver, SolverChoice, SolverConfig};
