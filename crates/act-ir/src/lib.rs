//! Typed, timing-annotated intermediate representation for Act.
//!
//! The pipeline through this crate: store discovery over the untyped AST,
//! then typechecking and elaboration into [`types::Act`] — name
//! resolution, bidirectional expression checking, case normalization,
//! timing analysis and claim splitting. Traversal collectors and the
//! constant folder support the SMT layer.

pub mod abi;
pub mod env;
pub mod errors;
pub mod eval;
pub mod json;
pub mod storage;
pub mod store;
pub mod timing;
pub mod traversal;
pub mod typecheck;
pub mod types;

pub use errors::{CheckFailure, InternalError, TypeError, TypeErrors};
pub use typecheck::typecheck;
pub use types::Act;
