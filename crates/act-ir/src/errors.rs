use miette::Diagnostic;
use thiserror::Error;

use act_dsl::ast::Span;

use crate::timing::Timing;

/// A positioned user error from store discovery or typechecking.
#[derive(Debug, Error, Diagnostic)]
pub enum TypeError {
    #[error("Unknown name `{name}`")]
    #[diagnostic(code(act::check::unknown_name))]
    UnknownName {
        name: String,
        #[label("not in scope")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Ambiguous name `{name}`: both a storage slot and a calldata argument")]
    #[diagnostic(code(act::check::ambiguous_name))]
    AmbiguousName {
        name: String,
        #[label("ambiguous")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Arity mismatch for `{name}`: expected {expected} indices, found {found}")]
    #[diagnostic(code(act::check::arity))]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        #[label("wrong number of indices")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Type mismatch: expected {expected}, found {found}")]
    #[diagnostic(code(act::check::type_mismatch))]
    TypeMismatch {
        expected: String,
        found: String,
        #[label("wrong type")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Cannot harmonize the operand types of this comparison")]
    #[diagnostic(code(act::check::harmonize))]
    CannotHarmonize {
        #[label("operands have no common type")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Expressions in a creates block cannot read storage")]
    #[diagnostic(code(act::check::storage_read_in_creates))]
    StorageReadInCreates {
        #[label("storage read")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("A wildcard case may only appear as the final case")]
    #[diagnostic(code(act::check::wildcard))]
    WildcardNotLast {
        #[label("wildcard here")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Duplicate contract definition `{name}`")]
    #[diagnostic(code(act::check::duplicate_contract))]
    DuplicateContract {
        name: String,
        #[label("already defined")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Duplicate slot declaration `{name}`")]
    #[diagnostic(code(act::check::duplicate_slot))]
    DuplicateSlot {
        name: String,
        #[label("already declared")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Duplicate behaviour `{name}` for contract `{contract}`")]
    #[diagnostic(code(act::check::duplicate_behaviour))]
    DuplicateBehaviour {
        name: String,
        contract: String,
        #[label("same name and interface")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Missing constructor for contract `{name}`")]
    #[diagnostic(code(act::check::missing_constructor))]
    MissingConstructor {
        name: String,
        #[label("contract has behaviours but no constructor")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("{needed} variable needed here")]
    #[diagnostic(code(act::check::timing))]
    TimingMismatch {
        needed: Timing,
        #[label("wrong timing")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Type `{abi}` has no integer range")]
    #[diagnostic(code(act::check::no_range))]
    NoRange {
        abi: String,
        #[label("not a ranged type")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("A constructor's storage block may only rewrite other contracts' storage")]
    #[diagnostic(code(act::check::own_storage_in_constructor))]
    OwnStorageInConstructor {
        #[label("belongs to the contract under construction")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },
}

/// Collects every user error of one pass so unrelated mistakes surface
/// together instead of one at a time.
#[derive(Debug, Error, Diagnostic)]
#[error("{}", format_type_errors(.errors))]
pub struct TypeErrors {
    #[related]
    pub errors: Vec<TypeError>,
}

fn format_type_errors(errors: &[TypeError]) -> String {
    if errors.len() == 1 {
        return errors[0].to_string();
    }
    format!("{} type errors", errors.len())
}

impl TypeErrors {
    pub fn new(errors: Vec<TypeError>) -> Self {
        Self { errors }
    }
}

/// Assertion violations and unsupported-feature stubs. These abort the
/// program with a stable message, distinct from user diagnostics.
#[derive(Debug, Error, Diagnostic)]
pub enum InternalError {
    #[error("internal error: symbolic exponent reached the SMT encoder")]
    SymbolicExponent,
    #[error("internal error: symbolic bytestring slice reached the SMT encoder")]
    SymbolicSlice,
    #[error("internal error: struct assignments are not supported")]
    StructAssignment,
    #[error("internal error: external contract creation is not supported")]
    ExtCreates,
    #[error("internal error: cross-contract field access is not supported by the SMT encoder")]
    FieldAccess,
    #[error("internal error: {0}")]
    Assertion(String),
}

/// Outcome of the typechecking phase.
#[derive(Debug, Error, Diagnostic)]
pub enum CheckFailure {
    #[error(transparent)]
    #[diagnostic(transparent)]
    User(#[from] TypeErrors),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Internal(#[from] InternalError),
}

/// Context threaded through checking for constructing positioned errors.
pub(crate) struct ErrCtx<'a> {
    pub source: &'a str,
    pub filename: &'a str,
}

impl<'a> ErrCtx<'a> {
    pub fn src(&self) -> miette::NamedSource<String> {
        miette::NamedSource::new(self.filename, self.source.to_owned())
    }

    pub fn at(&self, span: Span) -> miette::SourceSpan {
        span.into()
    }
}
