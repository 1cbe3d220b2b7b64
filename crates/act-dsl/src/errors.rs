use miette::Diagnostic;
use thiserror::Error;

use crate::ast::Span;

/// Errors produced while lexing or parsing. Both carry a single position;
/// multiple-error accumulation only starts at the typechecking phase.
#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("Lexical error: {message}")]
    #[diagnostic(code(act::lex))]
    Lex {
        message: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Syntax error: {message}")]
    #[diagnostic(code(act::parse::syntax))]
    Syntax {
        message: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Unexpected token: expected {expected}, found {found}")]
    #[diagnostic(code(act::parse::unexpected))]
    UnexpectedToken {
        expected: String,
        found: String,
        #[label("unexpected token")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },
}

impl ParseError {
    pub fn lex(message: impl Into<String>, span: Span, source: &str, filename: &str) -> Self {
        ParseError::Lex {
            message: message.into(),
            span: span.into(),
            src: miette::NamedSource::new(filename, source.to_owned()),
        }
    }

    pub fn syntax(message: impl Into<String>, span: Span, source: &str, filename: &str) -> Self {
        ParseError::Syntax {
            message: message.into(),
            span: span.into(),
            src: miette::NamedSource::new(filename, source.to_owned()),
        }
    }

    /// The byte span the error points at.
    pub fn span(&self) -> miette::SourceSpan {
        match self {
            ParseError::Lex { span, .. }
            | ParseError::Syntax { span, .. }
            | ParseError::UnexpectedToken { span, .. } => *span,
        }
    }
}
