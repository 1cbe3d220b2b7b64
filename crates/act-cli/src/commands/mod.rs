// Command handlers, one module per subcommand, plus shared helpers.

pub(crate) mod lex;
pub(crate) mod parse;
pub(crate) mod prove;
pub(crate) mod typecheck;

use std::path::Path;

use miette::IntoDiagnostic;

use act_engine::SolverChoice;

/// Read a specification file, returning its contents and the logical
/// filename used in diagnostics.
pub(crate) fn read_source(path: &Path) -> miette::Result<(String, String)> {
    let source = std::fs::read_to_string(path).into_diagnostic()?;
    Ok((source, path.display().to_string()))
}

pub(crate) fn parse_solver_choice(raw: &str) -> SolverChoice {
    match raw {
        "z3" => SolverChoice::Z3,
        "cvc4" => SolverChoice::Cvc4,
        other => {
            eprintln!("Unknown solver: {other}. Use 'z3' or 'cvc4'.");
            std::process::exit(1);
        }
    }
}
