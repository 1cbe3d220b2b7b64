//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "act")]
#[command(about = "Verification front-end for the Act smart contract specification language")]
#[command(
    long_about = "Verification front-end for the Act smart contract specification language.\n\n\
    Pipeline:\n  \
    1. act lex spec.act      — inspect the token stream\n  \
    2. act parse spec.act    — inspect the untyped AST\n  \
    3. act type spec.act     — typecheck and emit the typed program as JSON\n  \
    4. act prove spec.act    — discharge every claim to an SMT solver\n\n\
    Exit codes: 0 when everything holds, 1 on user errors or failing claims,\n\
    2 on internal errors."
)]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Tokenise a specification and print one token per line
    #[command(display_order = 10)]
    Lex {
        /// Path to the .act specification
        file: PathBuf,
    },

    /// Parse a specification and print the untyped AST
    #[command(display_order = 20)]
    Parse {
        /// Path to the .act specification
        file: PathBuf,
    },

    /// Typecheck a specification and print the typed program as JSON
    #[command(name = "type", display_order = 30)]
    Type {
        /// Path to the .act specification
        file: PathBuf,
    },

    /// Discharge every postcondition and invariant to an SMT solver
    #[command(display_order = 40)]
    Prove {
        /// Path to the .act specification
        file: PathBuf,

        /// Solver backend to use
        #[arg(long, default_value = "z3")]
        solver: String,

        /// Solver timeout per query, in milliseconds
        #[arg(long, default_value_t = 20_000)]
        smttimeout: u64,

        /// Log every SMT line sent and received
        #[arg(long)]
        debug: bool,

        /// Print a machine-readable JSON report instead of text
        #[arg(long)]
        json: bool,
    },
}
