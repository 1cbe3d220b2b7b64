mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::read_source;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => std::process::exit(code),
        Err(report) => {
            eprintln!("{report:?}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> miette::Result<i32> {
    match cli.command {
        Commands::Lex { file } => {
            let (source, filename) = read_source(&file)?;
            commands::lex::run(&source, &filename)
        }
        Commands::Parse { file } => {
            let (source, filename) = read_source(&file)?;
            commands::parse::run(&source, &filename)
        }
        Commands::Type { file } => {
            let (source, filename) = read_source(&file)?;
            commands::typecheck::run(&source, &filename)
        }
        Commands::Prove {
            file,
            solver,
            smttimeout,
            debug,
            json,
        } => {
            let (source, filename) = read_source(&file)?;
            commands::prove::run(
                &source,
                &filename,
                &commands::prove::ProveArgs {
                    solver: &solver,
                    smttimeout,
                    debug,
                    json,
                },
            )
        }
    }
}
