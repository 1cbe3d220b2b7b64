use miette::Report;

use act_engine::pipeline::{prove, ProveOptions};

pub(crate) struct ProveArgs<'a> {
    pub solver: &'a str,
    pub smttimeout: u64,
    pub debug: bool,
    pub json: bool,
}

pub(crate) fn run(source: &str, filename: &str, args: &ProveArgs<'_>) -> miette::Result<i32> {
    let options = ProveOptions {
        solver: super::parse_solver_choice(args.solver),
        timeout_ms: args.smttimeout,
        debug: args.debug,
    };
    match prove(source, filename, &options) {
        Ok(report) => {
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report.to_json()).unwrap_or_default()
                );
            } else {
                println!("{report}");
            }
            Ok(if report.all_hold() { 0 } else { 1 })
        }
        Err(e) if e.is_internal() => {
            eprintln!("{e}");
            Ok(2)
        }
        Err(e) => Err(Report::new(e)),
    }
}
