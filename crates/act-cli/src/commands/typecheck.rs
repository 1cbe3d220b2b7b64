use miette::Report;

use act_engine::pipeline::compile;

pub(crate) fn run(source: &str, filename: &str) -> miette::Result<i32> {
    match compile(source, filename) {
        Ok(act) => {
            let json = act_ir::json::act_json(&act);
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
            Ok(0)
        }
        Err(e) if e.is_internal() => {
            eprintln!("{e}");
            Ok(2)
        }
        Err(e) => Err(Report::new(e)),
    }
}
