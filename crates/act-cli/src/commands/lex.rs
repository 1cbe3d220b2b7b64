use miette::Report;

pub(crate) fn run(source: &str, filename: &str) -> miette::Result<i32> {
    let tokens = act_dsl::lex(source, filename).map_err(Report::new)?;
    for tok in tokens {
        println!("{} {}:{}", tok.kind, tok.line, tok.col);
    }
    Ok(0)
}
