use miette::Report;

pub(crate) fn run(source: &str, filename: &str) -> miette::Result<i32> {
    let act = act_dsl::parse(source, filename).map_err(Report::new)?;
    println!("{act:#?}");
    Ok(0)
}
