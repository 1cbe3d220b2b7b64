use std::fmt;

use act_smt::solver::{Model, ModelValue};

/// A satisfying assignment rendered in the fixed human-readable layout:
/// calldata, environment, then prestate and poststate lines.
#[derive(Debug, Clone)]
pub struct Counterexample {
    pub model: Model,
}

fn section(f: &mut fmt::Formatter<'_>, title: &str, rows: &[(String, ModelValue)]) -> fmt::Result {
    if rows.is_empty() {
        return Ok(());
    }
    writeln!(f, "  {title}:")?;
    for (name, value) in rows {
        writeln!(f, "    {name} = {value}")?;
    }
    Ok(())
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Counterexample:")?;
        section(f, "calldata", &self.model.calldata)?;
        section(f, "environment", &self.model.environment)?;
        section(f, "prestate", &self.model.prestate)?;
        section(f, "poststate", &self.model.poststate)?;
        Ok(())
    }
}
