use anyhow::{Context, Result};

pub fn execute(template: &str, values: &[String]) -> Result<()> {
    let path = templates::evaluate(template, values)
        .with_context(|| format!("Cannot evaluate {:?}", template))?;
    println!("{}", path);
    Ok(())
}
