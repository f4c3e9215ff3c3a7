use super::check_format;
use crate::context::Context;
use crate::GlobalArgs;
use anyhow::Result;
use colored::*;

pub async fn execute(global: &GlobalArgs, format: String) -> Result<()> {
    check_format(&format)?;
    let context = Context::open(global).await?;
    let service = context.service()?;
    let report = service.startup().await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Preexisting resources".bold());
    for path in &report.verified {
        println!("  {} {}", "✓".green(), path);
    }
    for path in &report.unchecked {
        println!("  {} {} (checked per subject)", "-".yellow(), path);
    }
    if !report.created.is_empty() {
        println!("{}", "Created even if empty".bold());
        for path in &report.created {
            println!("  {} {}", "✓".green(), path);
        }
    }
    println!("{} Startup checks passed", "✓".green().bold());
    Ok(())
}
