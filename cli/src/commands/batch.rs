use super::check_format;
use crate::context::Context;
use crate::GlobalArgs;
use anyhow::{bail, Context as _, Result};
use colored::*;
use provisioner::{BatchReport, BatchRunner, Job};
use std::path::Path;
use std::sync::Arc;

fn print_report(report: &BatchReport) {
    println!("{}", "Batch report".bold());
    println!(
        "Started: {}",
        report
            .started_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    for result in &report.results {
        if result.success {
            println!(
                "  {} {} {} ({}ms)",
                "✓".green(),
                result.action,
                result.subject_id,
                result.execution_time_ms
            );
        } else {
            let marker = if result.fatal { "✗".red().bold() } else { "✗".red() };
            println!(
                "  {} {} {}: {}",
                marker, result.action, result.subject_id, result.message
            );
        }
    }
    println!(
        "{} succeeded, {} failed, {} skipped in {}ms",
        report.succeeded.to_string().green(),
        report.failed.to_string().red(),
        report.skipped,
        report.execution_time_ms
    );
}

pub async fn execute(global: &GlobalArgs, file: &Path, format: String) -> Result<()> {
    check_format(&format)?;
    let jobs = Job::list_from_file(file)
        .with_context(|| format!("Failed to read jobs from {}", file.display()))?;

    let context = Context::open(global).await?;
    let values_sets: Vec<Vec<String>> = jobs
        .iter()
        .flat_map(|job| match job {
            Job::Add { subject } | Job::Update { subject } => subject.values_sets(),
            Job::Remove { .. } => Vec::new(),
        })
        .collect();
    context.seed_preexisting(&values_sets);

    let service = Arc::new(context.service()?);
    service.startup().await?;
    let report = BatchRunner::new(service).run(jobs).await;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.aborted {
        bail!("Batch stopped after a fatal error");
    }
    if report.failed > 0 {
        bail!("{} of {} jobs failed", report.failed, report.total);
    }
    Ok(())
}
