use crate::context::Context;
use crate::GlobalArgs;
use anyhow::{Context as _, Result};
use colored::*;
use provisioner::{ProvisioningService, SubjectDescription};
use std::path::Path;

async fn prepare(global: &GlobalArgs, subject: &SubjectDescription) -> Result<ProvisioningService> {
    let context = Context::open(global).await?;
    context.seed_preexisting(&subject.values_sets());
    if context.is_dry_run() {
        println!("{}", "Dry run: nothing is persisted".yellow());
    }
    let service = context.service()?;
    service.startup().await?;
    Ok(service)
}

async fn print_memberships(service: &ProvisioningService, subject_id: &str) -> Result<()> {
    let groups = service.engine().retrieve_managed_groups(subject_id).await?;
    println!(
        "{} {} is a managed member of {} groups",
        "✓".green(),
        subject_id.bold(),
        groups.len()
    );
    for group in groups {
        println!("  {}", group);
    }
    Ok(())
}

fn read_subject(path: &Path) -> Result<SubjectDescription> {
    let subject = SubjectDescription::from_file(path)
        .with_context(|| format!("Failed to load subject from {}", path.display()))?;
    Ok(subject)
}

pub async fn add(global: &GlobalArgs, subject_file: &Path) -> Result<()> {
    let subject = read_subject(subject_file)?;
    let service = prepare(global, &subject).await?;
    service.add_to_groups(&subject).await.into_result()?;
    print_memberships(&service, &subject.id).await
}

pub async fn update(global: &GlobalArgs, subject_file: &Path) -> Result<()> {
    let subject = read_subject(subject_file)?;
    let service = prepare(global, &subject).await?;
    service.update_memberships(&subject).await.into_result()?;
    print_memberships(&service, &subject.id).await
}

pub async fn remove(global: &GlobalArgs, subject_id: &str, managed_only: bool) -> Result<()> {
    let context = Context::open(global).await?;
    let service = context.service()?;
    let result = if managed_only {
        service.remove_from_managed_groups(subject_id).await
    } else {
        service.remove_from_all_groups(subject_id).await
    };
    result.into_result()?;
    println!(
        "{} Removed {} from its {}groups",
        "✓".green(),
        subject_id.bold(),
        if managed_only { "managed " } else { "" }
    );
    Ok(())
}
