use super::check_format;
use crate::context::{load_definitions, load_settings};
use crate::utils::env_paths::EnvPaths;
use crate::GlobalArgs;
use anyhow::Result;
use colored::*;
use definitions::{DefinitionTemplate, TemplateDefinitions};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct DefinitionSummary {
    path: String,
    kind: &'static str,
    preexisting: bool,
    create_if_empty: bool,
    templated: bool,
    privileges: usize,
    containing_groups: usize,
    member_rules: usize,
}

impl From<&DefinitionTemplate> for DefinitionSummary {
    fn from(template: &DefinitionTemplate) -> Self {
        Self {
            path: template.path().to_string(),
            kind: if template.kind().is_group() {
                "group"
            } else {
                "folder"
            },
            preexisting: template.is_preexisting(),
            create_if_empty: template.is_create_if_empty(),
            templated: !template.path().is_constant(),
            privileges: template.privileges().len(),
            containing_groups: template.containing_groups().len(),
            member_rules: template.members().len(),
        }
    }
}

#[derive(Serialize)]
struct ValidationReport {
    source: String,
    total: usize,
    groups: usize,
    folders: usize,
    preexisting: usize,
    create_if_empty: usize,
    definitions: Vec<DefinitionSummary>,
}

impl ValidationReport {
    fn new(source: &Path, definitions: &TemplateDefinitions) -> Self {
        let summaries: Vec<DefinitionSummary> = definitions
            .iter()
            .map(|template| DefinitionSummary::from(&**template))
            .collect();
        let groups = summaries.iter().filter(|d| d.kind == "group").count();
        Self {
            source: source.display().to_string(),
            total: summaries.len(),
            groups,
            folders: summaries.len() - groups,
            preexisting: summaries.iter().filter(|d| d.preexisting).count(),
            create_if_empty: summaries.iter().filter(|d| d.create_if_empty).count(),
            definitions: summaries,
        }
    }
}

pub fn execute(global: &GlobalArgs, format: String) -> Result<()> {
    check_format(&format)?;
    let paths = EnvPaths::load()?;
    let config = load_settings(global, &paths)?;
    let (source, definitions) = load_definitions(global, &config, &paths)?;
    let report = ValidationReport::new(&source, &definitions);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Definitions".bold());
    println!("Source: {}", report.source);
    for definition in &report.definitions {
        let mut flags = Vec::new();
        if definition.preexisting {
            flags.push("preexisting");
        }
        if definition.create_if_empty {
            flags.push("create-if-empty");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", ")).dimmed().to_string()
        };
        println!("  {:<6} {}{}", definition.kind, definition.path, flags);
    }
    println!();
    println!(
        "{} {} definitions are valid ({} groups, {} folders, {} preexisting)",
        "✓".green(),
        report.total,
        report.groups,
        report.folders,
        report.preexisting
    );
    Ok(())
}
