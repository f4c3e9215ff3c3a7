use crate::context::{load_settings, open_store, Store};
use crate::utils::env_paths::EnvPaths;
use crate::{GlobalArgs, SeedKind};
use anyhow::{bail, Result};
use colored::*;

pub async fn execute(global: &GlobalArgs, path: &str, kind: SeedKind) -> Result<()> {
    if global.dry_run {
        bail!("Seeding needs a persistent store, drop --dry-run");
    }
    let paths = EnvPaths::load()?;
    let config = load_settings(global, &paths)?;
    let Store::Sqlite(store) = open_store(global, &config, &paths).await? else {
        bail!("Seeding needs a persistent store");
    };

    let name = match kind {
        SeedKind::Folder => store.seed_folder(path).await?.name,
        SeedKind::Group => store.seed_group(path).await?.name,
    };
    println!(
        "{} Registered {} {}",
        "✓".green(),
        if kind == SeedKind::Folder { "folder" } else { "group" },
        name.bold()
    );
    Ok(())
}
