use crate::utils::env_paths::EnvPaths;
use crate::GlobalArgs;
use anyhow::{bail, Context as _, Result};
use backend::{Backend, MemoryBackend, SqliteBackend};
use definitions::{DefinitionLoader, DefinitionsManager, ResourceKind, TemplateDefinitions};
use provisioner::{ProvisionerConfig, ProvisioningService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// The group store a command works against
pub enum Store {
    Memory(Arc<MemoryBackend>),
    Sqlite(Arc<SqliteBackend>),
}

impl Store {
    pub fn backend(&self) -> Arc<dyn Backend> {
        match self {
            Store::Memory(memory) => memory.clone(),
            Store::Sqlite(sqlite) => sqlite.clone(),
        }
    }
}

/// Settings, definitions and store resolved from the command line
pub struct Context {
    pub config: ProvisionerConfig,
    pub definitions: Arc<TemplateDefinitions>,
    pub store: Store,
}

/// Settings file from `--config`, then `PROVISIONER_CONFIG`, then defaults
pub fn load_settings(global: &GlobalArgs, paths: &EnvPaths) -> Result<ProvisionerConfig> {
    let config = match &global.config {
        Some(path) => ProvisionerConfig::from_file(path)?,
        None if paths.config_path.exists() => ProvisionerConfig::from_file(&paths.config_path)?,
        None => {
            debug!("No settings file at {:?}, using defaults", paths.config_path);
            ProvisionerConfig::default()
        }
    };
    Ok(config)
}

/// Definitions from `--definitions`, then the settings file, then
/// `DEFINITIONS_PATH`
pub fn load_definitions(
    global: &GlobalArgs,
    config: &ProvisionerConfig,
    paths: &EnvPaths,
) -> Result<(PathBuf, TemplateDefinitions)> {
    let path = global
        .definitions
        .clone()
        .or_else(|| config.definitions_path.clone())
        .unwrap_or_else(|| paths.definitions_path.clone());
    if !path.exists() {
        bail!("No definitions found at {}", path.display());
    }
    let definitions = DefinitionLoader::load(&path)
        .with_context(|| format!("Invalid definitions in {}", path.display()))?;
    Ok((path, definitions))
}

/// The in-memory store for `--dry-run`, otherwise SQLite at `--database`,
/// the settings file's `database_path` or `DATABASE_PATH`
pub async fn open_store(
    global: &GlobalArgs,
    config: &ProvisionerConfig,
    paths: &EnvPaths,
) -> Result<Store> {
    if global.dry_run {
        info!("Dry run: working against an in-memory store");
        return Ok(Store::Memory(Arc::new(MemoryBackend::new(config.session()))));
    }
    let path = global
        .database
        .clone()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| paths.database_path.clone());
    let location = path.to_string_lossy();
    let sqlite = SqliteBackend::connect(&location, config.session())
        .await
        .with_context(|| format!("Failed to open the group store at {}", location))?;
    Ok(Store::Sqlite(Arc::new(sqlite)))
}

impl Context {
    pub async fn open(global: &GlobalArgs) -> Result<Self> {
        let paths = EnvPaths::load()?;
        let config = load_settings(global, &paths)?;
        let (_, definitions) = load_definitions(global, &config, &paths)?;
        let definitions = Arc::new(definitions);

        let store = open_store(global, &config, &paths).await?;

        let context = Self {
            config,
            definitions,
            store,
        };
        context.seed_preexisting(&[Vec::new()]);
        Ok(context)
    }

    /// In a dry run, create the preexisting resources the given value tuples
    /// point at, since nothing else will
    pub fn seed_preexisting(&self, values_sets: &[Vec<String>]) {
        let Store::Memory(memory) = &self.store else {
            return;
        };
        for template in self.definitions.preexisting_definitions() {
            for values in values_sets {
                let Ok(definition) = template.evaluate(values.as_slice()) else {
                    continue;
                };
                if definition.is_root() {
                    continue;
                }
                debug!("Dry run: seeding {}", definition.path());
                match definition.kind() {
                    ResourceKind::Folder => {
                        memory.seed_folder(definition.path());
                    }
                    ResourceKind::Group => {
                        memory.seed_group(definition.path());
                    }
                }
            }
        }
    }

    pub fn service(&self) -> Result<ProvisioningService> {
        let service = ProvisioningService::with_config(
            self.store.backend(),
            self.definitions.clone(),
            self.config.clone(),
        )?;
        Ok(service)
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self.store, Store::Memory(_))
    }
}
