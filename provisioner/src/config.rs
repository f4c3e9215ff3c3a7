use crate::error::{ProvisioningError, Result};
use backend::Subject;
use idempotency_cache::{IdempotencyCache, MemoryCache, TtlCache};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Settings of the provisioning engine and its surroundings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Identity the engine acts as; it owns what it creates
    pub session_subject: String,
    pub delete_empty_groups: bool,
    pub delete_empty_folders: bool,
    /// Apply privileges even on non-empty resources
    pub force_privileges: bool,
    /// Only delete resources created by the session subject
    pub require_ownership_for_deletion: bool,
    pub max_depth: usize,
    pub workers: usize,
    /// None keeps cached facts for the life of the process
    pub cache_ttl_seconds: Option<i64>,
    pub definitions_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            session_subject: "provisioner".to_string(),
            delete_empty_groups: true,
            delete_empty_folders: true,
            force_privileges: false,
            require_ownership_for_deletion: true,
            max_depth: 32,
            workers: 4,
            cache_ttl_seconds: None,
            definitions_path: None,
            database_path: None,
        }
    }
}

impl ProvisionerConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ProvisioningError::Settings(format!("YAML parsing error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading provisioner settings from {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProvisioningError::Settings(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_subject.trim().is_empty() {
            return Err(ProvisioningError::Settings(
                "session_subject cannot be empty".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(ProvisioningError::Settings(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ProvisioningError::Settings(
                "workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session(&self) -> Subject {
        Subject::person(&self.session_subject)
    }

    /// The cache these settings call for
    pub fn build_cache(&self) -> Arc<dyn IdempotencyCache> {
        match self.cache_ttl_seconds {
            Some(ttl) => {
                debug!("Cached facts expire after {} seconds", ttl);
                Arc::new(TtlCache::new(MemoryCache::new(), ttl))
            }
            None => Arc::new(MemoryCache::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ProvisionerConfig::from_yaml("{}").unwrap();
        assert_eq!(config, ProvisionerConfig::default());
        assert_eq!(config.session(), Subject::person("provisioner"));
        assert_eq!(config.max_depth, 32);
        assert!(config.require_ownership_for_deletion);
    }

    #[test]
    fn test_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "session_subject: sync-agent\nforce_privileges: true\nworkers: 8\ncache_ttl_seconds: 600"
        )
        .unwrap();

        let config = ProvisionerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.session_subject, "sync-agent");
        assert!(config.force_privileges);
        assert_eq!(config.workers, 8);
        assert_eq!(config.cache_ttl_seconds, Some(600));
        assert!(config.delete_empty_groups);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ProvisionerConfig::from_yaml("max_depth: 0"),
            Err(ProvisioningError::Settings(_))
        ));
        assert!(ProvisionerConfig::from_yaml("workers: 0").is_err());
        assert!(ProvisionerConfig::from_yaml("workers: [").is_err());
    }
}
