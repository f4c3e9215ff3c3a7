use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Environment-based path configuration
#[derive(Debug, Clone)]
pub struct EnvPaths {
    pub config_path: PathBuf,
    pub definitions_path: PathBuf,
    pub database_path: PathBuf,
}

impl EnvPaths {
    /// Load paths from environment variables with defaults
    pub fn load() -> Result<Self> {
        Self::load_with_base(None)
    }

    /// Load paths from environment variables with an optional base directory
    pub fn load_with_base(base_dir: Option<PathBuf>) -> Result<Self> {
        let base = if let Some(base) = base_dir {
            base
        } else {
            // Try to load .env file if it exists in current directory
            if let Ok(env_path) = env::current_dir() {
                let env_file = env_path.join(".env");
                if env_file.exists() {
                    dotenv::from_path(&env_file).ok();
                }
            }
            env::current_dir().context("Failed to get current directory")?
        };

        Ok(Self {
            config_path: Self::get_path_from_env("PROVISIONER_CONFIG", "./provisioner.yaml", &base),
            definitions_path: Self::get_path_from_env("DEFINITIONS_PATH", "./definitions", &base),
            database_path: Self::get_path_from_env("DATABASE_PATH", "./data/groups.db", &base),
        })
    }

    /// Get a path from environment variable or use default
    fn get_path_from_env(var_name: &str, default: &str, base_dir: &Path) -> PathBuf {
        let path = PathBuf::from(env::var(var_name).unwrap_or_else(|_| default.to_string()));

        // If the path is relative, make it relative to the base directory
        if path.is_relative() {
            base_dir.join(path)
        } else {
            path
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Use a mutex to ensure tests don't interfere with each other's environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("PROVISIONER_CONFIG");
        env::remove_var("DEFINITIONS_PATH");
        env::remove_var("DATABASE_PATH");
    }

    #[test]
    fn test_defaults_relative_to_base() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().to_path_buf();
        let paths = EnvPaths::load_with_base(Some(base.clone())).unwrap();

        assert_eq!(paths.config_path, base.join("provisioner.yaml"));
        assert_eq!(paths.definitions_path, base.join("definitions"));
        assert_eq!(paths.database_path, base.join("data/groups.db"));
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let temp_dir = TempDir::new().unwrap();
        let absolute = temp_dir.path().join("store.db");
        env::set_var("DEFINITIONS_PATH", "./custom_definitions");
        env::set_var("DATABASE_PATH", absolute.to_str().unwrap());

        let paths = EnvPaths::load().unwrap();
        assert!(paths.definitions_path.ends_with("custom_definitions"));
        assert_eq!(paths.database_path, absolute);
        assert!(paths.config_path.ends_with("provisioner.yaml"));

        clear_env();
    }
}
