use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};
use crate::registry::{BackendType, Registry};
use crate::traits::Store;

/// Settings for opening one store.
///
/// Read from a TOML file:
///
/// ```toml
/// name = "state"
/// backend = "redb"
/// dir = "/var/lib/openerp"
/// ```
///
/// or from `--name=`, `--backend=`, `--dir=` flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Database name; the redb backend stores it as `{dir}/{name}.redb`.
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub backend: BackendType,

    #[serde(default = "default_dir")]
    pub dir: PathBuf,
}

fn default_name() -> String {
    "data".to_string()
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            backend: BackendType::default(),
            dir: default_dir(),
        }
    }
}

impl DbConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Parse configuration from command-line arguments.
    ///
    /// Unknown flags are ignored; an unknown backend name is an error.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = DbConfig::default();

        for arg in args {
            if let Some(val) = arg.strip_prefix("--name=") {
                config.name = val.to_string();
            } else if let Some(val) = arg.strip_prefix("--backend=") {
                config.backend = val
                    .parse()
                    .map_err(|e: DbError| DbError::Config(e.to_string()))?;
            } else if let Some(val) = arg.strip_prefix("--dir=") {
                config.dir = PathBuf::from(val);
            }
        }

        Ok(config)
    }

    /// Open the configured store.
    pub fn open(&self, registry: &Registry) -> Result<Box<dyn Store>> {
        registry.open_db(&self.name, self.backend, &self.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args() {
        let args = vec![
            "--name=state".to_string(),
            "--backend=redb".to_string(),
            "--dir=/tmp/openerp".to_string(),
        ];
        let config = DbConfig::from_args(&args).unwrap();
        assert_eq!(config.name, "state");
        assert_eq!(config.backend, BackendType::Redb);
        assert_eq!(config.dir, PathBuf::from("/tmp/openerp"));
    }

    #[test]
    fn test_bad_backend_flag() {
        let args = vec!["--backend=rocksdb".to_string()];
        assert!(matches!(DbConfig::from_args(&args), Err(DbError::Config(_))));
    }

    #[test]
    fn test_toml_defaults() {
        let config = DbConfig::from_toml("backend = \"redb\"").unwrap();
        assert_eq!(config.name, "data");
        assert_eq!(config.backend, BackendType::Redb);
        assert_eq!(config.dir, PathBuf::from("."));

        assert_eq!(DbConfig::from_toml("").unwrap(), DbConfig::default());
        assert!(DbConfig::from_toml("backend = \"nope\"").is_err());
    }

    #[test]
    fn test_load_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.toml");
        let content = format!(
            "name = \"state\"\nbackend = \"redb\"\ndir = {:?}\n",
            dir.path().join("data").display().to_string()
        );
        std::fs::write(&path, content).unwrap();

        let config = DbConfig::load(&path).unwrap();
        let db = config.open(&Registry::with_defaults()).unwrap();
        db.set_sync(b"k", b"v").unwrap();
        assert!(dir.path().join("data/state.redb").is_file());
    }

    #[test]
    fn test_load_missing_file() {
        let err = DbConfig::load(Path::new("/nonexistent/db.toml")).unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
    }
}
