use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DbError, Result};
use crate::mem::MemDb;
use crate::redb::RedbStore;
use crate::traits::Store;

/// Storage engines known to the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    #[default]
    MemDb,
    Redb,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::MemDb => "memdb",
            BackendType::Redb => "redb",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memdb" => Ok(BackendType::MemDb),
            "redb" => Ok(BackendType::Redb),
            other => Err(DbError::InvalidArgument(format!("unknown backend: {}", other))),
        }
    }
}

/// Opens a store given a database name and a directory.
pub type Opener = fn(name: &str, dir: &Path) -> Result<Box<dyn Store>>;

/// Registry maps backend types to their open functions.
///
/// Build one at startup with `Registry::with_defaults()` and pass it to
/// whatever opens stores; there is no process-global table.
pub struct Registry {
    openers: BTreeMap<BackendType, Opener>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            openers: BTreeMap::new(),
        }
    }

    /// A registry with every built-in engine.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(BackendType::MemDb, open_memdb);
        registry.register(BackendType::Redb, open_redb);
        registry
    }

    /// Register an opener, replacing any previous one for `backend`.
    pub fn register(&mut self, backend: BackendType, opener: Opener) {
        if self.openers.insert(backend, opener).is_some() {
            debug!("Registry: replaced opener for {}", backend);
        }
    }

    /// Registered backends in sorted order.
    pub fn backends(&self) -> Vec<BackendType> {
        self.openers.keys().copied().collect()
    }

    /// Open database `name` in `dir` with the given backend.
    pub fn open_db(&self, name: &str, backend: BackendType, dir: &Path) -> Result<Box<dyn Store>> {
        let opener = self.openers.get(&backend).ok_or_else(|| {
            DbError::InvalidArgument(format!("backend {} is not registered", backend))
        })?;
        debug!("Registry: opening {} with {} in {:?}", name, backend, dir);
        opener(name, dir)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn open_memdb(_name: &str, _dir: &Path) -> Result<Box<dyn Store>> {
    Ok(Box::new(MemDb::new()))
}

fn open_redb(name: &str, dir: &Path) -> Result<Box<dyn Store>> {
    Ok(Box::new(RedbStore::open_in(name, dir)?))
}
