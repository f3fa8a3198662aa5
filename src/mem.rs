use std::collections::BTreeMap;

use parking_lot::{MappedRwLockWriteGuard, RwLock, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::batch::{AtomicSetDeleter, Batch, LockedBatch, WriteMode};
use crate::error::{DbError, Result};
use crate::iterator::{DbIterator, Direction, SnapshotIterator};
use crate::traits::Store;
use crate::util;

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// MemDb is an in-memory Store over an ordered map.
///
/// Every write goes through the `AtomicSetDeleter` primitives under one
/// write lock, and batches are `LockedBatch`es over the same lock. There is
/// no durable medium, so sync and async writes behave the same.
///
/// `close` drops the map; later calls fail with `DbError::Closed`.
pub struct MemDb {
    map: RwLock<Option<Map>>,
}

impl MemDb {
    pub fn new() -> Self {
        debug!("MemDb: created");
        Self {
            map: RwLock::new(Some(Map::new())),
        }
    }

    fn closed() -> DbError {
        warn!("MemDb: used after close");
        DbError::Closed("memdb is closed".into())
    }

    fn read<T>(&self, f: impl FnOnce(&Map) -> T) -> Result<T> {
        let guard = self.map.read();
        let map = guard.as_ref().ok_or_else(Self::closed)?;
        Ok(f(map))
    }

    fn snapshot(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        direction: Direction,
    ) -> Result<Box<dyn DbIterator + '_>> {
        util::check_range(start, end)?;
        let entries = self.read(|map| {
            map.range::<[u8], _>(util::bounds(start, end))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Vec<_>>()
        })?;
        Ok(Box::new(SnapshotIterator::new(entries, start, end, direction)))
    }
}

impl Default for MemDb {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicSetDeleter for MemDb {
    type Guard<'a> = MappedRwLockWriteGuard<'a, Map>;

    fn lock(&self) -> Result<Self::Guard<'_>> {
        RwLockWriteGuard::try_map(self.map.write(), Option::as_mut).map_err(|_| Self::closed())
    }

    fn set_locked(
        &self,
        guard: &mut Self::Guard<'_>,
        key: &[u8],
        value: &[u8],
        _mode: WriteMode,
    ) -> Result<()> {
        guard.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete_locked(
        &self,
        guard: &mut Self::Guard<'_>,
        key: &[u8],
        _mode: WriteMode,
    ) -> Result<()> {
        guard.remove(key);
        Ok(())
    }
}

impl Store for MemDb {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.read(|map| map.get(key).cloned())
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        self.read(|map| map.contains_key(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut guard = self.lock()?;
        self.set_locked(&mut guard, key, value, WriteMode::Async)
    }

    fn set_sync(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut guard = self.lock()?;
        self.set_locked(&mut guard, key, value, WriteMode::Sync)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        let mut guard = self.lock()?;
        self.delete_locked(&mut guard, key, WriteMode::Async)
    }

    fn delete_sync(&self, key: &[u8]) -> Result<()> {
        let mut guard = self.lock()?;
        self.delete_locked(&mut guard, key, WriteMode::Sync)
    }

    fn iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<Box<dyn DbIterator + '_>> {
        self.snapshot(start, end, Direction::Forward)
    }

    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<Box<dyn DbIterator + '_>> {
        self.snapshot(start, end, Direction::Reverse)
    }

    fn new_batch(&self) -> Box<dyn Batch + '_> {
        Box::new(LockedBatch::new(self))
    }

    fn close(&self) -> Result<()> {
        if self.map.write().take().is_some() {
            debug!("MemDb: closed");
        }
        Ok(())
    }

    fn stats(&self) -> BTreeMap<String, String> {
        let mut stats = BTreeMap::new();
        stats.insert("database.type".to_string(), "memDB".to_string());
        match self.map.read().as_ref() {
            Some(map) => {
                stats.insert("database.size".to_string(), map.len().to_string());
            }
            None => {
                stats.insert("database.closed".to_string(), "true".to_string());
            }
        }
        stats
    }
}
