use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use redb::{Database, Durability, TableDefinition};
use tracing::{debug, warn};

use crate::batch::{Batch, Op, OpBuffer, WriteMode};
use crate::error::{DbError, Result, storage_err};
use crate::iterator::{DbIterator, Direction, IterState};
use crate::traits::Store;
use crate::util;

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("kv");

/// RedbStore is a Store backed by redb, a pure-Rust embedded key-value
/// database.
///
/// Each point write and each batch is one redb write transaction, so batches
/// are atomic natively. Async writes commit with `Durability::Eventual`, sync
/// writes with `Durability::Immediate`. Iterators stream from one read
/// transaction, so they see the state as of their creation.
pub struct RedbStore {
    path: PathBuf,
    db: RwLock<Option<Database>>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(storage_err)?;
        create_table(&db)?;
        debug!("RedbStore: opened {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            db: RwLock::new(Some(db)),
        })
    }

    /// Open `{dir}/{name}.redb`, creating `dir` if needed.
    pub fn open_in(name: &str, dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(storage_err)?;
        Self::open(&dir.join(format!("{}.redb", name)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let guard = self.db.read();
        match guard.as_ref() {
            Some(db) => f(db),
            None => {
                warn!("RedbStore: {:?} used after close", self.path);
                Err(DbError::Closed(format!("redb store {:?} is closed", self.path)))
            }
        }
    }

    /// Apply ops in order inside a single write transaction.
    fn commit(&self, ops: &[Op], mode: WriteMode) -> Result<()> {
        self.with_db(|db| {
            let mut write_txn = db.begin_write().map_err(storage_err)?;
            write_txn.set_durability(match mode {
                WriteMode::Async => Durability::Eventual,
                WriteMode::Sync => Durability::Immediate,
            });
            {
                let mut table = write_txn.open_table(TABLE).map_err(storage_err)?;
                for op in ops {
                    match op {
                        Op::Set { key, value } => {
                            table
                                .insert(key.as_slice(), value.as_slice())
                                .map_err(storage_err)?;
                        }
                        Op::Delete { key } => {
                            table.remove(key.as_slice()).map_err(storage_err)?;
                        }
                    }
                }
            }
            write_txn.commit().map_err(storage_err)
        })
    }

    fn cursor(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        direction: Direction,
    ) -> Result<Box<dyn DbIterator + '_>> {
        util::check_range(start, end)?;
        let range = self.with_db(|db| {
            let read_txn = db.begin_read().map_err(storage_err)?;
            let table = read_txn.open_table(TABLE).map_err(storage_err)?;
            table
                .range::<&[u8]>(util::bounds(start, end))
                .map_err(storage_err)
        })?;
        Ok(Box::new(RedbIterator::new(range, start, end, direction)))
    }
}

/// Commit the kv table once so read transactions can open it on a fresh file.
fn create_table(db: &Database) -> Result<()> {
    let write_txn = db.begin_write().map_err(storage_err)?;
    write_txn.open_table(TABLE).map_err(storage_err)?;
    write_txn.commit().map_err(storage_err)
}

impl Store for RedbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_db(|db| {
            let read_txn = db.begin_read().map_err(storage_err)?;
            let table = read_txn.open_table(TABLE).map_err(storage_err)?;

            match table.get(key) {
                Ok(Some(val)) => Ok(Some(val.value().to_vec())),
                Ok(None) => Ok(None),
                Err(e) => Err(storage_err(e)),
            }
        })
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.commit(&[Op::Set { key: key.to_vec(), value: value.to_vec() }], WriteMode::Async)
    }

    fn set_sync(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.commit(&[Op::Set { key: key.to_vec(), value: value.to_vec() }], WriteMode::Sync)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.commit(&[Op::Delete { key: key.to_vec() }], WriteMode::Async)
    }

    fn delete_sync(&self, key: &[u8]) -> Result<()> {
        self.commit(&[Op::Delete { key: key.to_vec() }], WriteMode::Sync)
    }

    fn iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<Box<dyn DbIterator + '_>> {
        self.cursor(start, end, Direction::Forward)
    }

    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<Box<dyn DbIterator + '_>> {
        self.cursor(start, end, Direction::Reverse)
    }

    fn new_batch(&self) -> Box<dyn Batch + '_> {
        Box::new(RedbBatch {
            store: self,
            buffer: OpBuffer::new(),
        })
    }

    fn close(&self) -> Result<()> {
        if self.db.write().take().is_some() {
            debug!("RedbStore: closed {:?}", self.path);
        }
        Ok(())
    }

    fn stats(&self) -> BTreeMap<String, String> {
        let mut stats = BTreeMap::new();
        stats.insert("database.type".to_string(), "redb".to_string());
        stats.insert("database.path".to_string(), self.path.display().to_string());
        if self.db.read().is_none() {
            stats.insert("database.closed".to_string(), "true".to_string());
        }
        stats
    }
}

/// Streaming cursor over a redb range.
///
/// The range holds its read transaction alive, so entries are pulled one at a
/// time from a fixed snapshot. Only the current entry is copied out.
pub struct RedbIterator {
    range: Option<redb::Range<'static, &'static [u8], &'static [u8]>>,
    direction: Direction,
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    key: Vec<u8>,
    value: Vec<u8>,
    state: IterState,
    err: Option<String>,
}

impl RedbIterator {
    fn new(
        range: redb::Range<'static, &'static [u8], &'static [u8]>,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        direction: Direction,
    ) -> Self {
        let mut it = Self {
            range: Some(range),
            direction,
            start: start.map(<[u8]>::to_vec),
            end: end.map(<[u8]>::to_vec),
            key: Vec::new(),
            value: Vec::new(),
            state: IterState::Exhausted,
            err: None,
        };
        it.advance();
        it
    }

    fn advance(&mut self) {
        let entry = match (self.range.as_mut(), self.direction) {
            (Some(range), Direction::Forward) => range.next(),
            (Some(range), Direction::Reverse) => range.next_back(),
            (None, _) => None,
        };
        match entry {
            Some(Ok((key, value))) => {
                self.key.clear();
                self.key.extend_from_slice(key.value());
                self.value.clear();
                self.value.extend_from_slice(value.value());
                self.state = IterState::Ready;
            }
            Some(Err(e)) => {
                warn!("RedbIterator: read failed: {}", e);
                self.err = Some(e.to_string());
                self.release(IterState::Exhausted);
            }
            None => self.release(IterState::Exhausted),
        }
    }

    /// Drop the range and its read transaction.
    fn release(&mut self, state: IterState) {
        self.range = None;
        self.key = Vec::new();
        self.value = Vec::new();
        self.state = state;
    }
}

impl DbIterator for RedbIterator {
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>) {
        (self.start.as_deref(), self.end.as_deref())
    }

    fn valid(&self) -> bool {
        self.state == IterState::Ready
    }

    fn next(&mut self) {
        self.state.assert_ready("next");
        self.advance();
    }

    fn key(&self) -> &[u8] {
        self.state.assert_ready("key");
        &self.key
    }

    fn value(&self) -> &[u8] {
        self.state.assert_ready("value");
        &self.value
    }

    fn error(&self) -> Result<()> {
        match &self.err {
            Some(e) => Err(DbError::Storage(e.clone())),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.release(IterState::Closed);
        Ok(())
    }
}

/// Batch committed as one redb write transaction.
pub struct RedbBatch<'a> {
    store: &'a RedbStore,
    buffer: OpBuffer,
}

impl RedbBatch<'_> {
    fn apply(&mut self, mode: WriteMode) -> Result<()> {
        let ops = self.buffer.take()?;
        self.store.commit(&ops, mode)?;
        debug!("RedbBatch: committed {} ops ({:?})", ops.len(), mode);
        Ok(())
    }
}

impl Batch for RedbBatch<'_> {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.buffer.push(Op::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.buffer.push(Op::Delete { key: key.to_vec() })
    }

    fn write(&mut self) -> Result<()> {
        self.apply(WriteMode::Async)
    }

    fn write_sync(&mut self) -> Result<()> {
        self.apply(WriteMode::Sync)
    }

    fn close(&mut self) {
        self.buffer.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> (RedbStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(&dir.path().join("test.redb")).unwrap();
        (store, dir)
    }

    #[test]
    fn sync_and_async_writes_are_visible() {
        let (store, _dir) = open_store();
        store.set(b"a", b"1").unwrap();
        store.set_sync(b"b", b"2").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));

        store.delete(b"a").unwrap();
        store.delete_sync(b"b").unwrap();
        assert!(!store.has(b"a").unwrap());
        assert!(!store.has(b"b").unwrap());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persist.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            let mut batch = store.new_batch();
            batch.set(b"k1", b"v1").unwrap();
            batch.set(b"k2", b"").unwrap();
            batch.write_sync().unwrap();
            store.close().unwrap();
        }

        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get(b"k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(store.get(b"k2").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn batch_applies_in_order() {
        let (store, _dir) = open_store();
        store.set(b"3", b"old").unwrap();

        let mut batch = store.new_batch();
        batch.set(b"1", b"1").unwrap();
        batch.set(b"2", b"2").unwrap();
        batch.delete(b"3").unwrap();
        batch.set(b"4", b"4").unwrap();
        batch.set(b"4", b"44").unwrap();
        batch.write().unwrap();

        assert_eq!(store.get(b"1").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"2").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.get(b"3").unwrap(), None);
        assert_eq!(store.get(b"4").unwrap(), Some(b"44".to_vec()));
        assert!(matches!(batch.set(b"5", b"5"), Err(DbError::Closed(_))));
    }

    #[test]
    fn open_in_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open_in("named", &dir.path().join("nested")).unwrap();
        assert!(store.path().ends_with("nested/named.redb"));
        assert_eq!(store.stats()["database.type"], "redb");
    }

    fn drain(mut it: Box<dyn DbIterator + '_>) -> Vec<Vec<u8>> {
        let mut keys = Vec::new();
        while it.valid() {
            keys.push(it.key().to_vec());
            it.next();
        }
        it.error().unwrap();
        keys
    }

    #[test]
    fn iterator_reads_state_as_of_creation() {
        let (store, _dir) = open_store();
        for i in 0..10u8 {
            store.set(&[i], &[i]).unwrap();
        }

        let mut it = store.iterator(Some([2u8].as_slice()), Some([8u8].as_slice())).unwrap();
        assert_eq!(it.key(), &[2u8][..]);

        store.delete(&[3]).unwrap();
        store.set(&[4], b"new").unwrap();
        store.set(&[5, 0], b"inserted").unwrap();

        let mut seen = Vec::new();
        while it.valid() {
            seen.push((it.key().to_vec(), it.value().to_vec()));
            it.next();
        }
        let expected: Vec<_> = (2..8u8).map(|i| (vec![i], vec![i])).collect();
        assert_eq!(seen, expected);

        // A fresh cursor sees the writes.
        let keys = drain(store.iterator(Some([2u8].as_slice()), Some([6u8].as_slice())).unwrap());
        assert_eq!(keys, vec![vec![2], vec![4], vec![5], vec![5, 0]]);
    }

    #[test]
    fn reverse_iterator_walks_back_from_end() {
        let (store, _dir) = open_store();
        for k in [b"a", b"b", b"c", b"d"] {
            store.set(k, b"v").unwrap();
        }
        let keys = drain(store.reverse_iterator(Some(b"b".as_slice()), Some(b"d".as_slice())).unwrap());
        assert_eq!(keys, vec![b"c".to_vec(), b"b".to_vec()]);

        let keys = drain(store.reverse_iterator(None, None).unwrap());
        assert_eq!(keys.first(), Some(&b"d".to_vec()));
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn closing_iterator_early_releases_read() {
        let (store, _dir) = open_store();
        for i in 0..100u8 {
            store.set(&[i], b"v").unwrap();
        }
        let mut it = store.iterator(None, None).unwrap();
        assert!(it.valid());
        it.close().unwrap();
        assert!(!it.valid());
        it.error().unwrap();

        store.set(&[200], b"v").unwrap();
        assert_eq!(drain(store.iterator(None, None).unwrap()).len(), 101);
    }

    #[test]
    fn closed_store_rejects_operations() {
        let (store, _dir) = open_store();
        store.close().unwrap();
        assert!(matches!(store.get(b"a"), Err(DbError::Closed(_))));
        assert!(matches!(store.set_sync(b"a", b"1"), Err(DbError::Closed(_))));
        assert!(matches!(store.reverse_iterator(None, None), Err(DbError::Closed(_))));
        store.close().unwrap();
    }
}
