use std::collections::BTreeMap;

use crate::batch::Batch;
use crate::error::Result;
use crate::iterator::{DbIterator, IterState};
use crate::traits::Store;
use crate::util;

/// PrefixDb exposes the keys of an inner store that start with a fixed
/// prefix, with the prefix stripped.
///
/// Every key is written to the inner store as `prefix ++ key`. Keys outside
/// the prefixed range are never visible. Wrappers nest:
/// `PrefixDb::new(PrefixDb::new(db, p1), p2)` stores `p1 ++ p2 ++ key`.
///
/// `close` closes the inner store.
pub struct PrefixDb<S> {
    db: S,
    prefix: Vec<u8>,
}

impl<S: Store> PrefixDb<S> {
    pub fn new(db: S, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            db,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn inner(&self) -> &S {
        &self.db
    }

    fn prefixed(&self, key: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.prefix.len() + key.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(key);
        out
    }

    /// Map a caller range onto the inner store's key space.
    fn prefixed_range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<(Vec<u8>, Option<Vec<u8>>)> {
        util::check_range(start, end)?;
        let pstart = self.prefixed(start.unwrap_or_default());
        let pend = match end {
            Some(e) => Some(self.prefixed(e)),
            None => util::prefix_end(&self.prefix),
        };
        Ok((pstart, pend))
    }
}

impl<S: Store> Store for PrefixDb<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db.get(&self.prefixed(key))
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        self.db.has(&self.prefixed(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.set(&self.prefixed(key), value)
    }

    fn set_sync(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.set_sync(&self.prefixed(key), value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.db.delete(&self.prefixed(key))
    }

    fn delete_sync(&self, key: &[u8]) -> Result<()> {
        self.db.delete_sync(&self.prefixed(key))
    }

    fn iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<Box<dyn DbIterator + '_>> {
        let (pstart, pend) = self.prefixed_range(start, end)?;
        let source = self.db.iterator(Some(&pstart), pend.as_deref())?;
        Ok(Box::new(PrefixIterator::new(source, &self.prefix, start, end)))
    }

    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<Box<dyn DbIterator + '_>> {
        let (pstart, pend) = self.prefixed_range(start, end)?;
        let source = self.db.reverse_iterator(Some(&pstart), pend.as_deref())?;
        Ok(Box::new(PrefixIterator::new(source, &self.prefix, start, end)))
    }

    fn new_batch(&self) -> Box<dyn Batch + '_> {
        Box::new(PrefixBatch {
            source: self.db.new_batch(),
            prefix: self.prefix.clone(),
        })
    }

    fn close(&self) -> Result<()> {
        self.db.close()
    }

    fn stats(&self) -> BTreeMap<String, String> {
        let mut stats = self.db.stats();
        stats.insert(
            "prefixdb.prefix".to_string(),
            String::from_utf8_lossy(&self.prefix).into_owned(),
        );
        stats
    }
}

/// Iterator over an inner iterator's prefixed keys, yielding them stripped.
pub struct PrefixIterator<'a> {
    source: Box<dyn DbIterator + 'a>,
    prefix: Vec<u8>,
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    state: IterState,
}

impl<'a> PrefixIterator<'a> {
    fn new(
        source: Box<dyn DbIterator + 'a>,
        prefix: &[u8],
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Self {
        let mut it = Self {
            source,
            prefix: prefix.to_vec(),
            start: start.map(<[u8]>::to_vec),
            end: end.map(<[u8]>::to_vec),
            state: IterState::Exhausted,
        };
        it.sync_state();
        it
    }

    /// Ready iff the source sits on a key inside our prefix and range.
    fn sync_state(&mut self) {
        let ready = self.source.valid() && {
            let key = self.source.key();
            key.starts_with(&self.prefix)
                && util::in_domain(
                    &key[self.prefix.len()..],
                    self.start.as_deref(),
                    self.end.as_deref(),
                )
        };
        self.state = if ready {
            IterState::Ready
        } else {
            IterState::Exhausted
        };
    }
}

impl DbIterator for PrefixIterator<'_> {
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>) {
        (self.start.as_deref(), self.end.as_deref())
    }

    fn valid(&self) -> bool {
        self.state == IterState::Ready
    }

    fn next(&mut self) {
        self.state.assert_ready("next");
        self.source.next();
        self.sync_state();
    }

    fn key(&self) -> &[u8] {
        self.state.assert_ready("key");
        &self.source.key()[self.prefix.len()..]
    }

    fn value(&self) -> &[u8] {
        self.state.assert_ready("value");
        self.source.value()
    }

    fn error(&self) -> Result<()> {
        self.source.error()
    }

    fn close(&mut self) -> Result<()> {
        self.state = IterState::Closed;
        self.source.close()
    }
}

/// Batch that prefixes keys before buffering them in the inner batch.
pub struct PrefixBatch<'a> {
    source: Box<dyn Batch + 'a>,
    prefix: Vec<u8>,
}

impl PrefixBatch<'_> {
    fn prefixed(&self, key: &[u8]) -> Vec<u8> {
        [self.prefix.as_slice(), key].concat()
    }
}

impl Batch for PrefixBatch<'_> {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let key = self.prefixed(key);
        self.source.set(&key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        let key = self.prefixed(key);
        self.source.delete(&key)
    }

    fn write(&mut self) -> Result<()> {
        self.source.write()
    }

    fn write_sync(&mut self) -> Result<()> {
        self.source.write_sync()
    }

    fn close(&mut self) {
        self.source.close();
    }
}
