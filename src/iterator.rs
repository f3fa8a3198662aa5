use crate::error::Result;

/// Traversal direction, fixed when an iterator is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Cursor state shared by every iterator implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IterState {
    Ready,
    Exhausted,
    Closed,
}

impl IterState {
    /// Panic unless the cursor is positioned on an entry.
    pub(crate) fn assert_ready(self, op: &str) {
        match self {
            IterState::Ready => {}
            IterState::Exhausted => panic!("{} called on an exhausted iterator", op),
            IterState::Closed => panic!("{} called on a closed iterator", op),
        }
    }
}

/// DbIterator is a cursor over the half-open range `[start, end)` of a store.
///
/// A fresh iterator is positioned on the first entry in range (the last one
/// for reverse iterators), or is already exhausted if the range is empty.
/// Exhaustion is permanent.
///
/// `key`, `value` and `next` panic unless `valid()` is true. Callers loop with
/// `while it.valid() { ...; it.next(); }`.
pub trait DbIterator {
    /// The range this iterator was created with.
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>);

    /// Whether the cursor is positioned on an entry. Never panics.
    fn valid(&self) -> bool;

    /// Advance to the next entry in traversal order.
    fn next(&mut self);

    /// Key of the current entry.
    fn key(&self) -> &[u8];

    /// Value of the current entry.
    fn value(&self) -> &[u8];

    /// Deferred engine error encountered while iterating, if any.
    fn error(&self) -> Result<()>;

    /// Release the cursor. The iterator is invalid afterwards.
    fn close(&mut self) -> Result<()>;
}

/// Iterator over entries materialised from one consistent read.
///
/// For engines whose read view cannot outlive a lock guard. The range is
/// collected under a single read lock, so the iterator never observes half of
/// a concurrent batch and never holds the lock while the caller iterates.
pub struct SnapshotIterator {
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: usize,
    state: IterState,
}

impl SnapshotIterator {
    /// Build an iterator from entries sorted in ascending key order.
    pub fn new(
        entries: Vec<(Vec<u8>, Vec<u8>)>,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        direction: Direction,
    ) -> Self {
        let mut entries = entries;
        if direction == Direction::Reverse {
            entries.reverse();
        }
        let state = if entries.is_empty() {
            IterState::Exhausted
        } else {
            IterState::Ready
        };
        Self {
            start: start.map(<[u8]>::to_vec),
            end: end.map(<[u8]>::to_vec),
            entries,
            pos: 0,
            state,
        }
    }
}

impl DbIterator for SnapshotIterator {
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>) {
        (self.start.as_deref(), self.end.as_deref())
    }

    fn valid(&self) -> bool {
        self.state == IterState::Ready
    }

    fn next(&mut self) {
        self.state.assert_ready("next");
        self.pos += 1;
        if self.pos >= self.entries.len() {
            self.state = IterState::Exhausted;
            self.entries = Vec::new();
        }
    }

    fn key(&self) -> &[u8] {
        self.state.assert_ready("key");
        &self.entries[self.pos].0
    }

    fn value(&self) -> &[u8] {
        self.state.assert_ready("value");
        &self.entries[self.pos].1
    }

    fn error(&self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state = IterState::Closed;
        self.entries = Vec::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(keys: &[&[u8]]) -> Vec<(Vec<u8>, Vec<u8>)> {
        keys.iter().map(|k| (k.to_vec(), k.to_vec())).collect()
    }

    #[test]
    fn empty_snapshot_starts_exhausted() {
        let it = SnapshotIterator::new(Vec::new(), None, None, Direction::Forward);
        assert!(!it.valid());
        assert!(!it.valid());
    }

    #[test]
    fn reverse_snapshot_yields_descending() {
        let mut it = SnapshotIterator::new(
            entries(&[b"a", b"b", b"c"]),
            None,
            None,
            Direction::Reverse,
        );
        let mut seen = Vec::new();
        while it.valid() {
            seen.push(it.key().to_vec());
            it.next();
        }
        assert_eq!(seen, vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn domain_is_kept() {
        let it = SnapshotIterator::new(Vec::new(), Some(b"a".as_slice()), None, Direction::Forward);
        assert_eq!(it.domain(), (Some(&b"a"[..]), None));
    }

    #[test]
    #[should_panic(expected = "exhausted")]
    fn next_past_end_panics() {
        let mut it = SnapshotIterator::new(entries(&[b"a"]), None, None, Direction::Forward);
        it.next();
        assert!(!it.valid());
        it.next();
    }

    #[test]
    #[should_panic(expected = "exhausted")]
    fn key_on_exhausted_panics() {
        let it = SnapshotIterator::new(Vec::new(), None, None, Direction::Forward);
        let _ = it.key();
    }

    #[test]
    #[should_panic(expected = "closed")]
    fn value_after_close_panics() {
        let mut it = SnapshotIterator::new(entries(&[b"a"]), None, None, Direction::Forward);
        it.close().unwrap();
        assert!(!it.valid());
        let _ = it.value();
    }
}
