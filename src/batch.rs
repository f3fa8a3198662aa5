use tracing::debug;

use crate::error::{DbError, Result};

/// Durability requested for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Visible immediately, durable eventually.
    Async,
    /// Durable before the call returns.
    Sync,
}

/// A buffered mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Batch buffers writes and applies them to its store as one atomic unit.
///
/// Operations are applied in insertion order, so the last write to a key
/// wins. After `write`, `write_sync` or `close` the batch is closed and every
/// mutating call returns `DbError::Closed`. `close` itself is idempotent.
pub trait Batch {
    /// Buffer a set.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Buffer a delete.
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Apply all buffered operations atomically, then close the batch.
    fn write(&mut self) -> Result<()>;

    /// Like `write`, but durable before returning.
    fn write_sync(&mut self) -> Result<()>;

    /// Discard buffered operations without applying them.
    fn close(&mut self);
}

/// Insertion-ordered op buffer with the closed-after-write rule.
#[derive(Debug, Default)]
pub struct OpBuffer {
    ops: Vec<Op>,
    closed: bool,
}

impl OpBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: Op) -> Result<()> {
        if self.closed {
            return Err(DbError::Closed("batch has been written or closed".into()));
        }
        self.ops.push(op);
        Ok(())
    }

    /// Take the buffered ops and close the buffer.
    pub fn take(&mut self) -> Result<Vec<Op>> {
        if self.closed {
            return Err(DbError::Closed("batch has been written or closed".into()));
        }
        self.closed = true;
        Ok(std::mem::take(&mut self.ops))
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.ops.clear();
    }
}

/// Single-key write primitives for engines without a native atomic batch.
///
/// `lock` enters the engine's critical section; the `_locked` methods
/// require the returned guard and never take the lock themselves. A caller
/// applying several writes holds one guard for all of them, so readers see
/// either none or all of the writes.
pub trait AtomicSetDeleter: Send + Sync {
    type Guard<'a>
    where
        Self: 'a;

    /// Acquire the write lock. Fails if the store is closed.
    fn lock(&self) -> Result<Self::Guard<'_>>;

    fn set_locked(
        &self,
        guard: &mut Self::Guard<'_>,
        key: &[u8],
        value: &[u8],
        mode: WriteMode,
    ) -> Result<()>;

    fn delete_locked(&self, guard: &mut Self::Guard<'_>, key: &[u8], mode: WriteMode)
    -> Result<()>;
}

/// LockedBatch applies its buffer through an engine's locked primitives,
/// holding the engine lock once for the whole batch.
///
/// For `write_sync` only the final operation carries `WriteMode::Sync`; a
/// durable last write flushes everything before it.
pub struct LockedBatch<'a, D: AtomicSetDeleter + ?Sized> {
    db: &'a D,
    buffer: OpBuffer,
}

impl<'a, D: AtomicSetDeleter + ?Sized> LockedBatch<'a, D> {
    pub fn new(db: &'a D) -> Self {
        Self {
            db,
            buffer: OpBuffer::new(),
        }
    }

    fn apply(&mut self, mode: WriteMode) -> Result<()> {
        let ops = self.buffer.take()?;
        let mut guard = self.db.lock()?;
        let last = ops.len().saturating_sub(1);
        for (i, op) in ops.iter().enumerate() {
            let op_mode = if i == last { mode } else { WriteMode::Async };
            match op {
                Op::Set { key, value } => self.db.set_locked(&mut guard, key, value, op_mode)?,
                Op::Delete { key } => self.db.delete_locked(&mut guard, key, op_mode)?,
            }
        }
        debug!("LockedBatch: applied {} ops ({:?})", ops.len(), mode);
        Ok(())
    }
}

impl<D: AtomicSetDeleter + ?Sized> Batch for LockedBatch<'_, D> {
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
