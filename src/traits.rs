use std::collections::BTreeMap;
use std::sync::Arc;

use crate::batch::Batch;
use crate::error::Result;
use crate::iterator::DbIterator;

/// Store is the key-value contract every engine and wrapper implements.
///
/// Keys are ordered bytewise. `get` returns `None` for an absent key and
/// `Some(vec![])` for a key holding an empty value. Writes through `set` and
/// `delete` are visible to subsequent reads immediately; the `_sync` variants
/// also wait for the write to be durable.
///
/// After `close` every operation fails with `DbError::Closed`.
pub trait Store: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Check whether a key exists.
    fn has(&self, key: &[u8]) -> Result<bool>;

    /// Set a key-value pair. May return before the write is durable.
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Set a key-value pair and flush it to durable storage.
    fn set_sync(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key. Deleting an absent key is a no-op.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Delete a key and flush the removal to durable storage.
    fn delete_sync(&self, key: &[u8]) -> Result<()>;

    /// Iterate `[start, end)` in ascending key order. `None` leaves that side
    /// unbounded.
    fn iterator(&self, start: Option<&[u8]>, end: Option<&[u8]>)
    -> Result<Box<dyn DbIterator + '_>>;

    /// Iterate `[start, end)` in descending key order.
    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<Box<dyn DbIterator + '_>>;

    /// Create an empty batch of pending writes.
    fn new_batch(&self) -> Box<dyn Batch + '_>;

    /// Release the store's resources.
    fn close(&self) -> Result<()>;

    /// Engine statistics, keyed by dotted names such as `database.type`.
    fn stats(&self) -> BTreeMap<String, String>;
}

macro_rules! forward_store {
    ($($ty:ty),*) => {$(
        impl<S: Store + ?Sized> Store for $ty {
            fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
                (**self).get(key)
            }

            fn has(&self, key: &[u8]) -> Result<bool> {
                (**self).has(key)
            }

            fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
                (**self).set(key, value)
            }

            fn set_sync(&self, key: &[u8], value: &[u8]) -> Result<()> {
                (**self).set_sync(key, value)
            }

            fn delete(&self, key: &[u8]) -> Result<()> {
                (**self).delete(key)
            }

            fn delete_sync(&self, key: &[u8]) -> Result<()> {
                (**self).delete_sync(key)
            }

            fn iterator(
                &self,
                start: Option<&[u8]>,
                end: Option<&[u8]>,
            ) -> Result<Box<dyn DbIterator + '_>> {
                (**self).iterator(start, end)
            }

            fn reverse_iterator(
                &self,
                start: Option<&[u8]>,
                end: Option<&[u8]>,
            ) -> Result<Box<dyn DbIterator + '_>> {
                (**self).reverse_iterator(start, end)
            }

            fn new_batch(&self) -> Box<dyn Batch + '_> {
                (**self).new_batch()
            }

            fn close(&self) -> Result<()> {
                (**self).close()
            }

            fn stats(&self) -> BTreeMap<String, String> {
                (**self).stats()
            }
        }
    )*};
}

forward_store!(&S, Box<S>, Arc<S>);
