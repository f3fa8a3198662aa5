pub mod batch;
pub mod config;
pub mod error;
pub mod iterator;
pub mod mem;
pub mod prefix;
pub mod redb;
pub mod registry;
pub mod traits;
pub mod util;

pub use batch::{AtomicSetDeleter, Batch, LockedBatch, Op, WriteMode};
pub use config::DbConfig;
pub use error::{DbError, Result};
pub use iterator::{DbIterator, Direction, SnapshotIterator};
pub use mem::MemDb;
pub use prefix::PrefixDb;
pub use crate::redb::{RedbIterator, RedbStore};
pub use registry::{BackendType, Registry};
pub use traits::Store;
