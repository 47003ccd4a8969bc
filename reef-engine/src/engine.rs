//! # Storage Engine Interface
//!
//! ## Design Principles
//!
//! 1. **Strategy Pattern**: The engine sits behind a trait so backends can be
//!    swapped without touching the data-type operators.
//! 2. **Binary-Safe API**: Keys and values are raw byte buffers; the ordered
//!    key space is compared lexicographically.
//! 3. **Write-Batch Transactions**: All mutations are staged on a transaction
//!    handle and committed atomically; an error from the closure discards
//!    every staged write.
//! 4. **Snapshot Reads**: Reads made through a transaction observe at least
//!    the committed pre-transaction state. Whether staged writes are visible
//!    is backend-dependent and callers must not rely on it.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the storage backends.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("unknown engine kind '{0}'")]
    UnknownKind(String),

    /// Sentinel used by callers to roll back a transaction on purpose.
    #[error("transaction aborted")]
    Aborted,
}

/// One key/value row returned by `scan`/`range`.
///
/// Rows are owned copies so results stay valid past the backing iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Capability surface handed to transaction closures.
///
/// `put`/`del` are staged and become durable only when the surrounding
/// transaction commits. `get`/`scan`/`range` read the committed state; a
/// backend may additionally reflect staged writes (redb does, sled does not),
/// so correct callers track their own in-flight mutations in locals.
pub trait Txn {
    /// Point lookup. `None` iff the key is absent.
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>>;

    /// Stages an insert or overwrite.
    fn put(&mut self, key: &[u8], value: &[u8]) -> EngineResult<()>;

    /// Stages a delete. Deleting an absent key is not an error.
    fn del(&mut self, key: &[u8]) -> EngineResult<()>;

    /// All pairs whose key starts with `prefix`, in lexicographic order.
    fn scan(&self, prefix: &[u8]) -> EngineResult<Vec<Pair>>;

    /// All pairs with `start <= key < end`, in lexicographic order.
    fn range(&self, start: &[u8], end: &[u8]) -> EngineResult<Vec<Pair>>;
}

/// Strategy trait implemented by each storage backend.
pub trait KvEngine: Send + Sync {
    /// Runs `f` exactly once and atomically commits the writes it staged.
    /// When `f` returns an error nothing is written and the error surfaces.
    fn transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn Txn) -> EngineResult<()>,
    ) -> EngineResult<()>;

    /// Point lookup against the committed state.
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>>;

    /// Prefix scan against the committed state.
    fn scan(&self, prefix: &[u8]) -> EngineResult<Vec<Pair>>;

    /// Half-open range scan against the committed state.
    fn range(&self, start: &[u8], end: &[u8]) -> EngineResult<Vec<Pair>>;

    /// Flushes buffered state before shutdown.
    fn close(&self) -> EngineResult<()> {
        Ok(())
    }
}

/// Selectable storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    /// Log-structured backend with write-batch transactions.
    #[default]
    Sled,
    /// B-tree file backend with read-your-writes transactions.
    Redb,
}

impl FromStr for EngineKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sled" => Ok(EngineKind::Sled),
            "redb" => Ok(EngineKind::Redb),
            other => Err(EngineError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Sled => f.write_str("sled"),
            EngineKind::Redb => f.write_str("redb"),
        }
    }
}

/// Opens a shard directory with the selected backend.
pub fn open_engine(kind: EngineKind, path: &Path) -> EngineResult<Box<dyn KvEngine>> {
    match kind {
        EngineKind::Sled => Ok(Box::new(crate::SledEngine::open(path)?)),
        EngineKind::Redb => Ok(Box::new(crate::RedbEngine::open(path)?)),
    }
}

/// Smallest byte string strictly greater than every key carrying `prefix`.
///
/// Used to turn a prefix scan into a half-open range. `None` when the prefix
/// is empty or all `0xFF`, in which case no finite upper bound exists.
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.last_mut() {
        if *last == 0xFF {
            upper.pop();
        } else {
            *last += 1;
            return Some(upper);
        }
    }
    None
}
