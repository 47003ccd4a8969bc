//! # Sled Backend
//!
//! Write-batch transactions over a `sled::Db`. Mutations are staged into a
//! `sled::Batch` and applied atomically at commit; reads always pass through
//! to the committed tree, so staged writes are invisible within the same
//! transaction. This is the weaker read model the `Txn` contract is written
//! for.

use std::path::Path;

use crate::engine::{EngineResult, KvEngine, Pair, Txn};

/// Default backend. One `sled::Db` per shard directory.
pub struct SledEngine {
    db: sled::Db,
}

impl SledEngine {
    /// Opens (or creates) a shard directory.
    pub fn open(path: &Path) -> EngineResult<Self> {
        let db = sled::open(path)?;
        Ok(SledEngine { db })
    }
}

struct SledTxn<'a> {
    db: &'a sled::Db,
    batch: sled::Batch,
}

impl Txn for SledTxn<'_> {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|value| value.to_vec()))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> EngineResult<()> {
        self.batch.insert(key, value);
        Ok(())
    }

    fn del(&mut self, key: &[u8]) -> EngineResult<()> {
        self.batch.remove(key);
        Ok(())
    }

    fn scan(&self, prefix: &[u8]) -> EngineResult<Vec<Pair>> {
        collect_iter(self.db.scan_prefix(prefix))
    }

    fn range(&self, start: &[u8], end: &[u8]) -> EngineResult<Vec<Pair>> {
        if start >= end {
            return Ok(Vec::new());
        }
        collect_iter(self.db.range(start..end))
    }
}

impl KvEngine for SledEngine {
    fn transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn Txn) -> EngineResult<()>,
    ) -> EngineResult<()> {
        let mut txn = SledTxn {
            db: &self.db,
            batch: sled::Batch::default(),
        };
        f(&mut txn)?;
        self.db.apply_batch(txn.batch)?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|value| value.to_vec()))
    }

    fn scan(&self, prefix: &[u8]) -> EngineResult<Vec<Pair>> {
        collect_iter(self.db.scan_prefix(prefix))
    }

    fn range(&self, start: &[u8], end: &[u8]) -> EngineResult<Vec<Pair>> {
        if start >= end {
            return Ok(Vec::new());
        }
        collect_iter(self.db.range(start..end))
    }

    fn close(&self) -> EngineResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn collect_iter(iter: sled::Iter) -> EngineResult<Vec<Pair>> {
    let mut out = Vec::new();
    for row in iter {
        let (key, value) = row?;
        out.push(Pair {
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }
    Ok(out)
}
