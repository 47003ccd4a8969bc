//! # Redb Backend
//!
//! B-tree file database with real ACID transactions. Unlike the sled batch
//! model, mutations land in the write transaction's table immediately, so
//! reads inside a transaction do observe earlier writes from the same
//! transaction. Callers must treat that as a bonus, not a guarantee.

use std::path::Path;

use redb::{Database, ReadableTable, Table, TableDefinition};

use crate::engine::{prefix_successor, EngineResult, KvEngine, Pair, Txn};

const DATA_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("reef");

/// B-tree backend. One single-file database per shard directory.
pub struct RedbEngine {
    db: Database,
}

impl RedbEngine {
    /// Opens (or creates) a shard directory and its database file.
    pub fn open(path: &Path) -> EngineResult<Self> {
        std::fs::create_dir_all(path)?;
        let db = Database::create(path.join("data.redb"))?;
        // Create the table up front so read transactions never miss it.
        let init = db.begin_write()?;
        init.open_table(DATA_TABLE)?;
        init.commit()?;
        Ok(RedbEngine { db })
    }
}

struct RedbTxn<'a, 'txn> {
    table: &'a mut Table<'txn, &'static [u8], &'static [u8]>,
}

impl Txn for RedbTxn<'_, '_> {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        Ok(self.table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> EngineResult<()> {
        self.table.insert(key, value)?;
        Ok(())
    }

    fn del(&mut self, key: &[u8]) -> EngineResult<()> {
        self.table.remove(key)?;
        Ok(())
    }

    fn scan(&self, prefix: &[u8]) -> EngineResult<Vec<Pair>> {
        match prefix_successor(prefix) {
            Some(end) => collect_range(self.table.range::<&[u8]>(prefix..end.as_slice())?),
            None => collect_range(self.table.range::<&[u8]>(prefix..)?),
        }
    }

    fn range(&self, start: &[u8], end: &[u8]) -> EngineResult<Vec<Pair>> {
        if start >= end {
            return Ok(Vec::new());
        }
        collect_range(self.table.range::<&[u8]>(start..end)?)
    }
}

impl KvEngine for RedbEngine {
    fn transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn Txn) -> EngineResult<()>,
    ) -> EngineResult<()> {
        let wtx = self.db.begin_write()?;
        let result = {
            let mut table = wtx.open_table(DATA_TABLE)?;
            let mut txn = RedbTxn { table: &mut table };
            f(&mut txn)
        };
        match result {
            Ok(()) => {
                wtx.commit()?;
                Ok(())
            }
            Err(err) => {
                wtx.abort()?;
                Err(err)
            }
        }
    }

    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        let rtx = self.db.begin_read()?;
        let table = rtx.open_table(DATA_TABLE)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    fn scan(&self, prefix: &[u8]) -> EngineResult<Vec<Pair>> {
        let rtx = self.db.begin_read()?;
        let table = rtx.open_table(DATA_TABLE)?;
        match prefix_successor(prefix) {
            Some(end) => collect_range(table.range::<&[u8]>(prefix..end.as_slice())?),
            None => collect_range(table.range::<&[u8]>(prefix..)?),
        }
    }

    fn range(&self, start: &[u8], end: &[u8]) -> EngineResult<Vec<Pair>> {
        if start >= end {
            return Ok(Vec::new());
        }
        let rtx = self.db.begin_read()?;
        let table = rtx.open_table(DATA_TABLE)?;
        collect_range(table.range::<&[u8]>(start..end)?)
    }
}

fn collect_range(iter: redb::Range<'_, &'static [u8], &'static [u8]>) -> EngineResult<Vec<Pair>> {
    let mut out = Vec::new();
    for row in iter {
        let (key, value) = row?;
        out.push(Pair {
            key: key.value().to_vec(),
            value: value.value().to_vec(),
        });
    }
    Ok(out)
}
