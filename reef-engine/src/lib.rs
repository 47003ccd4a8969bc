// reef-engine - Ordered KV engine abstraction for reef
//
// The storage layer consumes the `KvEngine`/`Txn` traits only; the concrete
// backends (sled, redb) are chosen at startup.

pub mod engine;
mod redb_backend;
mod sled_backend;

pub use engine::{
    open_engine, prefix_successor, EngineError, EngineKind, EngineResult, KvEngine, Pair, Txn,
};
pub use redb_backend::RedbEngine;
pub use sled_backend::SledEngine;
