//! # Store
//!
//! Owns one engine instance per shard and routes every user key to its shard
//! with the BKDR hash. All data-type operators hang off `Store` (one impl
//! block per type module) and run each operation as a single transaction on
//! the key's shard.

use std::path::Path;

use reef_common::bkdr_hash;
use reef_engine::{open_engine, EngineError, EngineKind, KvEngine, Txn};

use crate::codec::{self, envelope_state, set_expire_at, MetaState};
use crate::error::{StoreError, StoreResult};

/// Default shard count. Changing it invalidates existing data directories
/// because the key-to-shard mapping moves.
pub const DEFAULT_SHARD_COUNT: usize = 16;

/// Meta-key constructors in the fixed probe order used by DEL/EXPIRE/TTL:
/// string, hash, list, zset, set. A user key holds at most one type at a
/// time, so at most one probe can succeed; the order only pins determinism.
const META_FAMILIES: [fn(&[u8]) -> Vec<u8>; 5] = [
    codec::string_key,
    codec::hash_meta_key,
    codec::list_meta_key,
    codec::zset_meta_key,
    codec::set_meta_key,
];

/// TTL observation for a user key, mirroring Redis `TTL` semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlState {
    /// No live key under any type family.
    Missing,
    /// Key exists without an expiration.
    NoExpiry,
    /// Key expires after this many seconds.
    ExpiresIn(u32),
}

/// Sharded, typed view over the flat engine namespace.
pub struct Store {
    shards: Vec<Box<dyn KvEngine>>,
}

impl Store {
    /// Opens `shard_count` engine instances under `<dir>/<engine>/<shard>/`.
    pub fn open(dir: &Path, kind: EngineKind, shard_count: usize) -> StoreResult<Self> {
        let shard_count = shard_count.max(1);
        let base = dir.join(kind.to_string());
        let mut shards = Vec::with_capacity(shard_count);
        for index in 0..shard_count {
            shards.push(open_engine(kind, &base.join(index.to_string()))?);
        }
        tracing::info!(%kind, shard_count, dir = %base.display(), "store opened");
        Ok(Store { shards })
    }

    /// Flushes every shard. Call once on graceful shutdown.
    pub fn close(&self) -> StoreResult<()> {
        for shard in &self.shards {
            shard.close()?;
        }
        Ok(())
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard index a user key routes to. Stable across restarts.
    pub fn shard_of(&self, key: &[u8]) -> usize {
        bkdr_hash(key) as usize % self.shards.len()
    }

    pub(crate) fn shard(&self, key: &[u8]) -> &dyn KvEngine {
        self.shards[self.shard_of(key)].as_ref()
    }

    /// Runs `f` as one transaction on the key's shard, mapping the typed
    /// operator error through the engine's abort path so an `Err` from `f`
    /// rolls back every staged write.
    pub(crate) fn with_txn<T>(
        &self,
        key: &[u8],
        mut f: impl FnMut(&mut dyn Txn) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut outcome: Option<StoreResult<T>> = None;
        let run = self.shard(key).transaction(&mut |tx| match f(tx) {
            Ok(value) => {
                outcome = Some(Ok(value));
                Ok(())
            }
            Err(err) => {
                outcome = Some(Err(err));
                Err(EngineError::Aborted)
            }
        });
        match run {
            // The closure ran exactly once, so `outcome` is always populated
            // on these paths; the fallback only guards a misbehaving engine.
            Ok(()) | Err(EngineError::Aborted) => {
                outcome.unwrap_or(Err(StoreError::Engine(EngineError::Aborted)))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Deletes a user key from whichever type family currently holds it.
    /// Returns 1 when a key was removed, 0 otherwise.
    pub fn del(&self, key: &[u8]) -> StoreResult<i64> {
        type FamilyDel = fn(&Store, &[u8]) -> StoreResult<()>;
        let families: [FamilyDel; 5] = [
            Store::del_string,
            Store::hash_del,
            Store::list_del,
            Store::zset_del,
            Store::set_del,
        ];
        for family_del in families {
            match family_del(self, key) {
                Ok(()) => return Ok(1),
                Err(StoreError::NotFound) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(0)
    }

    /// Attaches a TTL to whichever type family holds the key.
    /// Returns false when no live key exists.
    pub fn expire(&self, key: &[u8], ttl_secs: u32) -> StoreResult<bool> {
        let now = codec::unix_now();
        let deadline = now.saturating_add(ttl_secs);
        for meta_key_of in META_FAMILIES {
            let meta_key = meta_key_of(key);
            let mut updated = false;
            self.with_txn(key, |tx| {
                let raw = tx.get(&meta_key)?;
                if let Some(bytes) = raw.as_deref() {
                    if matches!(envelope_state(Some(bytes), now), MetaState::Live { .. }) {
                        let refreshed =
                            set_expire_at(bytes, deadline).ok_or(StoreError::WrongType)?;
                        tx.put(&meta_key, &refreshed)?;
                        updated = true;
                    }
                }
                Ok(())
            })?;
            if updated {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Reports the TTL state of a user key across all type families.
    pub fn ttl(&self, key: &[u8]) -> StoreResult<TtlState> {
        let now = codec::unix_now();
        let engine = self.shard(key);
        for meta_key_of in META_FAMILIES {
            let raw = engine.get(&meta_key_of(key))?;
            match envelope_state(raw.as_deref(), now) {
                // Expired metas read as missing; the next operation on the
                // key performs the actual purge.
                MetaState::Missing | MetaState::Expired => continue,
                MetaState::Live { expire_at, .. } => {
                    return Ok(if expire_at == 0 {
                        TtlState::NoExpiry
                    } else {
                        TtlState::ExpiresIn(expire_at.saturating_sub(now))
                    });
                }
            }
        }
        Ok(TtlState::Missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_routing_is_stable_and_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), EngineKind::Sled, 4).unwrap();
        let first = store.shard_of(b"mykey");
        assert!(first < 4);
        assert_eq!(store.shard_of(b"mykey"), first);
    }

    #[test]
    fn open_creates_one_directory_per_shard() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), EngineKind::Sled, 3).unwrap();
        assert_eq!(store.shard_count(), 3);
        for index in 0..3 {
            assert!(dir.path().join("sled").join(index.to_string()).is_dir());
        }
    }

    #[test]
    fn shard_count_is_clamped_to_at_least_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), EngineKind::Sled, 0).unwrap();
        assert_eq!(store.shard_count(), 1);
    }
}
