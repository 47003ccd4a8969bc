//! Set operator: a `S` meta carrying the cardinality plus one `T` entry per
//! member. The member bytes double as the entry value so SMEMBERS is a plain
//! prefix scan.

use reef_engine::Txn;

use crate::codec::{self, envelope_state, CountMeta, MetaState};
use crate::error::{StoreError, StoreResult};
use crate::store::Store;

/// Stages deletion of the meta and every member entry of `key`.
pub(crate) fn purge_set(tx: &mut dyn Txn, key: &[u8]) -> StoreResult<()> {
    tx.del(&codec::set_meta_key(key))?;
    for pair in tx.scan(&codec::set_member_prefix(key))? {
        tx.del(&pair.key)?;
    }
    Ok(())
}

impl Store {
    /// SADD. Returns how many members were actually new.
    pub fn sadd(&self, key: &[u8], members: &[&[u8]]) -> StoreResult<u32> {
        let now = codec::unix_now();
        self.with_txn(key, |tx| {
            let meta_key = codec::set_meta_key(key);
            let raw = tx.get(&meta_key)?;
            let (mut count, expire_at, fresh) = match envelope_state(raw.as_deref(), now) {
                MetaState::Live { expire_at, payload } => (
                    CountMeta::decode(payload).map(|m| m.count).unwrap_or(0),
                    expire_at,
                    false,
                ),
                MetaState::Expired => {
                    purge_set(tx, key)?;
                    (0, 0, true)
                }
                MetaState::Missing => (0, 0, false),
            };

            let mut added: u32 = 0;
            let mut seen: Vec<&[u8]> = Vec::with_capacity(members.len());
            for &member in members {
                if seen.contains(&member) {
                    continue;
                }
                seen.push(member);
                let member_key = codec::set_member_key(key, member);
                let absent = fresh || tx.get(&member_key)?.is_none();
                if absent {
                    tx.put(&member_key, member)?;
                    added += 1;
                }
            }

            if added > 0 {
                count += added;
                let meta = CountMeta { count };
                tx.put(&meta_key, &codec::encode_envelope_at(&meta.encode(), expire_at))?;
            }
            Ok(added)
        })
    }

    /// SREM. Returns how many members were actually removed; the meta count
    /// drops by the same amount.
    pub fn srem(&self, key: &[u8], members: &[&[u8]]) -> StoreResult<u32> {
        let now = codec::unix_now();
        self.with_txn(key, |tx| {
            let meta_key = codec::set_meta_key(key);
            let raw = tx.get(&meta_key)?;
            let (mut count, expire_at) = match envelope_state(raw.as_deref(), now) {
                MetaState::Missing => return Ok(0),
                MetaState::Expired => {
                    purge_set(tx, key)?;
                    return Ok(0);
                }
                MetaState::Live { expire_at, payload } => (
                    CountMeta::decode(payload).map(|m| m.count).unwrap_or(0),
                    expire_at,
                ),
            };

            let mut removed: u32 = 0;
            let mut seen: Vec<&[u8]> = Vec::with_capacity(members.len());
            for &member in members {
                if seen.contains(&member) {
                    continue;
                }
                seen.push(member);
                let member_key = codec::set_member_key(key, member);
                if tx.get(&member_key)?.is_some() {
                    tx.del(&member_key)?;
                    removed += 1;
                }
            }

            if removed > 0 {
                count = count.saturating_sub(removed);
                let meta = CountMeta { count };
                tx.put(&meta_key, &codec::encode_envelope_at(&meta.encode(), expire_at))?;
            }
            Ok(removed)
        })
    }

    /// SMEMBERS: every member, in byte order.
    pub fn smembers(&self, key: &[u8]) -> StoreResult<Vec<Vec<u8>>> {
        let now = codec::unix_now();
        let engine = self.shard(key);
        let raw = engine.get(&codec::set_meta_key(key))?;
        match envelope_state(raw.as_deref(), now) {
            MetaState::Missing => Err(StoreError::NotFound),
            MetaState::Expired => {
                let _ = self.set_del(key);
                Err(StoreError::NotFound)
            }
            MetaState::Live { .. } => {
                let rows = engine.scan(&codec::set_member_prefix(key))?;
                Ok(rows.into_iter().map(|pair| pair.value).collect())
            }
        }
    }

    /// SCARD. Missing or expired sets report zero.
    pub fn scard(&self, key: &[u8]) -> StoreResult<u32> {
        let now = codec::unix_now();
        let raw = self.shard(key).get(&codec::set_meta_key(key))?;
        match envelope_state(raw.as_deref(), now) {
            MetaState::Missing => Ok(0),
            MetaState::Expired => {
                let _ = self.set_del(key);
                Ok(0)
            }
            MetaState::Live { payload, .. } => {
                Ok(CountMeta::decode(payload).map(|m| m.count).unwrap_or(0))
            }
        }
    }

    /// Deletes the whole set (meta plus members) in one transaction.
    pub(crate) fn set_del(&self, key: &[u8]) -> StoreResult<()> {
        self.with_txn(key, |tx| {
            if tx.get(&codec::set_meta_key(key))?.is_none() {
                return Err(StoreError::NotFound);
            }
            purge_set(tx, key)
        })
    }
}
