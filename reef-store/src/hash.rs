//! Hash operator: a `H` meta carrying the field count plus one `I` entry per
//! field. The meta count and the set of `I` entries are kept consistent
//! inside each transaction; engines are never asked to read their own staged
//! writes, so duplicate fields within one call are tracked in locals.

use reef_engine::Txn;

use crate::codec::{self, envelope_state, CountMeta, MetaState};
use crate::error::{StoreError, StoreResult};
use crate::store::Store;

/// Stages deletion of the meta and every field entry of `key`.
pub(crate) fn purge_hash(tx: &mut dyn Txn, key: &[u8]) -> StoreResult<()> {
    tx.del(&codec::hash_meta_key(key))?;
    for pair in tx.scan(&codec::hash_field_prefix(key))? {
        tx.del(&pair.key)?;
    }
    Ok(())
}

impl Store {
    /// HSET. Fields already present are overwritten without touching the
    /// count; the meta is rewritten only when new fields were added.
    pub fn hset(&self, key: &[u8], pairs: &[(&[u8], &[u8])]) -> StoreResult<()> {
        let now = codec::unix_now();
        self.with_txn(key, |tx| {
            let meta_key = codec::hash_meta_key(key);
            let raw = tx.get(&meta_key)?;
            let (mut count, expire_at, fresh) = match envelope_state(raw.as_deref(), now) {
                MetaState::Live { expire_at, payload } => (
                    CountMeta::decode(payload).map(|m| m.count).unwrap_or(0),
                    expire_at,
                    false,
                ),
                MetaState::Expired => {
                    purge_hash(tx, key)?;
                    (0, 0, true)
                }
                MetaState::Missing => (0, 0, false),
            };

            let mut added: u32 = 0;
            let mut written: Vec<&[u8]> = Vec::with_capacity(pairs.len());
            for &(field, value) in pairs {
                let first_write = !written.contains(&field);
                if first_write {
                    // After an expiry purge the committed entries are dead,
                    // so every distinct field in this call counts as new.
                    let absent = fresh || tx.get(&codec::hash_field_key(key, field))?.is_none();
                    if absent {
                        added += 1;
                    }
                    written.push(field);
                }
                tx.put(&codec::hash_field_key(key, field), value)?;
            }

            if added > 0 || fresh {
                count += added;
                let meta = CountMeta { count };
                tx.put(&meta_key, &codec::encode_envelope_at(&meta.encode(), expire_at))?;
            }
            Ok(())
        })
    }

    /// HGET for one or more fields. All requested fields must exist; a single
    /// missing field fails the whole lookup with `NotFound`.
    pub fn hget(&self, key: &[u8], fields: &[&[u8]]) -> StoreResult<Vec<Vec<u8>>> {
        let now = codec::unix_now();
        let engine = self.shard(key);
        let raw = engine.get(&codec::hash_meta_key(key))?;
        match envelope_state(raw.as_deref(), now) {
            MetaState::Missing => Err(StoreError::NotFound),
            MetaState::Expired => {
                let _ = self.hash_del(key);
                Err(StoreError::NotFound)
            }
            MetaState::Live { .. } => {
                let mut values = Vec::with_capacity(fields.len());
                for field in fields {
                    match engine.get(&codec::hash_field_key(key, field))? {
                        Some(value) => values.push(value),
                        None => return Err(StoreError::NotFound),
                    }
                }
                Ok(values)
            }
        }
    }

    /// HDEL. Returns how many fields were actually removed and decrements the
    /// meta count by the same amount.
    pub fn hdel(&self, key: &[u8], fields: &[&[u8]]) -> StoreResult<u32> {
        let now = codec::unix_now();
        self.with_txn(key, |tx| {
            let meta_key = codec::hash_meta_key(key);
            let raw = tx.get(&meta_key)?;
            let (mut count, expire_at) = match envelope_state(raw.as_deref(), now) {
                MetaState::Missing => return Ok(0),
                MetaState::Expired => {
                    purge_hash(tx, key)?;
                    return Ok(0);
                }
                MetaState::Live { expire_at, payload } => (
                    CountMeta::decode(payload).map(|m| m.count).unwrap_or(0),
                    expire_at,
                ),
            };

            let mut removed: u32 = 0;
            let mut seen: Vec<&[u8]> = Vec::with_capacity(fields.len());
            for &field in fields {
                if seen.contains(&field) {
                    continue;
                }
                seen.push(field);
                let field_key = codec::hash_field_key(key, field);
                if tx.get(&field_key)?.is_some() {
                    tx.del(&field_key)?;
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

    /// HGETALL: every `(field, value)` pair, in field byte order.
    pub fn hgetall(&self, key: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let now = codec::unix_now();
        let engine = self.shard(key);
        let raw = engine.get(&codec::hash_meta_key(key))?;
        match envelope_state(raw.as_deref(), now) {
            MetaState::Missing => Err(StoreError::NotFound),
            MetaState::Expired => {
                let _ = self.hash_del(key);
                Err(StoreError::NotFound)
            }
            MetaState::Live { .. } => {
                let mut out = Vec::new();
                for pair in engine.scan(&codec::hash_field_prefix(key))? {
                    if let Some(field) = codec::split_hash_field(&pair.key) {
                        out.push((field.to_vec(), pair.value));
                    }
                }
                Ok(out)
            }
        }
    }

    /// HKEYS: every field name, in byte order.
    pub fn hkeys(&self, key: &[u8]) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self.hgetall(key)?.into_iter().map(|(field, _)| field).collect())
    }

    /// HLEN. Missing or expired hashes report zero.
    pub fn hlen(&self, key: &[u8]) -> StoreResult<u32> {
        let now = codec::unix_now();
        let raw = self.shard(key).get(&codec::hash_meta_key(key))?;
        match envelope_state(raw.as_deref(), now) {
            MetaState::Missing => Ok(0),
            MetaState::Expired => {
                let _ = self.hash_del(key);
                Ok(0)
            }
            MetaState::Live { payload, .. } => {
                Ok(CountMeta::decode(payload).map(|m| m.count).unwrap_or(0))
            }
        }
    }

    /// HEXISTS: point lookup on the field entry.
    pub fn hexists(&self, key: &[u8], field: &[u8]) -> StoreResult<bool> {
        let now = codec::unix_now();
        let engine = self.shard(key);
        let raw = engine.get(&codec::hash_meta_key(key))?;
        match envelope_state(raw.as_deref(), now) {
            MetaState::Missing => Ok(false),
            MetaState::Expired => {
                let _ = self.hash_del(key);
                Ok(false)
            }
            MetaState::Live { .. } => {
                Ok(engine.get(&codec::hash_field_key(key, field))?.is_some())
            }
        }
    }

    /// Deletes the whole hash (meta plus fields) in one transaction.
    pub(crate) fn hash_del(&self, key: &[u8]) -> StoreResult<()> {
        self.with_txn(key, |tx| {
            if tx.get(&codec::hash_meta_key(key))?.is_none() {
                return Err(StoreError::NotFound);
            }
            purge_hash(tx, key)
        })
    }
}
