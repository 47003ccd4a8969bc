//! List operator: a `L` meta holding the half-open engine index window
//! `[left, right)` plus one `M` entry per element, big-endian indexed so the
//! engine's byte order equals list order. User index `i` maps to engine index
//! `left + i`; LPUSH grows the window downward, RPUSH upward.

use reef_engine::Txn;

use crate::codec::{self, envelope_state, ListMeta, MetaState};
use crate::error::{StoreError, StoreResult};
use crate::store::Store;

/// Stages deletion of the meta and every item entry of `key`.
pub(crate) fn purge_list(tx: &mut dyn Txn, key: &[u8]) -> StoreResult<()> {
    tx.del(&codec::list_meta_key(key))?;
    for pair in tx.scan(&codec::list_item_prefix(key))? {
        tx.del(&pair.key)?;
    }
    Ok(())
}

/// Clamps user-facing (possibly negative) start/stop indices to the engine
/// offsets of a list of length `len`. `None` when the normalized range is
/// empty.
fn normalize_range(len: u32, start: i64, stop: i64) -> Option<(u64, u64)> {
    if len == 0 {
        return None;
    }
    let len = i64::from(len);
    let mut start = if start < 0 { start + len } else { start };
    let mut stop = if stop < 0 { stop + len } else { stop };
    start = start.max(0);
    stop = stop.min(len - 1);
    if start > stop {
        return None;
    }
    Some((start as u64, stop as u64))
}

impl Store {
    /// LPUSH. Returns the new list length.
    pub fn lpush(&self, key: &[u8], values: &[&[u8]]) -> StoreResult<u32> {
        self.push(key, values, true)
    }

    /// RPUSH. Returns the new list length.
    pub fn rpush(&self, key: &[u8], values: &[&[u8]]) -> StoreResult<u32> {
        self.push(key, values, false)
    }

    fn push(&self, key: &[u8], values: &[&[u8]], left_end: bool) -> StoreResult<u32> {
        let now = codec::unix_now();
        self.with_txn(key, |tx| {
            let meta_key = codec::list_meta_key(key);
            let raw = tx.get(&meta_key)?;
            let (mut meta, expire_at) = match envelope_state(raw.as_deref(), now) {
                MetaState::Live { expire_at, payload } => (
                    ListMeta::decode(payload).unwrap_or_else(ListMeta::fresh),
                    expire_at,
                ),
                MetaState::Expired => {
                    purge_list(tx, key)?;
                    (ListMeta::fresh(), 0)
                }
                MetaState::Missing => (ListMeta::fresh(), 0),
            };

            for &value in values {
                if left_end {
                    meta.left -= 1;
                    tx.put(&codec::list_item_key(key, meta.left), value)?;
                } else {
                    tx.put(&codec::list_item_key(key, meta.right), value)?;
                    meta.right += 1;
                }
                meta.len += 1;
            }
            tx.put(&meta_key, &codec::encode_envelope_at(&meta.encode(), expire_at))?;
            Ok(meta.len)
        })
    }

    /// LPOP. Empty or missing lists report `NotFound`.
    pub fn lpop(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.pop(key, true)
    }

    /// RPOP. Empty or missing lists report `NotFound`.
    pub fn rpop(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.pop(key, false)
    }

    fn pop(&self, key: &[u8], left_end: bool) -> StoreResult<Vec<u8>> {
        let now = codec::unix_now();
        let mut expired = false;
        let result = self.with_txn(key, |tx| {
            let meta_key = codec::list_meta_key(key);
            let raw = tx.get(&meta_key)?;
            let (mut meta, expire_at) = match envelope_state(raw.as_deref(), now) {
                MetaState::Missing => return Err(StoreError::NotFound),
                MetaState::Expired => {
                    expired = true;
                    return Err(StoreError::NotFound);
                }
                MetaState::Live { expire_at, payload } => (
                    ListMeta::decode(payload).ok_or(StoreError::WrongType)?,
                    expire_at,
                ),
            };
            if meta.len == 0 {
                return Err(StoreError::NotFound);
            }

            let index = if left_end { meta.left } else { meta.right - 1 };
            let item_key = codec::list_item_key(key, index);
            let value = tx.get(&item_key)?.ok_or(StoreError::WrongType)?;
            tx.del(&item_key)?;
            if left_end {
                meta.left += 1;
            } else {
                meta.right -= 1;
            }
            meta.len -= 1;
            tx.put(&meta_key, &codec::encode_envelope_at(&meta.encode(), expire_at))?;
            Ok(value)
        });
        if expired {
            // Rolled back above; purge in its own transaction.
            let _ = self.list_del(key);
        }
        result
    }

    /// LRANGE with Redis index semantics (negative offsets from the tail,
    /// clamped to the list bounds). An empty normalized range yields an
    /// empty vector.
    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> StoreResult<Vec<Vec<u8>>> {
        let now = codec::unix_now();
        let engine = self.shard(key);
        let raw = engine.get(&codec::list_meta_key(key))?;
        let meta = match envelope_state(raw.as_deref(), now) {
            MetaState::Missing => return Err(StoreError::NotFound),
            MetaState::Expired => {
                let _ = self.list_del(key);
                return Err(StoreError::NotFound);
            }
            MetaState::Live { payload, .. } => {
                ListMeta::decode(payload).ok_or(StoreError::WrongType)?
            }
        };

        let Some((from, to)) = normalize_range(meta.len, start, stop) else {
            return Ok(Vec::new());
        };
        let rows = engine.range(
            &codec::list_item_key(key, meta.left + from),
            &codec::list_item_key(key, meta.left + to + 1),
        )?;
        Ok(rows.into_iter().map(|pair| pair.value).collect())
    }

    /// LTRIM: keeps `[start, stop]` and deletes both flanks. A normalized
    /// range that is empty clears the whole list.
    pub fn ltrim(&self, key: &[u8], start: i64, stop: i64) -> StoreResult<()> {
        let now = codec::unix_now();
        let mut expired = false;
        let result = self.with_txn(key, |tx| {
            let meta_key = codec::list_meta_key(key);
            let raw = tx.get(&meta_key)?;
            let (mut meta, expire_at) = match envelope_state(raw.as_deref(), now) {
                MetaState::Missing => return Err(StoreError::NotFound),
                MetaState::Expired => {
                    expired = true;
                    return Err(StoreError::NotFound);
                }
                MetaState::Live { expire_at, payload } => (
                    ListMeta::decode(payload).ok_or(StoreError::WrongType)?,
                    expire_at,
                ),
            };

            let (keep_left, keep_right) = match normalize_range(meta.len, start, stop) {
                Some((from, to)) => (meta.left + from, meta.left + to + 1),
                // Nothing survives the trim.
                None => (meta.left, meta.left),
            };

            for pair in tx.range(
                &codec::list_item_key(key, meta.left),
                &codec::list_item_key(key, keep_left),
            )? {
                tx.del(&pair.key)?;
            }
            for pair in tx.range(
                &codec::list_item_key(key, keep_right),
                &codec::list_item_key(key, meta.right),
            )? {
                tx.del(&pair.key)?;
            }

            meta.left = keep_left;
            meta.right = keep_right;
            meta.len = (keep_right - keep_left) as u32;
            tx.put(&meta_key, &codec::encode_envelope_at(&meta.encode(), expire_at))?;
            Ok(())
        });
        if expired {
            let _ = self.list_del(key);
        }
        result
    }

    /// LLEN. Missing or expired lists report zero.
    pub fn llen(&self, key: &[u8]) -> StoreResult<u32> {
        let now = codec::unix_now();
        let raw = self.shard(key).get(&codec::list_meta_key(key))?;
        match envelope_state(raw.as_deref(), now) {
            MetaState::Missing => Ok(0),
            MetaState::Expired => {
                let _ = self.list_del(key);
                Ok(0)
            }
            MetaState::Live { payload, .. } => Ok(ListMeta::decode(payload)
                .map(|meta| meta.len)
                .unwrap_or(0)),
        }
    }

    /// Deletes the whole list (meta plus items) in one transaction.
    pub(crate) fn list_del(&self, key: &[u8]) -> StoreResult<()> {
        self.with_txn(key, |tx| {
            if tx.get(&codec::list_meta_key(key))?.is_none() {
                return Err(StoreError::NotFound);
            }
            purge_list(tx, key)
        })
    }
}
