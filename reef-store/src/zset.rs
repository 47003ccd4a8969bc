//! Sorted-set operator: a `Z` meta plus two parallel element indices. `A`
//! entries (`key | score:u64-BE | member`) enumerate members in ascending
//! score order; `B` entries (`key | member`) map a member to its score. Every
//! mutation keeps the pair of indices and the meta count consistent within
//! one transaction.

use reef_engine::{prefix_successor, Txn};

use crate::codec::{self, envelope_state, CountMeta, MetaState};
use crate::error::{StoreError, StoreResult};
use crate::store::Store;

/// Stages deletion of the meta and both element indices of `key`.
pub(crate) fn purge_zset(tx: &mut dyn Txn, key: &[u8]) -> StoreResult<()> {
    tx.del(&codec::zset_meta_key(key))?;
    for pair in tx.scan(&codec::zset_score_scan_prefix(key))? {
        tx.del(&pair.key)?;
    }
    for pair in tx.scan(&codec::zset_member_prefix(key))? {
        tx.del(&pair.key)?;
    }
    Ok(())
}

impl Store {
    /// ZADD for a single `(score, member)` pair. An existing member is
    /// re-scored (its old by-score entry is removed); returns 1 when the
    /// member was new, 0 on update.
    pub fn zadd(&self, key: &[u8], score: u64, member: &[u8]) -> StoreResult<i64> {
        let now = codec::unix_now();
        self.with_txn(key, |tx| {
            let meta_key = codec::zset_meta_key(key);
            let raw = tx.get(&meta_key)?;
            let (mut count, expire_at, fresh) = match envelope_state(raw.as_deref(), now) {
                MetaState::Live { expire_at, payload } => (
                    CountMeta::decode(payload).map(|m| m.count).unwrap_or(0),
                    expire_at,
                    false,
                ),
                MetaState::Expired => {
                    purge_zset(tx, key)?;
                    (0, 0, true)
                }
                MetaState::Missing => (0, 0, false),
            };

            let member_key = codec::zset_member_key(key, member);
            let previous = if fresh { None } else { tx.get(&member_key)? };
            let added = match previous {
                Some(old_raw) => {
                    let old_score =
                        codec::decode_score(&old_raw).ok_or(StoreError::WrongType)?;
                    tx.del(&codec::zset_score_key(key, old_score, member))?;
                    0
                }
                None => {
                    count += 1;
                    1
                }
            };

            tx.put(&member_key, &codec::encode_score(score))?;
            tx.put(&codec::zset_score_key(key, score, member), member)?;
            let meta = CountMeta { count };
            tx.put(&meta_key, &codec::encode_envelope_at(&meta.encode(), expire_at))?;
            Ok(added)
        })
    }

    /// ZREM. Missing members are skipped; returns how many were removed and
    /// decrements the count by the same amount.
    pub fn zrem(&self, key: &[u8], members: &[&[u8]]) -> StoreResult<u32> {
        let now = codec::unix_now();
        let mut expired = false;
        let result = self.with_txn(key, |tx| {
            let meta_key = codec::zset_meta_key(key);
            let raw = tx.get(&meta_key)?;
            let (mut count, expire_at) = match envelope_state(raw.as_deref(), now) {
                MetaState::Missing => return Err(StoreError::NotFound),
                MetaState::Expired => {
                    expired = true;
                    return Err(StoreError::NotFound);
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
                let member_key = codec::zset_member_key(key, member);
                let Some(old_raw) = tx.get(&member_key)? else {
                    continue;
                };
                let score = codec::decode_score(&old_raw).ok_or(StoreError::WrongType)?;
                tx.del(&member_key)?;
                tx.del(&codec::zset_score_key(key, score, member))?;
                removed += 1;
            }

            if removed > 0 {
                count = count.saturating_sub(removed);
                let meta = CountMeta { count };
                tx.put(&meta_key, &codec::encode_envelope_at(&meta.encode(), expire_at))?;
            }
            Ok(removed)
        });
        if expired {
            let _ = self.zset_del(key);
        }
        result
    }

    /// ZSCORE: the member's score, or `NotFound` for absent key/member.
    pub fn zscore(&self, key: &[u8], member: &[u8]) -> StoreResult<u64> {
        let now = codec::unix_now();
        let engine = self.shard(key);
        let raw = engine.get(&codec::zset_meta_key(key))?;
        match envelope_state(raw.as_deref(), now) {
            MetaState::Missing => Err(StoreError::NotFound),
            MetaState::Expired => {
                let _ = self.zset_del(key);
                Err(StoreError::NotFound)
            }
            MetaState::Live { .. } => {
                let value = engine
                    .get(&codec::zset_member_key(key, member))?
                    .ok_or(StoreError::NotFound)?;
                codec::decode_score(&value).ok_or(StoreError::WrongType)
            }
        }
    }

    /// ZINCRBY: adds `delta` to the member's score (wrapping in the u64
    /// domain) and rewrites both indices. Returns the new score.
    pub fn zincrby(&self, key: &[u8], delta: u64, member: &[u8]) -> StoreResult<u64> {
        let now = codec::unix_now();
        let mut expired = false;
        let result = self.with_txn(key, |tx| {
            let meta_key = codec::zset_meta_key(key);
            let raw = tx.get(&meta_key)?;
            match envelope_state(raw.as_deref(), now) {
                MetaState::Missing => return Err(StoreError::NotFound),
                MetaState::Expired => {
                    expired = true;
                    return Err(StoreError::NotFound);
                }
                MetaState::Live { .. } => {}
            }

            let member_key = codec::zset_member_key(key, member);
            let old_raw = tx.get(&member_key)?.ok_or(StoreError::NotFound)?;
            let old_score = codec::decode_score(&old_raw).ok_or(StoreError::WrongType)?;
            let new_score = old_score.wrapping_add(delta);

            tx.del(&codec::zset_score_key(key, old_score, member))?;
            tx.put(&codec::zset_score_key(key, new_score, member), member)?;
            tx.put(&member_key, &codec::encode_score(new_score))?;
            Ok(new_score)
        });
        if expired {
            let _ = self.zset_del(key);
        }
        result
    }

    /// ZRANGE: `(score, member)` pairs for the index window `[start, stop]`
    /// in ascending score order. Negative indices count from the end.
    pub fn zrange(
        &self,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<(u64, Vec<u8>)>> {
        self.range_by_rank(key, start, stop, false)
    }

    /// ZREVRANGE: same window, descending score order.
    pub fn zrevrange(
        &self,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<(u64, Vec<u8>)>> {
        self.range_by_rank(key, start, stop, true)
    }

    fn range_by_rank(
        &self,
        key: &[u8],
        start: i64,
        stop: i64,
        reverse: bool,
    ) -> StoreResult<Vec<(u64, Vec<u8>)>> {
        let entries = self.score_ordered_entries(key)?;
        let len = entries.len() as i64;
        if len == 0 {
            return Ok(Vec::new());
        }
        let mut start = if start < 0 { start + len } else { start };
        let mut stop = if stop < 0 { stop + len } else { stop };
        start = start.max(0);
        stop = stop.min(len - 1);
        if start > stop {
            return Ok(Vec::new());
        }

        let mut window: Vec<(u64, Vec<u8>)> = if reverse {
            entries.into_iter().rev().collect()
        } else {
            entries
        };
        window.truncate(stop as usize + 1);
        Ok(window.split_off(start as usize))
    }

    /// ZRANK: the member's position in ascending score order.
    pub fn zrank(&self, key: &[u8], member: &[u8]) -> StoreResult<u32> {
        let now = codec::unix_now();
        let engine = self.shard(key);
        let raw = engine.get(&codec::zset_meta_key(key))?;
        match envelope_state(raw.as_deref(), now) {
            MetaState::Missing => return Err(StoreError::NotFound),
            MetaState::Expired => {
                let _ = self.zset_del(key);
                return Err(StoreError::NotFound);
            }
            MetaState::Live { .. } => {}
        }
        if engine.get(&codec::zset_member_key(key, member))?.is_none() {
            return Err(StoreError::NotFound);
        }

        let rows = engine.scan(&codec::zset_score_scan_prefix(key))?;
        for (rank, pair) in rows.iter().enumerate() {
            if pair.value == member {
                return Ok(rank as u32);
            }
        }
        // The by-member entry existed, so the by-score entry must as well.
        Err(StoreError::WrongType)
    }

    /// ZCOUNT: members with `min <= score <= max` (inclusive bounds).
    pub fn zcount(&self, key: &[u8], min: u64, max: u64) -> StoreResult<u32> {
        let now = codec::unix_now();
        let engine = self.shard(key);
        let raw = engine.get(&codec::zset_meta_key(key))?;
        match envelope_state(raw.as_deref(), now) {
            MetaState::Missing => return Err(StoreError::NotFound),
            MetaState::Expired => {
                let _ = self.zset_del(key);
                return Err(StoreError::NotFound);
            }
            MetaState::Live { .. } => {}
        }
        if min > max {
            return Ok(0);
        }

        let start = codec::zset_score_prefix(key, min);
        let rows = match max.checked_add(1) {
            Some(end_score) => engine.range(&start, &codec::zset_score_prefix(key, end_score))?,
            // max == u64::MAX: bound by the successor of the whole A-prefix.
            None => match prefix_successor(&codec::zset_score_scan_prefix(key)) {
                Some(end) => engine.range(&start, &end)?,
                None => engine.scan(&codec::zset_score_scan_prefix(key))?,
            },
        };
        Ok(rows.len() as u32)
    }

    /// ZCARD. Missing or expired sorted sets report zero.
    pub fn zcard(&self, key: &[u8]) -> StoreResult<u32> {
        let now = codec::unix_now();
        let raw = self.shard(key).get(&codec::zset_meta_key(key))?;
        match envelope_state(raw.as_deref(), now) {
            MetaState::Missing => Ok(0),
            MetaState::Expired => {
                let _ = self.zset_del(key);
                Ok(0)
            }
            MetaState::Live { payload, .. } => {
                Ok(CountMeta::decode(payload).map(|m| m.count).unwrap_or(0))
            }
        }
    }

    /// Deletes the whole sorted set (meta plus both indices).
    pub(crate) fn zset_del(&self, key: &[u8]) -> StoreResult<()> {
        self.with_txn(key, |tx| {
            if tx.get(&codec::zset_meta_key(key))?.is_none() {
                return Err(StoreError::NotFound);
            }
            purge_zset(tx, key)
        })
    }

    /// All `(score, member)` pairs in ascending score order, with the usual
    /// lazy-expiry handling.
    fn score_ordered_entries(&self, key: &[u8]) -> StoreResult<Vec<(u64, Vec<u8>)>> {
        let now = codec::unix_now();
        let engine = self.shard(key);
        let raw = engine.get(&codec::zset_meta_key(key))?;
        match envelope_state(raw.as_deref(), now) {
            MetaState::Missing => Err(StoreError::NotFound),
            MetaState::Expired => {
                let _ = self.zset_del(key);
                Err(StoreError::NotFound)
            }
            MetaState::Live { .. } => {
                let rows = engine.scan(&codec::zset_score_scan_prefix(key))?;
                let mut out = Vec::with_capacity(rows.len());
                for pair in rows {
                    let (score, _) =
                        codec::split_zset_score(&pair.key).ok_or(StoreError::WrongType)?;
                    out.push((score, pair.value));
                }
                Ok(out)
            }
        }
    }
}
