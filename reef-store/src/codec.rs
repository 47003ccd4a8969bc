//! # Key and Value Codec
//!
//! Every logical entity lives in one flat ordered byte-keyed namespace per
//! shard, distinguished by a type-tag byte at the front of the primary key.
//! Collection entries embed the user key behind a little-endian length prefix
//! so two user keys can never alias each other, while the parts that must
//! sort numerically (list indices, sorted-set scores) are big-endian so the
//! engine's lexicographic order equals numeric order.
//!
//! ## Key layouts
//!
//! ```text
//! string        C | key
//! hash meta     H | key
//! hash field    I | keyLen:u32-LE | key | fieldLen:u32-LE | field
//! list meta     L | key
//! list item     M | keyLen:u32-LE | key | index:u64-BE
//! set meta      S | key
//! set member    T | keyLen:u32-LE | key | memberLen:u32-LE | member
//! zset meta     Z | key
//! zset by-score A | keyLen:u32-LE | key | score:u64-BE | member
//! zset by-member B | keyLen:u32-LE | key | memberLen:u32-LE | member
//! ```
//!
//! Meta values are wrapped in the TTL envelope `expireAt:u32-LE | payload`
//! with `expireAt == 0` meaning no expiration. Element entries carry raw
//! bytes; their lifetime is bound to the meta.
//!
//! Decoders return `None` (or `MetaState::Missing`) for malformed or
//! wrong-tag input, never panic.

use std::time::{SystemTime, UNIX_EPOCH};

pub const TAG_STRING: u8 = b'C';
pub const TAG_HASH_META: u8 = b'H';
pub const TAG_HASH_FIELD: u8 = b'I';
pub const TAG_LIST_META: u8 = b'L';
pub const TAG_LIST_ITEM: u8 = b'M';
pub const TAG_SET_META: u8 = b'S';
pub const TAG_SET_MEMBER: u8 = b'T';
pub const TAG_ZSET_META: u8 = b'Z';
pub const TAG_ZSET_SCORE: u8 = b'A';
pub const TAG_ZSET_MEMBER: u8 = b'B';

/// Engine index both ends of a fresh list start from; pushes grow the window
/// downward (left) and upward (right) from here.
pub const LIST_INITIAL_INDEX: u64 = 1 << 63;

/// Seconds since the Unix epoch, truncated to the envelope's u32 domain.
pub fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or(0)
}

// ---------------------------------------------------------------- meta keys

fn tagged(tag: u8, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + key.len());
    out.push(tag);
    out.extend_from_slice(key);
    out
}

pub fn string_key(key: &[u8]) -> Vec<u8> {
    tagged(TAG_STRING, key)
}

pub fn hash_meta_key(key: &[u8]) -> Vec<u8> {
    tagged(TAG_HASH_META, key)
}

pub fn list_meta_key(key: &[u8]) -> Vec<u8> {
    tagged(TAG_LIST_META, key)
}

pub fn set_meta_key(key: &[u8]) -> Vec<u8> {
    tagged(TAG_SET_META, key)
}

pub fn zset_meta_key(key: &[u8]) -> Vec<u8> {
    tagged(TAG_ZSET_META, key)
}

// ------------------------------------------------------------- entry keys

/// `tag | keyLen:u32-LE | key`, the shared stem of every element entry.
fn entry_stem(tag: u8, key: &[u8], extra: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 4 + key.len() + extra);
    out.push(tag);
    out.extend_from_slice(&(key.len() as u32).to_le_bytes());
    out.extend_from_slice(key);
    out
}

fn member_entry(tag: u8, key: &[u8], member: &[u8]) -> Vec<u8> {
    let mut out = entry_stem(tag, key, 4 + member.len());
    out.extend_from_slice(&(member.len() as u32).to_le_bytes());
    out.extend_from_slice(member);
    out
}

/// Splits a `tag | keyLen | key | memberLen | member` entry, returning the
/// member suffix.
fn split_member_entry(raw: &[u8], tag: u8) -> Option<&[u8]> {
    if raw.first() != Some(&tag) {
        return None;
    }
    let key_len = u32::from_le_bytes(raw.get(1..5)?.try_into().ok()?) as usize;
    let rest = raw.get(5 + key_len..)?;
    let member_len = u32::from_le_bytes(rest.get(..4)?.try_into().ok()?) as usize;
    let member = rest.get(4..)?;
    (member.len() == member_len).then_some(member)
}

pub fn hash_field_key(key: &[u8], field: &[u8]) -> Vec<u8> {
    member_entry(TAG_HASH_FIELD, key, field)
}

pub fn hash_field_prefix(key: &[u8]) -> Vec<u8> {
    entry_stem(TAG_HASH_FIELD, key, 0)
}

pub fn split_hash_field(raw: &[u8]) -> Option<&[u8]> {
    split_member_entry(raw, TAG_HASH_FIELD)
}

pub fn set_member_key(key: &[u8], member: &[u8]) -> Vec<u8> {
    member_entry(TAG_SET_MEMBER, key, member)
}

pub fn set_member_prefix(key: &[u8]) -> Vec<u8> {
    entry_stem(TAG_SET_MEMBER, key, 0)
}

pub fn split_set_member(raw: &[u8]) -> Option<&[u8]> {
    split_member_entry(raw, TAG_SET_MEMBER)
}

pub fn list_item_key(key: &[u8], index: u64) -> Vec<u8> {
    let mut out = entry_stem(TAG_LIST_ITEM, key, 8);
    out.extend_from_slice(&index.to_be_bytes());
    out
}

pub fn list_item_prefix(key: &[u8]) -> Vec<u8> {
    entry_stem(TAG_LIST_ITEM, key, 0)
}

/// Returns the engine index of a list item entry.
pub fn split_list_index(raw: &[u8]) -> Option<u64> {
    if raw.first() != Some(&TAG_LIST_ITEM) {
        return None;
    }
    let key_len = u32::from_le_bytes(raw.get(1..5)?.try_into().ok()?) as usize;
    let tail = raw.get(5 + key_len..)?;
    if tail.len() != 8 {
        return None;
    }
    Some(u64::from_be_bytes(tail.try_into().ok()?))
}

pub fn zset_member_key(key: &[u8], member: &[u8]) -> Vec<u8> {
    member_entry(TAG_ZSET_MEMBER, key, member)
}

pub fn zset_member_prefix(key: &[u8]) -> Vec<u8> {
    entry_stem(TAG_ZSET_MEMBER, key, 0)
}

pub fn zset_score_key(key: &[u8], score: u64, member: &[u8]) -> Vec<u8> {
    let mut out = entry_stem(TAG_ZSET_SCORE, key, 8 + member.len());
    out.extend_from_slice(&score.to_be_bytes());
    out.extend_from_slice(member);
    out
}

/// Lower bound for all by-score entries of `key` with at least `score`.
pub fn zset_score_prefix(key: &[u8], score: u64) -> Vec<u8> {
    let mut out = entry_stem(TAG_ZSET_SCORE, key, 8);
    out.extend_from_slice(&score.to_be_bytes());
    out
}

/// Prefix covering every by-score entry of `key`, across all scores.
pub fn zset_score_scan_prefix(key: &[u8]) -> Vec<u8> {
    entry_stem(TAG_ZSET_SCORE, key, 0)
}

/// Returns `(score, member)` from a by-score entry.
pub fn split_zset_score(raw: &[u8]) -> Option<(u64, &[u8])> {
    if raw.first() != Some(&TAG_ZSET_SCORE) {
        return None;
    }
    let key_len = u32::from_le_bytes(raw.get(1..5)?.try_into().ok()?) as usize;
    let tail = raw.get(5 + key_len..)?;
    let score = u64::from_be_bytes(tail.get(..8)?.try_into().ok()?);
    Some((score, &tail[8..]))
}

/// Encodes a score as the value of a by-member entry.
pub fn encode_score(score: u64) -> [u8; 8] {
    score.to_le_bytes()
}

pub fn decode_score(raw: &[u8]) -> Option<u64> {
    Some(u64::from_le_bytes(raw.get(..8)?.try_into().ok()?))
}

// ---------------------------------------------------------------- envelope

/// What an operator observes about a meta entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaState<'a> {
    /// No meta entry (or a malformed one, which readers treat the same way).
    Missing,
    /// The meta exists but its expiration timestamp has passed.
    Expired,
    /// The meta is alive; `expire_at` is 0 when no TTL is set.
    Live { expire_at: u32, payload: &'a [u8] },
}

/// Wraps a meta payload in the TTL envelope. `ttl_secs == 0` means no TTL.
pub fn encode_envelope(payload: &[u8], ttl_secs: u32, now: u32) -> Vec<u8> {
    let expire_at = if ttl_secs > 0 { now.saturating_add(ttl_secs) } else { 0 };
    encode_envelope_at(payload, expire_at)
}

/// Wraps a meta payload with an absolute expiration timestamp.
pub fn encode_envelope_at(payload: &[u8], expire_at: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&expire_at.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Classifies a raw meta value against the clock.
pub fn envelope_state(raw: Option<&[u8]>, now: u32) -> MetaState<'_> {
    let Some(raw) = raw else {
        return MetaState::Missing;
    };
    let Some(head) = raw.get(..4) else {
        return MetaState::Missing;
    };
    let expire_at = u32::from_le_bytes(head.try_into().unwrap_or([0; 4]));
    if expire_at != 0 && expire_at < now {
        return MetaState::Expired;
    }
    MetaState::Live {
        expire_at,
        payload: &raw[4..],
    }
}

/// Rewrites the expiration timestamp of an enveloped value in place.
pub fn set_expire_at(raw: &[u8], expire_at: u32) -> Option<Vec<u8>> {
    if raw.len() < 4 {
        return None;
    }
    let mut out = raw.to_vec();
    out[..4].copy_from_slice(&expire_at.to_le_bytes());
    Some(out)
}

// ------------------------------------------------------------ meta payloads

/// Cardinality payload shared by hash, set, and sorted-set metas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountMeta {
    pub count: u32,
}

impl CountMeta {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let count = u32::from_le_bytes(payload.get(..4)?.try_into().ok()?);
        Some(CountMeta { count })
    }

    pub fn encode(&self) -> [u8; 4] {
        self.count.to_le_bytes()
    }
}

/// List meta payload: length plus the half-open engine index window
/// `[left, right)` the items occupy. Invariant: `len == right - left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListMeta {
    pub len: u32,
    pub left: u64,
    pub right: u64,
}

impl ListMeta {
    /// Empty window centered on the middle of the index domain.
    pub fn fresh() -> Self {
        ListMeta {
            len: 0,
            left: LIST_INITIAL_INDEX,
            right: LIST_INITIAL_INDEX,
        }
    }

    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() < 20 {
            return None;
        }
        Some(ListMeta {
            len: u32::from_le_bytes(payload[..4].try_into().ok()?),
            left: u64::from_le_bytes(payload[4..12].try_into().ok()?),
            right: u64::from_le_bytes(payload[12..20].try_into().ok()?),
        })
    }

    pub fn encode(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        out[..4].copy_from_slice(&self.len.to_le_bytes());
        out[4..12].copy_from_slice(&self.left.to_le_bytes());
        out[12..20].copy_from_slice(&self.right.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_keys_prepend_tag() {
        assert_eq!(string_key(b"k"), vec![b'C', b'k']);
        assert_eq!(hash_meta_key(b"k"), vec![b'H', b'k']);
        assert_eq!(list_meta_key(b"k"), vec![b'L', b'k']);
        assert_eq!(set_meta_key(b"k"), vec![b'S', b'k']);
        assert_eq!(zset_meta_key(b"k"), vec![b'Z', b'k']);
    }

    #[test]
    fn hash_field_roundtrip() {
        let raw = hash_field_key(b"user", b"name");
        assert_eq!(split_hash_field(&raw), Some(&b"name"[..]));
        assert!(raw.starts_with(&hash_field_prefix(b"user")));
    }

    #[test]
    fn hash_field_rejects_wrong_tag_and_truncation() {
        let raw = set_member_key(b"user", b"name");
        assert_eq!(split_hash_field(&raw), None);
        let raw = hash_field_key(b"user", b"name");
        assert_eq!(split_hash_field(&raw[..4]), None);
        assert_eq!(split_hash_field(b""), None);
    }

    #[test]
    fn set_member_roundtrip() {
        let raw = set_member_key(b"tags", b"rust");
        assert_eq!(split_set_member(&raw), Some(&b"rust"[..]));
        assert_eq!(split_set_member(&hash_field_key(b"tags", b"rust")), None);
        assert!(raw.starts_with(&set_member_prefix(b"tags")));
    }

    #[test]
    fn length_prefix_prevents_key_aliasing() {
        // Same concatenated bytes, different (key, field) splits.
        let a = hash_field_key(b"ab", b"c");
        let b = hash_field_key(b"a", b"bc");
        assert_ne!(a, b);
    }

    #[test]
    fn list_item_order_matches_index_order() {
        let low = list_item_key(b"l", LIST_INITIAL_INDEX - 1);
        let mid = list_item_key(b"l", LIST_INITIAL_INDEX);
        let high = list_item_key(b"l", LIST_INITIAL_INDEX + 1);
        assert!(low < mid && mid < high);
        assert_eq!(split_list_index(&mid), Some(LIST_INITIAL_INDEX));
    }

    #[test]
    fn zset_score_order_groups_by_score_then_member() {
        let a = zset_score_key(b"z", 5, b"b");
        let b = zset_score_key(b"z", 10, b"a");
        assert!(a < b);
        let (score, member) = split_zset_score(&b).unwrap();
        assert_eq!(score, 10);
        assert_eq!(member, b"a");
        // Same score sorts by member bytes.
        assert!(zset_score_key(b"z", 5, b"a") < zset_score_key(b"z", 5, b"b"));
    }

    #[test]
    fn zset_prefixes_bound_scores() {
        let entry = zset_score_key(b"z", 7, b"m");
        assert!(entry >= zset_score_prefix(b"z", 7));
        assert!(entry < zset_score_prefix(b"z", 8));
        assert!(entry.starts_with(&zset_score_scan_prefix(b"z")));
    }

    #[test]
    fn score_value_roundtrip() {
        assert_eq!(decode_score(&encode_score(42)), Some(42));
        assert_eq!(decode_score(b"short"), None);
    }

    #[test]
    fn envelope_roundtrip_without_ttl() {
        let raw = encode_envelope(b"payload", 0, 1_000);
        match envelope_state(Some(&raw), 2_000_000_000) {
            MetaState::Live { expire_at, payload } => {
                assert_eq!(expire_at, 0);
                assert_eq!(payload, b"payload");
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn envelope_expires() {
        let raw = encode_envelope(b"x", 10, 1_000);
        assert!(matches!(
            envelope_state(Some(&raw), 1_005),
            MetaState::Live { .. }
        ));
        assert_eq!(envelope_state(Some(&raw), 1_011), MetaState::Expired);
    }

    #[test]
    fn envelope_missing_and_malformed() {
        assert_eq!(envelope_state(None, 0), MetaState::Missing);
        assert_eq!(envelope_state(Some(b"abc"), 0), MetaState::Missing);
    }

    #[test]
    fn expire_at_rewrite_preserves_payload() {
        let raw = encode_envelope(b"data", 0, 500);
        let updated = set_expire_at(&raw, 900).unwrap();
        match envelope_state(Some(&updated), 600) {
            MetaState::Live { expire_at, payload } => {
                assert_eq!(expire_at, 900);
                assert_eq!(payload, b"data");
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(set_expire_at(b"ab", 1), None);
    }

    #[test]
    fn count_meta_roundtrip() {
        let meta = CountMeta { count: 7 };
        assert_eq!(CountMeta::decode(&meta.encode()), Some(meta));
        assert_eq!(CountMeta::decode(b"xy"), None);
    }

    #[test]
    fn list_meta_roundtrip() {
        let meta = ListMeta {
            len: 3,
            left: LIST_INITIAL_INDEX - 2,
            right: LIST_INITIAL_INDEX + 1,
        };
        assert_eq!(ListMeta::decode(&meta.encode()), Some(meta));
        assert_eq!(ListMeta::decode(&[0u8; 19]), None);
    }

    #[test]
    fn fresh_list_meta_has_empty_window() {
        let meta = ListMeta::fresh();
        assert_eq!(meta.len, 0);
        assert_eq!(meta.right - meta.left, 0);
    }

    #[test]
    fn entry_families_never_collide() {
        // Same key and member bytes under every family tag stay distinct.
        let keys = [
            string_key(b"k"),
            hash_meta_key(b"k"),
            hash_field_key(b"k", b"m"),
            list_meta_key(b"k"),
            list_item_key(b"k", 0),
            set_meta_key(b"k"),
            set_member_key(b"k", b"m"),
            zset_meta_key(b"k"),
            zset_score_key(b"k", 0, b"m"),
            zset_member_key(b"k", b"m"),
        ];
        for (i, a) in keys.iter().enumerate() {
            for (j, b) in keys.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }
}
