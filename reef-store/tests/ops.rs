//! Operator integration tests on real engine shards in scratch directories.

use std::time::Duration;

use reef_engine::EngineKind;
use reef_store::{Store, StoreError, TtlState};

fn sled_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Store::open(dir.path(), EngineKind::Sled, 4).expect("open");
    (dir, store)
}

fn redb_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Store::open(dir.path(), EngineKind::Redb, 2).expect("open");
    (dir, store)
}

// ------------------------------------------------------------------ strings

#[test]
fn set_get_is_idempotent() {
    let (_dir, store) = sled_store();
    store.set(b"k", b"v", 0).unwrap();
    store.set(b"k", b"v", 0).unwrap();
    assert_eq!(store.get(b"k").unwrap(), b"v".to_vec());
}

#[test]
fn get_missing_key_is_not_found() {
    let (_dir, store) = sled_store();
    assert!(matches!(store.get(b"nope"), Err(StoreError::NotFound)));
}

#[test]
fn del_reports_whether_anything_was_removed() {
    let (_dir, store) = sled_store();
    store.set(b"k", b"v", 0).unwrap();
    assert_eq!(store.del(b"k").unwrap(), 1);
    assert_eq!(store.del(b"k").unwrap(), 0);
    assert!(matches!(store.get(b"k"), Err(StoreError::NotFound)));
}

#[test]
fn del_covers_every_type_family() {
    let (_dir, store) = sled_store();

    store.hset(b"h", &[(b"f", b"v")]).unwrap();
    assert_eq!(store.del(b"h").unwrap(), 1);
    assert_eq!(store.hlen(b"h").unwrap(), 0);

    store.rpush(b"l", &[b"x"]).unwrap();
    assert_eq!(store.del(b"l").unwrap(), 1);
    assert_eq!(store.llen(b"l").unwrap(), 0);

    store.sadd(b"s", &[b"m"]).unwrap();
    assert_eq!(store.del(b"s").unwrap(), 1);
    assert_eq!(store.scard(b"s").unwrap(), 0);

    store.zadd(b"z", 1, b"m").unwrap();
    assert_eq!(store.del(b"z").unwrap(), 1);
    assert_eq!(store.zcard(b"z").unwrap(), 0);
}

#[test]
fn expired_string_reads_as_missing_and_is_purged() {
    let (_dir, store) = sled_store();
    store.set(b"k", b"v", 1).unwrap();
    assert_eq!(store.get(b"k").unwrap(), b"v".to_vec());

    std::thread::sleep(Duration::from_millis(2100));
    assert!(matches!(store.get(b"k"), Err(StoreError::NotFound)));
    // The lazy purge removed the key entirely.
    assert_eq!(store.ttl(b"k").unwrap(), TtlState::Missing);
    assert_eq!(store.del(b"k").unwrap(), 0);
}

#[test]
fn expire_and_ttl_track_deadlines() {
    let (_dir, store) = sled_store();
    assert_eq!(store.ttl(b"k").unwrap(), TtlState::Missing);

    store.set(b"k", b"v", 0).unwrap();
    assert_eq!(store.ttl(b"k").unwrap(), TtlState::NoExpiry);

    assert!(store.expire(b"k", 100).unwrap());
    match store.ttl(b"k").unwrap() {
        TtlState::ExpiresIn(secs) => assert!((1..=100).contains(&secs)),
        other => panic!("unexpected ttl {other:?}"),
    }

    assert!(!store.expire(b"missing", 100).unwrap());
}

#[test]
fn expire_applies_to_collections_too() {
    let (_dir, store) = sled_store();
    store.sadd(b"s", &[b"a", b"b"]).unwrap();
    assert!(store.expire(b"s", 100).unwrap());
    assert!(matches!(store.ttl(b"s").unwrap(), TtlState::ExpiresIn(_)));
    // Mutating the set keeps the deadline.
    store.sadd(b"s", &[b"c"]).unwrap();
    assert!(matches!(store.ttl(b"s").unwrap(), TtlState::ExpiresIn(_)));
}

// ------------------------------------------------------------------- hashes

#[test]
fn hset_counts_each_field_once() {
    let (_dir, store) = sled_store();
    store.hset(b"h", &[(b"f1", b"v1"), (b"f2", b"v2")]).unwrap();
    assert_eq!(store.hlen(b"h").unwrap(), 2);

    // Overwriting an existing field leaves the count unchanged.
    store.hset(b"h", &[(b"f1", b"v9")]).unwrap();
    assert_eq!(store.hlen(b"h").unwrap(), 2);
    assert_eq!(store.hget(b"h", &[b"f1"]).unwrap(), vec![b"v9".to_vec()]);

    // Duplicate fields inside one call count once.
    store.hset(b"h2", &[(b"f", b"a"), (b"f", b"b")]).unwrap();
    assert_eq!(store.hlen(b"h2").unwrap(), 1);
    assert_eq!(store.hget(b"h2", &[b"f"]).unwrap(), vec![b"b".to_vec()]);
}

#[test]
fn hash_boundary_scenario() {
    let (_dir, store) = sled_store();
    store.hset(b"h", &[(b"f1", b"v1"), (b"f2", b"v2")]).unwrap();
    assert_eq!(store.hlen(b"h").unwrap(), 2);
    assert_eq!(store.hget(b"h", &[b"f2"]).unwrap(), vec![b"v2".to_vec()]);

    let mut keys = store.hkeys(b"h").unwrap();
    keys.sort();
    assert_eq!(keys, vec![b"f1".to_vec(), b"f2".to_vec()]);
}

#[test]
fn hget_is_all_or_nothing() {
    let (_dir, store) = sled_store();
    store.hset(b"h", &[(b"f1", b"v1")]).unwrap();
    assert!(matches!(
        store.hget(b"h", &[b"f1", b"ghost"]),
        Err(StoreError::NotFound)
    ));
}

#[test]
fn hdel_decrements_count_for_real_deletions_only() {
    let (_dir, store) = sled_store();
    store
        .hset(b"h", &[(b"f1", b"v1"), (b"f2", b"v2"), (b"f3", b"v3")])
        .unwrap();

    // One real field, one ghost, one duplicate.
    assert_eq!(store.hdel(b"h", &[b"f1", b"ghost", b"f1"]).unwrap(), 1);
    assert_eq!(store.hlen(b"h").unwrap(), 2);
    assert_eq!(store.hgetall(b"h").unwrap().len(), 2);

    assert_eq!(store.hdel(b"h", &[b"f2", b"f3"]).unwrap(), 2);
    assert_eq!(store.hlen(b"h").unwrap(), 0);
    assert!(store.hgetall(b"h").unwrap().is_empty());

    assert_eq!(store.hdel(b"missing", &[b"f"]).unwrap(), 0);
}

#[test]
fn hash_meta_count_matches_entries_after_mixed_ops() {
    let (_dir, store) = sled_store();
    store.hset(b"h", &[(b"a", b"1"), (b"b", b"2")]).unwrap();
    store.hdel(b"h", &[b"a"]).unwrap();
    store.hset(b"h", &[(b"c", b"3"), (b"b", b"x")]).unwrap();
    store.hdel(b"h", &[b"ghost"]).unwrap();

    assert_eq!(store.hlen(b"h").unwrap() as usize, store.hgetall(b"h").unwrap().len());
    assert_eq!(store.hlen(b"h").unwrap(), 2);
}

#[test]
fn hexists_sees_only_present_fields() {
    let (_dir, store) = sled_store();
    assert!(!store.hexists(b"h", b"f").unwrap());
    store.hset(b"h", &[(b"f", b"v")]).unwrap();
    assert!(store.hexists(b"h", b"f").unwrap());
    assert!(!store.hexists(b"h", b"other").unwrap());
}

// -------------------------------------------------------------------- lists

#[test]
fn lpush_lpop_leaves_list_unchanged() {
    let (_dir, store) = sled_store();
    store.rpush(b"l", &[b"base"]).unwrap();
    store.lpush(b"l", &[b"x"]).unwrap();
    assert_eq!(store.lpop(b"l").unwrap(), b"x".to_vec());
    assert_eq!(store.lrange(b"l", 0, -1).unwrap(), vec![b"base".to_vec()]);
}

#[test]
fn rpush_rpop_leaves_list_unchanged() {
    let (_dir, store) = sled_store();
    store.rpush(b"l", &[b"base"]).unwrap();
    store.rpush(b"l", &[b"x"]).unwrap();
    assert_eq!(store.rpop(b"l").unwrap(), b"x".to_vec());
    assert_eq!(store.lrange(b"l", 0, -1).unwrap(), vec![b"base".to_vec()]);
}

#[test]
fn lpush_orders_newest_first() {
    // LPUSH mylist a; LPUSH mylist b; LRANGE mylist 0 -1 -> [b, a]
    let (_dir, store) = sled_store();
    store.lpush(b"mylist", &[b"a"]).unwrap();
    store.lpush(b"mylist", &[b"b"]).unwrap();
    assert_eq!(
        store.lrange(b"mylist", 0, -1).unwrap(),
        vec![b"b".to_vec(), b"a".to_vec()]
    );
}

#[test]
fn ltrim_keeps_only_the_window() {
    // RPUSH x y z; LTRIM 1 1; LRANGE 0 -1 -> [y]
    let (_dir, store) = sled_store();
    store.rpush(b"mylist", &[b"x", b"y", b"z"]).unwrap();
    store.ltrim(b"mylist", 1, 1).unwrap();
    assert_eq!(store.lrange(b"mylist", 0, -1).unwrap(), vec![b"y".to_vec()]);
    assert_eq!(store.llen(b"mylist").unwrap(), 1);
}

#[test]
fn ltrim_with_empty_window_clears_the_list() {
    let (_dir, store) = sled_store();
    store.rpush(b"l", &[b"a", b"b", b"c"]).unwrap();
    store.ltrim(b"l", 2, 1).unwrap();
    assert_eq!(store.llen(b"l").unwrap(), 0);
    assert!(store.lrange(b"l", 0, -1).unwrap().is_empty());
    // The list can be refilled afterwards.
    store.rpush(b"l", &[b"d"]).unwrap();
    assert_eq!(store.lrange(b"l", 0, -1).unwrap(), vec![b"d".to_vec()]);
}

#[test]
fn lrange_normalizes_negative_and_out_of_bounds_indices() {
    let (_dir, store) = sled_store();
    store.rpush(b"l", &[b"a", b"b", b"c", b"d"]).unwrap();
    assert_eq!(
        store.lrange(b"l", -2, -1).unwrap(),
        vec![b"c".to_vec(), b"d".to_vec()]
    );
    assert_eq!(store.lrange(b"l", 0, 100).unwrap().len(), 4);
    assert!(store.lrange(b"l", 3, 1).unwrap().is_empty());
}

#[test]
fn pops_on_empty_or_missing_lists_are_not_found() {
    let (_dir, store) = sled_store();
    assert!(matches!(store.lpop(b"l"), Err(StoreError::NotFound)));
    store.rpush(b"l", &[b"only"]).unwrap();
    store.rpop(b"l").unwrap();
    assert!(matches!(store.rpop(b"l"), Err(StoreError::NotFound)));
    assert_eq!(store.llen(b"l").unwrap(), 0);
}

#[test]
fn list_length_equals_window_and_entries() {
    let (_dir, store) = sled_store();
    store.lpush(b"l", &[b"a", b"b"]).unwrap();
    store.rpush(b"l", &[b"c", b"d"]).unwrap();
    store.lpop(b"l").unwrap();
    assert_eq!(store.llen(b"l").unwrap(), 3);
    assert_eq!(store.lrange(b"l", 0, -1).unwrap().len(), 3);
    assert_eq!(
        store.lrange(b"l", 0, -1).unwrap(),
        vec![b"a".to_vec(), b"c".to_vec(), b"d".to_vec()]
    );
}

// --------------------------------------------------------------------- sets

#[test]
fn sadd_ignores_duplicates() {
    // SADD s a; SADD s a; SCARD s -> 1
    let (_dir, store) = sled_store();
    assert_eq!(store.sadd(b"s", &[b"a"]).unwrap(), 1);
    assert_eq!(store.sadd(b"s", &[b"a"]).unwrap(), 0);
    assert_eq!(store.scard(b"s").unwrap(), 1);

    // Duplicates within one call also count once.
    assert_eq!(store.sadd(b"s", &[b"b", b"b", b"c"]).unwrap(), 2);
    assert_eq!(store.scard(b"s").unwrap(), 3);
}

#[test]
fn srem_only_counts_existing_members() {
    let (_dir, store) = sled_store();
    store.sadd(b"s", &[b"a", b"b", b"c"]).unwrap();
    assert_eq!(store.srem(b"s", &[b"a", b"ghost", b"a"]).unwrap(), 1);
    assert_eq!(store.scard(b"s").unwrap(), 2);
    assert_eq!(store.smembers(b"s").unwrap().len(), 2);
    assert_eq!(store.srem(b"missing", &[b"x"]).unwrap(), 0);
}

#[test]
fn smembers_returns_member_bytes() {
    let (_dir, store) = sled_store();
    store.sadd(b"s", &[b"bb", b"aa"]).unwrap();
    let members = store.smembers(b"s").unwrap();
    assert_eq!(members, vec![b"aa".to_vec(), b"bb".to_vec()]);
}

// -------------------------------------------------------------- sorted sets

#[test]
fn zadd_rescore_keeps_cardinality_one() {
    // ZADD z s m; ZADD z s' m; ZSCORE -> s'; ZCARD -> 1
    let (_dir, store) = sled_store();
    assert_eq!(store.zadd(b"z", 5, b"m").unwrap(), 1);
    assert_eq!(store.zadd(b"z", 9, b"m").unwrap(), 0);
    assert_eq!(store.zscore(b"z", b"m").unwrap(), 9);
    assert_eq!(store.zcard(b"z").unwrap(), 1);
    // The old by-score entry is gone.
    assert_eq!(store.zrange(b"z", 0, -1).unwrap(), vec![(9, b"m".to_vec())]);
}

#[test]
fn zset_boundary_scenario() {
    // ZADD z 10 a; ZADD z 5 b; ZRANGE WITHSCORES -> [b 5 a 10];
    // ZREVRANGE -> [a b]; ZRANK b -> 0
    let (_dir, store) = sled_store();
    store.zadd(b"z", 10, b"a").unwrap();
    store.zadd(b"z", 5, b"b").unwrap();

    assert_eq!(
        store.zrange(b"z", 0, -1).unwrap(),
        vec![(5, b"b".to_vec()), (10, b"a".to_vec())]
    );
    assert_eq!(
        store.zrevrange(b"z", 0, -1).unwrap(),
        vec![(10, b"a".to_vec()), (5, b"b".to_vec())]
    );
    assert_eq!(store.zrank(b"z", b"b").unwrap(), 0);
    assert_eq!(store.zrank(b"z", b"a").unwrap(), 1);
}

#[test]
fn zrange_windows_by_rank() {
    let (_dir, store) = sled_store();
    for (score, member) in [(1u64, b"a"), (2, b"b"), (3, b"c"), (4, b"d")] {
        store.zadd(b"z", score, member).unwrap();
    }
    assert_eq!(
        store.zrange(b"z", 1, 2).unwrap(),
        vec![(2, b"b".to_vec()), (3, b"c".to_vec())]
    );
    assert_eq!(
        store.zrevrange(b"z", 0, 1).unwrap(),
        vec![(4, b"d".to_vec()), (3, b"c".to_vec())]
    );
    assert_eq!(store.zrange(b"z", -2, -1).unwrap().len(), 2);
    assert!(store.zrange(b"z", 3, 1).unwrap().is_empty());
}

#[test]
fn zrem_skips_missing_members() {
    let (_dir, store) = sled_store();
    store.zadd(b"z", 1, b"a").unwrap();
    store.zadd(b"z", 2, b"b").unwrap();
    assert_eq!(store.zrem(b"z", &[b"a", b"ghost"]).unwrap(), 1);
    assert_eq!(store.zcard(b"z").unwrap(), 1);
    assert!(matches!(
        store.zscore(b"z", b"a"),
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        store.zrem(b"missing", &[b"x"]),
        Err(StoreError::NotFound)
    ));
}

#[test]
fn zincrby_moves_the_member_in_score_order() {
    let (_dir, store) = sled_store();
    store.zadd(b"z", 10, b"a").unwrap();
    store.zadd(b"z", 20, b"b").unwrap();
    assert_eq!(store.zincrby(b"z", 15, b"a").unwrap(), 25);
    assert_eq!(
        store.zrange(b"z", 0, -1).unwrap(),
        vec![(20, b"b".to_vec()), (25, b"a".to_vec())]
    );
    assert_eq!(store.zscore(b"z", b"a").unwrap(), 25);
    assert_eq!(store.zcard(b"z").unwrap(), 2);
    assert!(matches!(
        store.zincrby(b"z", 1, b"ghost"),
        Err(StoreError::NotFound)
    ));
}

#[test]
fn zcount_bounds_are_inclusive() {
    let (_dir, store) = sled_store();
    for (score, member) in [(5u64, b"a"), (10, b"b"), (15, b"c")] {
        store.zadd(b"z", score, member).unwrap();
    }
    assert_eq!(store.zcount(b"z", 5, 15).unwrap(), 3);
    assert_eq!(store.zcount(b"z", 6, 14).unwrap(), 1);
    assert_eq!(store.zcount(b"z", 0, u64::MAX).unwrap(), 3);
    assert_eq!(store.zcount(b"z", 16, 20).unwrap(), 0);
}

#[test]
fn zset_indices_stay_in_agreement() {
    let (_dir, store) = sled_store();
    store.zadd(b"z", 3, b"x").unwrap();
    store.zadd(b"z", 1, b"y").unwrap();
    store.zadd(b"z", 7, b"x").unwrap();
    store.zincrby(b"z", 1, b"y").unwrap();
    store.zrem(b"z", &[b"nothing"]).unwrap();

    // Every by-score entry agrees with the by-member score.
    let entries = store.zrange(b"z", 0, -1).unwrap();
    assert_eq!(entries.len() as u32, store.zcard(b"z").unwrap());
    for (score, member) in entries {
        assert_eq!(store.zscore(b"z", &member).unwrap(), score);
    }
}

#[test]
fn same_score_members_sort_by_bytes() {
    let (_dir, store) = sled_store();
    store.zadd(b"z", 5, b"bb").unwrap();
    store.zadd(b"z", 5, b"aa").unwrap();
    assert_eq!(
        store.zrange(b"z", 0, -1).unwrap(),
        vec![(5, b"aa".to_vec()), (5, b"bb".to_vec())]
    );
}

// ----------------------------------------------------------- other backends

#[test]
fn operators_behave_the_same_on_redb() {
    let (_dir, store) = redb_store();

    store.set(b"k", b"v", 0).unwrap();
    assert_eq!(store.get(b"k").unwrap(), b"v".to_vec());

    store.lpush(b"mylist", &[b"a"]).unwrap();
    store.lpush(b"mylist", &[b"b"]).unwrap();
    assert_eq!(
        store.lrange(b"mylist", 0, -1).unwrap(),
        vec![b"b".to_vec(), b"a".to_vec()]
    );

    store.hset(b"h", &[(b"f1", b"v1"), (b"f2", b"v2")]).unwrap();
    store.hset(b"h", &[(b"f1", b"v1")]).unwrap();
    assert_eq!(store.hlen(b"h").unwrap(), 2);

    store.zadd(b"z", 10, b"a").unwrap();
    store.zadd(b"z", 5, b"b").unwrap();
    assert_eq!(
        store.zrange(b"z", 0, -1).unwrap(),
        vec![(5, b"b".to_vec()), (10, b"a".to_vec())]
    );

    assert_eq!(store.del(b"h").unwrap(), 1);
    assert_eq!(store.hlen(b"h").unwrap(), 0);
}

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let store = Store::open(dir.path(), EngineKind::Sled, 2).expect("open");
        store.set(b"k", b"v", 0).unwrap();
        store.rpush(b"l", &[b"a", b"b"]).unwrap();
        store.close().unwrap();
    }
    let store = Store::open(dir.path(), EngineKind::Sled, 2).expect("reopen");
    assert_eq!(store.get(b"k").unwrap(), b"v".to_vec());
    assert_eq!(
        store.lrange(b"l", 0, -1).unwrap(),
        vec![b"a".to_vec(), b"b".to_vec()]
    );
}
