//! # Command Dispatch
//!
//! One declarative table maps a lowercased command name to its arity bounds
//! and handler. Arity violations are answered before any operator runs;
//! operator errors are translated to RESP at this boundary and nowhere else.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use reef_common::{format_u64, parse_i64, parse_u64};
use reef_store::{Store, StoreError, TtlState};

use crate::resp::Reply;

type Handler = fn(&Store, &[Vec<u8>]) -> Reply;

/// One row of the command table.
pub struct CommandSpec {
    pub name: &'static str,
    /// Minimum argument count, command name included.
    min_args: usize,
    /// Maximum argument count; `usize::MAX` marks variadic commands.
    max_args: usize,
    handler: Handler,
}

const VARIADIC: usize = usize::MAX;

static COMMANDS: &[CommandSpec] = &[
    CommandSpec { name: "set", min_args: 3, max_args: 5, handler: cmd_set },
    CommandSpec { name: "get", min_args: 2, max_args: 2, handler: cmd_get },
    CommandSpec { name: "del", min_args: 2, max_args: VARIADIC, handler: cmd_del },
    CommandSpec { name: "expire", min_args: 3, max_args: 3, handler: cmd_expire },
    CommandSpec { name: "ttl", min_args: 2, max_args: 2, handler: cmd_ttl },
    CommandSpec { name: "hset", min_args: 4, max_args: VARIADIC, handler: cmd_hset },
    CommandSpec { name: "hget", min_args: 3, max_args: 3, handler: cmd_hget },
    CommandSpec { name: "hdel", min_args: 3, max_args: VARIADIC, handler: cmd_hdel },
    CommandSpec { name: "hgetall", min_args: 2, max_args: 2, handler: cmd_hgetall },
    CommandSpec { name: "hkeys", min_args: 2, max_args: 2, handler: cmd_hkeys },
    CommandSpec { name: "hlen", min_args: 2, max_args: 2, handler: cmd_hlen },
    CommandSpec { name: "hexists", min_args: 3, max_args: 3, handler: cmd_hexists },
    CommandSpec { name: "sadd", min_args: 3, max_args: VARIADIC, handler: cmd_sadd },
    CommandSpec { name: "srem", min_args: 3, max_args: VARIADIC, handler: cmd_srem },
    CommandSpec { name: "smembers", min_args: 2, max_args: 2, handler: cmd_smembers },
    CommandSpec { name: "scard", min_args: 2, max_args: 2, handler: cmd_scard },
    CommandSpec { name: "lpush", min_args: 3, max_args: VARIADIC, handler: cmd_lpush },
    CommandSpec { name: "rpush", min_args: 3, max_args: VARIADIC, handler: cmd_rpush },
    CommandSpec { name: "lpop", min_args: 2, max_args: 2, handler: cmd_lpop },
    CommandSpec { name: "rpop", min_args: 2, max_args: 2, handler: cmd_rpop },
    CommandSpec { name: "lrange", min_args: 4, max_args: 4, handler: cmd_lrange },
    CommandSpec { name: "ltrim", min_args: 4, max_args: 4, handler: cmd_ltrim },
    CommandSpec { name: "llen", min_args: 2, max_args: 2, handler: cmd_llen },
    CommandSpec { name: "zadd", min_args: 4, max_args: 4, handler: cmd_zadd },
    CommandSpec { name: "zrem", min_args: 3, max_args: VARIADIC, handler: cmd_zrem },
    CommandSpec { name: "zscore", min_args: 3, max_args: 3, handler: cmd_zscore },
    CommandSpec { name: "zincrby", min_args: 4, max_args: 4, handler: cmd_zincrby },
    CommandSpec { name: "zrange", min_args: 4, max_args: 5, handler: cmd_zrange },
    CommandSpec { name: "zrevrange", min_args: 4, max_args: 5, handler: cmd_zrevrange },
    CommandSpec { name: "zrank", min_args: 3, max_args: 3, handler: cmd_zrank },
    CommandSpec { name: "zcount", min_args: 4, max_args: 4, handler: cmd_zcount },
    CommandSpec { name: "zcard", min_args: 2, max_args: 2, handler: cmd_zcard },
];

static REGISTRY: Lazy<HashMap<&'static str, &'static CommandSpec>> =
    Lazy::new(|| COMMANDS.iter().map(|spec| (spec.name, spec)).collect());

/// True when `name` (lowercased) is a worker-routed data command.
pub fn is_registered(name: &str) -> bool {
    REGISTRY.contains_key(name)
}

/// Looks up and runs a data command, validating arity first.
pub fn dispatch(store: &Store, args: &[Vec<u8>]) -> Reply {
    let Some(first) = args.first() else {
        return Reply::Error("ERR empty command".to_string());
    };
    let name = String::from_utf8_lossy(first).to_ascii_lowercase();
    let Some(spec) = REGISTRY.get(name.as_str()) else {
        return Reply::Error(format!("ERR unknown command '{name}'"));
    };
    if args.len() < spec.min_args || args.len() > spec.max_args {
        return wrong_args(&name);
    }
    (spec.handler)(store, args)
}

pub fn wrong_args(name: &str) -> Reply {
    Reply::Error(format!("ERR wrong number of arguments for '{name}' command"))
}

fn integer_error() -> Reply {
    Reply::Error("ERR value is not an integer or out of range".to_string())
}

fn store_error(err: StoreError) -> Reply {
    Reply::Error(format!("ERR {err}"))
}

fn rest(args: &[Vec<u8>], from: usize) -> Vec<&[u8]> {
    args[from..].iter().map(|arg| arg.as_slice()).collect()
}

// ------------------------------------------------------------------ strings

fn cmd_set(store: &Store, args: &[Vec<u8>]) -> Reply {
    let ttl = match args.len() {
        3 => 0,
        5 if args[3].eq_ignore_ascii_case(b"EX") => match parse_u64(&args[4]) {
            Some(secs) if secs > 0 && secs <= u64::from(u32::MAX) => secs as u32,
            _ => return integer_error(),
        },
        _ => return Reply::Error("ERR syntax error".to_string()),
    };
    match store.set(&args[1], &args[2], ttl) {
        Ok(()) => Reply::ok(),
        Err(err) => store_error(err),
    }
}

fn cmd_get(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.get(&args[1]) {
        Ok(value) => Reply::Bulk(value),
        Err(StoreError::NotFound) => Reply::NullBulk,
        Err(err) => store_error(err),
    }
}

fn cmd_del(store: &Store, args: &[Vec<u8>]) -> Reply {
    let mut removed = 0;
    for key in &args[1..] {
        match store.del(key) {
            Ok(count) => removed += count,
            Err(err) => return store_error(err),
        }
    }
    Reply::Int(removed)
}

fn cmd_expire(store: &Store, args: &[Vec<u8>]) -> Reply {
    let Some(secs) = parse_u64(&args[2]).filter(|&s| s <= u64::from(u32::MAX)) else {
        return integer_error();
    };
    match store.expire(&args[1], secs as u32) {
        Ok(true) => Reply::Int(1),
        Ok(false) => Reply::Int(0),
        Err(err) => store_error(err),
    }
}

fn cmd_ttl(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.ttl(&args[1]) {
        Ok(TtlState::Missing) => Reply::Int(-2),
        Ok(TtlState::NoExpiry) => Reply::Int(-1),
        Ok(TtlState::ExpiresIn(secs)) => Reply::Int(i64::from(secs)),
        Err(err) => store_error(err),
    }
}

// ------------------------------------------------------------------- hashes

fn cmd_hset(store: &Store, args: &[Vec<u8>]) -> Reply {
    let fields = &args[2..];
    if fields.len() % 2 != 0 {
        return wrong_args("hset");
    }
    let pairs: Vec<(&[u8], &[u8])> = fields
        .chunks_exact(2)
        .map(|pair| (pair[0].as_slice(), pair[1].as_slice()))
        .collect();
    match store.hset(&args[1], &pairs) {
        Ok(()) => Reply::ok(),
        Err(err) => store_error(err),
    }
}

fn cmd_hget(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.hget(&args[1], &[args[2].as_slice()]) {
        Ok(mut values) => match values.pop() {
            Some(value) => Reply::Bulk(value),
            None => Reply::NullBulk,
        },
        Err(StoreError::NotFound) => Reply::NullBulk,
        Err(err) => store_error(err),
    }
}

fn cmd_hdel(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.hdel(&args[1], &rest(args, 2)) {
        Ok(removed) => Reply::Int(i64::from(removed)),
        Err(err) => store_error(err),
    }
}

fn cmd_hgetall(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.hgetall(&args[1]) {
        Ok(pairs) => {
            let mut items = Vec::with_capacity(pairs.len() * 2);
            for (field, value) in pairs {
                items.push(Reply::Bulk(field));
                items.push(Reply::Bulk(value));
            }
            Reply::Array(items)
        }
        Err(StoreError::NotFound) => Reply::NullBulk,
        Err(err) => store_error(err),
    }
}

fn cmd_hkeys(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.hkeys(&args[1]) {
        Ok(fields) => Reply::Array(fields.into_iter().map(Reply::Bulk).collect()),
        Err(StoreError::NotFound) => Reply::NullBulk,
        Err(err) => store_error(err),
    }
}

fn cmd_hlen(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.hlen(&args[1]) {
        Ok(count) => Reply::Int(i64::from(count)),
        Err(err) => store_error(err),
    }
}

fn cmd_hexists(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.hexists(&args[1], &args[2]) {
        Ok(present) => Reply::Int(i64::from(present)),
        Err(err) => store_error(err),
    }
}

// --------------------------------------------------------------------- sets

fn cmd_sadd(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.sadd(&args[1], &rest(args, 2)) {
        Ok(added) => Reply::Int(i64::from(added)),
        Err(err) => store_error(err),
    }
}

fn cmd_srem(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.srem(&args[1], &rest(args, 2)) {
        Ok(removed) => Reply::Int(i64::from(removed)),
        Err(err) => store_error(err),
    }
}

fn cmd_smembers(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.smembers(&args[1]) {
        Ok(members) => Reply::Array(members.into_iter().map(Reply::Bulk).collect()),
        Err(StoreError::NotFound) => Reply::NullBulk,
        Err(err) => store_error(err),
    }
}

fn cmd_scard(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.scard(&args[1]) {
        Ok(count) => Reply::Int(i64::from(count)),
        Err(err) => store_error(err),
    }
}

// -------------------------------------------------------------------- lists

fn cmd_lpush(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.lpush(&args[1], &rest(args, 2)) {
        Ok(len) => Reply::Int(i64::from(len)),
        Err(err) => store_error(err),
    }
}

fn cmd_rpush(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.rpush(&args[1], &rest(args, 2)) {
        Ok(len) => Reply::Int(i64::from(len)),
        Err(err) => store_error(err),
    }
}

fn cmd_lpop(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.lpop(&args[1]) {
        Ok(value) => Reply::Bulk(value),
        Err(StoreError::NotFound) => Reply::NullBulk,
        Err(err) => store_error(err),
    }
}

fn cmd_rpop(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.rpop(&args[1]) {
        Ok(value) => Reply::Bulk(value),
        Err(StoreError::NotFound) => Reply::NullBulk,
        Err(err) => store_error(err),
    }
}

fn cmd_lrange(store: &Store, args: &[Vec<u8>]) -> Reply {
    let (Some(start), Some(stop)) = (parse_i64(&args[2]), parse_i64(&args[3])) else {
        return integer_error();
    };
    match store.lrange(&args[1], start, stop) {
        Ok(values) => Reply::Array(values.into_iter().map(Reply::Bulk).collect()),
        Err(StoreError::NotFound) => Reply::Array(Vec::new()),
        Err(err) => store_error(err),
    }
}

fn cmd_ltrim(store: &Store, args: &[Vec<u8>]) -> Reply {
    let (Some(start), Some(stop)) = (parse_i64(&args[2]), parse_i64(&args[3])) else {
        return integer_error();
    };
    match store.ltrim(&args[1], start, stop) {
        // Trimming a missing list is a no-op, as in Redis.
        Ok(()) | Err(StoreError::NotFound) => Reply::ok(),
        Err(err) => store_error(err),
    }
}

fn cmd_llen(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.llen(&args[1]) {
        Ok(len) => Reply::Int(i64::from(len)),
        Err(err) => store_error(err),
    }
}

// -------------------------------------------------------------- sorted sets

fn cmd_zadd(store: &Store, args: &[Vec<u8>]) -> Reply {
    let Some(score) = parse_u64(&args[2]) else {
        return integer_error();
    };
    match store.zadd(&args[1], score, &args[3]) {
        Ok(added) => Reply::Int(added),
        Err(err) => store_error(err),
    }
}

fn cmd_zrem(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.zrem(&args[1], &rest(args, 2)) {
        Ok(removed) => Reply::Int(i64::from(removed)),
        Err(StoreError::NotFound) => Reply::Int(0),
        Err(err) => store_error(err),
    }
}

fn cmd_zscore(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.zscore(&args[1], &args[2]) {
        Ok(score) => Reply::Bulk(format_u64(score)),
        Err(StoreError::NotFound) => Reply::NullBulk,
        Err(err) => store_error(err),
    }
}

fn cmd_zincrby(store: &Store, args: &[Vec<u8>]) -> Reply {
    let Some(delta) = parse_u64(&args[2]) else {
        return integer_error();
    };
    match store.zincrby(&args[1], delta, &args[3]) {
        Ok(score) => Reply::Bulk(format_u64(score)),
        Err(StoreError::NotFound) => Reply::NullBulk,
        Err(err) => store_error(err),
    }
}

fn cmd_zrange(store: &Store, args: &[Vec<u8>]) -> Reply {
    zrange_reply(store, args, false)
}

fn cmd_zrevrange(store: &Store, args: &[Vec<u8>]) -> Reply {
    zrange_reply(store, args, true)
}

fn zrange_reply(store: &Store, args: &[Vec<u8>], reverse: bool) -> Reply {
    let (Some(start), Some(stop)) = (parse_i64(&args[2]), parse_i64(&args[3])) else {
        return integer_error();
    };
    let withscores = match args.get(4) {
        Some(flag) if flag.eq_ignore_ascii_case(b"WITHSCORES") => true,
        Some(_) => return Reply::Error("ERR syntax error".to_string()),
        None => false,
    };
    let result = if reverse {
        store.zrevrange(&args[1], start, stop)
    } else {
        store.zrange(&args[1], start, stop)
    };
    match result {
        Ok(entries) => {
            let mut items = Vec::with_capacity(entries.len() * 2);
            for (score, member) in entries {
                items.push(Reply::Bulk(member));
                if withscores {
                    items.push(Reply::Bulk(format_u64(score)));
                }
            }
            Reply::Array(items)
        }
        Err(StoreError::NotFound) => Reply::Array(Vec::new()),
        Err(err) => store_error(err),
    }
}

fn cmd_zrank(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.zrank(&args[1], &args[2]) {
        Ok(rank) => Reply::Int(i64::from(rank)),
        Err(StoreError::NotFound) => Reply::NullBulk,
        Err(err) => store_error(err),
    }
}

fn cmd_zcount(store: &Store, args: &[Vec<u8>]) -> Reply {
    let (Some(min), Some(max)) = (parse_u64(&args[2]), parse_u64(&args[3])) else {
        return integer_error();
    };
    match store.zcount(&args[1], min, max) {
        Ok(count) => Reply::Int(i64::from(count)),
        Err(StoreError::NotFound) => Reply::Int(0),
        Err(err) => store_error(err),
    }
}

fn cmd_zcard(store: &Store, args: &[Vec<u8>]) -> Reply {
    match store.zcard(&args[1]) {
        Ok(count) => Reply::Int(i64::from(count)),
        Err(err) => store_error(err),
    }
}
