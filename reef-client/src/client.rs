//! # Synchronous Client API
//!
//! Typed wrappers over the RESP2 wire for every reef command. Each call
//! leases a pooled connection, runs one command, and translates the reply;
//! server error lines surface as `ClientError::Server`.

use std::time::Duration;

use thiserror::Error;

use crate::pool::ConnectionPool;
use crate::resp::RespValue;

/// Result alias for client calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error")]
    Protocol,

    #[error("server error: {}", String::from_utf8_lossy(.message))]
    Server { message: Vec<u8> },

    #[error("unexpected response type")]
    UnexpectedResponse,

    #[error("connection pool exhausted")]
    PoolExhausted,

    #[error("invalid server address")]
    InvalidAddress,
}

/// TTL state reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTtl {
    /// Key missing or already expired.
    Missing,
    /// Key present without expiration.
    NoExpiry,
    /// Key expires after this duration.
    ExpiresIn(Duration),
}

/// Client and pool configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, e.g. "127.0.0.1:6380".
    pub addr: String,
    /// Idle connections kept for reuse.
    pub max_idle: usize,
    /// Total connections (idle plus leased).
    pub max_total: usize,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: "127.0.0.1:6380".to_string(),
            max_idle: 8,
            max_total: 16,
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
        }
    }
}

/// Blocking client with connection pooling.
pub struct ReefClient {
    pool: ConnectionPool,
}

impl ReefClient {
    /// Connects with default pool settings.
    pub fn connect(addr: impl Into<String>) -> ReefClient {
        let config = ClientConfig {
            addr: addr.into(),
            ..ClientConfig::default()
        };
        Self::with_config(config)
    }

    pub fn with_config(config: ClientConfig) -> ReefClient {
        ReefClient {
            pool: ConnectionPool::new(config),
        }
    }

    fn exec(&self, args: &[&[u8]]) -> ClientResult<RespValue> {
        let mut lease = self.pool.acquire()?;
        match lease.exec(args)? {
            RespValue::Error(message) => Err(ClientError::Server { message }),
            value => Ok(value),
        }
    }

    // ------------------------------------------------------------- strings

    pub fn set(&self, key: &[u8], value: &[u8]) -> ClientResult<()> {
        expect_simple(self.exec(&[b"SET", key, value])?)
    }

    pub fn set_with_ttl(&self, key: &[u8], value: &[u8], ttl: Duration) -> ClientResult<()> {
        let secs = ttl.as_secs().to_string();
        expect_simple(self.exec(&[b"SET", key, value, b"EX", secs.as_bytes()])?)
    }

    pub fn get(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        expect_bulk(self.exec(&[b"GET", key])?)
    }

    pub fn del(&self, key: &[u8]) -> ClientResult<i64> {
        expect_int(self.exec(&[b"DEL", key])?)
    }

    pub fn expire(&self, key: &[u8], ttl: Duration) -> ClientResult<bool> {
        let secs = ttl.as_secs().to_string();
        Ok(expect_int(self.exec(&[b"EXPIRE", key, secs.as_bytes()])?)? == 1)
    }

    pub fn ttl(&self, key: &[u8]) -> ClientResult<ClientTtl> {
        match expect_int(self.exec(&[b"TTL", key])?)? {
            -2 => Ok(ClientTtl::Missing),
            -1 => Ok(ClientTtl::NoExpiry),
            secs if secs >= 0 => Ok(ClientTtl::ExpiresIn(Duration::from_secs(secs as u64))),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    // -------------------------------------------------------------- hashes

    pub fn hset(&self, key: &[u8], pairs: &[(&[u8], &[u8])]) -> ClientResult<()> {
        let mut args: Vec<&[u8]> = vec![b"HSET", key];
        for &(field, value) in pairs {
            args.push(field);
            args.push(value);
        }
        expect_simple(self.exec(&args)?)
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        expect_bulk(self.exec(&[b"HGET", key, field])?)
    }

    pub fn hdel(&self, key: &[u8], fields: &[&[u8]]) -> ClientResult<i64> {
        let mut args: Vec<&[u8]> = vec![b"HDEL", key];
        args.extend_from_slice(fields);
        expect_int(self.exec(&args)?)
    }

    pub fn hgetall(&self, key: &[u8]) -> ClientResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let items = expect_bulk_array(self.exec(&[b"HGETALL", key])?)?;
        if items.len() % 2 != 0 {
            return Err(ClientError::UnexpectedResponse);
        }
        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            pairs.push((field, value));
        }
        Ok(pairs)
    }

    pub fn hkeys(&self, key: &[u8]) -> ClientResult<Vec<Vec<u8>>> {
        expect_bulk_array(self.exec(&[b"HKEYS", key])?)
    }

    pub fn hlen(&self, key: &[u8]) -> ClientResult<i64> {
        expect_int(self.exec(&[b"HLEN", key])?)
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> ClientResult<bool> {
        Ok(expect_int(self.exec(&[b"HEXISTS", key, field])?)? == 1)
    }

    // ---------------------------------------------------------------- sets

    pub fn sadd(&self, key: &[u8], members: &[&[u8]]) -> ClientResult<i64> {
        let mut args: Vec<&[u8]> = vec![b"SADD", key];
        args.extend_from_slice(members);
        expect_int(self.exec(&args)?)
    }

    pub fn srem(&self, key: &[u8], members: &[&[u8]]) -> ClientResult<i64> {
        let mut args: Vec<&[u8]> = vec![b"SREM", key];
        args.extend_from_slice(members);
        expect_int(self.exec(&args)?)
    }

    pub fn smembers(&self, key: &[u8]) -> ClientResult<Vec<Vec<u8>>> {
        expect_bulk_array(self.exec(&[b"SMEMBERS", key])?)
    }

    pub fn scard(&self, key: &[u8]) -> ClientResult<i64> {
        expect_int(self.exec(&[b"SCARD", key])?)
    }

    // --------------------------------------------------------------- lists

    pub fn lpush(&self, key: &[u8], values: &[&[u8]]) -> ClientResult<i64> {
        let mut args: Vec<&[u8]> = vec![b"LPUSH", key];
        args.extend_from_slice(values);
        expect_int(self.exec(&args)?)
    }

    pub fn rpush(&self, key: &[u8], values: &[&[u8]]) -> ClientResult<i64> {
        let mut args: Vec<&[u8]> = vec![b"RPUSH", key];
        args.extend_from_slice(values);
        expect_int(self.exec(&args)?)
    }

    pub fn lpop(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        expect_bulk(self.exec(&[b"LPOP", key])?)
    }

    pub fn rpop(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        expect_bulk(self.exec(&[b"RPOP", key])?)
    }

    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> ClientResult<Vec<Vec<u8>>> {
        let (start, stop) = (start.to_string(), stop.to_string());
        expect_bulk_array(self.exec(&[b"LRANGE", key, start.as_bytes(), stop.as_bytes()])?)
    }

    pub fn ltrim(&self, key: &[u8], start: i64, stop: i64) -> ClientResult<()> {
        let (start, stop) = (start.to_string(), stop.to_string());
        expect_simple(self.exec(&[b"LTRIM", key, start.as_bytes(), stop.as_bytes()])?)
    }

    pub fn llen(&self, key: &[u8]) -> ClientResult<i64> {
        expect_int(self.exec(&[b"LLEN", key])?)
    }

    // --------------------------------------------------------- sorted sets

    pub fn zadd(&self, key: &[u8], score: u64, member: &[u8]) -> ClientResult<i64> {
        let score = score.to_string();
        expect_int(self.exec(&[b"ZADD", key, score.as_bytes(), member])?)
    }

    pub fn zrem(&self, key: &[u8], members: &[&[u8]]) -> ClientResult<i64> {
        let mut args: Vec<&[u8]> = vec![b"ZREM", key];
        args.extend_from_slice(members);
        expect_int(self.exec(&args)?)
    }

    pub fn zscore(&self, key: &[u8], member: &[u8]) -> ClientResult<Option<u64>> {
        parse_score(expect_bulk(self.exec(&[b"ZSCORE", key, member])?)?)
    }

    pub fn zincrby(&self, key: &[u8], delta: u64, member: &[u8]) -> ClientResult<Option<u64>> {
        let delta = delta.to_string();
        parse_score(expect_bulk(self.exec(&[b"ZINCRBY", key, delta.as_bytes(), member])?)?)
    }

    pub fn zrange(&self, key: &[u8], start: i64, stop: i64) -> ClientResult<Vec<Vec<u8>>> {
        let (start, stop) = (start.to_string(), stop.to_string());
        expect_bulk_array(self.exec(&[b"ZRANGE", key, start.as_bytes(), stop.as_bytes()])?)
    }

    pub fn zrange_withscores(
        &self,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> ClientResult<Vec<(Vec<u8>, u64)>> {
        let (start, stop) = (start.to_string(), stop.to_string());
        let items = expect_bulk_array(self.exec(&[
            b"ZRANGE",
            key,
            start.as_bytes(),
            stop.as_bytes(),
            b"WITHSCORES",
        ])?)?;
        if items.len() % 2 != 0 {
            return Err(ClientError::UnexpectedResponse);
        }
        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(member), Some(score)) = (iter.next(), iter.next()) {
            let score = parse_score(Some(score))?.ok_or(ClientError::UnexpectedResponse)?;
            pairs.push((member, score));
        }
        Ok(pairs)
    }

    pub fn zrevrange(&self, key: &[u8], start: i64, stop: i64) -> ClientResult<Vec<Vec<u8>>> {
        let (start, stop) = (start.to_string(), stop.to_string());
        expect_bulk_array(self.exec(&[b"ZREVRANGE", key, start.as_bytes(), stop.as_bytes()])?)
    }

    pub fn zrank(&self, key: &[u8], member: &[u8]) -> ClientResult<Option<i64>> {
        match self.exec(&[b"ZRANK", key, member])? {
            RespValue::Integer(rank) => Ok(Some(rank)),
            RespValue::Bulk(None) => Ok(None),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub fn zcount(&self, key: &[u8], min: u64, max: u64) -> ClientResult<i64> {
        let (min, max) = (min.to_string(), max.to_string());
        expect_int(self.exec(&[b"ZCOUNT", key, min.as_bytes(), max.as_bytes()])?)
    }

    pub fn zcard(&self, key: &[u8]) -> ClientResult<i64> {
        expect_int(self.exec(&[b"ZCARD", key])?)
    }

    // ---------------------------------------------------------- connection

    /// PING, optionally with a payload to echo.
    pub fn ping(&self, payload: Option<&[u8]>) -> ClientResult<Vec<u8>> {
        let response = match payload {
            Some(data) => self.exec(&[b"PING", data])?,
            None => self.exec(&[b"PING"])?,
        };
        match response {
            RespValue::Simple(text) => Ok(text),
            RespValue::Bulk(Some(data)) => Ok(data),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Raw INFO payload.
    pub fn info(&self) -> ClientResult<Vec<u8>> {
        match self.exec(&[b"INFO"])? {
            RespValue::Bulk(Some(data)) => Ok(data),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

fn expect_simple(value: RespValue) -> ClientResult<()> {
    match value {
        RespValue::Simple(_) => Ok(()),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

fn expect_int(value: RespValue) -> ClientResult<i64> {
    match value {
        RespValue::Integer(n) => Ok(n),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

fn expect_bulk(value: RespValue) -> ClientResult<Option<Vec<u8>>> {
    match value {
        RespValue::Bulk(data) => Ok(data),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

/// Flattens an array of bulk strings. A null bulk reply (how the server
/// reports a missing collection) reads as an empty list.
fn expect_bulk_array(value: RespValue) -> ClientResult<Vec<Vec<u8>>> {
    match value {
        RespValue::Bulk(None) => Ok(Vec::new()),
        RespValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    RespValue::Bulk(Some(data)) => out.push(data),
                    _ => return Err(ClientError::UnexpectedResponse),
                }
            }
            Ok(out)
        }
        _ => Err(ClientError::UnexpectedResponse),
    }
}

fn parse_score(data: Option<Vec<u8>>) -> ClientResult<Option<u64>> {
    let Some(data) = data else {
        return Ok(None);
    };
    let text = std::str::from_utf8(&data).map_err(|_| ClientError::Protocol)?;
    text.parse::<u64>()
        .map(Some)
        .map_err(|_| ClientError::Protocol)
}
