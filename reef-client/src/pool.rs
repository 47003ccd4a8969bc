//! # Connection Pool
//!
//! Bounded pool of blocking TCP connections. A lease hands a connection out,
//! runs commands on it, and returns it on drop; connections that hit an IO or
//! protocol error are discarded instead of being reused.

use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};

use crate::client::{ClientConfig, ClientError, ClientResult};
use crate::resp::{command_frame, read_response, RespValue};

/// Reply read buffering. Most replies are a few bytes (`+OK`, integers,
/// short bulks); 4 KiB also absorbs INFO and mid-sized arrays in one fill
/// without over-reserving per pooled connection.
const READ_BUFFER_BYTES: usize = 4096;

struct State {
    idle: Vec<Connection>,
    open: usize,
}

struct Shared {
    config: ClientConfig,
    state: Mutex<State>,
}

/// Cloneable pool handle.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<Shared>,
}

impl ConnectionPool {
    pub fn new(config: ClientConfig) -> Self {
        ConnectionPool {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State {
                    idle: Vec::new(),
                    open: 0,
                }),
            }),
        }
    }

    /// Takes an idle connection or dials a new one, up to the configured
    /// total. Fails fast with `PoolExhausted` at the limit.
    pub fn acquire(&self) -> ClientResult<Lease> {
        {
            let mut state = self.shared.state.lock().expect("pool mutex poisoned");
            if let Some(conn) = state.idle.pop() {
                return Ok(Lease::new(Arc::clone(&self.shared), conn));
            }
            if state.open >= self.shared.config.max_total {
                return Err(ClientError::PoolExhausted);
            }
            state.open += 1;
        }

        match Connection::dial(&self.shared.config) {
            Ok(conn) => Ok(Lease::new(Arc::clone(&self.shared), conn)),
            Err(err) => {
                let mut state = self.shared.state.lock().expect("pool mutex poisoned");
                state.open -= 1;
                Err(err)
            }
        }
    }
}

/// RAII lease; returns the connection to the pool on drop unless it failed.
pub struct Lease {
    shared: Arc<Shared>,
    conn: Option<Connection>,
    healthy: bool,
}

impl Lease {
    fn new(shared: Arc<Shared>, conn: Connection) -> Self {
        Lease {
            shared,
            conn: Some(conn),
            healthy: true,
        }
    }

    /// Runs one command and reads its reply.
    pub fn exec(&mut self, args: &[&[u8]]) -> ClientResult<RespValue> {
        let conn = self.conn.as_mut().expect("leased connection present");
        let result = conn.exec(args);
        if result.is_err() {
            self.healthy = false;
        }
        result
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let mut state = self.shared.state.lock().expect("pool mutex poisoned");
        if self.healthy && state.idle.len() < self.shared.config.max_idle {
            state.idle.push(conn);
        } else {
            state.open -= 1;
        }
    }
}

/// One blocking TCP connection. The socket is split into a write handle and
/// a buffered read handle (a cloned descriptor) so a request goes out as one
/// exact-sized frame while replies are parsed off the buffered side.
struct Connection {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    scratch: Vec<u8>,
}

impl Connection {
    fn dial(config: &ClientConfig) -> ClientResult<Self> {
        let addr: SocketAddr = config
            .addr
            .parse()
            .map_err(|_| ClientError::InvalidAddress)?;
        let stream = match config.connect_timeout {
            Some(limit) => TcpStream::connect_timeout(&addr, limit)?,
            None => TcpStream::connect(addr)?,
        };
        // Frames are written whole, so Nagle only adds latency here.
        stream.set_nodelay(true)?;
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;

        let reader = BufReader::with_capacity(READ_BUFFER_BYTES, stream.try_clone()?);
        Ok(Connection {
            stream,
            reader,
            scratch: Vec::new(),
        })
    }

    fn exec(&mut self, args: &[&[u8]]) -> ClientResult<RespValue> {
        // One presized frame, one write; TcpStream is unbuffered so there is
        // nothing to flush.
        self.stream.write_all(&command_frame(args))?;
        read_response(&mut self.reader, &mut self.scratch)
    }
}
