//! # TCP Server
//!
//! Accept RESP2 connections, parse command frames, and hand them to the
//! worker pool. Each connection runs a reader task and a writer task; workers
//! (and the fast-path commands handled here) push encoded replies into the
//! connection's outbound channel, and the writer flushes after every reply so
//! commands on different keys may interleave without blocking each other.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

use crate::dispatch;
use crate::resp::{Reply, RespError, RespParser};
use crate::worker::{Task, WorkerPool};

/// Accept loop. Returns once `shutdown` flips; open connections wind down on
/// their own as clients disconnect.
pub async fn serve(
    listener: TcpListener,
    pool: Arc<WorkerPool>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                tracing::debug!(%peer, "connection accepted");
                let pool = Arc::clone(&pool);
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, pool).await {
                        tracing::debug!(%peer, error = %err, "connection ended");
                    }
                });
            }
            _ = shutdown.changed() => {
                tracing::info!("listener closing");
                return Ok(());
            }
        }
    }
}

/// Handles a single client connection until EOF, QUIT, or protocol error.
pub async fn handle_connection(stream: TcpStream, pool: Arc<WorkerPool>) -> std::io::Result<()> {
    stream.set_nodelay(true)?;
    let (read_half, write_half) = stream.into_split();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();

    let writer = tokio::spawn(write_loop(write_half, reply_rx));
    let result = read_loop(read_half, &pool, &reply_tx).await;

    // Dropping the sender lets the writer drain pending replies and exit.
    drop(reply_tx);
    let _ = writer.await;
    result
}

async fn write_loop(mut half: OwnedWriteHalf, mut replies: UnboundedReceiver<Vec<u8>>) {
    while let Some(buf) = replies.recv().await {
        if half.write_all(&buf).await.is_err() {
            break;
        }
        if half.flush().await.is_err() {
            break;
        }
    }
    let _ = half.shutdown().await;
}

async fn read_loop(
    mut half: OwnedReadHalf,
    pool: &Arc<WorkerPool>,
    reply_tx: &UnboundedSender<Vec<u8>>,
) -> std::io::Result<()> {
    let mut buffer = BytesMut::with_capacity(8 * 1024);
    let mut parser = RespParser::new();

    loop {
        let bytes = half.read_buf(&mut buffer).await?;
        if bytes == 0 {
            return Ok(());
        }

        loop {
            match parser.parse(&mut buffer) {
                Ok(Some(args)) => {
                    if args.is_empty() {
                        continue;
                    }
                    if !handle_frame(args, pool, reply_tx) {
                        return Ok(());
                    }
                }
                Ok(None) => break,
                Err(RespError::Protocol) => {
                    let _ = reply_tx.send(Reply::Error("ERR protocol error".to_string()).to_bytes());
                    return Ok(());
                }
            }
        }
    }
}

/// Routes one parsed frame. Connection-level commands are answered inline;
/// data commands go to the worker owning the key. Returns false when the
/// connection should close.
fn handle_frame(
    args: Vec<Vec<u8>>,
    pool: &Arc<WorkerPool>,
    reply_tx: &UnboundedSender<Vec<u8>>,
) -> bool {
    let send = |reply: Reply| {
        let _ = reply_tx.send(reply.to_bytes());
    };

    let name = String::from_utf8_lossy(&args[0]).to_ascii_lowercase();
    match name.as_str() {
        "ping" => {
            match args.len() {
                1 => send(Reply::Simple("PONG".to_string())),
                2 => send(Reply::Bulk(args[1].clone())),
                _ => send(dispatch::wrong_args("ping")),
            }
            true
        }
        "quit" => {
            send(Reply::ok());
            false
        }
        // Hand-off: acknowledge and give the socket back to the client by
        // closing our side of the session.
        "detach" => {
            send(Reply::ok());
            false
        }
        // Accepted for client compatibility; there is only one database.
        "select" => {
            if args.len() == 2 {
                send(Reply::ok());
            } else {
                send(dispatch::wrong_args("select"));
            }
            true
        }
        "info" => {
            send(info_reply(pool));
            true
        }
        _ => {
            if !dispatch::is_registered(&name) {
                send(Reply::Error(format!("ERR unknown command '{name}'")));
                return true;
            }
            if args.len() < 2 {
                send(dispatch::wrong_args(&name));
                return true;
            }
            let key = args[1].clone();
            let task = Task {
                args,
                reply: reply_tx.clone(),
            };
            if pool.submit(&key, task).is_err() {
                tracing::warn!(
                    queue = pool.queue_index(&key),
                    "worker queue full, rejecting command"
                );
                send(Reply::Error("ERR server busy".to_string()));
            }
            true
        }
    }
}

/// INFO payload: server pid plus the per-worker processed counters.
fn info_reply(pool: &WorkerPool) -> Reply {
    let mut text = String::new();
    text.push_str("# server\r\n");
    text.push_str(&format!("pid:{}\r\n", std::process::id()));
    text.push_str("# workers\r\n");
    for (index, processed) in pool.stats().iter().enumerate() {
        text.push_str(&format!("worker:{index} processed:{processed}\r\n"));
    }
    Reply::Bulk(text.into_bytes())
}
