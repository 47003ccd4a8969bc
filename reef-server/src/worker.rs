//! # Worker Pool
//!
//! A fixed pool of `2^k` OS threads, each owning a bounded task queue.
//! Tasks are routed by `bkdr_hash(user_key) & (workers - 1)`, so every
//! command on the same user key lands on the same worker and runs in
//! submission order; commands on different keys proceed in parallel.
//! Workers run the (blocking) engine transactions and push the encoded
//! reply back through the connection's outbound channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;

use reef_common::bkdr_hash;
use reef_store::Store;

use crate::dispatch::dispatch;

/// Per-worker queue capacity. A full queue answers "server busy" instead of
/// stalling the network tasks.
pub const QUEUE_CAPACITY: usize = 10_240;

/// How often a worker publishes its processed-task counter for INFO.
const STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Queue poll interval; bounds how quickly workers observe shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// One queued command, carrying the connection's reply channel.
pub struct Task {
    pub args: Vec<Vec<u8>>,
    pub reply: UnboundedSender<Vec<u8>>,
}

/// Hash-partitioned pool of command-executing threads.
pub struct WorkerPool {
    queues: Vec<SyncSender<Task>>,
    stats: Arc<Vec<AtomicU64>>,
    shutdown: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    mask: u32,
}

impl WorkerPool {
    /// Spawns `2^power` workers sharing the store.
    pub fn start(store: Arc<Store>, power: u32) -> Self {
        let count = 1usize << power;
        let stats: Arc<Vec<AtomicU64>> =
            Arc::new((0..count).map(|_| AtomicU64::new(0)).collect());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut queues = Vec::with_capacity(count);
        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let (sender, receiver) = mpsc::sync_channel(QUEUE_CAPACITY);
            queues.push(sender);

            let store = Arc::clone(&store);
            let stats = Arc::clone(&stats);
            let shutdown = Arc::clone(&shutdown);
            let handle = std::thread::Builder::new()
                .name(format!("reef-worker-{index}"))
                .spawn(move || worker_loop(index, receiver, store, stats, shutdown))
                .expect("spawn worker thread");
            handles.push(handle);
        }

        tracing::info!(workers = count, "worker pool started");
        WorkerPool {
            queues,
            stats,
            shutdown,
            handles: Mutex::new(handles),
            mask: count as u32 - 1,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.queues.len()
    }

    /// Queue index a user key routes to; stable for the pool's lifetime.
    pub fn queue_index(&self, key: &[u8]) -> usize {
        (bkdr_hash(key) & self.mask) as usize
    }

    /// Enqueues a task on the worker owning `key`. Returns the task back
    /// when the queue is full or the pool has shut down.
    pub fn submit(&self, key: &[u8], task: Task) -> Result<(), Task> {
        match self.queues[self.queue_index(key)].try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) | Err(TrySendError::Disconnected(task)) => Err(task),
        }
    }

    /// Last published processed-task counter per worker.
    pub fn stats(&self) -> Vec<u64> {
        self.stats
            .iter()
            .map(|counter| counter.load(Ordering::Relaxed))
            .collect()
    }

    /// Signals shutdown and joins every worker. In-flight tasks finish;
    /// queued tasks are dropped.
    pub fn close(&self) {
        self.shutdown.store(true, Ordering::Release);
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock().expect("worker handle mutex poisoned");
            guard.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.join();
        }
        tracing::info!("worker pool stopped");
    }
}

fn worker_loop(
    index: usize,
    receiver: Receiver<Task>,
    store: Arc<Store>,
    stats: Arc<Vec<AtomicU64>>,
    shutdown: Arc<AtomicBool>,
) {
    let mut processed: u64 = 0;
    let mut last_publish = Instant::now();
    loop {
        if shutdown.load(Ordering::Acquire) {
            break;
        }
        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(task) => {
                let reply = dispatch(&store, &task.args);
                // A failed send means the connection is already gone.
                let _ = task.reply.send(reply.to_bytes());
                processed += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if last_publish.elapsed() >= STATS_INTERVAL {
            stats[index].store(processed, Ordering::Relaxed);
            last_publish = Instant::now();
        }
    }
    stats[index].store(processed, Ordering::Relaxed);
    tracing::debug!(worker = index, processed, "worker exit");
}
