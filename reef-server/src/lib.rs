// reef-server - RESP2 front end for the reef store
//
// Frames commands off TCP connections, routes them through the
// hash-partitioned worker pool, and renders typed operator results as RESP
// replies. The binary entry point lives in main.rs.

pub mod config;
pub mod dispatch;
pub mod resp;
pub mod server;
pub mod worker;

pub use config::Config;
pub use server::serve;
pub use worker::{Task, WorkerPool};
