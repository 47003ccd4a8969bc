// reef-common - Shared leaf utilities for reef
//
// This crate holds the key hash and the strict decimal helpers used by both
// the storage layer and the server front end.

pub mod hash;
pub mod num;

pub use hash::bkdr_hash;
pub use num::{format_u64, parse_i64, parse_u64};
