//! # Store Errors
//!
//! Typed errors returned by the data-type operators. The server's dispatcher
//! maps them onto RESP replies: `NotFound` becomes a null bulk or `:0`
//! depending on the command, `Parse` becomes the Redis integer-range error,
//! everything else surfaces as `-ERR <message>`.

use thiserror::Error;

use reef_engine::EngineError;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the data-type operators.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key (or requested member/field) absent or expired.
    #[error("key not found")]
    NotFound,

    /// Stored bytes violate the expected layout for the key's type.
    #[error("stored value has the wrong shape for its type")]
    WrongType,

    /// An argument that must be a decimal integer was not.
    #[error("value is not an integer or out of range")]
    Parse,

    /// Propagated storage failure.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
