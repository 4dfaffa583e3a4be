//! Error taxonomy shared across the crate.

use std::io;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, StrataError>;

/// Errors surfaced by the cache, the store boundary, and the CLI.
#[derive(Debug, Error)]
pub enum StrataError {
    /// Underlying I/O failure while reading graph data.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A node or row lookup missed. Recoverable: the renderer skips the
    /// element this frame and retries after pending loads drain.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The store handed back unreadable or malformed chunk data. Fatal to
    /// the load that requested it; resident state is left untouched.
    #[error("corruption detected: {0}")]
    Corruption(String),

    /// An internal windowing or expansion invariant broke. Indicates a bug
    /// in this crate, never bad input; not meant to be recovered from.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Caller passed an argument outside the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
