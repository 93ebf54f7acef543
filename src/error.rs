//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.
//!
//! Listener callbacks report failures as opaque `anyhow` errors; those are
//! logged and swallowed by the dispatch loop and never appear here. Every
//! variant below is recoverable at the call site.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A caller-supplied argument was rejected (invalid key, empty name, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The cache has been shut down and no longer accepts mutations
    #[error("Cache '{0}' is shut down")]
    Closed(String),

    /// A batch insert failed and was rolled back; no partial state is visible
    #[error("Batch insert failed: {0}")]
    BatchFailure(String),

    /// A selector action raised an error; the scan was aborted
    #[error("Selector failed: {0}")]
    Selector(anyhow::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
