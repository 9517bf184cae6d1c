//! Error types for the store and the scan engine.
//!
//! Two enums cover the whole application:
//!
//! - [`StoreError`] — invariant violations and I/O failures inside the
//!   hierarchical store. These are programming or configuration errors
//!   and are never silently tolerated: the scan engine propagates them
//!   and stops the run, since continuing risks persisting inconsistent
//!   metadata.
//! - [`ScanError`] — run-level failures: barrier timeouts, actor
//!   failures, configuration problems. Barrier timeouts and actor errors
//!   are always fatal to the run; per-step data problems (an unexpected
//!   channel shape) are handled locally by the engine and only skip the
//!   offending scan index.
//!
//! Device drivers themselves report failures through `anyhow::Result`
//! (see `modaq-hardware`); the engine wraps those into
//! [`ScanError::Actor`] at the coordination boundary.

use thiserror::Error;

/// Convenience alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Convenience alias for scan-engine operations.
pub type ScanResult<T> = std::result::Result<T, ScanError>;

/// Errors raised by the hierarchical store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A `write_at` coordinate exceeds the pre-declared array shape.
    /// Checked before any mutation; a failed write never writes partially.
    #[error("index {index:?} out of bounds for array '{path}' with shape {shape:?}")]
    OutOfBounds {
        path: String,
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    /// A data block does not match the extent it is written into.
    #[error("shape mismatch for '{path}': expected {expected} elements, got {actual}")]
    ShapeMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    /// `append` was called on a fixed (pre-shaped) array.
    #[error("array '{0}' is not growable")]
    NotGrowable(String),

    /// The zero-padded incremental suffix width was exceeded.
    #[error("incremental group suffix overflow for prefix '{prefix}' (max index {max})")]
    NamingOverflow { prefix: String, max: usize },

    /// A group operation was attempted on a non-group node.
    #[error("node '{0}' is not a group")]
    NotAGroup(String),

    /// An array operation was attempted on a group node.
    #[error("node '{0}' is not an array")]
    NotAnArray(String),

    /// Lookup by path or handle failed.
    #[error("no node at '{0}'")]
    NodeNotFound(String),

    /// An array or group with that name already exists where a new array
    /// was to be created.
    #[error("node '{0}' already exists")]
    DuplicateName(String),

    /// `close` was called while an array write was in flight.
    #[error("cannot close store: {0} write(s) in flight")]
    WriteInFlight(usize),

    /// Operation attempted on a closed store.
    #[error("store is closed")]
    Closed,

    /// Underlying file I/O failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot encode/decode failed.
    #[error("store codec error: {0}")]
    Codec(String),
}

/// Errors fatal to a scan run.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A move or grab barrier deadline elapsed before every actor
    /// acknowledged. Aborts the run.
    #[error("timed out during {phase} (pending: {pending:?})")]
    TimedOut {
        phase: &'static str,
        pending: Vec<String>,
    },

    /// An actuator or detector reported a failure while executing a
    /// command. Treated the same as a timeout: the run aborts.
    #[error("actor '{actor}' failed: {source}")]
    Actor {
        actor: String,
        #[source]
        source: anyhow::Error,
    },

    /// Store invariant violation. Never recovered from locally.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid run configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A run was requested while the engine was not idle.
    #[error("engine is not idle")]
    NotIdle,
}
