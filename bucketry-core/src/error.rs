//! Error types for bucket lookup and construction
use std::io;
use thiserror::Error;

/// Result type for bucket operations
pub type Result<T> = std::result::Result<T, BucketError>;

/// Errors surfaced by the bucket cache, factory and registry.
///
/// Close failures are deliberately absent: closing a bucket through the
/// manager never fails, the error is logged and counted instead.
#[derive(Error, Debug)]
pub enum BucketError {
    /// The lookup arguments were rejected before touching the cache
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Why the arguments were rejected
        reason: String,
    },

    /// No constructor could be resolved (or instantiated) for a name
    #[error("Failed to resolve bucket constructor '{name}': {reason}")]
    Resolution {
        /// The name that was looked up in the registry
        name: String,
        /// The failure reason
        reason: String,
        /// The constructor's own error, if it produced one
        #[source]
        source: Option<io::Error>,
    },

    /// The constructor resolved but the bucket failed to initialize
    #[error("Failed to initialize bucket '{name}' at '{path}': {source}")]
    Initialization {
        /// The resolved constructor name
        name: String,
        /// The bucket path relative to the base directory
        path: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A constructor looked up the key it is constructing
    #[error("Cyclic construction of bucket {key}")]
    CyclicConstruction {
        /// The key being constructed
        key: String,
    },

    /// The manager was disposed; no new buckets are handed out
    #[error("Bucket manager is closed")]
    ManagerClosed,
}

impl BucketError {
    /// Creates an invalid-argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors raised while constructing a bucket.
    ///
    /// Both resolution and initialization failures leave the cache untouched,
    /// so the same lookup may simply be retried.
    pub fn is_construction_failure(&self) -> bool {
        matches!(self, Self::Resolution { .. } | Self::Initialization { .. })
    }
}
