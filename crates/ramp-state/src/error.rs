//! Error types for the ramp object store.
//!
//! Store failures name the object kind and key they hit, so a failed
//! reconciliation logs "cannot store plan state \"default/svc\"" rather
//! than a bare storage-layer error.

use thiserror::Error;

/// Result type alias for object store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading or writing control-plane objects.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open object store: {0}")]
    Open(String),

    /// A transaction failed to begin or commit; nothing was written.
    #[error("object store transaction failed: {0}")]
    Transaction(String),

    /// One object kind's table could not be opened or scanned.
    #[error("{kind} table unavailable: {reason}")]
    Table { kind: &'static str, reason: String },

    /// A keyed operation against a single record failed.
    #[error("cannot {op} {kind} {key:?}: {reason}")]
    Object {
        /// What was being done: "load", "store", "delete".
        op: &'static str,
        kind: &'static str,
        key: String,
        reason: String,
    },

    /// An object could not be encoded for storage.
    #[error("cannot encode {kind} {key:?}: {reason}")]
    Encode {
        kind: &'static str,
        key: String,
        reason: String,
    },

    /// Stored bytes did not decode as the expected object kind.
    #[error("corrupt {kind} record {key:?}: {reason}")]
    Corrupt {
        kind: &'static str,
        key: String,
        reason: String,
    },
}
