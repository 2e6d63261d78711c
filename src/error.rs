//! Error types for the draft store.

use thiserror::Error;

use crate::draft::DraftStatus;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the draft protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// An asynchronous draft was requested while another draft is open.
    #[error("cannot start a new draft while one is active")]
    DraftAlreadyOpen,

    /// The draft was already committed or discarded.
    #[error("draft is no longer open (status: {0})")]
    DraftClosed(DraftStatus),

    /// The draft was accessed again from inside one of its own read or
    /// modify closures on the same thread.
    #[error("draft is already being accessed on this thread")]
    DraftBusy,
}

/// Errors raised by path writes on a [`Node`](crate::tree::Node).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("invalid pointer {0:?}: must be empty or start with '/'")]
    InvalidPointer(String),

    #[error("cannot write through {0:?}: parent is not a map or list")]
    NotAContainer(String),

    #[error("list index {index:?} out of bounds at {pointer:?}")]
    IndexOutOfBounds { pointer: String, index: String },

    #[error("missing parent for {0:?}")]
    MissingParent(String),
}

/// Errors raised by the inspection bridge.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("an inspection extension is already installed")]
    AlreadyInstalled,
}
