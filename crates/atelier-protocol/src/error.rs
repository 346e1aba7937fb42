//! Error taxonomy for the sync runtime.

use thiserror::Error;

/// Errors surfaced while handling a sync-protocol message.
///
/// These are contained per message: the connection replies with an `ERROR`
/// frame and keeps going, and no partially-applied state is ever written.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("agent note must not be empty")]
    EmptyAgentNote,
    #[error("store error: {0}")]
    Store(String),
}

/// Convenience result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
