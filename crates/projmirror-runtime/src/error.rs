//! Error types for the session runtime.

use thiserror::Error;

/// Failure of a call into the remote daemon.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("daemon unreachable: {0}")]
    Unreachable(String),

    #[error("daemon rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed daemon response: {0}")]
    Malformed(String),
}

/// The session task is gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("project session {0} is closed")]
    Closed(String),
}

/// Why a restart request was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestartRefused {
    #[error("a restart is already in progress")]
    AlreadyPending,

    #[error("{0}")]
    NotAllowed(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}
