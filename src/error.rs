//! Error types for live-serve.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for live-serve operations.
#[derive(Error, Debug)]
pub enum LiveServeError {
    /// Root directory is missing, not a directory, or unreadable.
    #[error("path unavailable: {}: {reason}", path.display())]
    PathUnavailable { path: PathBuf, reason: String },

    /// The requested port is already bound by another process.
    #[error("port {0} is already in use")]
    PortInUse(u16),

    /// The file watcher could not be created or lost its watch capability.
    #[error("watch error: {0}")]
    Watch(String),

    /// Invalid session state transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: crate::session::SessionState,
        to: crate::session::SessionState,
    },

    /// An ignore pattern is not a valid glob.
    #[error("invalid ignore pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// The reload registry was closed because the session went offline.
    #[error("reload channel closed")]
    ChannelClosed,

    /// HTTP server failure after the listener was bound.
    #[error("server error: {0}")]
    Server(String),
}

impl LiveServeError {
    /// Build a `PathUnavailable` error from a path and a displayable reason.
    pub fn path_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::PathUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller may retry the operation with different input
    /// (another port, another root).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::PortInUse(_))
    }
}

impl From<notify::Error> for LiveServeError {
    fn from(e: notify::Error) -> Self {
        Self::Watch(e.to_string())
    }
}

/// Convenience Result type for live-serve operations.
pub type Result<T> = std::result::Result<T, LiveServeError>;
