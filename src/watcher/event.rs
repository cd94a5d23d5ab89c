//! Normalized filesystem change events.

use std::path::PathBuf;
use std::time::SystemTime;

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A debounced change to a single path under the watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Absolute path of the affected file or directory.
    pub path: PathBuf,
    /// Coalesced kind of the change.
    pub kind: ChangeKind,
    /// Wall-clock time of the last raw event folded into this one.
    pub timestamp: SystemTime,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp: SystemTime::now(),
        }
    }
}

/// Notification delivered to the watcher's listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A debounced change.
    Change(ChangeEvent),
    /// The watcher lost (part of) its watch capability. Changes may no
    /// longer be reported, but the watcher keeps running.
    Error(String),
}
