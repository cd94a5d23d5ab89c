//! Session management module.
//!
//! A session is one running server + watcher pair. The controller drives
//! it through `Offline → Starting → Online → Stopping → Offline`.

mod controller;
mod options;
mod state;

pub use controller::{signal_for, SessionController, SessionNotice};
pub use options::{LiveOptions, SessionInfo, DEFAULT_PORT, PORT_FALLBACK_ATTEMPTS};
pub use state::SessionState;
