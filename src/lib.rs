//! # live-serve
//!
//! Local development web server with live reload.
//!
//! Serves a directory over HTTP, watches it for changes, and tells every
//! connected browser to reload. Stylesheet edits are hot-swapped without a
//! full page reload.
//!
//! ## Features
//!
//! - **Static serving**: MIME detection, directory index, traversal protection
//! - **Recursive watching**: debounced, with glob ignore patterns
//! - **Reload channel**: WebSocket fan-out to every open page
//! - **Session control**: one `go_live` / `go_offline` lifecycle per controller
//!
//! ## Quick Start
//!
//! ```no_run
//! use live_serve::{LiveOptions, SessionController};
//!
//! #[tokio::main]
//! async fn main() -> live_serve::Result<()> {
//!     live_serve::logging::try_init().ok();
//!
//!     let controller = SessionController::new(".");
//!     let info = controller.go_live(LiveOptions::default().with_root("public")).await?;
//!     println!("Serving at {}", info.url());
//!
//!     tokio::signal::ctrl_c().await?;
//!     controller.go_offline().await
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod reload;
pub mod server;
pub mod session;
pub mod watcher;

// Re-export commonly used types
pub use error::{LiveServeError, Result};
pub use reload::{ClientChannel, ClientId, ReloadChannel, ReloadSignal};
pub use server::{AppState, ServerHandle, ServerOptions};
pub use session::{
    LiveOptions, SessionController, SessionInfo, SessionNotice, SessionState,
};
pub use watcher::{
    ChangeEvent, ChangeKind, ChangeRecorder, FileWatcher, WatchEvent, WatchHandle, WatchOptions,
};
