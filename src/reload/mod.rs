//! Reload channel.
//!
//! Keeps the registry of connected browser tabs and pushes
//! [`ReloadSignal`]s to them. The WebSocket transport lives in
//! [`crate::server::websocket`]; this module is transport-agnostic.

mod channel;
pub mod client;
mod signal;

pub use channel::{ClientChannel, ClientId, ReloadChannel};
pub use client::{inject_into_html, RELOAD_CHANNEL_PATH};
pub use signal::ReloadSignal;
