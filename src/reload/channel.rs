//! Registry of connected reload clients.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::ReloadSignal;
use crate::error::LiveServeError;
use crate::Result;

/// Global counter for client ID generation.
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connected browser tab.
///
/// Displayed as `client-XXXXXXXX` (hexadecimal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

impl ClientId {
    /// Create a new unique client ID.
    pub fn new() -> Self {
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Create a ClientId from a raw value.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{:08x}", self.0)
    }
}

impl FromStr for ClientId {
    type Err = LiveServeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.strip_prefix("client-")
            .and_then(|hex| u64::from_str_radix(hex, 16).ok())
            .map(ClientId)
            .ok_or_else(|| LiveServeError::Server(format!("invalid client id: {s}")))
    }
}

/// One browser's push channel.
///
/// The receiving half lives with whoever drives the browser connection
/// (the WebSocket task). Once that half is dropped the channel is dead and
/// the registry forgets it on the next broadcast or prune.
#[derive(Debug, Clone)]
pub struct ClientChannel {
    id: ClientId,
    sender: mpsc::UnboundedSender<ReloadSignal>,
}

impl ClientChannel {
    /// Create a channel with a fresh ID and return its receiving half.
    pub fn open() -> (Self, mpsc::UnboundedReceiver<ReloadSignal>) {
        Self::open_with_id(ClientId::new())
    }

    pub fn open_with_id(id: ClientId) -> (Self, mpsc::UnboundedReceiver<ReloadSignal>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { id, sender }, receiver)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Liveness flag: false once the receiving side has gone away.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    fn send(&self, signal: ReloadSignal) -> bool {
        self.sender.send(signal).is_ok()
    }
}

/// Thread-safe, registration-ordered set of client channels.
///
/// Broadcasts happen under the write lock, so a channel registered
/// concurrently either sees the whole broadcast or none of it, and always
/// sees the next one.
#[derive(Debug, Default)]
pub struct ReloadChannel {
    clients: RwLock<Vec<ClientChannel>>,
    /// Set by `close_all`; later registrations are refused.
    closed: AtomicBool,
}

impl ReloadChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel. Returns `false` if it was already registered.
    ///
    /// Fails with `ChannelClosed` once `close_all` has run.
    pub fn register(&self, channel: ClientChannel) -> Result<bool> {
        let mut clients = self
            .clients
            .write()
            .map_err(|_| LiveServeError::LockPoisoned)?;

        if self.closed.load(Ordering::Acquire) {
            return Err(LiveServeError::ChannelClosed);
        }

        if clients.iter().any(|c| c.id == channel.id) {
            return Ok(false);
        }

        debug!(client = %channel.id, total = clients.len() + 1, "Reload client registered");
        clients.push(channel);
        Ok(true)
    }

    /// Unregister a channel. Returns `false` if it was not registered.
    pub fn unregister(&self, id: ClientId) -> Result<bool> {
        let mut clients = self
            .clients
            .write()
            .map_err(|_| LiveServeError::LockPoisoned)?;

        let before = clients.len();
        clients.retain(|c| c.id != id);
        let removed = clients.len() != before;
        if removed {
            debug!(client = %id, total = clients.len(), "Reload client unregistered");
        }
        Ok(removed)
    }

    /// Send `signal` to every live channel in registration order.
    ///
    /// Dead channels are dropped silently. Returns the number of channels
    /// that accepted the signal.
    pub fn broadcast(&self, signal: &ReloadSignal) -> Result<usize> {
        let mut clients = self
            .clients
            .write()
            .map_err(|_| LiveServeError::LockPoisoned)?;

        let mut delivered = 0;
        clients.retain(|client| {
            if client.send(signal.clone()) {
                delivered += 1;
                true
            } else {
                trace!(client = %client.id, "Dropping disconnected reload client");
                false
            }
        });

        Ok(delivered)
    }

    /// Drop channels whose receiving side has gone away.
    ///
    /// Returns the number of channels removed.
    pub fn prune(&self) -> Result<usize> {
        let mut clients = self
            .clients
            .write()
            .map_err(|_| LiveServeError::LockPoisoned)?;

        let before = clients.len();
        clients.retain(ClientChannel::is_alive);
        Ok(before - clients.len())
    }

    /// Remove every channel, closing them, and refuse new registrations.
    /// Returns how many were removed.
    pub fn close_all(&self) -> Result<usize> {
        let mut clients = self
            .clients
            .write()
            .map_err(|_| LiveServeError::LockPoisoned)?;

        self.closed.store(true, Ordering::Release);
        let closed = clients.len();
        clients.clear();
        Ok(closed)
    }

    /// Whether `close_all` has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Registered client IDs in registration order.
    pub fn client_ids(&self) -> Result<Vec<ClientId>> {
        let clients = self
            .clients
            .read()
            .map_err(|_| LiveServeError::LockPoisoned)?;
        Ok(clients.iter().map(|c| c.id).collect())
    }

    pub fn contains(&self, id: ClientId) -> Result<bool> {
        let clients = self
            .clients
            .read()
            .map_err(|_| LiveServeError::LockPoisoned)?;
        Ok(clients.iter().any(|c| c.id == id))
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.clients.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
