//! HTTP server for live-serve.
//!
//! ## Endpoints
//!
//! - `GET /__live-serve/ws` - WebSocket reload channel
//! - `GET /*` - static files from the session root (HTML gets the reload
//!   client injected)
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use live_serve::reload::ReloadChannel;
//! use live_serve::server::{AppState, ServerHandle, ServerOptions};
//!
//! #[tokio::main]
//! async fn main() -> live_serve::Result<()> {
//!     let state = AppState::new("./public", Arc::new(ReloadChannel::new()), true)?;
//!     let server = ServerHandle::bind(&ServerOptions::new("127.0.0.1", 5500), state).await?;
//!     println!("serving on {}", server.local_addr());
//!     server.stop(std::time::Duration::from_secs(2)).await;
//!     Ok(())
//! }
//! ```

pub mod static_files;
pub mod websocket;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

use crate::error::LiveServeError;
use crate::reload::{ReloadChannel, RELOAD_CHANNEL_PATH};
use crate::watcher::validate_root;
use crate::Result;

pub use static_files::{resolve_request_path, ServeError, INDEX_FILE};

/// Default grace period for in-flight requests on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Shared request-handler state.
#[derive(Clone)]
pub struct AppState {
    /// Canonical directory being served.
    pub root: Arc<PathBuf>,
    /// Registry of connected reload clients.
    pub reload: Arc<ReloadChannel>,
    /// Inject the reload client into HTML responses.
    pub inject_script: bool,
}

impl AppState {
    /// Create state for `root`, which must be an existing directory.
    pub fn new(root: impl AsRef<Path>, reload: Arc<ReloadChannel>, inject_script: bool) -> Result<Self> {
        let root = validate_root(root.as_ref())?;
        Ok(Self {
            root: Arc::new(root),
            reload,
            inject_script,
        })
    }
}

/// Create the router with all routes configured.
pub fn create_router(state: AppState, cors: bool) -> Router {
    let router = Router::new()
        .route(RELOAD_CHANNEL_PATH, get(websocket::ws_handler))
        .fallback(static_files::serve_file)
        .layer(TraceLayer::new_for_http());

    let router = if cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}

/// Server bind configuration.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on (`0` picks an ephemeral port).
    pub port: u16,
    /// Add permissive CORS headers.
    pub cors: bool,
}

impl ServerOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            cors: true,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::new("127.0.0.1", 5500)
    }
}

/// A running HTTP server.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Bind the listener and start serving in a background task.
    ///
    /// Fails with `PortInUse` if the port is taken; never binds elsewhere.
    pub async fn bind(options: &ServerOptions, state: AppState) -> Result<Self> {
        let addr = options.bind_address();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AddrInUse => LiveServeError::PortInUse(options.port),
                _ => LiveServeError::Io(e),
            })?;
        let local_addr = listener.local_addr()?;

        let router = create_router(state, options.cors);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "HTTP server terminated with an error");
            }
        });

        info!(address = %local_addr, "HTTP server listening");

        Ok(Self {
            addr: local_addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop the server. Waits up to `grace` for in-flight requests, then
    /// aborts. The port is released when this returns.
    pub async fn stop(mut self, grace: Duration) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if tokio::time::timeout(grace, &mut self.task).await.is_err() {
            warn!(address = %self.addr, "Graceful shutdown timed out, aborting server");
            self.task.abort();
            let _ = (&mut self.task).await;
        }

        debug!(address = %self.addr, "HTTP server stopped");
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle").field("addr", &self.addr).finish()
    }
}
