//! Options passed to `go_live`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::server::DEFAULT_SHUTDOWN_GRACE;
use crate::watcher::WatchOptions;

/// Default port, same as the editor extension this server mirrors.
pub const DEFAULT_PORT: u16 = 5500;

/// How many consecutive ports to try when port fallback is enabled.
pub const PORT_FALLBACK_ATTEMPTS: u16 = 10;

/// Everything `go_live` needs to start a session.
#[derive(Debug, Clone)]
pub struct LiveOptions {
    /// Directory to serve. `None` means the remembered root for
    /// `workspace`, or the workspace root.
    pub root: Option<PathBuf>,
    /// Workspace identifier used to remember the last root.
    pub workspace: Option<String>,
    /// Host address to bind to.
    pub host: String,
    /// Preferred port (`0` picks an ephemeral port).
    pub port: u16,
    /// Try the next ports when `port` is taken instead of failing.
    pub port_fallback: bool,
    /// Add permissive CORS headers.
    pub cors: bool,
    /// Inject the reload client into HTML responses.
    pub inject_script: bool,
    /// Watcher settings.
    pub watch: WatchOptions,
    /// Grace period for in-flight requests on `go_offline`.
    pub shutdown_grace: Duration,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            root: None,
            workspace: None,
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            port_fallback: false,
            cors: true,
            inject_script: true,
            watch: WatchOptions::default(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl LiveOptions {
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.watch.debounce = debounce;
        self
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.watch.ignore_patterns = patterns;
        self
    }

    pub fn with_port_fallback(mut self) -> Self {
        self.port_fallback = true;
        self
    }

    pub fn without_inject_script(mut self) -> Self {
        self.inject_script = false;
        self
    }
}

/// Public view of a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Canonical directory being served.
    pub root: PathBuf,
    /// Address the server is bound to.
    pub addr: SocketAddr,
    /// When the session went online.
    pub started_at: SystemTime,
}

impl SessionInfo {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Base URL a browser should open.
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }
}
