//! Session controller: owns the watcher + server pair of a live session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::options::{LiveOptions, SessionInfo, PORT_FALLBACK_ATTEMPTS};
use super::SessionState;
use crate::error::LiveServeError;
use crate::reload::{ReloadChannel, ReloadSignal};
use crate::server::{AppState, ServerHandle, ServerOptions};
use crate::watcher::{
    validate_root, ChangeEvent, ChangeKind, ChangeRecorder, FileWatcher, WatchEvent, WatchHandle,
};
use crate::Result;

/// Capacity of the notice broadcast channel.
const NOTICE_CAPACITY: usize = 64;

/// Notifications published to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// The session state machine moved.
    StateChanged(SessionState),
    /// The watcher lost capability; the server keeps serving.
    WatchDegraded(String),
    /// A reload signal went out to `clients` browsers.
    Reloaded { signal: ReloadSignal, clients: usize },
}

/// Resources of one running session.
struct Session {
    info: SessionInfo,
    watcher: WatchHandle,
    server: ServerHandle,
    reload: Arc<ReloadChannel>,
    dispatch: JoinHandle<()>,
    grace: Duration,
}

impl Session {
    async fn shutdown(self) {
        // Watcher first: no new signals once teardown starts.
        self.watcher.stop();
        self.dispatch.abort();

        // Closing also rejects upgrades that complete during the grace period.
        let closed = self.reload.close_all().unwrap_or(0);
        self.server.stop(self.grace).await;

        info!(
            root = %self.info.root.display(),
            port = self.info.port(),
            closed_clients = closed,
            "Session offline"
        );
    }
}

/// State readable without awaiting the lifecycle lock.
#[derive(Default)]
struct Shared {
    state: SessionState,
    info: Option<SessionInfo>,
    reload: Option<Arc<ReloadChannel>>,
    recorder: Option<ChangeRecorder>,
}

/// Starts and stops live sessions.
///
/// `go_live` and `go_offline` are serialised; at most one session runs per
/// controller.
pub struct SessionController {
    workspace_root: PathBuf,
    lifecycle: Mutex<Option<Session>>,
    shared: RwLock<Shared>,
    remembered_roots: RwLock<HashMap<String, PathBuf>>,
    notices: broadcast::Sender<SessionNotice>,
}

impl SessionController {
    /// Create a controller whose default root is `workspace_root`.
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            workspace_root: workspace_root.into(),
            lifecycle: Mutex::new(None),
            shared: RwLock::new(Shared::default()),
            remembered_roots: RwLock::new(HashMap::new()),
            notices,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.read().map(|s| s.state).unwrap_or_default()
    }

    /// Info about the running session, if online.
    pub fn session_info(&self) -> Option<SessionInfo> {
        self.shared.read().ok().and_then(|s| s.info.clone())
    }

    /// Reload registry of the running session, if online.
    pub fn reload_channel(&self) -> Option<Arc<ReloadChannel>> {
        self.shared.read().ok().and_then(|s| s.reload.clone())
    }

    /// Subscribe to session notices.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    /// Remember `root` as the last root used for `workspace`.
    pub fn remember_root(&self, workspace: impl Into<String>, root: impl Into<PathBuf>) -> Result<()> {
        let mut roots = self
            .remembered_roots
            .write()
            .map_err(|_| LiveServeError::LockPoisoned)?;
        roots.insert(workspace.into(), root.into());
        Ok(())
    }

    /// Last root used for `workspace`.
    pub fn remembered_root(&self, workspace: &str) -> Option<PathBuf> {
        self.remembered_roots
            .read()
            .ok()
            .and_then(|roots| roots.get(workspace).cloned())
    }

    /// Start serving and watching.
    ///
    /// Valid only while offline. On failure everything already started is
    /// torn down, the controller is back to `Offline`, and the originating
    /// error is returned.
    pub async fn go_live(&self, options: LiveOptions) -> Result<SessionInfo> {
        let mut slot = self.lifecycle.lock().await;
        self.transition(SessionState::Starting)?;

        match self.start_session(&options).await {
            Ok(session) => {
                let info = session.info.clone();
                {
                    let mut shared = self
                        .shared
                        .write()
                        .map_err(|_| LiveServeError::LockPoisoned)?;
                    shared.info = Some(info.clone());
                    shared.reload = Some(Arc::clone(&session.reload));
                    shared.recorder = Some(session.watcher.recorder());
                }
                *slot = Some(session);
                self.transition(SessionState::Online)?;

                if let (Some(workspace), Some(_)) = (&options.workspace, &options.root) {
                    self.remember_root(workspace.clone(), info.root.clone())?;
                }

                info!(root = %info.root.display(), url = %info.url(), "Session online");
                Ok(info)
            }
            Err(e) => {
                warn!(error = %e, "go_live failed, rolled back to offline");
                self.transition(SessionState::Offline)?;
                Err(e)
            }
        }
    }

    /// Stop the running session. A no-op when already offline.
    pub async fn go_offline(&self) -> Result<()> {
        let mut slot = self.lifecycle.lock().await;
        let Some(session) = slot.take() else {
            debug!("go_offline while offline, nothing to do");
            return Ok(());
        };

        self.transition(SessionState::Stopping)?;
        {
            let mut shared = self
                .shared
                .write()
                .map_err(|_| LiveServeError::LockPoisoned)?;
            shared.info = None;
            shared.reload = None;
            shared.recorder = None;
        }

        session.shutdown().await;
        self.transition(SessionState::Offline)
    }

    /// Report a save from the host editor.
    ///
    /// Fed into the watcher's debounce, so a save that the watcher also
    /// observes produces a single signal. Returns `false` when offline or
    /// when `path` is outside the served root.
    pub fn notify_saved(&self, path: impl AsRef<Path>) -> bool {
        let Ok(shared) = self.shared.read() else {
            return false;
        };
        let (Some(info), Some(recorder)) = (&shared.info, &shared.recorder) else {
            return false;
        };

        let path = path.as_ref();
        let path = if path.is_relative() {
            info.root.join(path)
        } else {
            path.to_path_buf()
        };
        let path = path.canonicalize().unwrap_or(path);
        if !path.starts_with(&info.root) {
            return false;
        }

        recorder.record(path, ChangeKind::Modified)
    }

    fn transition(&self, target: SessionState) -> Result<()> {
        {
            let mut shared = self
                .shared
                .write()
                .map_err(|_| LiveServeError::LockPoisoned)?;
            shared.state.transition_to(target)?;
        }
        debug!(state = %target, "Session state changed");
        let _ = self.notices.send(SessionNotice::StateChanged(target));
        Ok(())
    }

    fn resolve_root(&self, options: &LiveOptions) -> PathBuf {
        let root = options
            .root
            .clone()
            .or_else(|| {
                options
                    .workspace
                    .as_deref()
                    .and_then(|ws| self.remembered_root(ws))
            })
            .unwrap_or_else(|| self.workspace_root.clone());

        if root.is_relative() {
            self.workspace_root.join(root)
        } else {
            root
        }
    }

    async fn start_session(
        &self,
        options: &LiveOptions,
    ) -> Result<Session> {
        let root = validate_root(&self.resolve_root(options))?;
        let reload = Arc::new(ReloadChannel::new());

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let watcher = FileWatcher::start(&root, &options.watch, events_tx)?;

        let state = AppState {
            root: Arc::new(root.clone()),
            reload: Arc::clone(&reload),
            inject_script: options.inject_script,
        };
        let server = match bind_server(options, state).await {
            Ok(server) => server,
            Err(e) => {
                watcher.stop();
                return Err(e);
            }
        };

        let dispatch = tokio::spawn(run_dispatch(
            root.clone(),
            Arc::clone(&reload),
            self.notices.clone(),
            events_rx,
        ));

        let session = Session {
            info: SessionInfo {
                root,
                addr: server.local_addr(),
                started_at: SystemTime::now(),
            },
            watcher,
            server,
            reload,
            dispatch,
            grace: options.shutdown_grace,
        };

        Ok(session)
    }
}

/// Bind the server on the preferred port, optionally walking forward.
async fn bind_server(options: &LiveOptions, state: AppState) -> Result<ServerHandle> {
    let attempts = if options.port_fallback && options.port != 0 {
        PORT_FALLBACK_ATTEMPTS
    } else {
        1
    };

    for offset in 0..attempts {
        let Some(port) = options.port.checked_add(offset) else {
            break;
        };
        let server_options = ServerOptions {
            host: options.host.clone(),
            port,
            cors: options.cors,
        };

        match ServerHandle::bind(&server_options, state.clone()).await {
            Ok(server) => {
                if offset > 0 {
                    warn!(
                        requested = options.port,
                        port,
                        "Requested port is busy, serving on fallback port"
                    );
                }
                return Ok(server);
            }
            Err(LiveServeError::PortInUse(_)) => {
                debug!(port, "Port in use");
            }
            Err(e) => return Err(e),
        }
    }

    Err(LiveServeError::PortInUse(options.port))
}

/// Decide which signal a change produces.
///
/// Stylesheets that still exist are hot-swapped; everything else (including
/// a deleted stylesheet) reloads the page. Paths outside `root` produce
/// nothing.
pub fn signal_for(root: &Path, change: &ChangeEvent) -> Option<ReloadSignal> {
    let relative = change.path.strip_prefix(root).ok()?;

    let is_stylesheet = relative
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("css"));

    if is_stylesheet && change.kind != ChangeKind::Deleted {
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Some(ReloadSignal::InjectStyle { path })
    } else {
        Some(ReloadSignal::FullReload)
    }
}

async fn run_dispatch(
    root: PathBuf,
    reload: Arc<ReloadChannel>,
    notices: broadcast::Sender<SessionNotice>,
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            WatchEvent::Change(change) => {
                let Some(signal) = signal_for(&root, &change) else {
                    continue;
                };
                match reload.broadcast(&signal) {
                    Ok(clients) => {
                        info!(
                            path = %change.path.display(),
                            kind = ?change.kind,
                            ?signal,
                            clients,
                            "Change broadcast"
                        );
                        let _ = notices.send(SessionNotice::Reloaded { signal, clients });
                    }
                    Err(e) => warn!(error = %e, "Failed to broadcast reload signal"),
                }
            }
            WatchEvent::Error(message) => {
                warn!(error = %message, "File watcher degraded, server keeps serving");
                let _ = notices.send(SessionNotice::WatchDegraded(message));
            }
        }
    }
}
