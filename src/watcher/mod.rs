//! File watcher.
//!
//! Observes a directory tree through `notify`, filters ignored paths,
//! debounces bursts and emits normalized [`WatchEvent`]s to a listener.
//!
//! ```text
//! notify callback ──raw──┐
//!                        ├──► debounce task ──WatchEvent──► listener
//! ChangeRecorder ───raw──┘
//! ```

mod debouncer;
mod event;
mod ignore;

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::LiveServeError;
use crate::Result;

use debouncer::Debouncer;
pub use event::{ChangeEvent, ChangeKind, WatchEvent};
pub use ignore::IgnoreSet;

/// Raw input of the debounce task.
type RawEvent = notify::Result<notify::Event>;

/// Reported when the backend dropped events and asks for a rescan.
const OVERFLOW_MESSAGE: &str = "event queue overflowed, changes may have been missed";

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Patterns ignored unless the caller overrides them.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] =
    &[".git/**", ".vscode/**", "**/*.scss", "**/*.sass", "**/*.ts"];

/// Options for starting a watcher.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Globs matched against root-relative paths.
    pub ignore_patterns: Vec<String>,
    /// Debounce window.
    pub debounce: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Check that `root` is an existing, readable directory and return its
/// canonical form.
pub fn validate_root(root: &Path) -> Result<PathBuf> {
    let canonical = root
        .canonicalize()
        .map_err(|e| LiveServeError::path_unavailable(root, e))?;

    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| LiveServeError::path_unavailable(root, e))?;
    if !metadata.is_dir() {
        return Err(LiveServeError::path_unavailable(root, "not a directory"));
    }

    std::fs::read_dir(&canonical).map_err(|e| LiveServeError::path_unavailable(root, e))?;

    Ok(canonical)
}

/// Feeds externally observed changes into a running watcher.
///
/// Recorded changes go through the same ignore filter and debounce as
/// filesystem events, so a change seen both ways is reported once.
#[derive(Debug, Clone)]
pub struct ChangeRecorder {
    raw: mpsc::UnboundedSender<RawEvent>,
}

impl ChangeRecorder {
    /// Record a change to `path`. Returns `false` once the watcher stopped.
    pub fn record(&self, path: impl Into<PathBuf>, kind: ChangeKind) -> bool {
        let event_kind = match kind {
            ChangeKind::Created => EventKind::Create(CreateKind::Any),
            ChangeKind::Modified => EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            ChangeKind::Deleted => EventKind::Remove(RemoveKind::Any),
        };
        let event = notify::Event::new(event_kind).add_path(path.into());
        self.raw.send(Ok(event)).is_ok()
    }

    #[cfg(test)]
    pub(crate) fn send_raw(&self, raw: RawEvent) -> bool {
        self.raw.send(raw).is_ok()
    }
}

/// Running watcher. Dropping the handle stops it.
pub struct WatchHandle {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    recorder: ChangeRecorder,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Canonical root being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A recorder feeding this watcher's debounce task.
    pub fn recorder(&self) -> ChangeRecorder {
        self.recorder.clone()
    }

    /// Stop watching and cancel pending debounce timers.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.watcher.take().is_some() {
            self.task.abort();
            debug!(root = %self.root.display(), "File watcher stopped");
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("root", &self.root)
            .field("running", &self.watcher.is_some())
            .finish()
    }
}

/// Filesystem watcher entry point.
pub struct FileWatcher;

impl FileWatcher {
    /// Start watching `root` recursively.
    ///
    /// Must be called from within a tokio runtime. Debounced changes and
    /// watch errors are sent to `listener`; the watcher stops on its own
    /// once the listener is dropped.
    pub fn start(
        root: &Path,
        options: &WatchOptions,
        listener: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<WatchHandle> {
        let root = validate_root(root)?;
        let ignore = IgnoreSet::new(&options.ignore_patterns)?;

        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<RawEvent>();
        let recorder = ChangeRecorder {
            raw: raw_tx.clone(),
        };

        let mut watcher = notify::recommended_watcher(move |res: RawEvent| {
            // Receiver gone means the watcher is shutting down.
            let _ = raw_tx.send(res);
        })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| match e.kind {
                notify::ErrorKind::PathNotFound => LiveServeError::path_unavailable(&root, e),
                _ => LiveServeError::from(e),
            })?;

        let task = tokio::spawn(run_debounce_loop(
            root.clone(),
            ignore,
            options.debounce,
            raw_rx,
            listener,
        ));

        info!(
            root = %root.display(),
            debounce_ms = options.debounce.as_millis() as u64,
            ignored = options.ignore_patterns.len(),
            "File watcher started"
        );

        Ok(WatchHandle {
            root,
            watcher: Some(watcher),
            recorder,
            task,
        })
    }
}

/// Map a raw notify event to `(path, kind)` pairs.
fn classify(event: &notify::Event) -> Vec<(PathBuf, ChangeKind)> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::with_capacity(2);
            if let Some(from) = event.paths.first() {
                changes.push((from.clone(), ChangeKind::Deleted));
            }
            if let Some(to) = event.paths.get(1) {
                changes.push((to.clone(), ChangeKind::Created));
            }
            return changes;
        }
        // Permission and timestamp changes do not alter served content.
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => ChangeKind::Modified,
        _ => return Vec::new(),
    };

    event.paths.iter().map(|p| (p.clone(), kind)).collect()
}

async fn run_debounce_loop(
    root: PathBuf,
    ignore: IgnoreSet,
    window: Duration,
    mut raw_rx: mpsc::UnboundedReceiver<RawEvent>,
    listener: mpsc::UnboundedSender<WatchEvent>,
) {
    let mut debouncer = Debouncer::new(window);

    loop {
        let deadline = debouncer
            .next_deadline()
            .map(tokio::time::Instant::from_std)
            .unwrap_or_else(|| tokio::time::Instant::now() + Duration::from_secs(3600));

        tokio::select! {
            raw = raw_rx.recv() => match raw {
                Some(Ok(event)) if event.need_rescan() => {
                    warn!(root = %root.display(), "File watcher overflowed");
                    if listener.send(WatchEvent::Error(OVERFLOW_MESSAGE.to_string())).is_err() {
                        break;
                    }
                }
                Some(Ok(event)) => {
                    for (path, kind) in classify(&event) {
                        if ignore.is_ignored(&path, &root) {
                            continue;
                        }
                        debug!(path = %path.display(), ?kind, "Recorded filesystem event");
                        debouncer.record(path, kind);
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "File watcher reported an error");
                    if listener.send(WatchEvent::Error(e.to_string())).is_err() {
                        break;
                    }
                }
                None => break,
            },
            () = tokio::time::sleep_until(deadline), if !debouncer.is_empty() => {
                for change in debouncer.drain_ready(std::time::Instant::now()) {
                    if listener.send(WatchEvent::Change(change)).is_err() {
                        debug!("Watch listener dropped, stopping debounce loop");
                        return;
                    }
                }
            }
        }
    }
}
