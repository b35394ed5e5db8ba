//! File-backed configuration resource.
//!
//! Watches the parent directory with `notify` and re-reads the file on
//! modify/create events, so editors that replace the file via rename are
//! picked up as well.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};

use crate::error::ConfigError;
use crate::format::{FormatRegistry, Formatter};
use crate::resource::{LastPayload, Resource, SourceEvent, WatchGuard};
use crate::value::Value;

#[derive(Debug)]
pub struct FileResource {
    path: PathBuf,
    formatter: Arc<dyn Formatter>,
    last: Arc<LastPayload>,
}

impl FileResource {
    /// Create a resource for `path`. The format is derived from the file
    /// extension; a missing or unregistered extension fails construction.
    pub fn new(path: impl Into<PathBuf>, registry: &FormatRegistry) -> Result<Self, ConfigError> {
        let path = path.into();
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let formatter = registry.require(ext)?;
        Ok(Self {
            path,
            formatter,
            last: Arc::new(LastPayload::default()),
        })
    }
}

#[async_trait]
impl Resource for FileResource {
    fn locator(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Value, ConfigError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| ConfigError::unavailable(self.locator(), e))?;
        self.last.store(&raw);
        self.formatter.parse(&raw)
    }

    async fn watch(&self, events: mpsc::Sender<SourceEvent>) -> Result<WatchGuard, ConfigError> {
        let (fs_tx, mut fs_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| {
                // Runs on notify's own thread; just hand off to the task.
                let _ = fs_tx.send(result);
            },
            notify::Config::default(),
        )
        .map_err(|e| ConfigError::unavailable(self.locator(), e))?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| ConfigError::unavailable(self.locator(), e))?;

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let path = self.path.clone();
        let locator = self.locator();
        let formatter = Arc::clone(&self.formatter);
        let last = Arc::clone(&self.last);

        let task = tokio::spawn(async move {
            // Keep the watcher alive for the lifetime of the task.
            let _watcher = watcher;
            loop {
                tokio::select! {
                    _ = cancel_rx.changed() => {
                        tracing::debug!(path = %locator, "file watch stopped");
                        return;
                    }
                    result = fs_rx.recv() => {
                        let Some(result) = result else {
                            // The watcher backend died; tell the coordinator
                            // this stream is silent from here on.
                            let _ = events.send(SourceEvent::Failed(ConfigError::Stopped)).await;
                            return;
                        };
                        let event = match result {
                            Ok(event) => event,
                            Err(e) => {
                                let failure = ConfigError::unavailable(&locator, e);
                                if events.send(SourceEvent::Failed(failure)).await.is_err() {
                                    return;
                                }
                                continue;
                            }
                        };
                        if !is_relevant(&event, &path) {
                            continue;
                        }
                        let outcome = reload(&path, &locator, formatter.as_ref(), &last).await;
                        match outcome {
                            Ok(Some(tree)) => {
                                tracing::debug!(path = %locator, "file changed, new tree decoded");
                                if events.send(SourceEvent::Changed(tree)).await.is_err() {
                                    return;
                                }
                            }
                            Ok(None) => {} // duplicate payload
                            Err(e) => {
                                tracing::warn!(path = %locator, error = %e, "file reload failed");
                                if events.send(SourceEvent::Failed(e)).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        });
        Ok(WatchGuard::new(cancel_tx, task))
    }
}

/// True if `event` is a content change of the watched file.
fn is_relevant(event: &Event, path: &Path) -> bool {
    if !event.kind.is_modify() && !event.kind.is_create() {
        return false;
    }
    // Only the parent directory is watched, so matching the file name is
    // enough and tolerates `./`-style path prefixes.
    event
        .paths
        .iter()
        .any(|p| p.file_name() == path.file_name())
}

/// Re-read and decode the file. `Ok(None)` means the payload was
/// byte-identical to the last delivered one.
async fn reload(
    path: &Path,
    locator: &str,
    formatter: &dyn Formatter,
    last: &LastPayload,
) -> Result<Option<Value>, ConfigError> {
    let raw = tokio::fs::read(path)
        .await
        .map_err(|e| ConfigError::unavailable(locator, e))?;
    if last.is_duplicate(&raw) {
        return Ok(None);
    }
    let tree = formatter.parse(&raw)?;
    // Only record the payload once it decoded; a malformed write must not
    // suppress the corrected rewrite that follows.
    last.store(&raw);
    Ok(Some(tree))
}
