//! Configuration source subsystem.
//!
//! # Data Flow
//! ```text
//! backend (file, environment, remote KV)
//!     → Resource::load (one-shot fetch + decode)
//!     → Resource::watch (background task emitting SourceEvent)
//!     → coordinator fan-in
//! ```
//!
//! # Design Decisions
//! - Resources own their formatter and decode before emitting; the
//!   coordinator only ever sees decoded trees.
//! - Byte-identical payloads are suppressed inside the resource (the last raw
//!   payload is resource-private state), so duplicate backend notifications
//!   never reach the merge loop.
//! - A backend that cannot continue watching terminates its task cleanly and
//!   delivers one final `Failed(Stopped)` event.

pub mod env;
pub mod file;

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::ConfigError;
use crate::value::Value;

/// An event emitted by a watching resource.
#[derive(Debug)]
pub enum SourceEvent {
    /// The source changed; carries the freshly decoded tree.
    Changed(Value),
    /// A transient or terminal watch failure. The coordinator forwards it to
    /// the error channel without touching the current snapshot.
    Failed(ConfigError),
}

/// Capability abstracting one configuration source.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Identity of this source (file path, prefix, remote key) for logs and
    /// error messages.
    fn locator(&self) -> String;

    /// Fetch and decode the current state. Every call performs a fresh fetch.
    async fn load(&self) -> Result<Value, ConfigError>;

    /// Start watching for changes, emitting events on `events` until the
    /// returned guard is stopped.
    async fn watch(&self, events: mpsc::Sender<SourceEvent>) -> Result<WatchGuard, ConfigError>;
}

/// Stop handle for a watch task.
///
/// `stop` is idempotent and awaits the task, so no further events are
/// delivered once it returns.
pub struct WatchGuard {
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl WatchGuard {
    pub(crate) fn new(cancel: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Signal the watch task to exit and wait for it to acknowledge.
    pub async fn stop(&mut self) {
        // Send fails only if the task already exited, which is fine.
        let _ = self.cancel.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "watch task panicked during shutdown");
            }
        }
    }
}

/// Resource-private dedup state: the last raw payload delivered downstream.
#[derive(Debug, Default)]
pub(crate) struct LastPayload {
    raw: Mutex<Option<Vec<u8>>>,
}

impl LastPayload {
    /// Record `raw` as the latest delivered payload.
    pub(crate) fn store(&self, raw: &[u8]) {
        *self.raw.lock().unwrap_or_else(|e| e.into_inner()) = Some(raw.to_vec());
    }

    /// True if `raw` is byte-identical to the last delivered payload.
    pub(crate) fn is_duplicate(&self, raw: &[u8]) -> bool {
        self.raw
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_deref()
            .is_some_and(|last| last == raw)
    }
}
