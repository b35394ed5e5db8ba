//! The watch coordinator.
//!
//! # Data Flow
//! ```text
//! N resources, each watching independently
//!     → per-source channel → forwarder task → one fan-in channel
//!     → event loop (single writer): update source tree, re-merge all,
//!       publish snapshot, broadcast notification
//! ```
//!
//! # Design Decisions
//! - Merge precedence is always registration order, never event arrival
//!   order: every re-merge runs over the latest known tree of *every* source.
//! - A failing source degrades freshness for that source only; its last-known
//!   tree keeps contributing to every merge until replaced.
//! - Shutdown is structural: watch tasks are stopped and awaited first, which
//!   drops all fan-in senders, which drains and ends the event loop. A send
//!   after stop is impossible by construction.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::error::ConfigError;
use crate::merge::{LastWinsMerger, Merger};
use crate::resource::{Resource, SourceEvent, WatchGuard};
use crate::store::ConfigStore;
use crate::value::Value;

const FAN_IN_CAPACITY: usize = 64;
const BROADCAST_CAPACITY: usize = 64;

/// One-shot aggregation: load every resource in order and merge.
pub async fn load_merged(
    resources: &[Arc<dyn Resource>],
    merger: &dyn Merger,
) -> Result<Value, ConfigError> {
    let mut trees = Vec::with_capacity(resources.len());
    for resource in resources {
        trees.push(resource.load().await?);
    }
    Ok(merger.merge(&trees))
}

/// Fans in change events from multiple resources and republishes merged
/// snapshots.
pub struct Coordinator {
    store: Arc<ConfigStore>,
    updates: broadcast::Sender<Arc<Value>>,
    errors: broadcast::Sender<Arc<ConfigError>>,
    guards: Vec<WatchGuard>,
    forwarders: Vec<JoinHandle<()>>,
    event_loop: Option<JoinHandle<()>>,
}

impl Coordinator {
    /// Start with the canonical last-wins merger.
    pub async fn start(resources: Vec<Arc<dyn Resource>>) -> Result<Self, ConfigError> {
        Self::start_with(resources, Arc::new(LastWinsMerger)).await
    }

    /// Load every resource (fail fast on any error), publish the initial
    /// snapshot, then start watching all of them.
    pub async fn start_with(
        resources: Vec<Arc<dyn Resource>>,
        merger: Arc<dyn Merger>,
    ) -> Result<Self, ConfigError> {
        let mut trees = Vec::with_capacity(resources.len());
        let mut locators = Vec::with_capacity(resources.len());
        for resource in &resources {
            let tree = resource.load().await?;
            locators.push(resource.locator());
            trees.push(tree);
        }
        let store = Arc::new(ConfigStore::new(merger.merge(&trees)));
        tracing::info!(sources = resources.len(), "initial configuration loaded");

        let (updates, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (errors, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (fan_tx, fan_rx) = mpsc::channel(FAN_IN_CAPACITY);

        let mut guards: Vec<WatchGuard> = Vec::with_capacity(resources.len());
        let mut forwarders = Vec::with_capacity(resources.len());
        for (index, resource) in resources.iter().enumerate() {
            let (tx, mut rx) = mpsc::channel(FAN_IN_CAPACITY);
            match resource.watch(tx).await {
                Ok(guard) => guards.push(guard),
                Err(e) => {
                    // Unwind the watches already started before failing.
                    for guard in &mut guards {
                        guard.stop().await;
                    }
                    for forwarder in forwarders {
                        let _ = forwarder.await;
                    }
                    return Err(e);
                }
            }
            let fan = fan_tx.clone();
            forwarders.push(tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if fan.send((index, event)).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(fan_tx);

        let event_loop = tokio::spawn(run_event_loop(
            fan_rx,
            trees,
            locators,
            merger,
            Arc::clone(&store),
            updates.clone(),
            errors.clone(),
        ));

        Ok(Self {
            store,
            updates,
            errors,
            guards,
            forwarders,
            event_loop: Some(event_loop),
        })
    }

    /// The current merged snapshot. Non-blocking.
    pub fn current(&self) -> Arc<Value> {
        self.store.current()
    }

    /// Monotonic version of the current snapshot.
    pub fn version(&self) -> u64 {
        self.store.version()
    }

    /// Subscribe to snapshot notifications. Delivery is best-effort buffered:
    /// a slow consumer misses intermediate snapshots but never stalls the
    /// merge loop, and can always catch up via `current`.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Value>> {
        self.updates.subscribe()
    }

    /// Subscribe to watch failures. Errors never enter the data path.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<Arc<ConfigError>> {
        self.errors.subscribe()
    }

    /// Stop every watch and wait for all tasks to acknowledge termination.
    /// Idempotent; once it returns, no further notification or error event
    /// fires.
    pub async fn stop(&mut self) {
        if self.event_loop.is_none() && self.guards.is_empty() {
            return;
        }
        for guard in &mut self.guards {
            guard.stop().await;
        }
        self.guards.clear();
        for forwarder in self.forwarders.drain(..) {
            let _ = forwarder.await;
        }
        if let Some(event_loop) = self.event_loop.take() {
            let _ = event_loop.await;
        }
        tracing::info!("coordinator stopped");
    }
}

async fn run_event_loop(
    mut events: mpsc::Receiver<(usize, SourceEvent)>,
    mut trees: Vec<Value>,
    locators: Vec<String>,
    merger: Arc<dyn Merger>,
    store: Arc<ConfigStore>,
    updates: broadcast::Sender<Arc<Value>>,
    errors: broadcast::Sender<Arc<ConfigError>>,
) {
    while let Some((index, event)) = events.recv().await {
        match event {
            SourceEvent::Changed(tree) => {
                trees[index] = tree;
                let merged = merger.merge(&trees);
                if merged == *store.current() {
                    tracing::debug!(source = %locators[index], "re-merge is a no-op, not publishing");
                    continue;
                }
                let snapshot = store.publish(merged);
                tracing::info!(
                    source = %locators[index],
                    version = store.version(),
                    "published new configuration snapshot"
                );
                // Send fails only when nobody is subscribed.
                let _ = updates.send(snapshot);
            }
            SourceEvent::Failed(error) => {
                tracing::warn!(source = %locators[index], error = %error, "source watch failure");
                let _ = errors.send(Arc::new(error));
            }
        }
    }
    tracing::debug!("coordinator event loop drained");
}
