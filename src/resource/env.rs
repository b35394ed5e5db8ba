//! Environment-variable configuration resource.
//!
//! Scrapes all variables with a given prefix into a sorted `KEY=VALUE`
//! payload and polls for changes, since the environment has no native
//! change notification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::error::ConfigError;
use crate::format::{FormatRegistry, Formatter};
use crate::resource::{LastPayload, Resource, SourceEvent, WatchGuard};
use crate::value::Value;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct EnvResource {
    prefix: String,
    formatter: Arc<dyn Formatter>,
    last: Arc<LastPayload>,
    poll_interval: Duration,
}

impl EnvResource {
    /// Create a resource scraping variables that start with `prefix`.
    /// Requires the `env` format to be registered.
    pub fn new(prefix: impl Into<String>, registry: &FormatRegistry) -> Result<Self, ConfigError> {
        let formatter = registry.require("env")?;
        Ok(Self {
            prefix: prefix.into(),
            formatter,
            last: Arc::new(LastPayload::default()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Override the watch poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Collect `KEY=VALUE` lines for every variable starting with `prefix`,
/// sorted for a deterministic payload.
fn scrape(prefix: &str) -> Result<Vec<u8>, ConfigError> {
    let mut lines: Vec<String> = std::env::vars()
        .filter(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    if lines.is_empty() {
        return Err(ConfigError::unavailable(
            format!("env:{prefix}"),
            "no environment variables found with prefix",
        ));
    }
    lines.sort();
    Ok(lines.join("\n").into_bytes())
}

#[async_trait]
impl Resource for EnvResource {
    fn locator(&self) -> String {
        format!("env:{}", self.prefix)
    }

    async fn load(&self) -> Result<Value, ConfigError> {
        let raw = scrape(&self.prefix)?;
        self.last.store(&raw);
        self.formatter.parse(&raw)
    }

    async fn watch(&self, events: mpsc::Sender<SourceEvent>) -> Result<WatchGuard, ConfigError> {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let prefix = self.prefix.clone();
        let locator = self.locator();
        let formatter = Arc::clone(&self.formatter);
        let last = Arc::clone(&self.last);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_rx.changed() => {
                        tracing::debug!(source = %locator, "env watch stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        let raw = match scrape(&prefix) {
                            Ok(raw) => raw,
                            Err(e) => {
                                if events.send(SourceEvent::Failed(e)).await.is_err() {
                                    return;
                                }
                                continue;
                            }
                        };
                        if last.is_duplicate(&raw) {
                            continue;
                        }
                        match formatter.parse(&raw) {
                            Ok(tree) => {
                                tracing::debug!(source = %locator, "environment changed");
                                if events.send(SourceEvent::Changed(tree)).await.is_err() {
                                    return;
                                }
                                last.store(&raw);
                            }
                            Err(e) => {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatRegistry;

    #[tokio::test]
    async fn test_load_scrapes_prefixed_variables() {
        std::env::set_var("CONFLUX_LOAD_A", "1");
        std::env::set_var("CONFLUX_LOAD_B", "two");

        let registry = FormatRegistry::with_defaults();
        let resource = EnvResource::new("CONFLUX_LOAD_", &registry).unwrap();
        let tree = resource.load().await.unwrap();

        assert_eq!(tree.get("CONFLUX_LOAD_A").and_then(Value::as_str), Some("1"));
        assert_eq!(tree.get("CONFLUX_LOAD_B").and_then(Value::as_str), Some("two"));

        std::env::remove_var("CONFLUX_LOAD_A");
        std::env::remove_var("CONFLUX_LOAD_B");
    }

    #[tokio::test]
    async fn test_load_without_matches_is_unavailable() {
        let registry = FormatRegistry::with_defaults();
        let resource = EnvResource::new("CONFLUX_NO_SUCH_PREFIX_", &registry).unwrap();
        let err = resource.load().await.unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_construction_requires_env_format() {
        let registry = FormatRegistry::new();
        let err = EnvResource::new("APP_", &registry).unwrap_err();
        assert!(matches!(err, ConfigError::FormatNotFound(id) if id == "env"));
    }
}
