//! Format decoding subsystem.
//!
//! # Data Flow
//! ```text
//! raw bytes (file content, env scrape, remote KV payload)
//!     → Formatter::parse (format-specific decoder)
//!     → Value tree (always a map at top level)
//! ```
//!
//! # Design Decisions
//! - The registry is an explicit object, not process-global state: callers
//!   that need isolation (tests, embedded use) construct their own.
//! - Registration is last-wins and expected only at startup; lookups are
//!   concurrent and never block each other.
//! - Every decoder must produce a map at top level; a bare scalar or list
//!   document is a decode error, so the merge engine never sees one.

pub mod env;
pub mod json;
pub mod toml;
pub mod yaml;

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::ConfigError;
use crate::value::Value;

/// Capability that decodes raw bytes of a known encoding into a value tree.
pub trait Formatter: Send + Sync {
    /// Parse raw configuration bytes. The result is always a `Value::Map`.
    fn parse(&self, raw: &[u8]) -> Result<Value, ConfigError>;
}

impl std::fmt::Debug for dyn Formatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Formatter")
    }
}

/// Registry mapping format identifiers (lower-cased file extensions or
/// explicit ids) to their decoders.
#[derive(Default)]
pub struct FormatRegistry {
    formats: DashMap<String, Arc<dyn Formatter>>,
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with all built-in decoders registered:
    /// `json`, `yaml`/`yml`, `toml`, `env`.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register("json", Arc::new(json::Json));
        registry.register("yaml", Arc::new(yaml::Yaml));
        registry.register("yml", Arc::new(yaml::Yaml));
        registry.register("toml", Arc::new(toml::Toml));
        registry.register("env", Arc::new(env::Env));
        registry
    }

    /// Insert or replace the decoder for `id`. Last registration wins.
    pub fn register(&self, id: &str, formatter: Arc<dyn Formatter>) {
        self.formats.insert(id.to_ascii_lowercase(), formatter);
    }

    /// Retrieve the decoder for `id`, or `None` if nothing is registered.
    pub fn lookup(&self, id: &str) -> Option<Arc<dyn Formatter>> {
        self.formats
            .get(&id.to_ascii_lowercase())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Retrieve the decoder for `id`, failing with a descriptive error that
    /// names the missing identifier. Used by resource constructors.
    pub fn require(&self, id: &str) -> Result<Arc<dyn Formatter>, ConfigError> {
        self.lookup(id)
            .ok_or_else(|| ConfigError::FormatNotFound(id.to_string()))
    }
}
