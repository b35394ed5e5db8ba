//! Multi-source configuration aggregation.
//!
//! Loads configuration from heterogeneous sources (files, environment
//! variables, anything implementing [`Resource`]), each in its own format,
//! merges them into one value tree under last-wins precedence, and keeps the
//! merged snapshot current as sources change.
//!
//! ```no_run
//! use std::sync::Arc;
//! use conflux::{Coordinator, EnvResource, FileResource, FormatRegistry, Resource};
//!
//! # async fn example() -> Result<(), conflux::ConfigError> {
//! let registry = FormatRegistry::with_defaults();
//! let file = FileResource::new("config.yaml", &registry)?;
//! let env = EnvResource::new("APP_", &registry)?;
//! let resources: Vec<Arc<dyn Resource>> = vec![Arc::new(file), Arc::new(env)];
//!
//! let mut coordinator = Coordinator::start(resources).await?;
//! let mut updates = coordinator.subscribe();
//! println!("{}", coordinator.current());
//! while let Ok(snapshot) = updates.recv().await {
//!     println!("{snapshot}");
//! }
//! coordinator.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod error;
pub mod format;
pub mod merge;
pub mod resource;
pub mod store;
pub mod value;

pub use coordinator::{load_merged, Coordinator};
pub use error::ConfigError;
pub use format::{FormatRegistry, Formatter};
pub use merge::{LastWinsMerger, Merger};
pub use resource::env::EnvResource;
pub use resource::file::FileResource;
pub use resource::{Resource, SourceEvent, WatchGuard};
pub use store::ConfigStore;
pub use value::Value;
