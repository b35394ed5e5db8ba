//! The merge engine.
//!
//! Combines an ordered sequence of value trees into one. Later sources win
//! per top-level key; a later source's entire sub-tree for a key supersedes
//! the earlier source's sub-tree wholesale. There is intentionally no
//! recursive combination of sibling sub-keys across sources at the same path:
//! downstream consumers depend on the replace-wholesale behavior, so it is
//! preserved as-is.

use std::collections::BTreeMap;

use crate::value::Value;

/// Capability combining multiple value trees into one under defined
/// precedence. Swappable: the coordinator accepts any implementation.
pub trait Merger: Send + Sync {
    /// Merge `sources` in order into a single tree. Deterministic and
    /// idempotent; not commutative (order encodes precedence).
    fn merge(&self, sources: &[Value]) -> Value;
}

/// The canonical last-wins-per-key merger.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastWinsMerger;

impl Merger for LastWinsMerger {
    fn merge(&self, sources: &[Value]) -> Value {
        let mut result: BTreeMap<String, Value> = BTreeMap::new();
        for source in sources {
            // Decoders always produce a map at top level; anything else has
            // no fields to extract and contributes nothing.
            if let Value::Map(fields) = source {
                for (key, value) in fields {
                    result.insert(key.clone(), value.clone());
                }
            }
        }
        Value::Map(result)
    }
}
