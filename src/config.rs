//! Engine configuration.

use crate::node::{PortLayout, Ports};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Caller-supplied override for a node's declared ports.
///
/// Invoked on every port query, so it may return a different layout each time.
pub type Configure<N> = Arc<dyn Fn(&N) -> PortLayout + Send + Sync>;

/// Options for the [`DataflowEngine`](crate::DataflowEngine).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Evict (and cancel) the cached computations of a removed node and of every node
  /// downstream of it. Off by default: removal only drops the node's setup and the entry
  /// lingers until the next `reset`.
  pub evict_on_remove: bool,
}

impl EngineConfig {
  /// Parses a configuration from JSON. Missing fields take their defaults.
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  /// Sets [`EngineConfig::evict_on_remove`].
  pub fn with_evict_on_remove(mut self, evict_on_remove: bool) -> Self {
    self.evict_on_remove = evict_on_remove;
    self
  }
}

/// Resolves a node's ports through an optional [`Configure`] override.
pub(crate) fn resolve_ports<N: Ports>(configure: Option<&Configure<N>>, node: &N) -> PortLayout {
  match configure {
    Some(configure) => configure(node),
    None => PortLayout::of(node),
  }
}

