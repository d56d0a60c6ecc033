//! # Graph Adapter
//!
//! The engines do not own the graph they run over. Node and connection storage lives
//! in an external collaborator that implements [`GraphAdapter`]; the engines only look
//! nodes up by id, enumerate connections, and react to [`GraphEvent`]s delivered
//! through [`GraphListener`].
//!
//! Connections are treated as immutable facts. Every engine operation re-queries
//! [`GraphAdapter::connections`] and filters client-side, so edits made to the graph
//! between two calls are always observed.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Opaque, externally-assigned node identity.
///
/// The engines never generate identities; they only use them as map keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
  /// Creates a node id from any string-like value.
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  /// Returns the id as a string slice.
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl Borrow<str> for NodeId {
  fn borrow(&self) -> &str {
    &self.0
  }
}

impl From<&str> for NodeId {
  fn from(id: &str) -> Self {
    Self(id.to_string())
  }
}

impl From<String> for NodeId {
  fn from(id: String) -> Self {
    Self(id)
  }
}

/// A directed edge from one node's output port to another node's input port.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
  /// Node the connection starts at.
  pub source_node: NodeId,
  /// Output port on the source node.
  pub source_port: String,
  /// Node the connection ends at.
  pub target_node: NodeId,
  /// Input port on the target node.
  pub target_port: String,
}

impl Connection {
  /// Creates a connection `source_node.source_port -> target_node.target_port`.
  pub fn new(
    source_node: impl Into<NodeId>,
    source_port: impl Into<String>,
    target_node: impl Into<NodeId>,
    target_port: impl Into<String>,
  ) -> Self {
    Self {
      source_node: source_node.into(),
      source_port: source_port.into(),
      target_node: target_node.into(),
      target_port: target_port.into(),
    }
  }

  /// Returns true if the connection starts at `node` on output `port`.
  pub fn leaves(&self, node: &NodeId, port: &str) -> bool {
    self.source_node == *node && self.source_port == port
  }
}

/// Read access to the graph the engines execute over.
pub trait GraphAdapter: Send + Sync + 'static {
  /// Node type stored by the graph.
  type Node: Send + Sync + 'static;

  /// Looks up a node by id.
  fn node(&self, id: &NodeId) -> Option<Arc<Self::Node>>;

  /// Returns every connection, in the graph's enumeration order.
  ///
  /// Fan-in aggregation and control-flow propagation both follow this order, so
  /// implementations should keep it stable between calls.
  fn connections(&self) -> Vec<Connection>;
}

/// Change notification emitted by the graph.
#[derive(Debug)]
pub enum GraphEvent<N> {
  /// A node was added to the graph.
  NodeCreated(Arc<N>),
  /// A node was removed from the graph.
  NodeRemoved(Arc<N>),
}

impl<N> GraphEvent<N> {
  /// Returns the event's type discriminator.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::NodeCreated(_) => "node created",
      Self::NodeRemoved(_) => "node removed",
    }
  }

  /// Returns the affected node.
  pub fn node(&self) -> &Arc<N> {
    match self {
      Self::NodeCreated(node) | Self::NodeRemoved(node) => node,
    }
  }
}

impl<N> Clone for GraphEvent<N> {
  fn clone(&self) -> Self {
    match self {
      Self::NodeCreated(node) => Self::NodeCreated(Arc::clone(node)),
      Self::NodeRemoved(node) => Self::NodeRemoved(Arc::clone(node)),
    }
  }
}

/// Receives graph change notifications.
///
/// The owning graph environment invokes listeners synchronously after each
/// structural change.
pub trait GraphListener<N>: Send + Sync {
  /// Handles one graph event.
  fn on_event(&self, event: &GraphEvent<N>) -> Result<(), EngineError>;
}
