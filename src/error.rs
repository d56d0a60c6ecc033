//! # Error Handling
//!
//! Errors raised by the control-flow and dataflow engines.
//!
//! ## Taxonomy
//!
//! - **Configuration errors**: duplicate registration, operating on an unregistered
//!   node, or naming a port the node does not declare. These are programmer mistakes
//!   and are never retried.
//! - **Contract violations**: a dataflow node returned an outputs record that is
//!   missing some of its declared output ports.
//! - **Cancellation**: a pending computation observed a `cancel()` request. This is an
//!   expected control outcome, see [`EngineError::is_cancelled`].
//!
//! `EngineError` is `Clone` so one failed or cancelled computation can be delivered
//! to every caller awaiting it.

use crate::graph::NodeId;
use std::error::Error;
use std::sync::Arc;
use thiserror::Error;

/// Error type returned by user-supplied node callbacks.
pub type NodeExecutionError = Box<dyn Error + Send + Sync>;

/// Error type for the result cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
  /// An entry already exists under the given key.
  #[error("cache already exists")]
  AlreadyExists,
}

/// Error type for engine operations.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
  /// A setup is already registered for the node.
  #[error("already processed: node \"{0}\"")]
  AlreadyProcessed(NodeId),
  /// The node has no registered setup.
  #[error("node is not initialized: \"{0}\"")]
  NotInitialized(NodeId),
  /// A reset reached a node with no registered setup.
  #[error("setup: node \"{0}\" has no registered setup")]
  MissingSetup(NodeId),
  /// The graph adapter has no node with this id.
  #[error("node \"{0}\" not found")]
  NodeNotFound(NodeId),
  /// The graph adapter already holds a node with this id.
  #[error("node \"{0}\" already exists")]
  DuplicateNode(NodeId),
  /// The input port is not among the node's declared inputs.
  #[error("inputs don't have a key: node \"{node}\" has no input \"{input}\"")]
  UnknownInput {
    /// Node that was executed.
    node: NodeId,
    /// Requested input port.
    input: String,
  },
  /// The output port is not among the node's declared outputs.
  #[error("outputs don't have a key: node \"{node}\" has no output \"{output}\"")]
  UnknownOutput {
    /// Node whose output was referenced.
    node: NodeId,
    /// Requested output port.
    output: String,
  },
  /// A dataflow node returned an outputs record without all declared ports.
  #[error(
    "dataflow node \"{node}\" doesn't return all of required properties. Expected \"{}\". Got \"{}\"",
    .expected.join("\", \""),
    .received.join("\", \"")
  )]
  MissingOutputs {
    /// Node that produced the record.
    node: NodeId,
    /// Declared output ports at the time of the fetch.
    expected: Vec<String>,
    /// Keys actually present in the record, sorted.
    received: Vec<String>,
  },
  /// A node callback failed.
  #[error("node \"{node}\" failed: {source}")]
  Execution {
    /// Node whose callback failed.
    node: NodeId,
    /// Error returned by the callback.
    #[source]
    source: Arc<dyn Error + Send + Sync>,
  },
  /// Result cache error.
  #[error(transparent)]
  Cache(#[from] CacheError),
  /// The computation was cancelled before it produced a value.
  #[error("cancelled")]
  Cancelled,
}

impl EngineError {
  /// Returns true if this is the [`EngineError::Cancelled`] outcome.
  pub fn is_cancelled(&self) -> bool {
    matches!(self, Self::Cancelled)
  }

  /// Converts an error returned by `node`'s callback into an engine error.
  ///
  /// Engine errors raised inside the callback (for example by `forward`) are passed
  /// through unchanged; anything else is wrapped in [`EngineError::Execution`].
  pub fn from_node(node: &NodeId, error: NodeExecutionError) -> Self {
    match error.downcast::<EngineError>() {
      Ok(engine_error) => *engine_error,
      Err(other) => Self::Execution {
        node: node.clone(),
        source: Arc::from(other),
      },
    }
  }
}
