//! # Node Contract
//!
//! Capabilities a node type must expose to be driven by the engines.
//!
//! Every node declares its input and output port names through [`Ports`]. The port
//! sets may change between calls (a node can reconfigure itself polymorphically), so
//! the engines re-query them on every operation and never cache them.
//!
//! - [`ControlFlowNode`] nodes are executed synchronously and choose which output
//!   ports to signal through `forward`.
//! - [`DataflowNode`] nodes compute an outputs record from the values that arrived on
//!   their inputs, and may suspend while doing so.
//!
//! ## Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use flowweave::{DataflowNode, Inputs, NodeExecutionError, NodeId, Outputs, Ports};
//!
//! struct Constant {
//!   id: NodeId,
//!   value: i64,
//! }
//!
//! impl Ports for Constant {
//!   fn id(&self) -> &NodeId { &self.id }
//!   fn input_port_names(&self) -> Vec<String> { Vec::new() }
//!   fn output_port_names(&self) -> Vec<String> { vec!["out".to_string()] }
//! }
//!
//! #[async_trait]
//! impl DataflowNode for Constant {
//!   type Value = i64;
//!
//!   async fn data(&self, _inputs: Inputs<i64>) -> Result<Outputs<i64>, NodeExecutionError> {
//!     Ok(Outputs::from([("out".to_string(), self.value)]))
//!   }
//! }
//! ```

use crate::control_flow::Forward;
use crate::error::NodeExecutionError;
use crate::graph::NodeId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Values gathered for a node's inputs, keyed by input port.
///
/// Each port maps to one value per inbound connection, in connection enumeration
/// order. Ports without inbound connections are absent.
pub type Inputs<V> = HashMap<String, Vec<V>>;

/// Values produced by a node, keyed by output port.
pub type Outputs<V> = HashMap<String, V>;

/// Declared port names of a node.
pub trait Ports {
  /// Returns the node's id.
  fn id(&self) -> &NodeId;

  /// Returns the currently declared input port names, in order.
  fn input_port_names(&self) -> Vec<String>;

  /// Returns the currently declared output port names, in order.
  fn output_port_names(&self) -> Vec<String>;
}

/// A snapshot of a node's port names, as produced by a [`Configure`](crate::Configure)
/// override.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortLayout {
  /// Input port names.
  pub inputs: Vec<String>,
  /// Output port names.
  pub outputs: Vec<String>,
}

impl PortLayout {
  /// Creates a layout from input and output port names.
  pub fn new<I, O>(inputs: I, outputs: O) -> Self
  where
    I: IntoIterator,
    I::Item: Into<String>,
    O: IntoIterator,
    O::Item: Into<String>,
  {
    Self {
      inputs: inputs.into_iter().map(Into::into).collect(),
      outputs: outputs.into_iter().map(Into::into).collect(),
    }
  }

  /// Captures the node's currently declared ports.
  pub fn of<N: Ports + ?Sized>(node: &N) -> Self {
    Self {
      inputs: node.input_port_names(),
      outputs: node.output_port_names(),
    }
  }
}

/// A node executed by the [`ControlFlowEngine`](crate::ControlFlowEngine).
pub trait ControlFlowNode: Ports + Send + Sync {
  /// Runs the node.
  ///
  /// `input` is the input port the signal arrived on, or `None` when execution was
  /// started directly on this node. Calling `forward(port)` synchronously executes
  /// every node connected to `port` before it returns; it may be called any number
  /// of times.
  fn execute(&self, input: Option<&str>, forward: Forward<'_>) -> Result<(), NodeExecutionError>;
}

/// A node evaluated by the [`DataflowEngine`](crate::DataflowEngine).
#[async_trait]
pub trait DataflowNode: Ports + Send + Sync {
  /// Value type carried on ports.
  type Value: Clone + Send + Sync + 'static;

  /// Computes the node's outputs from its gathered inputs.
  ///
  /// The returned record must contain every currently declared output port.
  async fn data(
    &self,
    inputs: Inputs<Self::Value>,
  ) -> Result<Outputs<Self::Value>, NodeExecutionError>;
}
