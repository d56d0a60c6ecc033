//! # Control-Flow Executor
//!
//! Propagates execution signals through the graph. Executing a node runs its
//! callback synchronously; the callback decides which output ports to signal by
//! calling `forward`, and every node connected to a signalled port is executed in
//! turn before `forward` returns.
//!
//! Propagation is depth-first and follows the graph's connection enumeration order.
//! Nothing is memoized: every `execute` runs live.

use crate::error::{EngineError, NodeExecutionError};
use crate::graph::{Connection, GraphAdapter, NodeId};
use crate::registry::SetupRegistry;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::trace;

/// Callback through which a node signals one of its output ports.
pub type Forward<'a> = &'a dyn Fn(&str) -> Result<(), EngineError>;

type PortsFn = Box<dyn Fn() -> Vec<String> + Send + Sync>;
type ExecuteFn =
  Box<dyn Fn(Option<&str>, Forward<'_>) -> Result<(), NodeExecutionError> + Send + Sync>;

/// How the control-flow executor runs one node.
pub struct ControlFlowSetup {
  inputs: PortsFn,
  outputs: PortsFn,
  execute: ExecuteFn,
}

impl ControlFlowSetup {
  /// Creates a setup from port accessors and an execute callback.
  ///
  /// The port accessors are called on every execution and every `forward`, so they
  /// may report different ports over time.
  pub fn new<I, O, E>(inputs: I, outputs: O, execute: E) -> Self
  where
    I: Fn() -> Vec<String> + Send + Sync + 'static,
    O: Fn() -> Vec<String> + Send + Sync + 'static,
    E: Fn(Option<&str>, Forward<'_>) -> Result<(), NodeExecutionError> + Send + Sync + 'static,
  {
    Self {
      inputs: Box::new(inputs),
      outputs: Box::new(outputs),
      execute: Box::new(execute),
    }
  }

  /// Returns the currently declared input ports.
  pub fn inputs(&self) -> Vec<String> {
    (self.inputs)()
  }

  /// Returns the currently declared output ports.
  pub fn outputs(&self) -> Vec<String> {
    (self.outputs)()
  }
}

/// Synchronous signal-propagation executor over a graph.
pub struct ControlFlow<G> {
  graph: Arc<G>,
  setups: SetupRegistry<ControlFlowSetup>,
}

impl<G: GraphAdapter> ControlFlow<G> {
  /// Creates an executor bound to `graph`.
  pub fn new(graph: Arc<G>) -> Self {
    Self {
      graph,
      setups: SetupRegistry::new(),
    }
  }

  /// Returns the graph this executor runs over.
  pub fn graph(&self) -> &Arc<G> {
    &self.graph
  }

  /// Returns the setup registry.
  pub fn setups(&self) -> &SetupRegistry<ControlFlowSetup> {
    &self.setups
  }

  /// Registers `setup` for `node`.
  ///
  /// # Errors
  ///
  /// Returns [`EngineError::AlreadyProcessed`] if `node` is already registered.
  pub fn add(&self, node: NodeId, setup: ControlFlowSetup) -> Result<(), EngineError> {
    self.setups.add(node, setup)
  }

  /// Deregisters `node`. Removing an unregistered node is a no-op.
  pub fn remove(&self, node: &NodeId) {
    self.setups.remove(node);
  }

  /// Executes `node`, optionally as if a signal arrived on `input`.
  ///
  /// Returns once the node and everything it forwarded to have finished.
  ///
  /// # Errors
  ///
  /// - [`EngineError::NotInitialized`] if `node` has no setup.
  /// - [`EngineError::UnknownInput`] if `input` is not a declared input of `node`.
  /// - [`EngineError::UnknownOutput`] if the callback forwards an undeclared output.
  /// - Any error raised by a node reached through `forward`.
  pub fn execute(&self, node: &NodeId, input: Option<&str>) -> Result<(), EngineError> {
    let setup = self
      .setups
      .get(node)
      .ok_or_else(|| EngineError::NotInitialized(node.clone()))?;

    if let Some(input) = input {
      if !setup.inputs().iter().any(|port| port == input) {
        return Err(EngineError::UnknownInput {
          node: node.clone(),
          input: input.to_string(),
        });
      }
    }

    let forward_error: RefCell<Option<EngineError>> = RefCell::new(None);
    let forward = |output: &str| -> Result<(), EngineError> {
      let result = self.forward(node, &setup, output);
      if let Err(error) = &result {
        forward_error.borrow_mut().get_or_insert_with(|| error.clone());
      }
      result
    };

    (setup.execute)(input, &forward).map_err(|error| EngineError::from_node(node, error))?;

    match forward_error.into_inner() {
      Some(error) => Err(error),
      None => Ok(()),
    }
  }

  fn forward(&self, node: &NodeId, setup: &ControlFlowSetup, output: &str) -> Result<(), EngineError> {
    if !setup.outputs().iter().any(|port| port == output) {
      return Err(EngineError::UnknownOutput {
        node: node.clone(),
        output: output.to_string(),
      });
    }

    let targets: Vec<Connection> = self
      .graph
      .connections()
      .into_iter()
      .filter(|connection| connection.leaves(node, output))
      .collect();

    trace!(
      node = %node,
      output,
      targets = targets.len(),
      "forwarding control-flow signal"
    );

    for connection in targets {
      self.execute(&connection.target_node, Some(&connection.target_port))?;
    }
    Ok(())
  }
}
