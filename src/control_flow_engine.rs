//! # Control-Flow Engine
//!
//! Binds [`ControlFlowNode`]s stored in a graph to a [`ControlFlow`] executor. The
//! engine registers a setup for every node the graph reports as created and drops it
//! when the graph reports the node removed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use flowweave::{ControlFlowEngine, MemoryGraph, Ports};
//! use std::sync::Arc;
//!
//! # fn run<N: flowweave::ControlFlowNode + 'static>(a: N, b: N) -> Result<(), flowweave::EngineError> {
//! let graph = Arc::new(MemoryGraph::new());
//! let engine = Arc::new(ControlFlowEngine::new(Arc::clone(&graph)));
//! graph.subscribe(&engine);
//!
//! let start = a.id().clone();
//! graph.add_node(a)?;
//! graph.add_node(b)?;
//! engine.execute(&start, None)?;
//! # Ok(())
//! # }
//! ```

use crate::config::{Configure, resolve_ports};
use crate::control_flow::{ControlFlow, ControlFlowSetup};
use crate::error::EngineError;
use crate::graph::{GraphAdapter, GraphEvent, GraphListener, NodeId};
use crate::node::{ControlFlowNode, PortLayout, Ports};
use std::sync::Arc;
use tracing::debug;

/// Control-flow execution over the [`ControlFlowNode`]s of a graph.
pub struct ControlFlowEngine<G: GraphAdapter> {
  control_flow: ControlFlow<G>,
  configure: Option<Configure<G::Node>>,
}

impl<G> ControlFlowEngine<G>
where
  G: GraphAdapter,
  G::Node: ControlFlowNode,
{
  /// Creates an engine bound to `graph`.
  ///
  /// Nodes already in the graph are not registered; the engine only learns about
  /// nodes through [`GraphEvent`]s.
  pub fn new(graph: Arc<G>) -> Self {
    Self {
      control_flow: ControlFlow::new(graph),
      configure: None,
    }
  }

  /// Overrides the ports the engine uses for every node.
  pub fn with_configure(
    mut self,
    configure: impl Fn(&G::Node) -> PortLayout + Send + Sync + 'static,
  ) -> Self {
    self.configure = Some(Arc::new(configure));
    self
  }

  /// Returns the underlying executor.
  pub fn control_flow(&self) -> &ControlFlow<G> {
    &self.control_flow
  }

  /// Registers `node`.
  ///
  /// # Errors
  ///
  /// Returns [`EngineError::AlreadyProcessed`] if the node is already registered.
  pub fn on_node_created(&self, node: Arc<G::Node>) -> Result<(), EngineError> {
    let id = node.id().clone();
    let inputs = {
      let node = Arc::clone(&node);
      let configure = self.configure.clone();
      move || resolve_ports(configure.as_ref(), &*node).inputs
    };
    let outputs = {
      let node = Arc::clone(&node);
      let configure = self.configure.clone();
      move || resolve_ports(configure.as_ref(), &*node).outputs
    };
    let setup = ControlFlowSetup::new(inputs, outputs, move |input, forward| {
      node.execute(input, forward)
    });

    self.control_flow.add(id.clone(), setup)?;
    debug!(node = %id, "registered control-flow node");
    Ok(())
  }

  /// Deregisters `node`.
  pub fn on_node_removed(&self, node: &G::Node) {
    self.control_flow.remove(node.id());
    debug!(node = %node.id(), "deregistered control-flow node");
  }

  /// Re-registers `node` from the graph's current copy, picking up port changes.
  ///
  /// # Errors
  ///
  /// Returns [`EngineError::NodeNotFound`] if the graph no longer has the node.
  pub fn update(&self, node: &NodeId) -> Result<(), EngineError> {
    let current = self
      .control_flow
      .graph()
      .node(node)
      .ok_or_else(|| EngineError::NodeNotFound(node.clone()))?;
    self.on_node_removed(&current);
    self.on_node_created(current)?;
    debug!(node = %node, "updated control-flow node");
    Ok(())
  }

  /// Executes `node`, optionally as if a signal arrived on `input`.
  ///
  /// See [`ControlFlow::execute`].
  pub fn execute(&self, node: &NodeId, input: Option<&str>) -> Result<(), EngineError> {
    self.control_flow.execute(node, input)
  }
}

impl<G> GraphListener<G::Node> for ControlFlowEngine<G>
where
  G: GraphAdapter,
  G::Node: ControlFlowNode,
{
  fn on_event(&self, event: &GraphEvent<G::Node>) -> Result<(), EngineError> {
    match event {
      GraphEvent::NodeCreated(node) => self.on_node_created(Arc::clone(node)),
      GraphEvent::NodeRemoved(node) => {
        self.on_node_removed(node);
        Ok(())
      }
    }
  }
}
