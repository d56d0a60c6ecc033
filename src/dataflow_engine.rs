//! # Dataflow Engine
//!
//! Binds [`DataflowNode`]s stored in a graph to a [`Dataflow`] executor and memoizes
//! their outputs.
//!
//! ## Memoization
//!
//! The first fetch of a node starts a [`Cancellable`] chain (gather inputs, then call
//! [`DataflowNode::data`]) and stores it in the engine's [`Cache`] before anything is
//! awaited. Every later fetch, including ones that arrive while the chain is still
//! running, awaits that same chain. At most one computation per node is alive at any
//! time.
//!
//! A failed or cancelled chain stays cached as a shared failure until the node is
//! reset; it is never retried automatically.
//!
//! ## Invalidation
//!
//! [`DataflowEngine::reset`] with a node id evicts that node and everything
//! downstream of its declared outputs; upstream entries are kept. Without a node id
//! it clears the whole cache. Evicted chains that are still running are cancelled,
//! and whoever awaits them observes [`EngineError::Cancelled`].

use crate::cache::Cache;
use crate::cancellable::{Cancellable, Chain};
use crate::config::{Configure, EngineConfig, resolve_ports};
use crate::dataflow::{Dataflow, DataflowSetup, FetchInputs};
use crate::error::EngineError;
use crate::graph::{GraphAdapter, GraphEvent, GraphListener, NodeId};
use crate::node::{DataflowNode, Inputs, Outputs, PortLayout, Ports};
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Value type carried by the nodes of graph `G`.
pub type NodeValue<G> = <<G as GraphAdapter>::Node as DataflowNode>::Value;

type ResultCache<V> = Cache<NodeId, Cancellable<Outputs<V>>>;

/// Memoizing dataflow evaluation over the [`DataflowNode`]s of a graph.
pub struct DataflowEngine<G>
where
  G: GraphAdapter,
  G::Node: DataflowNode,
{
  dataflow: Dataflow<G, NodeValue<G>>,
  cache: Arc<ResultCache<NodeValue<G>>>,
  configure: Option<Configure<G::Node>>,
  config: EngineConfig,
}

impl<G> DataflowEngine<G>
where
  G: GraphAdapter,
  G::Node: DataflowNode,
{
  /// Creates an engine bound to `graph` with the default [`EngineConfig`].
  ///
  /// Nodes already in the graph are not registered; the engine only learns about
  /// nodes through [`GraphEvent`]s.
  pub fn new(graph: Arc<G>) -> Self {
    Self {
      dataflow: Dataflow::new(graph),
      cache: Arc::new(Cache::with_eviction(
        |computation: &Cancellable<Outputs<NodeValue<G>>>| computation.cancel(),
      )),
      configure: None,
      config: EngineConfig::default(),
    }
  }

  /// Replaces the engine configuration.
  pub fn with_config(mut self, config: EngineConfig) -> Self {
    self.config = config;
    self
  }

  /// Overrides the ports the engine uses for every node.
  pub fn with_configure(
    mut self,
    configure: impl Fn(&G::Node) -> PortLayout + Send + Sync + 'static,
  ) -> Self {
    self.configure = Some(Arc::new(configure));
    self
  }

  /// Returns the engine configuration.
  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Returns the underlying executor.
  pub fn dataflow(&self) -> &Dataflow<G, NodeValue<G>> {
    &self.dataflow
  }

  /// Returns the cached computation for `node`, if any.
  pub fn cached(&self, node: &NodeId) -> Option<Cancellable<Outputs<NodeValue<G>>>> {
    self.cache.get(node)
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
    let compute = {
      let cache = Arc::clone(&self.cache);
      let id = id.clone();
      move |fetch_inputs: FetchInputs<NodeValue<G>>| {
        cache.get_or_insert_with(id.clone(), || start_computation(&node, &id, fetch_inputs))
      }
    };

    self
      .dataflow
      .add(id.clone(), DataflowSetup::new(inputs, outputs, compute))?;
    debug!(node = %id, "registered dataflow node");
    Ok(())
  }

  /// Deregisters `node`.
  ///
  /// The node's cache entry is kept unless [`EngineConfig::evict_on_remove`] is set.
  /// In that case the node and everything downstream of its declared outputs are
  /// evicted (and cancelled) exactly as [`DataflowEngine::reset`] would. The graph
  /// must still report the node's connections when this is called.
  ///
  /// # Errors
  ///
  /// Returns [`EngineError::MissingSetup`] if eviction reaches a downstream node with
  /// no registered setup. The node is deregistered regardless.
  pub fn on_node_removed(&self, node: &G::Node) -> Result<(), EngineError> {
    let id = node.id();
    let evicted = if self.config.evict_on_remove && self.dataflow.setups().contains(id) {
      debug!(node = %id, "evicting removed node and its downstream");
      self.reset_node(id, &mut HashSet::new())
    } else {
      Ok(())
    };
    self.dataflow.remove(id);
    debug!(node = %id, "deregistered dataflow node");
    evicted
  }

  /// Re-registers `node` from the graph's current copy, picking up port changes.
  ///
  /// The node's cache entry is left untouched; call [`DataflowEngine::reset`] to
  /// recompute it.
  ///
  /// # Errors
  ///
  /// Returns [`EngineError::NodeNotFound`] if the graph no longer has the node.
  pub fn update(&self, node: &NodeId) -> Result<(), EngineError> {
    let current = self
      .dataflow
      .graph()
      .node(node)
      .ok_or_else(|| EngineError::NodeNotFound(node.clone()))?;
    self.dataflow.remove(node);
    self.on_node_created(current)?;
    debug!(node = %node, "updated dataflow node");
    Ok(())
  }

  /// Invalidates memoized outputs.
  ///
  /// With `Some(node)`, evicts `node` and, recursively, every node connected
  /// downstream of one of its currently declared outputs. With `None`, clears the
  /// whole cache. In-flight computations that are evicted are cancelled.
  ///
  /// # Errors
  ///
  /// Returns [`EngineError::MissingSetup`] if `node`, or a node downstream of it, has
  /// no registered setup. Entries evicted before the error are not restored.
  pub fn reset(&self, node: Option<&NodeId>) -> Result<(), EngineError> {
    match node {
      Some(node) => self.reset_node(node, &mut HashSet::new()),
      None => {
        debug!(entries = self.cache.len(), "clearing dataflow cache");
        self.cache.clear();
        Ok(())
      }
    }
  }

  fn reset_node(&self, node: &NodeId, visited: &mut HashSet<NodeId>) -> Result<(), EngineError> {
    if !visited.insert(node.clone()) {
      return Ok(());
    }
    let setup = self
      .dataflow
      .setups()
      .get(node)
      .ok_or_else(|| EngineError::MissingSetup(node.clone()))?;

    if self.cache.delete(node) {
      debug!(node = %node, "evicted cached computation");
    }

    let outputs = setup.outputs();
    let downstream: Vec<NodeId> = self
      .dataflow
      .graph()
      .connections()
      .into_iter()
      .filter(|connection| {
        connection.source_node == *node && outputs.contains(&connection.source_port)
      })
      .map(|connection| connection.target_node)
      .collect();

    for target in downstream {
      self.reset_node(&target, visited)?;
    }
    Ok(())
  }

  /// Gathers the values arriving on `node`'s declared inputs without computing `node`.
  ///
  /// See [`Dataflow::fetch_inputs`].
  pub fn fetch_inputs(
    &self,
    node: &NodeId,
  ) -> BoxFuture<'static, Result<Inputs<NodeValue<G>>, EngineError>> {
    self.dataflow.fetch_inputs(node)
  }

  /// Returns `node`'s outputs, computing them (and anything upstream) if needed.
  ///
  /// See [`Dataflow::fetch`].
  pub fn fetch(
    &self,
    node: &NodeId,
  ) -> BoxFuture<'static, Result<Outputs<NodeValue<G>>, EngineError>> {
    self.dataflow.fetch(node)
  }
}

fn start_computation<N: DataflowNode + 'static>(
  node: &Arc<N>,
  id: &NodeId,
  fetch_inputs: FetchInputs<N::Value>,
) -> Cancellable<Outputs<N::Value>> {
  debug!(node = %id, "starting dataflow computation");
  let node = Arc::clone(node);
  let id = id.clone();
  Chain::new(move || fetch_inputs.fetch())
    .then(move |inputs| async move {
      node
        .data(inputs)
        .await
        .map_err(|error| EngineError::from_node(&id, error))
    })
    .share()
}

impl<G> GraphListener<G::Node> for DataflowEngine<G>
where
  G: GraphAdapter,
  G::Node: DataflowNode,
{
  fn on_event(&self, event: &GraphEvent<G::Node>) -> Result<(), EngineError> {
    match event {
      GraphEvent::NodeCreated(node) => self.on_node_created(Arc::clone(node)),
      GraphEvent::NodeRemoved(node) => self.on_node_removed(node),
    }
  }
}
