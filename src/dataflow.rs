//! # Dataflow Executor
//!
//! Demand-driven evaluation of node computations. Fetching a node runs its compute
//! callback, which may pull the node's inputs; pulling inputs fetches every upstream
//! node connected to a declared input, recursively.
//!
//! ## Fan-in
//!
//! All values arriving on the same input port are gathered into one `Vec`, one
//! entry per connection, in the graph's connection enumeration order. Upstream
//! fetches run concurrently; completion order never affects the gathered order.
//! Duplicate connections yield duplicate entries.
//!
//! ## Memoization
//!
//! This layer does not cache anything itself. Callers that want memoization (the
//! [`DataflowEngine`](crate::DataflowEngine)) supply a compute callback that goes
//! through a [`Cache`](crate::Cache).

use crate::error::EngineError;
use crate::graph::{Connection, GraphAdapter, NodeId};
use crate::node::{Inputs, Outputs};
use crate::registry::SetupRegistry;
use futures::future::{BoxFuture, FutureExt, try_join_all};
use std::future::Future;
use std::sync::Arc;
use tracing::{trace, warn};

type PortsFn = Box<dyn Fn() -> Vec<String> + Send + Sync>;
type ComputeFn<V> =
  Box<dyn Fn(FetchInputs<V>) -> BoxFuture<'static, Result<Outputs<V>, EngineError>> + Send + Sync>;

/// Deferred access to a node's inputs, handed to its compute callback.
///
/// Nothing upstream is fetched unless [`FetchInputs::fetch`] is called.
pub struct FetchInputs<V> {
  fetch: Box<dyn FnOnce() -> BoxFuture<'static, Result<Inputs<V>, EngineError>> + Send>,
}

impl<V> FetchInputs<V> {
  /// Wraps a deferred input fetch.
  pub fn new(
    fetch: impl FnOnce() -> BoxFuture<'static, Result<Inputs<V>, EngineError>> + Send + 'static,
  ) -> Self {
    Self {
      fetch: Box::new(fetch),
    }
  }

  /// Fetches the inputs.
  pub fn fetch(self) -> BoxFuture<'static, Result<Inputs<V>, EngineError>> {
    (self.fetch)()
  }
}

/// How the dataflow executor evaluates one node.
pub struct DataflowSetup<V> {
  inputs: PortsFn,
  outputs: PortsFn,
  compute: ComputeFn<V>,
}

impl<V> DataflowSetup<V> {
  /// Creates a setup from port accessors and a compute callback.
  ///
  /// The port accessors are called on every fetch, so they may report different
  /// ports over time.
  pub fn new<I, O, C, Fut>(inputs: I, outputs: O, compute: C) -> Self
  where
    I: Fn() -> Vec<String> + Send + Sync + 'static,
    O: Fn() -> Vec<String> + Send + Sync + 'static,
    C: Fn(FetchInputs<V>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Outputs<V>, EngineError>> + Send + 'static,
  {
    Self {
      inputs: Box::new(inputs),
      outputs: Box::new(outputs),
      compute: Box::new(move |fetch_inputs| compute(fetch_inputs).boxed()),
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

struct DataflowInner<G, V> {
  graph: Arc<G>,
  setups: SetupRegistry<DataflowSetup<V>>,
}

/// Demand-driven executor over a graph.
///
/// Cloning is cheap; clones share the same registry.
pub struct Dataflow<G, V> {
  inner: Arc<DataflowInner<G, V>>,
}

impl<G, V> Clone for Dataflow<G, V> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<G, V> Dataflow<G, V>
where
  G: GraphAdapter,
  V: Clone + Send + Sync + 'static,
{
  /// Creates an executor bound to `graph`.
  pub fn new(graph: Arc<G>) -> Self {
    Self {
      inner: Arc::new(DataflowInner {
        graph,
        setups: SetupRegistry::new(),
      }),
    }
  }

  /// Returns the graph this executor runs over.
  pub fn graph(&self) -> &Arc<G> {
    &self.inner.graph
  }

  /// Returns the setup registry.
  pub fn setups(&self) -> &SetupRegistry<DataflowSetup<V>> {
    &self.inner.setups
  }

  /// Registers `setup` for `node`.
  ///
  /// # Errors
  ///
  /// Returns [`EngineError::AlreadyProcessed`] if `node` is already registered.
  pub fn add(&self, node: NodeId, setup: DataflowSetup<V>) -> Result<(), EngineError> {
    self.inner.setups.add(node, setup)
  }

  /// Deregisters `node`. Removing an unregistered node is a no-op.
  pub fn remove(&self, node: &NodeId) {
    self.inner.setups.remove(node);
  }

  fn setup(&self, node: &NodeId) -> Result<Arc<DataflowSetup<V>>, EngineError> {
    self
      .inner
      .setups
      .get(node)
      .ok_or_else(|| EngineError::NotInitialized(node.clone()))
  }

  /// Gathers the values arriving on `node`'s declared inputs.
  ///
  /// Every upstream node is fetched, but `node`'s own compute callback is not run.
  ///
  /// # Errors
  ///
  /// - [`EngineError::NotInitialized`] if `node` or an upstream node has no setup.
  /// - [`EngineError::UnknownOutput`] if an upstream record lacks the connected port.
  /// - Any failure of an upstream fetch, including [`EngineError::Cancelled`].
  pub fn fetch_inputs(&self, node: &NodeId) -> BoxFuture<'static, Result<Inputs<V>, EngineError>> {
    let dataflow = self.clone();
    let node = node.clone();
    async move {
      let setup = dataflow.setup(&node)?;
      let input_ports = setup.inputs();
      let connections: Vec<Connection> = dataflow
        .inner
        .graph
        .connections()
        .into_iter()
        .filter(|connection| {
          connection.target_node == node && input_ports.contains(&connection.target_port)
        })
        .collect();

      let upstream = try_join_all(connections.iter().map(|connection| {
        trace!(
          node = %node,
          source = %connection.source_node,
          port = %connection.target_port,
          "fetching upstream node"
        );
        dataflow.fetch(&connection.source_node)
      }))
      .await?;

      let mut inputs = Inputs::new();
      for (connection, outputs) in connections.into_iter().zip(upstream) {
        let value = outputs.get(&connection.source_port).cloned().ok_or_else(|| {
          EngineError::UnknownOutput {
            node: connection.source_node.clone(),
            output: connection.source_port.clone(),
          }
        })?;
        inputs.entry(connection.target_port).or_default().push(value);
      }
      Ok(inputs)
    }
    .boxed()
  }

  /// Evaluates `node`, pulling upstream values on demand.
  ///
  /// # Errors
  ///
  /// - [`EngineError::NotInitialized`] if `node` has no setup.
  /// - [`EngineError::MissingOutputs`] if the returned record lacks a declared output.
  /// - Any failure of the compute callback, including [`EngineError::Cancelled`].
  pub fn fetch(&self, node: &NodeId) -> BoxFuture<'static, Result<Outputs<V>, EngineError>> {
    let dataflow = self.clone();
    let node = node.clone();
    async move {
      let setup = dataflow.setup(&node)?;
      let fetch_inputs = {
        let dataflow = dataflow.clone();
        let node = node.clone();
        FetchInputs::new(move || dataflow.fetch_inputs(&node))
      };
      let outputs = (setup.compute)(fetch_inputs).await?;

      let expected = setup.outputs();
      if !expected.iter().all(|port| outputs.contains_key(port)) {
        let mut received: Vec<String> = outputs.keys().cloned().collect();
        received.sort();
        warn!(
          node = %node,
          ?expected,
          ?received,
          "dataflow node returned an incomplete outputs record"
        );
        return Err(EngineError::MissingOutputs {
          node,
          expected,
          received,
        });
      }
      Ok(outputs)
    }
    .boxed()
  }
}
