//! # FlowWeave
//!
//! Execution engines for node graphs.
//!
//! FlowWeave runs user-defined node callbacks over a directed graph owned by someone
//! else. The graph (node and connection storage) is reached through the
//! [`GraphAdapter`] trait; the engines learn about nodes through [`GraphEvent`]s and
//! query connections on every call, so the graph may be reconfigured at runtime.
//!
//! ## Engines
//!
//! - **[`ControlFlowEngine`]**: signal propagation. Executing a node runs its
//!   callback synchronously; the callback forwards execution to the nodes connected
//!   to the output ports it chooses.
//! - **[`DataflowEngine`]**: demand-driven evaluation. Fetching a node pulls and
//!   memoizes upstream results, gathers fan-in into ordered collections, and supports
//!   cancelling in-flight computations through [`DataflowEngine::reset`].
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use flowweave::{
//!   Connection, DataflowEngine, DataflowNode, Inputs, MemoryGraph, NodeExecutionError, NodeId,
//!   Outputs, Ports,
//! };
//! use std::sync::Arc;
//!
//! struct Number {
//!   id: NodeId,
//!   value: i64,
//! }
//!
//! impl Ports for Number {
//!   fn id(&self) -> &NodeId { &self.id }
//!   fn input_port_names(&self) -> Vec<String> { vec!["in".to_string()] }
//!   fn output_port_names(&self) -> Vec<String> { vec!["out".to_string()] }
//! }
//!
//! #[async_trait]
//! impl DataflowNode for Number {
//!   type Value = i64;
//!
//!   async fn data(&self, inputs: Inputs<i64>) -> Result<Outputs<i64>, NodeExecutionError> {
//!     let upstream: i64 = inputs.get("in").map(|values| values.iter().sum()).unwrap_or(0);
//!     Ok(Outputs::from([("out".to_string(), upstream + self.value)]))
//!   }
//! }
//!
//! # futures::executor::block_on(async {
//! let graph = Arc::new(MemoryGraph::new());
//! let engine = Arc::new(DataflowEngine::new(Arc::clone(&graph)));
//! graph.subscribe(&engine);
//!
//! graph.add_node(Number { id: "a".into(), value: 1 }).unwrap();
//! graph.add_node(Number { id: "b".into(), value: 2 }).unwrap();
//! graph.add_connection(Connection::new("a", "out", "b", "in")).unwrap();
//!
//! let outputs = engine.fetch(&"b".into()).await.unwrap();
//! assert_eq!(outputs["out"], 3);
//! # });
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Result cache with an eviction hook.
pub mod cache;
/// Cancellable chains of asynchronous steps.
pub mod cancellable;
/// Engine configuration and port overrides.
pub mod config;
/// Synchronous signal-propagation executor.
pub mod control_flow;
/// Control-flow engine bound to graph events.
pub mod control_flow_engine;
/// Demand-driven dataflow executor.
pub mod dataflow;
/// Memoizing dataflow engine bound to graph events.
pub mod dataflow_engine;
/// Engine error types.
pub mod error;
/// Graph adapter contract.
pub mod graph;
/// In-memory graph adapter.
pub mod memory_graph;
/// Node capabilities expected by the engines.
pub mod node;
/// Per-node setup registry.
pub mod registry;

pub use cache::{Cache, EvictionHook};
pub use cancellable::{CancelHandle, Cancellable, Chain};
pub use config::{Configure, EngineConfig};
pub use control_flow::{ControlFlow, ControlFlowSetup, Forward};
pub use control_flow_engine::ControlFlowEngine;
pub use dataflow::{Dataflow, DataflowSetup, FetchInputs};
pub use dataflow_engine::{DataflowEngine, NodeValue};
pub use error::{CacheError, EngineError, NodeExecutionError};
pub use graph::{Connection, GraphAdapter, GraphEvent, GraphListener, NodeId};
pub use memory_graph::MemoryGraph;
pub use node::{ControlFlowNode, DataflowNode, Inputs, Outputs, PortLayout, Ports};
pub use registry::SetupRegistry;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod config_test;
