//! # In-Memory Graph
//!
//! A minimal [`GraphAdapter`] that keeps nodes and connections in memory and tells
//! subscribed engines about node creation and removal.
//!
//! Listeners are held weakly, so a graph and the engines bound to it (which hold the
//! graph strongly) never keep each other alive. Listeners that have been dropped are
//! pruned on the next notification.

use crate::error::EngineError;
use crate::graph::{Connection, GraphAdapter, GraphEvent, GraphListener, NodeId};
use crate::node::Ports;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tracing::debug;

/// Nodes and connections stored in memory, in insertion order.
pub struct MemoryGraph<N> {
  nodes: RwLock<Vec<Arc<N>>>,
  connections: RwLock<Vec<Connection>>,
  listeners: RwLock<Vec<Weak<dyn GraphListener<N>>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
  lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
  lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl<N> MemoryGraph<N>
where
  N: Ports + Send + Sync + 'static,
{
  /// Creates an empty graph.
  pub fn new() -> Self {
    Self {
      nodes: RwLock::new(Vec::new()),
      connections: RwLock::new(Vec::new()),
      listeners: RwLock::new(Vec::new()),
    }
  }

  /// Subscribes `listener` to node creation and removal events.
  pub fn subscribe<L>(&self, listener: &Arc<L>)
  where
    L: GraphListener<N> + 'static,
  {
    let listener: Weak<L> = Arc::downgrade(listener);
    write(&self.listeners).push(listener);
  }

  /// Adds `node` and notifies listeners.
  ///
  /// # Errors
  ///
  /// Returns [`EngineError::DuplicateNode`] if a node with the same id exists, or the
  /// first error returned by a listener. The node stays in the graph when a listener
  /// fails.
  pub fn add_node(&self, node: N) -> Result<Arc<N>, EngineError> {
    let node = Arc::new(node);
    {
      let mut nodes = write(&self.nodes);
      if nodes.iter().any(|existing| existing.id() == node.id()) {
        return Err(EngineError::DuplicateNode(node.id().clone()));
      }
      nodes.push(Arc::clone(&node));
    }
    debug!(node = %node.id(), "node added");
    self.notify(&GraphEvent::NodeCreated(Arc::clone(&node)))?;
    Ok(node)
  }

  /// Removes the node `id` together with its connections and notifies listeners.
  ///
  /// Listeners are notified while the node's connections are still in place, so they
  /// can walk its downstream neighbours. The connections are dropped afterwards even
  /// if a listener fails.
  ///
  /// # Errors
  ///
  /// Returns [`EngineError::NodeNotFound`] if there is no such node, or the first
  /// error returned by a listener.
  pub fn remove_node(&self, id: &NodeId) -> Result<Arc<N>, EngineError> {
    let node = {
      let mut nodes = write(&self.nodes);
      let index = nodes
        .iter()
        .position(|node| node.id() == id)
        .ok_or_else(|| EngineError::NodeNotFound(id.clone()))?;
      nodes.remove(index)
    };
    debug!(node = %id, "node removed");
    let notified = self.notify(&GraphEvent::NodeRemoved(Arc::clone(&node)));
    write(&self.connections)
      .retain(|connection| connection.source_node != *id && connection.target_node != *id);
    notified?;
    Ok(node)
  }

  /// Appends `connection`.
  ///
  /// # Errors
  ///
  /// Returns [`EngineError::NodeNotFound`] if either endpoint is not in the graph.
  pub fn add_connection(&self, connection: Connection) -> Result<(), EngineError> {
    {
      let nodes = read(&self.nodes);
      for endpoint in [&connection.source_node, &connection.target_node] {
        if !nodes.iter().any(|node| node.id() == endpoint) {
          return Err(EngineError::NodeNotFound(endpoint.clone()));
        }
      }
    }
    write(&self.connections).push(connection);
    Ok(())
  }

  /// Removes the first connection equal to `connection`. Returns true if one was found.
  pub fn remove_connection(&self, connection: &Connection) -> bool {
    let mut connections = write(&self.connections);
    match connections.iter().position(|existing| existing == connection) {
      Some(index) => {
        connections.remove(index);
        true
      }
      None => false,
    }
  }

  /// Returns every node, in insertion order.
  pub fn nodes(&self) -> Vec<Arc<N>> {
    read(&self.nodes).clone()
  }

  fn notify(&self, event: &GraphEvent<N>) -> Result<(), EngineError> {
    let listeners: Vec<Arc<dyn GraphListener<N>>> = {
      let mut listeners = write(&self.listeners);
      listeners.retain(|listener| listener.strong_count() > 0);
      listeners.iter().filter_map(Weak::upgrade).collect()
    };
    for listener in listeners {
      listener.on_event(event)?;
    }
    Ok(())
  }
}

impl<N> Default for MemoryGraph<N>
where
  N: Ports + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<N> GraphAdapter for MemoryGraph<N>
where
  N: Ports + Send + Sync + 'static,
{
  type Node = N;

  fn node(&self, id: &NodeId) -> Option<Arc<N>> {
    read(&self.nodes).iter().find(|node| node.id() == id).cloned()
  }

  fn connections(&self) -> Vec<Connection> {
    read(&self.connections).clone()
  }
}
