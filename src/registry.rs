//! # Setup Registry
//!
//! Per-node map from [`NodeId`] to the setup descriptor an executor registered for
//! it. Each executor owns one registry.
//!
//! Setups are stored behind `Arc` and handed out by clone, so no lock is held while
//! an executor runs a node's callbacks. A callback may therefore re-enter the
//! executor (control-flow `forward`, dataflow `fetch_inputs`) freely.

use crate::error::EngineError;
use crate::graph::NodeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Map from node id to a registered setup.
pub struct SetupRegistry<S> {
  setups: RwLock<HashMap<NodeId, Arc<S>>>,
}

impl<S> SetupRegistry<S> {
  /// Creates an empty registry.
  pub fn new() -> Self {
    Self {
      setups: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `setup` for `node`.
  ///
  /// # Errors
  ///
  /// Returns [`EngineError::AlreadyProcessed`] if `node` already has a setup. The
  /// existing setup is left in place.
  pub fn add(&self, node: NodeId, setup: S) -> Result<(), EngineError> {
    let mut setups = self.setups.write().unwrap_or_else(PoisonError::into_inner);
    if setups.contains_key(&node) {
      return Err(EngineError::AlreadyProcessed(node));
    }
    setups.insert(node, Arc::new(setup));
    Ok(())
  }

  /// Removes the setup for `node`, returning it. Removing an absent node is a no-op.
  pub fn remove(&self, node: &NodeId) -> Option<Arc<S>> {
    self
      .setups
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(node)
  }

  /// Returns the setup registered for `node`.
  pub fn get(&self, node: &NodeId) -> Option<Arc<S>> {
    self
      .setups
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(node)
      .cloned()
  }

  /// Returns true if `node` has a registered setup.
  pub fn contains(&self, node: &NodeId) -> bool {
    self
      .setups
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .contains_key(node)
  }

  /// Returns the number of registered setups.
  pub fn len(&self) -> usize {
    self.setups.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  /// Returns true if no setups are registered.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<S> Default for SetupRegistry<S> {
  fn default() -> Self {
    Self::new()
  }
}
