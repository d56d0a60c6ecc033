//! Mock nodes shared by the unit tests.

use crate::control_flow::Forward;
use crate::error::NodeExecutionError;
use crate::graph::NodeId;
use crate::node::{ControlFlowNode, DataflowNode, Inputs, Outputs, Ports};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::Semaphore;

pub(crate) fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_test_writer()
    .with_max_level(tracing::Level::TRACE)
    .try_init();
}

pub(crate) fn ports(names: &[&str]) -> Vec<String> {
  names.iter().map(|name| name.to_string()).collect()
}

/// Records `(node, input)` for every control-flow execution, in order.
pub(crate) type ExecutionLog = Arc<Mutex<Vec<(String, Option<String>)>>>;

pub(crate) fn entries(log: &ExecutionLog) -> Vec<(String, Option<String>)> {
  log.lock().unwrap().clone()
}

/// Control-flow node that logs its executions and forwards a fixed list of outputs.
#[derive(Debug)]
pub(crate) struct SignalNode {
  id: NodeId,
  inputs: RwLock<Vec<String>>,
  outputs: RwLock<Vec<String>>,
  forwards: Vec<String>,
  log: ExecutionLog,
}

impl SignalNode {
  pub(crate) fn new(id: &str, forwards: &[&str], log: &ExecutionLog) -> Self {
    Self {
      id: NodeId::from(id),
      inputs: RwLock::new(ports(&["in"])),
      outputs: RwLock::new(ports(&["out"])),
      forwards: ports(forwards),
      log: Arc::clone(log),
    }
  }

  pub(crate) fn with_outputs(self, outputs: &[&str]) -> Self {
    *self.outputs.write().unwrap() = ports(outputs);
    self
  }

  pub(crate) fn set_inputs(&self, inputs: &[&str]) {
    *self.inputs.write().unwrap() = ports(inputs);
  }
}

impl Ports for SignalNode {
  fn id(&self) -> &NodeId {
    &self.id
  }

  fn input_port_names(&self) -> Vec<String> {
    self.inputs.read().unwrap().clone()
  }

  fn output_port_names(&self) -> Vec<String> {
    self.outputs.read().unwrap().clone()
  }
}

impl ControlFlowNode for SignalNode {
  fn execute(&self, input: Option<&str>, forward: Forward<'_>) -> Result<(), NodeExecutionError> {
    self
      .log
      .lock()
      .unwrap()
      .push((self.id.to_string(), input.map(str::to_string)));
    for output in &self.forwards {
      forward(output.as_str())?;
    }
    Ok(())
  }
}

/// Dataflow node producing `label` on each output, or `label(a,b,..)` when values
/// arrived on its `in` port.
#[derive(Debug)]
pub(crate) struct ValueNode {
  id: NodeId,
  label: String,
  inputs: Vec<String>,
  outputs: RwLock<Vec<String>>,
  calls: Arc<AtomicUsize>,
  gate: Option<Arc<Semaphore>>,
  failing: bool,
  incomplete: bool,
}

impl ValueNode {
  pub(crate) fn new(id: &str, label: &str) -> Self {
    Self {
      id: NodeId::from(id),
      label: label.to_string(),
      inputs: ports(&["in"]),
      outputs: RwLock::new(ports(&["out"])),
      calls: Arc::new(AtomicUsize::new(0)),
      gate: None,
      failing: false,
      incomplete: false,
    }
  }

  /// Blocks `data` until a permit is added to `gate`.
  pub(crate) fn gated(mut self, gate: &Arc<Semaphore>) -> Self {
    self.gate = Some(Arc::clone(gate));
    self
  }

  pub(crate) fn failing(mut self) -> Self {
    self.failing = true;
    self
  }

  /// Returns an empty outputs record.
  pub(crate) fn incomplete(mut self) -> Self {
    self.incomplete = true;
    self
  }

  pub(crate) fn with_outputs(self, outputs: &[&str]) -> Self {
    *self.outputs.write().unwrap() = ports(outputs);
    self
  }

  pub(crate) fn set_outputs(&self, outputs: &[&str]) {
    *self.outputs.write().unwrap() = ports(outputs);
  }

  /// Counter of `data` invocations.
  pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
    Arc::clone(&self.calls)
  }
}

pub(crate) fn count(calls: &Arc<AtomicUsize>) -> usize {
  calls.load(Ordering::SeqCst)
}

impl Ports for ValueNode {
  fn id(&self) -> &NodeId {
    &self.id
  }

  fn input_port_names(&self) -> Vec<String> {
    self.inputs.clone()
  }

  fn output_port_names(&self) -> Vec<String> {
    self.outputs.read().unwrap().clone()
  }
}

#[async_trait]
impl DataflowNode for ValueNode {
  type Value = String;

  async fn data(&self, inputs: Inputs<String>) -> Result<Outputs<String>, NodeExecutionError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(gate) = &self.gate {
      let _permit = gate.acquire().await?;
    }
    if self.failing {
      return Err(format!("{} exploded", self.label).into());
    }
    if self.incomplete {
      return Ok(Outputs::new());
    }
    let value = match inputs.get("in") {
      Some(values) => format!("{}({})", self.label, values.join(",")),
      None => self.label.clone(),
    };
    Ok(
      self
        .output_port_names()
        .into_iter()
        .map(|port| (port, value.clone()))
        .collect(),
    )
  }
}
