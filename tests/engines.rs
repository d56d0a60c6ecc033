use async_trait::async_trait;
use flowweave::{
  Connection, ControlFlowEngine, ControlFlowNode, DataflowEngine, DataflowNode, EngineConfig,
  EngineError, Forward, Inputs, MemoryGraph, NodeExecutionError, NodeId, Outputs, Ports,
};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ============================================================================
// Control flow: a branch feeding two sinks
// ============================================================================

enum Step {
  Branch { condition: AtomicBool },
  Sink { hits: Arc<Mutex<Vec<String>>> },
}

struct FlowNode {
  id: NodeId,
  step: Step,
}

impl Ports for FlowNode {
  fn id(&self) -> &NodeId {
    &self.id
  }

  fn input_port_names(&self) -> Vec<String> {
    vec!["in".to_string()]
  }

  fn output_port_names(&self) -> Vec<String> {
    match self.step {
      Step::Branch { .. } => vec!["then".to_string(), "else".to_string()],
      Step::Sink { .. } => Vec::new(),
    }
  }
}

impl ControlFlowNode for FlowNode {
  fn execute(&self, _input: Option<&str>, forward: Forward<'_>) -> Result<(), NodeExecutionError> {
    match &self.step {
      Step::Branch { condition } => {
        if condition.load(Ordering::SeqCst) {
          forward("then")?;
        } else {
          forward("else")?;
        }
      }
      Step::Sink { hits } => hits.lock().unwrap().push(self.id.to_string()),
    }
    Ok(())
  }
}

#[test]
fn test_control_flow_follows_the_signalled_branch() {
  let graph = Arc::new(MemoryGraph::new());
  let engine = Arc::new(ControlFlowEngine::new(Arc::clone(&graph)));
  graph.subscribe(&engine);

  let hits = Arc::new(Mutex::new(Vec::new()));
  let branch = graph
    .add_node(FlowNode {
      id: "branch".into(),
      step: Step::Branch {
        condition: AtomicBool::new(true),
      },
    })
    .unwrap();
  for id in ["yes", "no"] {
    graph
      .add_node(FlowNode {
        id: id.into(),
        step: Step::Sink {
          hits: Arc::clone(&hits),
        },
      })
      .unwrap();
  }
  graph
    .add_connection(Connection::new("branch", "then", "yes", "in"))
    .unwrap();
  graph
    .add_connection(Connection::new("branch", "else", "no", "in"))
    .unwrap();

  engine.execute(&"branch".into(), None).unwrap();
  if let Step::Branch { condition } = &branch.step {
    condition.store(false, Ordering::SeqCst);
  }
  engine.execute(&"branch".into(), Some("in")).unwrap();

  assert_eq!(*hits.lock().unwrap(), vec!["yes".to_string(), "no".to_string()]);
}

#[test]
fn test_control_flow_rejects_undeclared_input() {
  let graph = Arc::new(MemoryGraph::new());
  let engine = Arc::new(ControlFlowEngine::new(Arc::clone(&graph)));
  graph.subscribe(&engine);
  graph
    .add_node(FlowNode {
      id: "sink".into(),
      step: Step::Sink {
        hits: Arc::new(Mutex::new(Vec::new())),
      },
    })
    .unwrap();

  let error = engine.execute(&"sink".into(), Some("bogus")).unwrap_err();

  assert!(matches!(error, EngineError::UnknownInput { .. }));
}

// ============================================================================
// Dataflow: summing numbers
// ============================================================================

struct Adder {
  id: NodeId,
  value: AtomicI64,
  calls: AtomicUsize,
  gate: Option<Arc<Notify>>,
}

impl Adder {
  fn new(id: &str, value: i64) -> Self {
    Self {
      id: id.into(),
      value: AtomicI64::new(value),
      calls: AtomicUsize::new(0),
      gate: None,
    }
  }
}

impl Ports for Adder {
  fn id(&self) -> &NodeId {
    &self.id
  }

  fn input_port_names(&self) -> Vec<String> {
    vec!["in".to_string()]
  }

  fn output_port_names(&self) -> Vec<String> {
    vec!["out".to_string()]
  }
}

#[async_trait]
impl DataflowNode for Adder {
  type Value = i64;

  async fn data(&self, inputs: Inputs<i64>) -> Result<Outputs<i64>, NodeExecutionError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(gate) = &self.gate {
      gate.notified().await;
    }
    let upstream: i64 = inputs.get("in").map(|values| values.iter().sum()).unwrap_or(0);
    let total = upstream + self.value.load(Ordering::SeqCst);
    Ok(Outputs::from([("out".to_string(), total)]))
  }
}

fn dataflow() -> (
  Arc<MemoryGraph<Adder>>,
  Arc<DataflowEngine<MemoryGraph<Adder>>>,
) {
  let graph = Arc::new(MemoryGraph::new());
  let engine = Arc::new(DataflowEngine::new(Arc::clone(&graph)));
  graph.subscribe(&engine);
  (graph, engine)
}

#[tokio::test]
async fn test_dataflow_sums_and_recomputes_after_reset() {
  let (graph, engine) = dataflow();
  let a = graph.add_node(Adder::new("a", 1)).unwrap();
  graph.add_node(Adder::new("b", 2)).unwrap();
  let c = graph.add_node(Adder::new("c", 10)).unwrap();
  graph
    .add_connection(Connection::new("a", "out", "c", "in"))
    .unwrap();
  graph
    .add_connection(Connection::new("b", "out", "c", "in"))
    .unwrap();

  assert_eq!(engine.fetch(&"c".into()).await.unwrap()["out"], 13);

  a.value.store(5, Ordering::SeqCst);
  assert_eq!(engine.fetch(&"c".into()).await.unwrap()["out"], 13);

  engine.reset(Some(&"a".into())).unwrap();
  assert_eq!(engine.fetch(&"c".into()).await.unwrap()["out"], 17);
  assert_eq!(c.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_dataflow_fetch_inputs_gathers_upstream_values() {
  let (graph, engine) = dataflow();
  graph.add_node(Adder::new("a", 1)).unwrap();
  graph.add_node(Adder::new("b", 2)).unwrap();
  let c = graph.add_node(Adder::new("c", 10)).unwrap();
  graph
    .add_connection(Connection::new("a", "out", "c", "in"))
    .unwrap();
  graph
    .add_connection(Connection::new("b", "out", "c", "in"))
    .unwrap();

  let inputs = engine.fetch_inputs(&"c".into()).await.unwrap();

  assert_eq!(inputs["in"], vec![1, 2]);
  assert_eq!(c.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dataflow_reset_cancels_pending_fetch() {
  let (graph, engine) = dataflow();
  let gate = Arc::new(Notify::new());
  let slow = graph
    .add_node(Adder {
      gate: Some(Arc::clone(&gate)),
      ..Adder::new("slow", 1)
    })
    .unwrap();

  let pending = tokio::spawn(engine.fetch(&"slow".into()));
  while slow.calls.load(Ordering::SeqCst) == 0 {
    tokio::task::yield_now().await;
  }
  engine.reset(None).unwrap();

  let error = pending.await.unwrap().unwrap_err();
  assert!(error.is_cancelled());
}

#[tokio::test]
async fn test_dataflow_eviction_on_removal_is_configurable() {
  let graph: Arc<MemoryGraph<Adder>> = Arc::new(MemoryGraph::new());
  let engine = Arc::new(
    DataflowEngine::new(Arc::clone(&graph))
      .with_config(EngineConfig::from_json(r#"{ "evict_on_remove": true }"#).unwrap()),
  );
  graph.subscribe(&engine);
  graph.add_node(Adder::new("a", 1)).unwrap();
  engine.fetch(&"a".into()).await.unwrap();

  graph.remove_node(&"a".into()).unwrap();

  assert!(engine.cached(&"a".into()).is_none());
}
