//! Tests for engine configuration.

use crate::config::{EngineConfig, resolve_ports};
use crate::node::PortLayout;
use crate::test_support::{ExecutionLog, SignalNode};
use std::sync::Arc;

#[test]
fn test_default_preserves_cache_on_remove() {
  assert!(!EngineConfig::default().evict_on_remove);
}

#[test]
fn test_from_json() {
  let config = EngineConfig::from_json(r#"{ "evict_on_remove": true }"#).unwrap();
  assert!(config.evict_on_remove);
}

#[test]
fn test_from_json_missing_fields_use_defaults() {
  let config = EngineConfig::from_json("{}").unwrap();
  assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_from_json_rejects_wrong_types() {
  assert!(EngineConfig::from_json(r#"{ "evict_on_remove": "yes" }"#).is_err());
}

#[test]
fn test_builder() {
  let config = EngineConfig::default().with_evict_on_remove(true);
  assert!(config.evict_on_remove);
}

#[test]
fn test_resolve_ports_without_override_reads_node() {
  let log = ExecutionLog::default();
  let node = SignalNode::new("a", &[], &log).with_outputs(&["then", "else"]);

  let layout = resolve_ports(None, &node);

  assert_eq!(layout, PortLayout::new(["in"], ["then", "else"]));
}

#[test]
fn test_resolve_ports_with_override() {
  let log = ExecutionLog::default();
  let node = SignalNode::new("a", &[], &log);
  let configure: crate::Configure<SignalNode> =
    Arc::new(|_node: &SignalNode| PortLayout::new(["x"], Vec::<String>::new()));

  let layout = resolve_ports(Some(&configure), &node);

  assert_eq!(layout.inputs, vec!["x".to_string()]);
  assert!(layout.outputs.is_empty());
}
