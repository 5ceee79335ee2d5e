// crates/wavecore/tests/registry_test.rs

use serde_json::json;
use std::collections::BTreeMap;
use wavecore::{
    Category, ConfiguredNode, EventBus, MathOperation, NodeConfig, NodeRecord, NodeRegistry,
    NodeSpec, NodeStatus, NodeType, RegistryError, RunEvent, RunId, RunResult, RunStatus, Value,
    Workflow, WorkflowBuilder,
};

fn overrides(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("overrides must be an object"),
    }
}

#[test]
fn test_builtin_registry_covers_every_node_type() {
    let registry = NodeRegistry::builtin();

    for node_type in NodeType::ALL {
        let descriptor = registry.lookup(node_type).expect("builtin descriptor");
        assert_eq!(descriptor.node_type, node_type);
        assert_eq!(descriptor.default_config.node_type(), node_type);
    }
    assert_eq!(registry.list().len(), NodeType::ALL.len());
}

#[test]
fn test_merge_overlays_only_given_fields() {
    let registry = NodeRegistry::builtin();
    let descriptor = registry.lookup(NodeType::Math).unwrap();

    let config = descriptor
        .merge(&overrides(json!({ "operation": "add" })))
        .expect("merge should succeed");

    match config {
        NodeConfig::Math(math) => {
            assert_eq!(math.operation, MathOperation::Add);
            assert_eq!(math.operand, 2.0, "untouched fields keep their defaults");
            assert_eq!(math.field.as_deref(), Some("value"));
        }
        other => panic!("expected math config, got {:?}", other),
    }
}

#[test]
fn test_merge_with_no_overrides_returns_defaults() {
    let registry = NodeRegistry::builtin();
    let descriptor = registry.lookup(NodeType::Delay).unwrap();

    let config = descriptor.merge(&serde_json::Map::new()).unwrap();
    assert_eq!(config, NodeConfig::default_for(NodeType::Delay));
}

#[test]
fn test_merge_rejects_unknown_field() {
    let registry = NodeRegistry::builtin();
    let descriptor = registry.lookup(NodeType::Template).unwrap();

    let err = descriptor
        .merge(&overrides(json!({ "colour": "blue" })))
        .unwrap_err();
    assert_eq!(err, RegistryError::UnknownField("colour".to_string()));
}

#[test]
fn test_merge_rejects_value_of_wrong_type() {
    let registry = NodeRegistry::builtin();
    let descriptor = registry.lookup(NodeType::Math).unwrap();

    let err = descriptor
        .merge(&overrides(json!({ "operand": "lots" })))
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidValue(_)), "got {:?}", err);
}

#[test]
fn test_required_fields_follow_schema() {
    let registry = NodeRegistry::builtin();

    let ai = registry.lookup(NodeType::AiTextGenerator).unwrap();
    assert_eq!(ai.required_fields(), vec!["prompt", "model"]);

    let delay = registry.lookup(NodeType::Delay).unwrap();
    assert!(delay.required_fields().is_empty());
}

#[test]
fn test_missing_required_reports_empty_field() {
    let registry = NodeRegistry::builtin();
    let descriptor = registry.lookup(NodeType::AiTextGenerator).unwrap();

    let mut node = ConfiguredNode::new(
        "writer",
        descriptor.merge(&serde_json::Map::new()).unwrap(),
    );
    node.required = descriptor.required_fields();
    assert_eq!(node.missing_required(), Some("prompt"));

    node.config = descriptor
        .merge(&overrides(json!({ "prompt": "Say hi" })))
        .unwrap();
    assert_eq!(node.missing_required(), None);
}

#[test]
fn test_builder_generates_session_scoped_ids() {
    let mut first = WorkflowBuilder::new("first");
    let a = first.add_node(NodeType::Webhook);
    let b = first.add_node(NodeType::Math);
    let edge = first.connect(&a, &b);

    let mut second = WorkflowBuilder::new("second");
    let c = second.add_node(NodeType::Webhook);

    assert_eq!(a, "node-1");
    assert_eq!(b, "node-2");
    assert_eq!(edge, "node-1-node-2");
    assert_eq!(c, "node-1", "each builder counts from one");

    let workflow = first.build();
    assert_eq!(workflow.nodes.len(), 2);
    assert_eq!(workflow.edges.len(), 1);
}

#[test]
fn test_builder_configure_sets_overrides() {
    let mut builder = WorkflowBuilder::new("configured");
    let node = builder.add_node(NodeType::Math);
    builder
        .configure(&node, "operation", "divide")
        .configure(&node, "operand", 4);

    let workflow = builder.build();
    let spec = workflow.find_node(&node).unwrap();
    assert_eq!(spec.config.get("operation"), Some(&json!("divide")));
    assert_eq!(spec.config.get("operand"), Some(&json!(4)));
}

#[test]
fn test_builder_skips_ids_taken_by_explicit_specs() {
    let mut builder = WorkflowBuilder::new("mixed");
    builder.add_spec(NodeSpec::new("node-1", NodeType::Webhook));
    let generated = builder.add_node(NodeType::Math);
    assert_eq!(generated, "node-2");

    let workflow = builder.build();
    let ids: Vec<_> = workflow.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["node-1", "node-2"]);
}

#[test]
fn test_builder_configure_ignores_unknown_node() {
    let mut builder = WorkflowBuilder::new("configured");
    let node = builder.add_node(NodeType::Math);
    builder
        .configure("ghost", "operation", "add")
        .configure(&node, "operand", 3);

    let workflow = builder.build();
    assert_eq!(workflow.nodes.len(), 1);
    let spec = workflow.find_node(&node).unwrap();
    assert_eq!(spec.config.get("operation"), None);
    assert_eq!(spec.config.get("operand"), Some(&json!(3)));
}

#[test]
fn test_terminal_statuses() {
    assert!(!NodeStatus::Pending.is_terminal());
    assert!(!NodeStatus::Running.is_terminal());
    assert!(NodeStatus::Succeeded.is_terminal());
    assert!(NodeStatus::Failed.is_terminal());
    assert!(NodeStatus::Skipped.is_terminal());
}

#[test]
fn test_only_trigger_category_counts_as_trigger() {
    for node_type in NodeType::ALL {
        assert_eq!(
            node_type.is_trigger(),
            node_type.category() == Category::Trigger,
            "{:?}",
            node_type
        );
    }
    assert!(NodeType::Webhook.is_trigger());
    assert!(NodeType::Schedule.is_trigger());
    assert!(!NodeType::Delay.is_trigger());
}

#[tokio::test]
async fn test_zero_capacity_event_bus_still_delivers() {
    let bus = EventBus::new(0);
    let mut events = bus.subscribe();

    bus.create_emitter(RunId::nil(), "n".to_string()).info("hello");

    match events.recv().await.unwrap() {
        RunEvent::NodeEvent { node_id, .. } => assert_eq!(node_id, "n"),
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_workflow_document_round_trips_through_json() {
    let raw = json!({
        "name": "doc",
        "nodes": [
            { "id": "hook", "type": "webhook" },
            { "id": "gen", "type": "aiTextGenerator", "config": { "prompt": "hi" } }
        ],
        "edges": [ { "id": "e1", "source": "hook", "target": "gen" } ]
    });

    let workflow: Workflow = serde_json::from_value(raw).expect("workflow parses");
    assert_eq!(workflow.nodes[1].node_type, NodeType::AiTextGenerator);
    assert_eq!(workflow.edges[0].target, "gen");
}

#[test]
fn test_unknown_node_type_fails_to_parse() {
    let raw = json!({
        "name": "doc",
        "nodes": [ { "id": "x", "type": "teleport" } ]
    });
    assert!(serde_json::from_value::<Workflow>(raw).is_err());
}

#[test]
fn test_run_result_serialization_shape() {
    let mut nodes = BTreeMap::new();
    nodes.insert(
        "double".to_string(),
        NodeRecord {
            status: NodeStatus::Succeeded,
            output: Some(Value::Number(6.0)),
            error: None,
        },
    );
    let result = RunResult {
        nodes,
        overall_status: RunStatus::PartiallyFailed,
    };

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["overallStatus"], "partiallyFailed");
    assert_eq!(json["nodes"]["double"]["status"], "succeeded");
    assert_eq!(json["nodes"]["double"]["output"], 6.0);
    assert_eq!(result.count(NodeStatus::Succeeded), 1);
}

#[test]
fn test_value_paths_and_emptiness() {
    let value = Value::from(json!({ "user": { "tags": ["a", "b"] }, "blank": "  " }));

    assert_eq!(value.get_path("user.tags.1"), Some(&Value::from("b")));
    assert_eq!(value.get_path("user.missing"), None);
    assert!(value.get_path("blank").unwrap().is_empty());
    assert!(!Value::Number(0.0).is_empty());
}
