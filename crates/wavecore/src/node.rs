use crate::{events::EventEmitter, NodeConfig, NodeExecutionError, NodeId, NodeType, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// A node whose configuration has been merged with its registry defaults
/// and parsed into the typed record for its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredNode {
    pub id: NodeId,
    pub label: Option<String>,
    pub config: NodeConfig,
    /// Fields that must be non-empty before the node may run.
    pub required: Vec<String>,
}

impl ConfiguredNode {
    pub fn new(id: impl Into<NodeId>, config: NodeConfig) -> Self {
        Self {
            id: id.into(),
            label: None,
            config,
            required: Vec::new(),
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.config.node_type()
    }

    /// First required field that is missing or empty.
    pub fn missing_required(&self) -> Option<&str> {
        let fields = self.config.fields();
        self.required
            .iter()
            .find(|name| {
                fields
                    .get(name.as_str())
                    .map(|v| Value::from(v.clone()).is_empty())
                    .unwrap_or(true)
            })
            .map(String::as_str)
    }
}

/// Outputs of a node's predecessors, keyed by predecessor id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeInputs {
    values: BTreeMap<NodeId, Value>,
}

impl NodeInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<NodeId>, value: Value) {
        self.values.insert(source.into(), value);
    }

    pub fn get(&self, source: &str) -> Option<&Value> {
        self.values.get(source)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Value)> {
        self.values.iter()
    }

    /// The only input of a single-input behavior.
    pub fn single(&self) -> Result<&Value, NodeExecutionError> {
        let mut values = self.values.values();
        match (values.next(), values.next()) {
            (Some(value), None) => Ok(value),
            (None, _) => Err(NodeExecutionError::transform("node has no upstream input")),
            (Some(_), Some(_)) => Err(NodeExecutionError::transform(format!(
                "node expects a single input but received {}",
                self.values.len()
            ))),
        }
    }

    /// All inputs as an object keyed by source id.
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

impl FromIterator<(NodeId, Value)> for NodeInputs {
    fn from_iter<T: IntoIterator<Item = (NodeId, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Execution context passed to each node
#[derive(Clone)]
pub struct NodeContext {
    pub node_id: NodeId,

    /// Payload the run was triggered with, if any
    pub trigger_payload: Value,

    /// Event emitter for real-time updates
    pub events: EventEmitter,

    /// Fires when the run is cancelled
    pub cancellation: CancellationToken,
}

impl NodeContext {
    pub fn new(node_id: impl Into<NodeId>, events: EventEmitter) -> Self {
        Self {
            node_id: node_id.into(),
            trigger_payload: Value::Null,
            events,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.trigger_payload = payload;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}
