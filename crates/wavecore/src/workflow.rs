use crate::NodeType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type WorkflowId = Uuid;
pub type NodeId = String;
pub type EdgeId = String;

/// Workflow document as edited by the canvas. Handed to the runtime as a
/// snapshot; the runtime copies what it needs before a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default = "Uuid::new_v4")]
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Node placed on the canvas. `config` holds only the user's overrides;
/// registry defaults fill in the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub position: Option<Position>,
}

impl NodeSpec {
    pub fn new(id: impl Into<NodeId>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            label: None,
            config: serde_json::Map::new(),
            position: None,
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }
}

/// Directed connection: the source's output becomes part of the target's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

impl EdgeSpec {
    /// Edge whose id is derived from its endpoints.
    pub fn between(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{}-{}", source, target),
            source,
            target,
        }
    }
}

/// Node position in visual editor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Builds a workflow with ids generated for this session only, so
/// workflows assembled concurrently never share a counter.
pub struct WorkflowBuilder {
    workflow: Workflow,
    next_id: u64,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            workflow: Workflow::new(name),
            next_id: 1,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.workflow.description = Some(description.into());
        self
    }

    /// Add a node of `node_type` with a generated `node-N` id. Ids already
    /// taken by [`add_spec`](Self::add_spec) are skipped.
    pub fn add_node(&mut self, node_type: NodeType) -> NodeId {
        let id = loop {
            let candidate = format!("node-{}", self.next_id);
            self.next_id += 1;
            if self.workflow.find_node(&candidate).is_none() {
                break candidate;
            }
        };
        self.add_spec(NodeSpec::new(id, node_type))
    }

    /// Add a fully specified node. Its id is kept as given.
    pub fn add_spec(&mut self, spec: NodeSpec) -> NodeId {
        let id = spec.id.clone();
        self.workflow.nodes.push(spec);
        id
    }

    /// Set a config override on a node that was already added. An unknown
    /// node id leaves the workflow untouched and logs a warning.
    pub fn configure(
        &mut self,
        node: &str,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> &mut Self {
        let key = key.into();
        match self.workflow.nodes.iter_mut().find(|n| n.id == node) {
            Some(spec) => {
                spec.config.insert(key, value.into());
            }
            None => tracing::warn!(node_id = %node, %key, "configure called for unknown node"),
        }
        self
    }

    pub fn connect(&mut self, source: &str, target: &str) -> EdgeId {
        let edge = EdgeSpec::between(source, target);
        let id = edge.id.clone();
        self.workflow.edges.push(edge);
        id
    }

    pub fn build(self) -> Workflow {
        self.workflow
    }
}
