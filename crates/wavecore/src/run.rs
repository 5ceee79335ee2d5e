use crate::{NodeId, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-node lifecycle: `pending -> running -> succeeded | failed`, or
/// `skipped` when the node never ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeStatus::Succeeded | NodeStatus::Failed | NodeStatus::Skipped
        )
    }
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Succeeded,
    Failed,
    PartiallyFailed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub status: NodeStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl NodeRecord {
    pub fn pending() -> Self {
        Self {
            status: NodeStatus::Pending,
            output: None,
            error: None,
        }
    }
}

/// Result of one run, keyed by node id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub nodes: BTreeMap<NodeId, NodeRecord>,
    pub overall_status: RunStatus,
}

impl RunResult {
    pub fn node(&self, id: &str) -> Option<&NodeRecord> {
        self.nodes.get(id)
    }

    pub fn status_of(&self, id: &str) -> Option<NodeStatus> {
        self.nodes.get(id).map(|r| r.status)
    }

    pub fn output_of(&self, id: &str) -> Option<&Value> {
        self.nodes.get(id).and_then(|r| r.output.as_ref())
    }

    pub fn count(&self, status: NodeStatus) -> usize {
        self.nodes.values().filter(|r| r.status == status).count()
    }
}
