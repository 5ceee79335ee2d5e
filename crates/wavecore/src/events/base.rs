use crate::{NodeId, NodeType, RunStatus, Value, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type RunId = Uuid;

/// Events emitted during a workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunEvent {
    #[serde(rename_all = "camelCase")]
    RunStarted {
        run_id: RunId,
        workflow_id: WorkflowId,
        node_count: usize,
        wave_count: usize,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    WaveStarted {
        run_id: RunId,
        wave: usize,
        nodes: Vec<NodeId>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    NodeStarted {
        run_id: RunId,
        node_id: NodeId,
        node_type: NodeType,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    NodeSucceeded {
        run_id: RunId,
        node_id: NodeId,
        output: Value,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    NodeFailed {
        run_id: RunId,
        node_id: NodeId,
        error: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    NodeSkipped {
        run_id: RunId,
        node_id: NodeId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    NodeEvent {
        run_id: RunId,
        node_id: NodeId,
        event: NodeEvent,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    RunFinished {
        run_id: RunId,
        status: RunStatus,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Events specific to node execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "camelCase")]
pub enum NodeEvent {
    Info { message: String },
    Warning { message: String },
    Progress { percent: f64, message: Option<String> },
}

/// Event emitter for nodes to send real-time updates
#[derive(Clone)]
pub struct EventEmitter {
    run_id: RunId,
    node_id: NodeId,
    sender: broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new(run_id: RunId, node_id: NodeId, sender: broadcast::Sender<RunEvent>) -> Self {
        Self {
            run_id,
            node_id,
            sender,
        }
    }

    /// Emitter whose events go nowhere. Useful when a behavior runs outside a run.
    pub fn detached(node_id: impl Into<NodeId>) -> Self {
        let (sender, _) = broadcast::channel(1);
        Self::new(Uuid::nil(), node_id.into(), sender)
    }

    /// Emit a node-specific event
    pub fn emit(&self, event: NodeEvent) {
        let _ = self.sender.send(RunEvent::NodeEvent {
            run_id: self.run_id,
            node_id: self.node_id.clone(),
            event,
            timestamp: Utc::now(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(NodeEvent::Info {
            message: message.into(),
        });
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(NodeEvent::Warning {
            message: message.into(),
        });
    }

    pub fn progress(&self, percent: f64, message: Option<String>) {
        self.emit(NodeEvent::Progress { percent, message });
    }
}

/// Broadcast bus shared by all runs of a runtime
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    /// Capacity is clamped to at least one slot.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }

    /// Send an event; having no subscribers is not an error.
    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn create_emitter(&self, run_id: RunId, node_id: NodeId) -> EventEmitter {
        EventEmitter::new(run_id, node_id, self.sender.clone())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
