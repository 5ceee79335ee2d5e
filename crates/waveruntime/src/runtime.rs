use crate::coordinator::{RunContext, RunCoordinator};
use crate::graph::Graph;
use crate::resolver::{resolve_order, Wave};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;
use wavecore::{
    ConfiguredNode, EventBus, FlowError, NodeId, NodeRegistry, RegistryError, RunEvent, RunId,
    RunResult, ValidationError, Value, Workflow,
};
use wavenodes::NodeExecutor;

/// Main runtime for executing workflows
pub struct FlowRuntime {
    registry: Arc<NodeRegistry>,
    executor: Arc<NodeExecutor>,
    event_bus: Arc<EventBus>,
    coordinator: RunCoordinator,
    config: RuntimeConfig,
}

impl FlowRuntime {
    /// Runtime with the built-in registry and an AI provider taken from the
    /// environment.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_parts(Arc::new(NodeRegistry::builtin()), NodeExecutor::from_env(), config)
    }

    /// Runtime with an explicit registry and node executor
    pub fn with_parts(
        registry: Arc<NodeRegistry>,
        executor: NodeExecutor,
        config: RuntimeConfig,
    ) -> Self {
        let coordinator = RunCoordinator::new(config.max_parallel_nodes)
            .with_node_timeout(config.node_timeout_ms.map(Duration::from_millis));

        Self {
            registry,
            executor: Arc::new(executor),
            event_bus: Arc::new(EventBus::new(config.event_buffer_size)),
            coordinator,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Validate a workflow and compute its execution plan. Nothing runs.
    ///
    /// The plan owns a copy of the workflow's nodes, so later edits to the
    /// workflow never reach a run started from it.
    pub fn plan(&self, workflow: &Workflow) -> Result<RunPlan, ValidationError> {
        let nodes = workflow
            .nodes
            .iter()
            .map(|spec| {
                let descriptor = self.registry.lookup(spec.node_type).map_err(|e| match e {
                    RegistryError::NotFound(t) => ValidationError::UnknownNodeType(t),
                    other => invalid_config(&spec.id, other),
                })?;
                let config = descriptor
                    .merge(&spec.config)
                    .map_err(|e| invalid_config(&spec.id, e))?;

                Ok(ConfiguredNode {
                    id: spec.id.clone(),
                    label: spec.label.clone(),
                    config,
                    required: descriptor.required_fields(),
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        let graph = Graph::build(nodes, &workflow.edges)?;
        let waves = resolve_order(&graph)?;

        Ok(RunPlan {
            graph: Arc::new(graph),
            waves,
        })
    }

    /// Execute a workflow and wait for its result
    pub async fn execute(&self, workflow: &Workflow, payload: Value) -> Result<RunResult, FlowError> {
        self.start(workflow, payload)?.wait().await
    }

    /// Validate a workflow and start running it in the background.
    pub fn start(&self, workflow: &Workflow, payload: Value) -> Result<RunHandle, FlowError> {
        let plan = self.plan(workflow).map_err(|e| {
            tracing::warn!("Workflow {} invalid: {}", workflow.id, e);
            e
        })?;
        Ok(self.launch(workflow, plan, payload))
    }

    fn launch(&self, workflow: &Workflow, plan: RunPlan, payload: Value) -> RunHandle {
        let run_id = Uuid::new_v4();
        let cancellation = CancellationToken::new();

        self.event_bus.emit(RunEvent::RunStarted {
            run_id,
            workflow_id: workflow.id,
            node_count: plan.graph.node_count(),
            wave_count: plan.waves.len(),
            timestamp: chrono::Utc::now(),
        });

        let ctx = RunContext {
            run_id,
            executor: Arc::clone(&self.executor),
            event_bus: Arc::clone(&self.event_bus),
            cancellation: cancellation.clone(),
            trigger_payload: payload,
        };
        let coordinator = self.coordinator.clone();
        let span = tracing::info_span!("run", %run_id, workflow = %workflow.name);

        let join = tokio::spawn(
            async move {
                let RunPlan { graph, waves } = plan;
                coordinator.run(graph, &waves, &ctx).await
            }
            .instrument(span),
        );

        RunHandle {
            run_id,
            cancellation,
            join,
        }
    }

    /// Subscribe to run events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_config(node: &str, error: RegistryError) -> ValidationError {
    ValidationError::InvalidConfig {
        node: node.to_string(),
        reason: error.to_string(),
    }
}

/// Validated graph plus its execution waves.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub graph: Arc<Graph>,
    pub waves: Vec<Wave>,
}

impl RunPlan {
    /// Waves as node ids, for display.
    pub fn wave_ids(&self) -> Vec<Vec<NodeId>> {
        self.waves
            .iter()
            .map(|wave| wave.iter().map(|&idx| self.graph.node(idx).id.clone()).collect())
            .collect()
    }
}

/// Handle for monitoring and cancelling a run
pub struct RunHandle {
    run_id: RunId,
    cancellation: CancellationToken,
    join: JoinHandle<RunResult>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Request cancellation. Running nodes are asked to stop; nodes that
    /// have not started are skipped.
    pub fn cancel(&self) {
        tracing::info!("Cancelling run {}", self.run_id);
        self.cancellation.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub async fn wait(self) -> Result<RunResult, FlowError> {
        self.join
            .await
            .map_err(|e| FlowError::Execution(format!("Run task join error: {}", e)))
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    pub max_parallel_nodes: usize,
    pub event_buffer_size: usize,
    pub node_timeout_ms: Option<u64>,
}

impl RuntimeConfig {
    /// Defaults overridden by `WAVE_MAX_PARALLEL` and `WAVE_NODE_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_number("WAVE_MAX_PARALLEL") {
            config.max_parallel_nodes = n as usize;
        }
        if let Some(ms) = env_number("WAVE_NODE_TIMEOUT_MS") {
            config.node_timeout_ms = Some(ms);
        }
        config
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 10,
            event_buffer_size: 1000,
            node_timeout_ms: None,
        }
    }
}

fn env_number(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a number", name, raw);
            None
        }
    }
}
