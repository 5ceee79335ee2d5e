use crate::graph::Graph;
use crate::resolver::Wave;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use petgraph::graph::NodeIndex;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use wavecore::{
    EventBus, NodeContext, NodeExecutionError, NodeInputs, NodeRecord, NodeStatus, RunEvent,
    RunId, RunResult, RunStatus, Value,
};
use wavenodes::NodeExecutor;

/// Everything a single run needs besides the graph.
#[derive(Clone)]
pub struct RunContext {
    pub run_id: RunId,
    pub executor: Arc<NodeExecutor>,
    pub event_bus: Arc<EventBus>,
    pub cancellation: CancellationToken,
    pub trigger_payload: Value,
}

/// Drives a run wave by wave.
///
/// Nodes inside a wave run as concurrent tasks, at most `max_parallel` at a
/// time. A wave finishes completely before the next one starts. Per-node
/// records are owned by the coordinator; tasks hand their outcome back
/// through their join handle.
#[derive(Debug, Clone)]
pub struct RunCoordinator {
    max_parallel: usize,
    node_timeout: Option<Duration>,
}

type TaskOutcome = (Result<Value, NodeExecutionError>, u64);
type Joined = (NodeIndex, Result<TaskOutcome, tokio::task::JoinError>);

impl RunCoordinator {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            node_timeout: None,
        }
    }

    pub fn with_node_timeout(mut self, node_timeout: Option<Duration>) -> Self {
        self.node_timeout = node_timeout;
        self
    }

    pub async fn run(&self, graph: Arc<Graph>, waves: &[Wave], ctx: &RunContext) -> RunResult {
        let started = Instant::now();
        let mut records = vec![NodeRecord::pending(); graph.node_count()];
        let mut interrupted = false;

        tracing::info!(
            "Starting run {} ({} nodes, {} waves)",
            ctx.run_id,
            graph.node_count(),
            waves.len()
        );

        for (wave_no, wave) in waves.iter().enumerate() {
            if ctx.cancellation.is_cancelled() {
                tracing::warn!("Run {} cancelled before wave {}", ctx.run_id, wave_no);
                break;
            }

            tracing::debug!("Wave {}: {} nodes", wave_no, wave.len());
            ctx.event_bus.emit(RunEvent::WaveStarted {
                run_id: ctx.run_id,
                wave: wave_no,
                nodes: wave.iter().map(|&idx| graph.node(idx).id.clone()).collect(),
                timestamp: Utc::now(),
            });

            let mut running: FuturesUnordered<BoxFuture<'static, Joined>> = FuturesUnordered::new();

            for &idx in wave {
                if let Some(reason) = blocked_by(&graph, idx, &records) {
                    self.skip(&graph, idx, &mut records, ctx, reason);
                    continue;
                }
                if ctx.cancellation.is_cancelled() {
                    break;
                }

                // Hold the wave at the concurrency limit until a slot frees up
                while running.len() >= self.max_parallel {
                    if let Some((done, outcome)) = running.next().await {
                        interrupted |= self.record(&graph, done, outcome, &mut records, ctx);
                    }
                }

                let inputs = collect_inputs(&graph, idx, &records);
                records[idx.index()].status = NodeStatus::Running;

                let node = graph.node(idx);
                ctx.event_bus.emit(RunEvent::NodeStarted {
                    run_id: ctx.run_id,
                    node_id: node.id.clone(),
                    node_type: node.node_type(),
                    timestamp: Utc::now(),
                });

                let span = tracing::info_span!("node", node_id = %node.id);
                let handle = tokio::spawn(
                    self.node_task(Arc::clone(&graph), idx, inputs, ctx)
                        .instrument(span),
                );
                running.push(async move { (idx, handle.await) }.boxed());
            }

            while let Some((done, outcome)) = running.next().await {
                interrupted |= self.record(&graph, done, outcome, &mut records, ctx);
            }
        }

        // Whatever never started was cut off by cancellation
        for (idx, _) in graph.all_nodes() {
            if !records[idx.index()].status.is_terminal() {
                interrupted = true;
                self.skip(&graph, idx, &mut records, ctx, "run cancelled".to_string());
            }
        }

        let overall_status = overall_status(&graph, &records, interrupted);
        let duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            "Run {} finished as {:?} in {}ms",
            ctx.run_id,
            overall_status,
            duration_ms
        );
        ctx.event_bus.emit(RunEvent::RunFinished {
            run_id: ctx.run_id,
            status: overall_status,
            duration_ms,
            timestamp: Utc::now(),
        });

        RunResult {
            nodes: graph
                .all_nodes()
                .map(|(idx, node)| (node.id.clone(), records[idx.index()].clone()))
                .collect(),
            overall_status,
        }
    }

    fn node_task(
        &self,
        graph: Arc<Graph>,
        idx: NodeIndex,
        inputs: NodeInputs,
        ctx: &RunContext,
    ) -> impl std::future::Future<Output = TaskOutcome> + Send + 'static {
        let node_ctx = NodeContext::new(
            graph.node(idx).id.clone(),
            ctx.event_bus.create_emitter(ctx.run_id, graph.node(idx).id.clone()),
        )
        .with_payload(ctx.trigger_payload.clone())
        .with_cancellation(ctx.cancellation.child_token());
        let executor = Arc::clone(&ctx.executor);
        let node_timeout = self.node_timeout;

        async move {
            let start = Instant::now();
            let node = graph.node(idx);
            let execution = executor.execute(node, &inputs, &node_ctx);

            let result = match node_timeout {
                Some(limit) => match timeout(limit, execution).await {
                    Ok(result) => result,
                    Err(_) => Err(NodeExecutionError::Timeout {
                        ms: limit.as_millis() as u64,
                    }),
                },
                None => execution.await,
            };

            (result, start.elapsed().as_millis() as u64)
        }
    }

    /// Store a finished task's outcome. Returns true when the node was cut
    /// short by cancellation.
    fn record(
        &self,
        graph: &Graph,
        idx: NodeIndex,
        outcome: Result<TaskOutcome, tokio::task::JoinError>,
        records: &mut [NodeRecord],
        ctx: &RunContext,
    ) -> bool {
        let node_id = graph.node(idx).id.clone();
        let (result, duration_ms) = match outcome {
            Ok(outcome) => outcome,
            Err(join_err) => {
                tracing::error!("Node {} task aborted: {}", node_id, join_err);
                (
                    Err(NodeExecutionError::transform(format!(
                        "node task aborted: {}",
                        join_err
                    ))),
                    0,
                )
            }
        };

        let record = &mut records[idx.index()];
        match result {
            Ok(output) => {
                tracing::info!("Node {} completed in {}ms", node_id, duration_ms);
                ctx.event_bus.emit(RunEvent::NodeSucceeded {
                    run_id: ctx.run_id,
                    node_id,
                    output: output.clone(),
                    duration_ms,
                    timestamp: Utc::now(),
                });
                record.status = NodeStatus::Succeeded;
                record.output = Some(output);
                false
            }
            Err(NodeExecutionError::Cancelled) => {
                tracing::warn!("Node {} interrupted by cancellation", node_id);
                record.status = NodeStatus::Skipped;
                ctx.event_bus.emit(RunEvent::NodeSkipped {
                    run_id: ctx.run_id,
                    node_id,
                    reason: "run cancelled".to_string(),
                    timestamp: Utc::now(),
                });
                true
            }
            Err(e) => {
                tracing::error!("Node {} failed: {}", node_id, e);
                ctx.event_bus.emit(RunEvent::NodeFailed {
                    run_id: ctx.run_id,
                    node_id,
                    error: e.to_string(),
                    duration_ms,
                    timestamp: Utc::now(),
                });
                record.status = NodeStatus::Failed;
                record.error = Some(e.to_string());
                false
            }
        }
    }

    fn skip(
        &self,
        graph: &Graph,
        idx: NodeIndex,
        records: &mut [NodeRecord],
        ctx: &RunContext,
        reason: String,
    ) {
        let node_id = graph.node(idx).id.clone();
        tracing::debug!("Skipping node {}: {}", node_id, reason);
        records[idx.index()].status = NodeStatus::Skipped;
        ctx.event_bus.emit(RunEvent::NodeSkipped {
            run_id: ctx.run_id,
            node_id,
            reason,
            timestamp: Utc::now(),
        });
    }
}

/// Reason a node may not run, if any predecessor did not succeed.
fn blocked_by(graph: &Graph, idx: NodeIndex, records: &[NodeRecord]) -> Option<String> {
    graph.predecessors(idx).into_iter().find_map(|pred| {
        let status = records[pred.index()].status;
        let verb = if !status.is_terminal() {
            "did not finish"
        } else {
            match status {
                NodeStatus::Succeeded => return None,
                NodeStatus::Failed => "failed",
                _ => "was skipped",
            }
        };
        Some(format!("upstream node '{}' {}", graph.node(pred).id, verb))
    })
}

/// `Succeeded` when every node succeeded; `Failed` when nothing downstream
/// of an entry point succeeded (every node when there are only entry
/// points); `PartiallyFailed` otherwise.
fn overall_status(graph: &Graph, records: &[NodeRecord], interrupted: bool) -> RunStatus {
    if interrupted {
        return RunStatus::Cancelled;
    }
    if records.iter().all(|r| r.status == NodeStatus::Succeeded) {
        return RunStatus::Succeeded;
    }

    let downstream: Vec<NodeIndex> = graph
        .all_nodes()
        .map(|(idx, _)| idx)
        .filter(|&idx| graph.in_degree(idx) > 0)
        .collect();
    let considered: Vec<NodeIndex> = if downstream.is_empty() {
        graph.all_nodes().map(|(idx, _)| idx).collect()
    } else {
        downstream
    };

    if considered
        .iter()
        .any(|idx| records[idx.index()].status == NodeStatus::Succeeded)
    {
        RunStatus::PartiallyFailed
    } else {
        RunStatus::Failed
    }
}
