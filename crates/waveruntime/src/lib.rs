//! Workflow execution runtime
//!
//! Builds the validated graph, resolves it into execution waves and runs
//! the waves with bounded parallelism.

mod coordinator;
mod graph;
mod resolver;
mod runtime;

pub use coordinator::{RunContext, RunCoordinator};
pub use graph::Graph;
pub use resolver::{resolve_order, Wave};
pub use runtime::{FlowRuntime, RunHandle, RunPlan, RuntimeConfig};
