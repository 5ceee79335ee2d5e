// crates/wavecli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;
use wavecore::{
    NodeEvent, NodeRegistry, NodeStatus, NodeType, RunEvent, RunStatus, Value, Workflow,
    WorkflowBuilder,
};
use wavenodes::NodeExecutor;
use waveruntime::{FlowRuntime, RuntimeConfig};

#[derive(Parser)]
#[command(name = "wave")]
#[command(about = "Wave workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Trigger payload as JSON
        #[arg(short, long)]
        input: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Maximum number of nodes running at once
        #[arg(long)]
        max_parallel: Option<usize>,

        /// Per-node timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Validate a workflow file and print its execution waves
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            verbose,
            max_parallel,
            timeout_ms,
        } => {
            init_logging(verbose);

            let mut config = RuntimeConfig::from_env();
            if let Some(n) = max_parallel {
                config.max_parallel_nodes = n;
            }
            if timeout_ms.is_some() {
                config.node_timeout_ms = timeout_ms;
            }

            let status = run_workflow(file, input, config).await?;
            if matches!(status, RunStatus::Failed | RunStatus::Cancelled) {
                std::process::exit(1);
            }
        }

        Commands::Validate { file } => {
            init_logging(false);
            validate_workflow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn load_workflow(file: &PathBuf) -> Result<Workflow> {
    let workflow_json = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let workflow: Workflow = serde_json::from_str(&workflow_json)
        .with_context(|| format!("parsing {}", file.display()))?;
    Ok(workflow)
}

async fn run_workflow(
    file: PathBuf,
    input: Option<String>,
    config: RuntimeConfig,
) -> Result<RunStatus> {
    println!("🚀 Loading workflow from: {}", file.display());
    let workflow = load_workflow(&file)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    println!();

    let payload = match input {
        Some(input_str) => {
            let json: serde_json::Value =
                serde_json::from_str(&input_str).context("input must be valid JSON")?;
            Value::from(json)
        }
        None => Value::Null,
    };

    let runtime = FlowRuntime::with_parts(
        Arc::new(NodeRegistry::builtin()),
        NodeExecutor::from_env(),
        config,
    );

    let events = runtime.subscribe_events();
    let event_task = tokio::spawn(forward_events(events, print_event));

    let handle = runtime.start(&workflow, payload)?;
    let cancel = handle.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("🛑 Interrupted, cancelling run");
            cancel.cancel();
        }
    });

    let result = handle.wait().await?;
    interrupt.abort();

    // Let the event printer drain
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📊 Run Summary: {:?}", result.overall_status);
    println!(
        "   Succeeded: {}  Failed: {}  Skipped: {}",
        result.count(NodeStatus::Succeeded),
        result.count(NodeStatus::Failed),
        result.count(NodeStatus::Skipped)
    );
    println!();

    for (node_id, record) in &result.nodes {
        match (&record.output, &record.error) {
            (Some(output), _) => println!("   {} [{:?}]: {}", node_id, record.status, output),
            (None, Some(error)) => println!("   {} [{:?}]: {}", node_id, record.status, error),
            (None, None) => println!("   {} [{:?}]", node_id, record.status),
        }
    }

    Ok(result.overall_status)
}

/// Hand every event to `sink` until the bus closes. A lagging receiver
/// skips the overflow and keeps going.
async fn forward_events(mut events: broadcast::Receiver<RunEvent>, mut sink: impl FnMut(RunEvent)) {
    loop {
        match events.recv().await {
            Ok(event) => sink(event),
            Err(RecvError::Lagged(n)) => {
                tracing::warn!("Event printer lagged, dropped {} events", n);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_event(event: RunEvent) {
    match event {
        RunEvent::RunStarted { node_count, wave_count, .. } => {
            println!("▶️  Run started ({} nodes in {} waves)", node_count, wave_count);
        }
        RunEvent::WaveStarted { wave, nodes, .. } => {
            println!("  🌊 Wave {}: {}", wave, nodes.join(", "));
        }
        RunEvent::NodeStarted { node_id, node_type, .. } => {
            println!("  ⚡ Starting node: {} ({})", node_id, node_type);
        }
        RunEvent::NodeSucceeded { node_id, duration_ms, .. } => {
            println!("  ✅ Node {} completed in {}ms", node_id, duration_ms);
        }
        RunEvent::NodeFailed { node_id, error, .. } => {
            println!("  ❌ Node {} failed: {}", node_id, error);
        }
        RunEvent::NodeSkipped { node_id, reason, .. } => {
            println!("  ⏭️  Node {} skipped: {}", node_id, reason);
        }
        RunEvent::NodeEvent { node_id, event, .. } => match event {
            NodeEvent::Info { message } => {
                println!("     ℹ️  [{}] {}", node_id, message);
            }
            NodeEvent::Warning { message } => {
                println!("     ⚠️  [{}] {}", node_id, message);
            }
            NodeEvent::Progress { percent, message } => match message {
                Some(msg) => println!("     📊 [{}] {}% - {}", node_id, percent, msg),
                None => println!("     📊 [{}] {}%", node_id, percent),
            },
        },
        RunEvent::RunFinished { status, duration_ms, .. } => match status {
            RunStatus::Succeeded => println!("✨ Run succeeded in {}ms", duration_ms),
            other => println!("💥 Run finished as {:?} after {}ms", other, duration_ms),
        },
    }
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(&file)?;
    let runtime = FlowRuntime::with_parts(
        Arc::new(NodeRegistry::builtin()),
        NodeExecutor::new(),
        RuntimeConfig::default(),
    );

    match runtime.plan(&workflow) {
        Ok(plan) => {
            println!("✅ Workflow is valid:");
            println!("   Name: {}", workflow.name);
            println!("   Nodes: {}", workflow.nodes.len());
            println!("   Edges: {}", workflow.edges.len());
            println!();
            println!("   Execution waves:");
            for (i, wave) in plan.wave_ids().iter().enumerate() {
                println!("     {}: {}", i, wave.join(", "));
            }
            Ok(())
        }
        Err(e) => {
            println!("❌ Workflow invalid: {}", e);
            Err(anyhow::anyhow!("workflow invalid"))
        }
    }
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = NodeRegistry::builtin();
    for descriptor in registry.list() {
        println!(
            "  • {} - {} ({:?})",
            descriptor.node_type, descriptor.label, descriptor.category
        );
        println!("    {}", descriptor.description);
        let required = descriptor.required_fields();
        if !required.is_empty() {
            println!("    required: {}", required.join(", "));
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut builder = WorkflowBuilder::new("Example Math Workflow")
        .description("Doubles the incoming value, then adds ten");

    let trigger = builder.add_node(NodeType::Webhook);
    let double = builder.add_node(NodeType::Math);
    builder
        .configure(&double, "operation", "multiply")
        .configure(&double, "operand", 2);
    let add = builder.add_node(NodeType::Math);
    builder
        .configure(&add, "operation", "add")
        .configure(&add, "operand", 10);

    builder.connect(&trigger, &double);
    builder.connect(&double, &add);

    let workflow = builder.build();
    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  wave run --file {} --input '{{\"value\": 21}}'",
        output.display()
    );

    Ok(())
}
