use tokio::time::{sleep, Duration};
use wavecore::{DelayConfig, NodeContext, NodeExecutionError, NodeInputs, Value};

/// Wait for the configured duration, then pass the input through.
/// Returns early with `Cancelled` when the run is cancelled.
pub async fn delay(
    config: &DelayConfig,
    inputs: &NodeInputs,
    ctx: &NodeContext,
) -> Result<Value, NodeExecutionError> {
    ctx.events
        .progress(0.0, Some(format!("waiting {}ms", config.duration_ms)));

    tokio::select! {
        _ = sleep(Duration::from_millis(config.duration_ms)) => {}
        _ = ctx.cancellation.cancelled() => return Err(NodeExecutionError::Cancelled),
    }
    ctx.events.progress(100.0, None);

    Ok(match inputs.len() {
        0 => Value::Null,
        1 => inputs.single()?.clone(),
        _ => inputs.to_value(),
    })
}
