use std::collections::BTreeMap;
use wavecore::{NodeContext, NodeExecutionError, ScheduleConfig, Value, WebhookConfig};

/// Entry point for HTTP-triggered runs. Emits the payload the run was
/// started with, or echoes its own configuration when there is none.
pub fn webhook(config: &WebhookConfig, ctx: &NodeContext) -> Result<Value, NodeExecutionError> {
    if !ctx.trigger_payload.is_null() {
        ctx.events.info(format!(
            "{} {} received payload",
            config.method.as_str(),
            config.path
        ));
        return Ok(ctx.trigger_payload.clone());
    }

    let mut echo = BTreeMap::new();
    echo.insert("method".to_string(), Value::from(config.method.as_str()));
    echo.insert("path".to_string(), Value::from(config.path.as_str()));
    Ok(Value::Object(echo))
}

/// Entry point for time-triggered runs. Recurrence itself is driven by
/// whoever starts the run; the node only describes the schedule.
pub fn schedule(config: &ScheduleConfig, ctx: &NodeContext) -> Result<Value, NodeExecutionError> {
    if !ctx.trigger_payload.is_null() {
        return Ok(ctx.trigger_payload.clone());
    }

    let mut echo = BTreeMap::new();
    echo.insert("cron".to_string(), Value::from(config.cron.as_str()));
    echo.insert("timezone".to_string(), Value::from(config.timezone.as_str()));
    Ok(Value::Object(echo))
}
