use crate::template;
use wavecore::{
    JsonParseConfig, JsonStringifyConfig, MathConfig, MathOperation, NodeContext, NodeExecutionError,
    NodeInputs, SetFieldsConfig, TemplateConfig, Value,
};

/// Arithmetic on a numeric input, or on a numeric field of an object input.
pub fn math(config: &MathConfig, inputs: &NodeInputs) -> Result<Value, NodeExecutionError> {
    let input = inputs.single()?;
    let path = config.field.as_deref().unwrap_or("");

    let number = match input {
        Value::Number(n) => *n,
        other => match other.get_path(path) {
            Some(Value::Number(n)) => *n,
            Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
                NodeExecutionError::transform(format!("field '{}' is not numeric: {:?}", path, s))
            })?,
            _ => {
                return Err(NodeExecutionError::transform(format!(
                    "input has no numeric field '{}'",
                    path
                )))
            }
        },
    };

    let result = match config.operation {
        MathOperation::Add => number + config.operand,
        MathOperation::Subtract => number - config.operand,
        MathOperation::Multiply => number * config.operand,
        MathOperation::Divide => {
            if config.operand == 0.0 {
                return Err(NodeExecutionError::transform("division by zero"));
            }
            number / config.operand
        }
    };

    Ok(Value::Number(result))
}

/// Render a text template against the upstream outputs.
pub fn render_template(
    config: &TemplateConfig,
    inputs: &NodeInputs,
) -> Result<Value, NodeExecutionError> {
    let scope = template::scope(inputs);
    Ok(Value::String(template::render(&config.template, &scope)))
}

/// Add or overwrite fields on an object. String field values are rendered
/// as templates, so `{{input.name}}` copies data from upstream.
pub fn set_fields(config: &SetFieldsConfig, inputs: &NodeInputs) -> Result<Value, NodeExecutionError> {
    let mut object = if config.keep_input {
        match inputs.single()? {
            Value::Object(map) => map.clone(),
            Value::Null => Default::default(),
            _ => {
                return Err(NodeExecutionError::transform(
                    "keepInput requires an object input",
                ))
            }
        }
    } else {
        Default::default()
    };

    let scope = template::scope(inputs);
    for (name, value) in &config.fields {
        let value = match value {
            Value::String(s) if template::has_placeholders(s) => {
                Value::String(template::render(s, &scope))
            }
            other => other.clone(),
        };
        object.insert(name.clone(), value);
    }

    Ok(Value::Object(object))
}

/// Parse JSON string to Value
pub fn json_parse(
    config: &JsonParseConfig,
    inputs: &NodeInputs,
    ctx: &NodeContext,
) -> Result<Value, NodeExecutionError> {
    let input = inputs.single()?;
    let path = config.field.as_deref().unwrap_or("");
    let text = input
        .get_path(path)
        .and_then(Value::as_str)
        .ok_or_else(|| NodeExecutionError::transform(format!("field '{}' is not a string", path)))?;

    let parsed: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| NodeExecutionError::transform(format!("JSON parse error: {}", e)))?;

    ctx.events.info(format!("Parsed {} bytes of JSON", text.len()));
    Ok(Value::from(parsed))
}

/// Stringify Value to JSON. Several inputs are stringified as one object
/// keyed by source id.
pub fn json_stringify(
    config: &JsonStringifyConfig,
    inputs: &NodeInputs,
) -> Result<Value, NodeExecutionError> {
    let value = match inputs.len() {
        0 => Value::Null,
        1 => inputs.single()?.clone(),
        _ => inputs.to_value(),
    };

    let json = serde_json::Value::from(value);
    let text = if config.pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    }
    .map_err(|e| NodeExecutionError::transform(format!("JSON stringify error: {}", e)))?;

    Ok(Value::String(text))
}
