use std::collections::BTreeMap;
use wavecore::{
    ConditionConfig, ConditionOperator, MergeConfig, MergeMode, NodeExecutionError, NodeInputs, Value,
};

/// Evaluate a predicate over the input. The output reports the branch taken
/// and carries the input through for downstream nodes.
pub fn condition(config: &ConditionConfig, inputs: &NodeInputs) -> Result<Value, NodeExecutionError> {
    let input = inputs.single()?;
    let subject = input.get_path(config.field.as_deref().unwrap_or(""));

    let matched = match config.operator {
        ConditionOperator::Equals => subject == Some(&config.value),
        ConditionOperator::NotEquals => subject != Some(&config.value),
        ConditionOperator::GreaterThan => compare(subject, &config.value)? > 0.0,
        ConditionOperator::LessThan => compare(subject, &config.value)? < 0.0,
        ConditionOperator::Contains => match (subject, &config.value) {
            (Some(Value::String(s)), Value::String(needle)) => s.contains(needle.as_str()),
            (Some(Value::Array(items)), needle) => items.contains(needle),
            (Some(Value::Object(map)), Value::String(key)) => map.contains_key(key),
            _ => false,
        },
        ConditionOperator::Exists => subject.map(|v| !v.is_null()).unwrap_or(false),
        ConditionOperator::IsEmpty => subject.map(Value::is_empty).unwrap_or(true),
    };

    let mut output = BTreeMap::new();
    output.insert("matched".to_string(), Value::Bool(matched));
    output.insert(
        "branch".to_string(),
        Value::from(if matched { "true" } else { "false" }),
    );
    output.insert("input".to_string(), input.clone());
    Ok(Value::Object(output))
}

fn compare(subject: Option<&Value>, expected: &Value) -> Result<f64, NodeExecutionError> {
    match (subject.and_then(Value::as_f64), expected.as_f64()) {
        (Some(left), Some(right)) => Ok(left - right),
        _ => Err(NodeExecutionError::transform(
            "numeric comparison needs numeric operands",
        )),
    }
}

/// Combine fan-in explicitly: an object keyed by source id, or an array in
/// source id order.
pub fn merge(config: &MergeConfig, inputs: &NodeInputs) -> Result<Value, NodeExecutionError> {
    Ok(match config.mode {
        MergeMode::Object => inputs.to_value(),
        MergeMode::Array => Value::Array(inputs.iter().map(|(_, v)| v.clone()).collect()),
    })
}
