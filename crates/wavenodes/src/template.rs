use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use wavecore::{NodeInputs, Value};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Values a template can reference: every input under its source id, plus
/// `input` for the single input (or the whole mapping when there are several).
pub fn scope(inputs: &NodeInputs) -> Value {
    let mut scope: BTreeMap<String, Value> = inputs
        .iter()
        .map(|(source, value)| (source.clone(), value.clone()))
        .collect();

    let input = match inputs.single() {
        Ok(value) => value.clone(),
        Err(_) => inputs.to_value(),
    };
    scope.insert("input".to_string(), input);
    Value::Object(scope)
}

/// Replace `{{path}}` placeholders with values from `scope`. Unresolved
/// paths render as empty text.
pub fn render(template: &str, scope: &Value) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            scope
                .get_path(&caps[1])
                .map(Value::to_text)
                .unwrap_or_default()
        })
        .into_owned()
}

pub fn has_placeholders(template: &str) -> bool {
    PLACEHOLDER.is_match(template)
}
