use crate::{Category, NodeConfig, NodeType, RegistryError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata about a node type: catalog entry, defaults and config schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeDescriptor {
    pub node_type: NodeType,
    pub label: String,
    pub description: String,
    pub category: Category,
    pub default_config: NodeConfig,
    pub fields: Vec<ConfigField>,
}

impl NodeTypeDescriptor {
    pub fn new(node_type: NodeType, label: &str, description: &str) -> Self {
        Self {
            node_type,
            label: label.to_string(),
            description: description.to_string(),
            category: node_type.category(),
            default_config: NodeConfig::default_for(node_type),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: ConfigField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn required_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Lay `overrides` over the default record. Only fields declared in the
    /// schema may be overridden, and each value must fit the field's type.
    pub fn merge(
        &self,
        overrides: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<NodeConfig, RegistryError> {
        let mut merged = self.default_config.fields();
        for (name, value) in overrides {
            if !self.fields.iter().any(|f| &f.name == name) {
                return Err(RegistryError::UnknownField(name.clone()));
            }
            merged.insert(name.clone(), value.clone());
        }

        NodeConfig::from_fields(self.node_type, merged)
            .map_err(|e| RegistryError::InvalidValue(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Textarea,
    Select,
    Number,
    Boolean,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

/// One form field of a node's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigField {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl ConfigField {
    pub fn new(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            options: Vec::new(),
            required: false,
            placeholder: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn placeholder(mut self, text: &str) -> Self {
        self.placeholder = Some(text.to_string());
        self
    }

    /// Select options where value and label coincide.
    pub fn options(mut self, values: &[&str]) -> Self {
        self.options = values
            .iter()
            .map(|v| FieldOption {
                value: v.to_string(),
                label: v.to_string(),
            })
            .collect();
        self
    }
}

/// Registry of available node types
pub struct NodeRegistry {
    descriptors: HashMap<NodeType, NodeTypeDescriptor>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: HashMap::new(),
        }
    }

    /// Registry holding every built-in node type.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for descriptor in builtin_descriptors() {
            registry.register(descriptor);
        }
        registry
    }

    pub fn register(&mut self, descriptor: NodeTypeDescriptor) {
        tracing::debug!("Registering node type: {}", descriptor.node_type);
        self.descriptors.insert(descriptor.node_type, descriptor);
    }

    pub fn lookup(&self, node_type: NodeType) -> Result<&NodeTypeDescriptor, RegistryError> {
        self.descriptors
            .get(&node_type)
            .ok_or_else(|| RegistryError::NotFound(node_type.to_string()))
    }

    /// All registered descriptors in catalog order.
    pub fn list(&self) -> Vec<&NodeTypeDescriptor> {
        let mut all: Vec<_> = self.descriptors.values().collect();
        all.sort_by_key(|d| d.node_type);
        all
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_descriptors() -> Vec<NodeTypeDescriptor> {
    use FieldKind::*;

    vec![
        NodeTypeDescriptor::new(
            NodeType::Webhook,
            "Webhook Trigger",
            "Trigger workflow when receiving HTTP request",
        )
        .field(
            ConfigField::new("method", "HTTP Method", Select)
                .options(&["GET", "POST", "PATCH"])
                .required(),
        )
        .field(ConfigField::new("path", "Path", Text).placeholder("/webhook").required()),
        NodeTypeDescriptor::new(
            NodeType::Schedule,
            "Schedule Trigger",
            "Trigger workflow on a cron schedule",
        )
        .field(ConfigField::new("cron", "Cron Expression", Text).placeholder("0 * * * *").required())
        .field(ConfigField::new("timezone", "Timezone", Text).placeholder("UTC")),
        NodeTypeDescriptor::new(
            NodeType::AiTextGenerator,
            "AI Text Generator",
            "Generate text from a prompt with a language model",
        )
        .field(
            ConfigField::new("prompt", "Prompt", Textarea)
                .placeholder("Write a reply to {{input}}")
                .required(),
        )
        .field(ConfigField::new("systemPrompt", "System Prompt", Textarea))
        .field(ConfigField::new("model", "Model", Text).required())
        .field(ConfigField::new("temperature", "Temperature", Number))
        .field(ConfigField::new("maxTokens", "Max Tokens", Number)),
        NodeTypeDescriptor::new(
            NodeType::AiAnalyser,
            "AI Analyser",
            "Analyse upstream text: sentiment, summary, keywords or classification",
        )
        .field(
            ConfigField::new("analysisType", "Analysis Type", Select)
                .options(&["sentiment", "summary", "keywords", "classification", "custom"])
                .required(),
        )
        .field(ConfigField::new("instructions", "Instructions", Textarea))
        .field(ConfigField::new("categories", "Categories", Json))
        .field(ConfigField::new("model", "Model", Text).required())
        .field(ConfigField::new("temperature", "Temperature", Number)),
        NodeTypeDescriptor::new(NodeType::Math, "Math", "Apply an arithmetic operation to a number")
            .field(
                ConfigField::new("operation", "Operation", Select)
                    .options(&["add", "subtract", "multiply", "divide"])
                    .required(),
            )
            .field(ConfigField::new("operand", "Operand", Number))
            .field(ConfigField::new("field", "Input Field", Text).placeholder("value")),
        NodeTypeDescriptor::new(NodeType::Template, "Template", "Render text from upstream values")
            .field(
                ConfigField::new("template", "Template", Textarea)
                    .placeholder("Hello {{input.name}}")
                    .required(),
            ),
        NodeTypeDescriptor::new(NodeType::SetFields, "Set Fields", "Add or overwrite object fields")
            .field(ConfigField::new("fields", "Fields", Json))
            .field(ConfigField::new("keepInput", "Keep Input Fields", Boolean)),
        NodeTypeDescriptor::new(NodeType::JsonParse, "Parse JSON", "Parse a JSON string")
            .field(ConfigField::new("field", "Input Field", Text)),
        NodeTypeDescriptor::new(
            NodeType::JsonStringify,
            "Stringify JSON",
            "Convert a value to a JSON string",
        )
        .field(ConfigField::new("pretty", "Pretty Print", Boolean)),
        NodeTypeDescriptor::new(
            NodeType::Condition,
            "Condition",
            "Test the input and report which branch matched",
        )
        .field(ConfigField::new("field", "Field", Text))
        .field(
            ConfigField::new("operator", "Operator", Select)
                .options(&[
                    "equals",
                    "notEquals",
                    "greaterThan",
                    "lessThan",
                    "contains",
                    "exists",
                    "isEmpty",
                ])
                .required(),
        )
        .field(ConfigField::new("value", "Value", Json)),
        NodeTypeDescriptor::new(NodeType::Merge, "Merge", "Combine the outputs of several nodes")
            .field(
                ConfigField::new("mode", "Mode", Select)
                    .options(&["object", "array"])
                    .required(),
            ),
        NodeTypeDescriptor::new(NodeType::Delay, "Delay", "Wait before passing input through")
            .field(ConfigField::new("durationMs", "Duration (ms)", Number)),
    ]
}
