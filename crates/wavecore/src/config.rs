//! Typed per-node-type configuration records.
//!
//! Every node type owns exactly one record. The registry holds a default
//! instance of each, and user overrides are laid over it field by field
//! before the record is parsed back into its typed form.

use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed set of node types the engine knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    Webhook,
    Schedule,
    AiTextGenerator,
    AiAnalyser,
    Math,
    Template,
    SetFields,
    JsonParse,
    JsonStringify,
    Condition,
    Merge,
    Delay,
}

impl NodeType {
    pub const ALL: [NodeType; 12] = [
        NodeType::Webhook,
        NodeType::Schedule,
        NodeType::AiTextGenerator,
        NodeType::AiAnalyser,
        NodeType::Math,
        NodeType::Template,
        NodeType::SetFields,
        NodeType::JsonParse,
        NodeType::JsonStringify,
        NodeType::Condition,
        NodeType::Merge,
        NodeType::Delay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Webhook => "webhook",
            NodeType::Schedule => "schedule",
            NodeType::AiTextGenerator => "aiTextGenerator",
            NodeType::AiAnalyser => "aiAnalyser",
            NodeType::Math => "math",
            NodeType::Template => "template",
            NodeType::SetFields => "setFields",
            NodeType::JsonParse => "jsonParse",
            NodeType::JsonStringify => "jsonStringify",
            NodeType::Condition => "condition",
            NodeType::Merge => "merge",
            NodeType::Delay => "delay",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            NodeType::Webhook | NodeType::Schedule => Category::Trigger,
            NodeType::AiTextGenerator | NodeType::AiAnalyser => Category::Ai,
            NodeType::Math
            | NodeType::Template
            | NodeType::SetFields
            | NodeType::JsonParse
            | NodeType::JsonStringify => Category::Action,
            NodeType::Condition | NodeType::Merge | NodeType::Delay => Category::Logic,
        }
    }

    pub fn is_trigger(&self) -> bool {
        self.category() == Category::Trigger
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Trigger,
    Ai,
    Action,
    Logic,
}

/// Configuration of a node, tagged by its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "camelCase")]
pub enum NodeConfig {
    Webhook(WebhookConfig),
    Schedule(ScheduleConfig),
    AiTextGenerator(AiTextGeneratorConfig),
    AiAnalyser(AiAnalyserConfig),
    Math(MathConfig),
    Template(TemplateConfig),
    SetFields(SetFieldsConfig),
    JsonParse(JsonParseConfig),
    JsonStringify(JsonStringifyConfig),
    Condition(ConditionConfig),
    Merge(MergeConfig),
    Delay(DelayConfig),
}

impl NodeConfig {
    /// Built-in default record for a node type.
    pub fn default_for(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Webhook => NodeConfig::Webhook(WebhookConfig::default()),
            NodeType::Schedule => NodeConfig::Schedule(ScheduleConfig::default()),
            NodeType::AiTextGenerator => {
                NodeConfig::AiTextGenerator(AiTextGeneratorConfig::default())
            }
            NodeType::AiAnalyser => NodeConfig::AiAnalyser(AiAnalyserConfig::default()),
            NodeType::Math => NodeConfig::Math(MathConfig::default()),
            NodeType::Template => NodeConfig::Template(TemplateConfig::default()),
            NodeType::SetFields => NodeConfig::SetFields(SetFieldsConfig::default()),
            NodeType::JsonParse => NodeConfig::JsonParse(JsonParseConfig::default()),
            NodeType::JsonStringify => NodeConfig::JsonStringify(JsonStringifyConfig::default()),
            NodeType::Condition => NodeConfig::Condition(ConditionConfig::default()),
            NodeType::Merge => NodeConfig::Merge(MergeConfig::default()),
            NodeType::Delay => NodeConfig::Delay(DelayConfig::default()),
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            NodeConfig::Webhook(_) => NodeType::Webhook,
            NodeConfig::Schedule(_) => NodeType::Schedule,
            NodeConfig::AiTextGenerator(_) => NodeType::AiTextGenerator,
            NodeConfig::AiAnalyser(_) => NodeType::AiAnalyser,
            NodeConfig::Math(_) => NodeType::Math,
            NodeConfig::Template(_) => NodeType::Template,
            NodeConfig::SetFields(_) => NodeType::SetFields,
            NodeConfig::JsonParse(_) => NodeType::JsonParse,
            NodeConfig::JsonStringify(_) => NodeType::JsonStringify,
            NodeConfig::Condition(_) => NodeType::Condition,
            NodeConfig::Merge(_) => NodeType::Merge,
            NodeConfig::Delay(_) => NodeType::Delay,
        }
    }

    /// The record's fields as a JSON object, without the type tag.
    pub fn fields(&self) -> serde_json::Map<String, serde_json::Value> {
        let tagged = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        match tagged.get("config") {
            Some(serde_json::Value::Object(map)) => map.clone(),
            _ => serde_json::Map::new(),
        }
    }

    /// Parse a record for `node_type` from a JSON object of its fields.
    pub fn from_fields(
        node_type: NodeType,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({
            "type": node_type,
            "config": fields,
        }))
    }

    /// Current value of a single field, if the record has it.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields().remove(name).map(Value::from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    pub method: HttpMethod,
    pub path: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            method: HttpMethod::Post,
            path: "/webhook".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    pub cron: String,
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: "0 * * * *".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiTextGeneratorConfig {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for AiTextGeneratorConfig {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            system_prompt: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisType {
    Sentiment,
    Summary,
    Keywords,
    Classification,
    Custom,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Sentiment => "sentiment",
            AnalysisType::Summary => "summary",
            AnalysisType::Keywords => "keywords",
            AnalysisType::Classification => "classification",
            AnalysisType::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalyserConfig {
    pub analysis_type: AnalysisType,
    pub instructions: String,
    pub categories: Vec<String>,
    pub model: String,
    pub temperature: f64,
}

impl Default for AiAnalyserConfig {
    fn default() -> Self {
        Self {
            analysis_type: AnalysisType::Summary,
            instructions: String::new(),
            categories: Vec::new(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MathOperation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MathConfig {
    pub operation: MathOperation,
    pub operand: f64,
    /// Path of the number inside an object input. Numeric inputs are used as is.
    pub field: Option<String>,
}

impl Default for MathConfig {
    fn default() -> Self {
        Self {
            operation: MathOperation::Multiply,
            operand: 2.0,
            field: Some("value".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig {
    pub template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetFieldsConfig {
    pub fields: BTreeMap<String, Value>,
    pub keep_input: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonParseConfig {
    pub field: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonStringifyConfig {
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    Exists,
    IsEmpty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionConfig {
    pub field: Option<String>,
    pub operator: ConditionOperator,
    pub value: Value,
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self {
            field: None,
            operator: ConditionOperator::Exists,
            value: Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeMode {
    #[default]
    Object,
    Array,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeConfig {
    pub mode: MergeMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayConfig {
    pub duration_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self { duration_ms: 1000 }
    }
}
