//! AI node behaviors and the text-generation seam they call through.

mod openai;

pub use openai::{OpenAiConfig, OpenAiGenerator};

use crate::template;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use wavecore::{
    AiAnalyserConfig, AiTextGeneratorConfig, AnalysisType, NodeContext, NodeExecutionError,
    NodeInputs, Value,
};

/// Request handed to a text-generation provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

/// Why a provider could not produce text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Cancelled")]
    Cancelled,
}

impl From<GenerationError> for NodeExecutionError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::MissingCredentials(msg) => NodeExecutionError::MissingCredentials(msg),
            GenerationError::Provider(msg) => NodeExecutionError::ProviderFailure(msg),
            GenerationError::Cancelled => NodeExecutionError::Cancelled,
        }
    }
}

/// External text-generation capability used by the AI node types.
///
/// Implementations should stop work and return `Cancelled` once `cancel`
/// fires.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<String, GenerationError>;
}

pub async fn generate_text(
    generator: &dyn TextGenerator,
    config: &AiTextGeneratorConfig,
    inputs: &NodeInputs,
    ctx: &NodeContext,
) -> Result<Value, NodeExecutionError> {
    let request = GenerationRequest {
        prompt: build_prompt(&config.prompt, inputs),
        system: config.system_prompt.clone().filter(|s| !s.trim().is_empty()),
        model: config.model.clone(),
        temperature: config.temperature,
        max_tokens: Some(config.max_tokens),
    };

    ctx.events.info(format!("Generating text with {}", config.model));
    let text = generator
        .generate(request, ctx.cancellation.child_token())
        .await?;

    Ok(Value::String(text))
}

pub async fn analyse(
    generator: &dyn TextGenerator,
    config: &AiAnalyserConfig,
    inputs: &NodeInputs,
    ctx: &NodeContext,
) -> Result<Value, NodeExecutionError> {
    let instructions = analysis_instructions(config)?;
    let subject = match inputs.len() {
        0 => {
            return Err(NodeExecutionError::transform(
                "analyser needs upstream text to analyse",
            ))
        }
        1 => inputs.single()?.to_text(),
        _ => inputs
            .iter()
            .map(|(_, v)| v.to_text())
            .collect::<Vec<_>>()
            .join("\n\n"),
    };

    let request = GenerationRequest {
        prompt: format!("{}\n\nText:\n{}", instructions, subject),
        system: None,
        model: config.model.clone(),
        temperature: config.temperature,
        max_tokens: None,
    };

    ctx.events.info(format!(
        "Running {} analysis with {}",
        config.analysis_type.as_str(),
        config.model
    ));
    let result = generator
        .generate(request, ctx.cancellation.child_token())
        .await?;

    let mut output = BTreeMap::new();
    output.insert(
        "analysisType".to_string(),
        Value::from(config.analysis_type.as_str()),
    );
    if config.analysis_type == AnalysisType::Keywords {
        let keywords = result
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(Value::from)
            .collect();
        output.insert("keywords".to_string(), Value::Array(keywords));
    }
    output.insert("result".to_string(), Value::String(result.trim().to_string()));
    Ok(Value::Object(output))
}

/// Render the prompt template. Upstream outputs the template does not
/// reference are appended as context so the model still sees them.
fn build_prompt(prompt: &str, inputs: &NodeInputs) -> String {
    if template::has_placeholders(prompt) {
        return template::render(prompt, &template::scope(inputs));
    }
    if inputs.is_empty() {
        return prompt.to_string();
    }

    let context = inputs
        .iter()
        .map(|(_, v)| v.to_text())
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\nContext:\n{}", prompt, context)
}

fn analysis_instructions(config: &AiAnalyserConfig) -> Result<String, NodeExecutionError> {
    let base = match config.analysis_type {
        AnalysisType::Sentiment => "Classify the sentiment of the following text as positive, \
             negative or neutral. Reply with a single word."
            .to_string(),
        AnalysisType::Summary => "Summarize the following text in a few sentences.".to_string(),
        AnalysisType::Keywords => "Extract the key words and phrases from the following text. \
             Reply with a comma-separated list."
            .to_string(),
        AnalysisType::Classification => {
            if config.categories.is_empty() {
                return Err(NodeExecutionError::invalid_config("categories"));
            }
            format!(
                "Classify the following text into exactly one of these categories: {}. \
                 Reply with the category name only.",
                config.categories.join(", ")
            )
        }
        AnalysisType::Custom => {
            if config.instructions.trim().is_empty() {
                return Err(NodeExecutionError::invalid_config("instructions"));
            }
            return Ok(config.instructions.clone());
        }
    };

    if config.instructions.trim().is_empty() {
        Ok(base)
    } else {
        Ok(format!("{}\n{}", base, config.instructions))
    }
}
