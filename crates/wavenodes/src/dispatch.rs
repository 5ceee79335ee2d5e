use crate::ai::{self, OpenAiGenerator, TextGenerator};
use crate::{logic, time, transform, trigger};
use std::sync::Arc;
use wavecore::{ConfiguredNode, NodeConfig, NodeContext, NodeExecutionError, NodeInputs, Value};

/// Runs a node's behavior. Dispatch is an exhaustive match over the config
/// variant, so every node type must be handled here.
#[derive(Clone, Default)]
pub struct NodeExecutor {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl NodeExecutor {
    /// Executor without a text generator; AI nodes fail with `MissingCredentials`.
    pub fn new() -> Self {
        Self { generator: None }
    }

    pub fn with_generator(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Use the OpenAI-compatible provider when credentials are present in
    /// the environment.
    pub fn from_env() -> Self {
        match OpenAiGenerator::from_env() {
            Some(generator) => Self::with_generator(Arc::new(generator)),
            None => {
                tracing::warn!("OPENAI_API_KEY not set; AI nodes will fail with missing credentials");
                Self::new()
            }
        }
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn execute(
        &self,
        node: &ConfiguredNode,
        inputs: &NodeInputs,
        ctx: &NodeContext,
    ) -> Result<Value, NodeExecutionError> {
        if let Some(field) = node.missing_required() {
            return Err(NodeExecutionError::invalid_config(field));
        }

        if node.node_type().is_trigger() && !inputs.is_empty() {
            ctx.events.warn(format!(
                "trigger ignores {} upstream input(s)",
                inputs.len()
            ));
        }

        tracing::debug!(
            node_id = %node.id,
            node_type = %node.node_type(),
            inputs = inputs.len(),
            "Dispatching node"
        );

        match &node.config {
            NodeConfig::Webhook(config) => trigger::webhook(config, ctx),
            NodeConfig::Schedule(config) => trigger::schedule(config, ctx),
            NodeConfig::AiTextGenerator(config) => {
                ai::generate_text(self.generator()?, config, inputs, ctx).await
            }
            NodeConfig::AiAnalyser(config) => {
                ai::analyse(self.generator()?, config, inputs, ctx).await
            }
            NodeConfig::Math(config) => transform::math(config, inputs),
            NodeConfig::Template(config) => transform::render_template(config, inputs),
            NodeConfig::SetFields(config) => transform::set_fields(config, inputs),
            NodeConfig::JsonParse(config) => transform::json_parse(config, inputs, ctx),
            NodeConfig::JsonStringify(config) => transform::json_stringify(config, inputs),
            NodeConfig::Condition(config) => logic::condition(config, inputs),
            NodeConfig::Merge(config) => logic::merge(config, inputs),
            NodeConfig::Delay(config) => time::delay(config, inputs, ctx).await,
        }
    }

    fn generator(&self) -> Result<&dyn TextGenerator, NodeExecutionError> {
        self.generator.as_deref().ok_or_else(|| {
            NodeExecutionError::MissingCredentials(
                "no text generation provider configured; set OPENAI_API_KEY".to_string(),
            )
        })
    }
}
