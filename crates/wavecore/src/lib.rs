//! Core abstractions for the wave workflow engine
//!
//! Node types and their typed configuration, the workflow document, the
//! node registry, run results, errors and the run event bus. Everything
//! else in the workspace builds on these types.

mod config;
mod error;
pub mod events;
mod node;
mod registry;
mod run;
mod value;
mod workflow;

pub use config::{
    AiAnalyserConfig, AiTextGeneratorConfig, AnalysisType, Category, ConditionConfig,
    ConditionOperator, DelayConfig, HttpMethod, JsonParseConfig, JsonStringifyConfig, MathConfig,
    MathOperation, MergeConfig, MergeMode, NodeConfig, NodeType, ScheduleConfig, SetFieldsConfig,
    TemplateConfig, WebhookConfig,
};
pub use error::{FlowError, NodeExecutionError, RegistryError, ValidationError};
pub use events::*;
pub use node::{ConfiguredNode, NodeContext, NodeInputs};
pub use registry::{ConfigField, FieldKind, FieldOption, NodeRegistry, NodeTypeDescriptor};
pub use run::{NodeRecord, NodeStatus, RunResult, RunStatus};
pub use value::Value;
pub use workflow::{EdgeId, EdgeSpec, NodeId, NodeSpec, Position, Workflow, WorkflowBuilder, WorkflowId};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
