use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Workflow invalid: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Graph-level problems found before any node runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Workflow has no nodes")]
    EmptyWorkflow,

    #[error("Edge '{edge}' references unknown node '{node}'")]
    DanglingEdge { edge: String, node: String },

    #[error("Cyclic dependency detected at node '{node}'")]
    CycleDetected { node: String },

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Duplicate edge id: {0}")]
    DuplicateEdge(String),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Invalid configuration for node '{node}': {reason}")]
    InvalidConfig { node: String, reason: String },
}

/// Failure of a single node. Recorded against the node, never fatal to the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeExecutionError {
    #[error("Missing required configuration field: {field}")]
    InvalidConfig { field: String },

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Provider failure: {0}")]
    ProviderFailure(String),

    #[error("Transform failed: {0}")]
    TransformError(String),

    #[error("Timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Cancelled")]
    Cancelled,
}

impl NodeExecutionError {
    pub fn transform(message: impl Into<String>) -> Self {
        NodeExecutionError::TransformError(message.into())
    }

    pub fn invalid_config(field: impl Into<String>) -> Self {
        NodeExecutionError::InvalidConfig {
            field: field.into(),
        }
    }
}

/// Registry lookup and config-merge failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Node type not registered: {0}")]
    NotFound(String),

    #[error("Unknown config field '{0}'")]
    UnknownField(String),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}
