//! Standard node library
//!
//! Behaviors for every built-in node type and the dispatcher that routes a
//! configured node to its behavior.

pub mod ai;
mod dispatch;
mod logic;
mod template;
mod time;
mod transform;
mod trigger;

pub use ai::{GenerationError, GenerationRequest, OpenAiConfig, OpenAiGenerator, TextGenerator};
pub use dispatch::NodeExecutor;
pub use template::{has_placeholders, render, scope};
