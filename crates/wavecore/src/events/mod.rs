mod base;

pub use base::{EventBus, EventEmitter, NodeEvent, RunEvent, RunId};
