//! Task and workflow engine
//!
//! This module holds the context store, the task contract, workflow events
//! and the workflow state machine that sequences tasks.

pub mod context;
pub mod event;
pub mod task;
pub mod workflow;

// Re-export main types
pub use context::*;
pub use event::*;
pub use task::*;
pub use workflow::{Workflow, WorkflowState};
