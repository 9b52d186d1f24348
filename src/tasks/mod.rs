//! Built-in task variants
//!
//! Synchronous closures, retryable work, sub-workflows and interactive prompts.

pub mod prompt;
pub mod retry;
pub mod subflow;
pub mod sync;

// Re-export main types
pub use prompt::*;
pub use retry::*;
pub use subflow::*;
pub use sync::*;
