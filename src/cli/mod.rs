//! CLI interface and argument parsing
//!
//! This module handles command-line parsing, interactive prompt answering,
//! progress reporting and shell completion.

pub mod app;
pub mod report;

// Re-export main types
pub use app::*;
pub use report::*;
