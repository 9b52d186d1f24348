//! Workflow runner
//!
//! This module turns configured workflows into engine workflows, including
//! variable interpolation and conditional steps.

pub mod build;
pub mod interpolate;
pub mod when;

// Re-export main types
pub use build::*;
pub use interpolate::*;
pub use when::*;
