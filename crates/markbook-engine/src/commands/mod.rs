//! Command orchestration layer.

pub mod engine_command;
pub mod import;
