//! Shared utilities: error taxonomy, result helpers and output sinks

pub mod error;
pub mod output;
pub mod result;
