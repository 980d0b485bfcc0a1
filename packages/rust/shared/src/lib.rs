//! Shared types, error model, and configuration for crewout.
//!
//! This crate is the foundation depended on by all other crewout crates.
//! It provides:
//! - [`CrewOutError`]: the unified error type
//! - The execution-result model ([`ExecutionResult`], [`StageOutput`], [`TokenUsage`])
//! - Configuration ([`AppConfig`], [`ExtractionConfig`], config loading)

pub mod config;
pub mod error;
mod lenient;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_MODEL_NAME, DefaultsConfig, ExtractionConfig, ExtractionSection,
    config_dir, config_file_path, init_config, init_config_in, load_config, load_config_from,
};
pub use error::{CrewOutError, Result};
pub use types::{
    ExecutionMetadata, ExecutionResult, ExecutionStatus, RawOutputs, SCALAR_FIELD, StageOutput,
    StageSlot, StageSlots, TokenUsage, to_json_value,
};
