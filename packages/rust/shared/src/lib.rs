//! Shared types, error model, and configuration for EventIntel.
//!
//! This crate is the foundation depended on by all other EventIntel crates.
//! It provides:
//! - [`EventIntelError`] : the unified error type
//! - Domain types ([`Category`], [`Degraded`], [`RunId`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EmbeddingConfig, GenerationConfig, KnowledgeConfig, PipelineConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{EventIntelError, Result};
pub use types::{Category, Degraded, RunId};
