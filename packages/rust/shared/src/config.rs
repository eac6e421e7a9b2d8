//! Application configuration for EventIntel.
//!
//! User config lives at `~/.eventintel/eventintel.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EventIntelError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "eventintel.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".eventintel";

// ---------------------------------------------------------------------------
// Config structs (matching eventintel.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text-generation runtime settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Embedding model settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Knowledge store and retrieval settings.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Pipeline orchestration settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the Ollama-compatible runtime.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used by every generation stage.
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Sampling temperature for the marketing stage.
    #[serde(default = "default_creative_temperature")]
    pub creative_temperature: f32,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_generation_model(),
            creative_temperature: default_creative_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_generation_model() -> String {
    "llama3.2".into()
}
fn default_creative_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    120
}

/// `[embedding]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding model served by the same runtime.
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
        }
    }
}

fn default_embedding_model() -> String {
    "mxbai-embed-large:latest".into()
}

/// `[knowledge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Path of the persistent libSQL database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory holding the source `.txt` knowledge files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Number of rule chunks retrieved per run.
    #[serde(default = "default_rules_k")]
    pub rules_k: usize,

    /// Number of memory chunks retrieved per run.
    #[serde(default = "default_history_k")]
    pub history_k: usize,

    /// Ingest `data_dir` automatically when the store is found empty.
    #[serde(default = "default_true")]
    pub auto_ingest: bool,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            data_dir: default_data_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            rules_k: default_rules_k(),
            history_k: default_history_k(),
            auto_ingest: true,
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("var/knowledge/eventintel.db")
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data/knowledge_base")
}
fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_rules_k() -> usize {
    4
}
fn default_history_k() -> usize {
    3
}
fn default_true() -> bool {
    true
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound for any single external call made by a stage.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Where generated landing pages are written by the CLI.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_call_timeout_secs() -> u64 {
    180
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("var/pages")
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.eventintel/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| EventIntelError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.eventintel/eventintel.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| EventIntelError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        EventIntelError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| EventIntelError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| EventIntelError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| EventIntelError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check the loaded values before anything talks to a service.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let url = Url::parse(&config.generation.base_url).map_err(|e| {
        EventIntelError::config(format!(
            "generation.base_url '{}' is not a valid URL: {e}",
            config.generation.base_url
        ))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(EventIntelError::config(format!(
            "generation.base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.generation.model.trim().is_empty() || config.embedding.model.trim().is_empty() {
        return Err(EventIntelError::config("model names must not be empty"));
    }

    let temp = config.generation.creative_temperature;
    if !(0.0..=2.0).contains(&temp) || temp == 0.0 {
        return Err(EventIntelError::config(format!(
            "generation.creative_temperature must be in (0, 2], got {temp}"
        )));
    }

    let k = &config.knowledge;
    if k.chunk_size == 0 || k.chunk_overlap >= k.chunk_size {
        return Err(EventIntelError::config(format!(
            "knowledge.chunk_overlap ({}) must be smaller than chunk_size ({})",
            k.chunk_overlap, k.chunk_size
        )));
    }
    if k.rules_k == 0 || k.history_k == 0 {
        return Err(EventIntelError::config(
            "knowledge.rules_k and knowledge.history_k must be at least 1",
        ));
    }

    if config.pipeline.call_timeout_secs == 0 || config.generation.timeout_secs == 0 {
        return Err(EventIntelError::config("timeouts must be at least one second"));
    }

    Ok(())
}
