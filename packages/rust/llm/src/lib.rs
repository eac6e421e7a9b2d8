//! Language-model plumbing for EventIntel.
//!
//! Two service seams are defined here and implemented by [`OllamaClient`]:
//! - [`GenerationService`] : prompt in, text out, under a [`SamplingConfig`]
//! - [`Embedder`] : texts in, dense vectors out
//!
//! [`json::parse_structured`] turns free-form model output into JSON without
//! ever failing the caller.

pub mod json;
mod ollama;

use std::future::Future;

use eventintel_shared::Result;

pub use json::{JsonOutcome, parse_structured};
pub use ollama::OllamaClient;

/// Response format hint passed to the generation runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Ask the runtime to constrain output to a JSON document.
    Json,
}

/// Sampling configuration for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub format: Option<ResponseFormat>,
}

impl SamplingConfig {
    /// Temperature 0 with a JSON format hint (inference, classification, risk).
    pub fn deterministic_json() -> Self {
        Self {
            temperature: 0.0,
            format: Some(ResponseFormat::Json),
        }
    }

    /// Free-form sampling for creative copy.
    pub fn creative(temperature: f32) -> Self {
        Self {
            temperature,
            format: None,
        }
    }

    pub fn is_deterministic(&self) -> bool {
        self.temperature == 0.0
    }
}

/// A text-completion service.
///
/// Implementations must tolerate concurrent calls from independent pipeline runs.
pub trait GenerationService: Send + Sync {
    /// Complete `prompt` and return the raw response text.
    fn generate(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Model name for logging.
    fn model_name(&self) -> &str;
}

/// A text-embedding service.
pub trait Embedder: Send + Sync {
    /// Embed every text; the output has one vector per input, in order.
    fn embed(&self, texts: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_creative_modes_differ() {
        let strict = SamplingConfig::deterministic_json();
        assert!(strict.is_deterministic());
        assert_eq!(strict.format, Some(ResponseFormat::Json));

        let creative = SamplingConfig::creative(0.7);
        assert!(!creative.is_deterministic());
        assert_eq!(creative.format, None);
    }
}
