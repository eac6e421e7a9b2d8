//! Ollama HTTP client.
//!
//! Uses `/api/generate` (non-streaming) for completions and `/api/embed` for
//! embeddings. One pooled `reqwest::Client` is shared by every caller.

use std::time::Duration;

use eventintel_shared::{AppConfig, EventIntelError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::{Embedder, GenerationService, ResponseFormat, SamplingConfig};

/// User-Agent string for runtime requests.
const USER_AGENT: &str = concat!("EventIntel/", env!("CARGO_PKG_VERSION"));

const GENERATION: &str = "generation";
const EMBEDDING: &str = "embedding";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for a local (or remote) Ollama runtime.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: Url,
    model: String,
    embedding_model: String,
    timeout: Duration,
}

impl OllamaClient {
    /// Build a client against `base_url`.
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        embedding_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            EventIntelError::config(format!("invalid runtime URL '{base_url}': {e}"))
        })?;
        // Endpoints are joined relative to the base, so keep its path prefix.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                EventIntelError::service(GENERATION, format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url,
            model: model.into(),
            embedding_model: embedding_model.into(),
            timeout,
        })
    }

    /// Build a client from the `[generation]` and `[embedding]` config sections.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            &config.generation.base_url,
            config.generation.model.clone(),
            config.embedding.model.clone(),
            Duration::from_secs(config.generation.timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| EventIntelError::config(format!("invalid endpoint {path}: {e}")))
    }

    fn map_send_error(&self, service: &'static str, err: reqwest::Error) -> EventIntelError {
        if err.is_timeout() {
            EventIntelError::Timeout {
                service,
                secs: self.timeout.as_secs(),
            }
        } else if err.is_connect() {
            EventIntelError::service(
                service,
                format!("runtime unreachable at {}: {err}", self.base_url),
            )
        } else {
            EventIntelError::service(service, err.to_string())
        }
    }

    async fn post_json<Req, Resp>(&self, service: &'static str, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(service, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EventIntelError::service(
                service,
                format!("{path}: HTTP {status}: {}", body.chars().take(200).collect::<String>()),
            ));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| self.map_send_error(service, e))
    }
}

impl GenerationService for OllamaClient {
    #[instrument(skip_all, fields(model = %self.model, temperature = sampling.temperature))]
    async fn generate(&self, prompt: &str, sampling: &SamplingConfig) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: sampling.format.map(|f| match f {
                ResponseFormat::Json => "json",
            }),
            options: GenerateOptions {
                temperature: sampling.temperature,
            },
        };

        let resp: GenerateResponse = self.post_json(GENERATION, "/api/generate", &request).await?;

        debug!(
            tokens_in = resp.prompt_eval_count.unwrap_or(0),
            tokens_out = resp.eval_count.unwrap_or(0),
            chars = resp.response.len(),
            "generation complete"
        );

        Ok(resp.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

impl Embedder for OllamaClient {
    #[instrument(skip_all, fields(model = %self.embedding_model, texts = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.embedding_model,
            input: texts,
        };

        let resp: EmbedResponse = self.post_json(EMBEDDING, "/api/embed", &request).await?;

        if resp.embeddings.len() != texts.len() {
            return Err(EventIntelError::service(
                EMBEDDING,
                format!(
                    "expected {} embeddings, runtime returned {}",
                    texts.len(),
                    resp.embeddings.len()
                ),
            ));
        }

        Ok(resp.embeddings)
    }
}
