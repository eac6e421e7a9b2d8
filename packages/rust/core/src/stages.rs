//! The five pipeline stages.
//!
//! Each stage reads what it needs from the [`PipelineState`] and returns only
//! its own output; the orchestrator folds that output back into the state.
//! Unreadable model output never fails a stage: it becomes degraded data.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{info, instrument, warn};

use eventintel_knowledge::{DocumentSearch, retrieve_history, retrieve_rules};
use eventintel_llm::{GenerationService, SamplingConfig, parse_structured};
use eventintel_shared::{Degraded, Result};

use crate::prompts;
use crate::render::{render_full_page, strip_code_fences};
use crate::risk;
use crate::state::{Classification, EventDetails, PipelineState, RiskAssessment, Retrieval};

// ---------------------------------------------------------------------------
// Stage 1: inference
// ---------------------------------------------------------------------------

/// Expand the event name into a structured profile.
#[instrument(skip_all, fields(stage = "inference", model = generator.model_name()))]
pub async fn infer_event<G: GenerationService>(
    generator: &G,
    state: &PipelineState,
) -> Result<EventDetails> {
    let prompt = prompts::fill(prompts::INFERENCE, &[("event_name", state.event_name())]);
    let raw = generator
        .generate(&prompt, &SamplingConfig::deterministic_json())
        .await?;

    let details = match parse_structured(&raw).into_object(&raw) {
        Ok(map) => EventDetails::from_map(map),
        Err(degraded) => {
            warn!(error = %degraded.error, "event profile is degraded");
            EventDetails::degraded(&degraded)
        }
    };

    info!(
        event_type = ?details.event_type(),
        attendees = ?details.estimated_attendees(),
        "inferred event profile"
    );
    Ok(details)
}

// ---------------------------------------------------------------------------
// Stage 2: classification
// ---------------------------------------------------------------------------

/// Derive risk-oriented search tags from the event profile.
#[instrument(skip_all, fields(stage = "classification", model = generator.model_name()))]
pub async fn classify_event<G: GenerationService>(
    generator: &G,
    state: &PipelineState,
) -> Result<Classification> {
    let details = state.event_details()?.to_json();
    let prompt = prompts::fill(prompts::CLASSIFICATION, &[("event_details", &details)]);
    let raw = generator
        .generate(&prompt, &SamplingConfig::deterministic_json())
        .await?;

    let classification = match parse_structured(&raw).into_object(&raw) {
        Ok(map) => match map.get("queries") {
            Some(value) => Classification {
                queries: normalize_tags(value),
                degraded: None,
            },
            None => Classification {
                queries: Vec::new(),
                degraded: Some(Degraded::new("response has no queries list", raw.as_str())),
            },
        },
        Err(degraded) => Classification {
            queries: Vec::new(),
            degraded: Some(degraded),
        },
    };

    if let Some(degraded) = &classification.degraded {
        warn!(error = %degraded.error, "classification is degraded, continuing without tags");
    }
    info!(tags = ?classification.queries, "derived search tags");
    Ok(classification)
}

/// Trim tags, dropping empty and repeated (case-insensitive) entries.
fn normalize_tags(value: &Value) -> Vec<String> {
    let candidates: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect()
}

// ---------------------------------------------------------------------------
// Stage 3: retrieval
// ---------------------------------------------------------------------------

/// Fetch rules and history for the derived tags, concurrently.
#[instrument(skip_all, fields(stage = "retrieval"))]
pub async fn retrieve_context<S: DocumentSearch>(
    search: &S,
    state: &PipelineState,
    rules_k: usize,
    history_k: usize,
) -> Result<Retrieval> {
    let tags = state.search_queries()?;

    let (rules, memories) = tokio::join!(
        retrieve_rules(search, tags, rules_k),
        retrieve_history(search, tags, history_k),
    );
    let retrieval = Retrieval {
        knowledge_docs: rules?,
        past_memories: memories?,
    };

    info!(
        rules = retrieval.knowledge_docs.len(),
        memories = retrieval.past_memories.len(),
        "retrieved context"
    );
    Ok(retrieval)
}

// ---------------------------------------------------------------------------
// Stage 4: risk
// ---------------------------------------------------------------------------

/// Score the plan against the retrieved rules and history.
#[instrument(skip_all, fields(stage = "risk", model = generator.model_name()))]
pub async fn analyze_risk<G: GenerationService>(
    generator: &G,
    state: &PipelineState,
) -> Result<RiskAssessment> {
    let details = state.event_details()?.to_json();
    let rules = Value::from(state.knowledge_docs()?.to_vec()).to_string();
    let memories = Value::from(state.past_memories()?.to_vec()).to_string();

    let prompt = prompts::fill(
        prompts::RISK,
        &[
            ("event_details", &details),
            ("rules", &rules),
            ("memories", &memories),
        ],
    );
    let raw = generator
        .generate(&prompt, &SamplingConfig::deterministic_json())
        .await?;

    let assessment = risk::assess(parse_structured(&raw), &raw);
    info!(score = ?assessment.score, level = ?assessment.level, "scored risk");
    Ok(assessment)
}

// ---------------------------------------------------------------------------
// Stage 5: marketing
// ---------------------------------------------------------------------------

/// Generate landing-page content and wrap it in the page template.
#[instrument(skip_all, fields(stage = "marketing", model = generator.model_name()))]
pub async fn generate_marketing<G: GenerationService>(
    generator: &G,
    state: &PipelineState,
    creative_temperature: f32,
) -> Result<String> {
    let details = state.event_details()?.to_json();
    let prompt = prompts::fill(
        prompts::MARKETING,
        &[("event_name", state.event_name()), ("event_details", &details)],
    );
    let raw = generator
        .generate(&prompt, &SamplingConfig::creative(creative_temperature))
        .await?;

    let body = strip_code_fences(&raw);
    if body.is_empty() {
        warn!("marketing stage returned no content");
    }
    let page = render_full_page(state.event_name(), &body);
    info!(bytes = page.len(), "rendered landing page");
    Ok(page)
}
