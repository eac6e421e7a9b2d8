//! Post-hoc validation of the risk stage's structured output.
//!
//! The model's score is trusted only after it is read as a number and clamped;
//! the level is always recomputed from the score band.

use serde_json::{Map, Value};
use tracing::warn;

use eventintel_llm::JsonOutcome;
use eventintel_shared::Degraded;

use crate::state::{RiskAssessment, RiskLevel};

/// Turn a parsed risk response into a validated assessment.
pub fn assess(outcome: JsonOutcome, raw: &str) -> RiskAssessment {
    match outcome.into_object(raw) {
        Ok(map) => from_object(&map, raw),
        Err(degraded) => {
            warn!(error = %degraded.error, "risk response is not usable JSON");
            RiskAssessment {
                degraded: Some(degraded),
                ..RiskAssessment::default()
            }
        }
    }
}

fn from_object(map: &Map<String, Value>, raw: &str) -> RiskAssessment {
    let reasoning = text_field(map, "reasoning");
    let mitigation_plan = text_field(map, "mitigation_plan");
    let claimed_level = map
        .get("level")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let Some(score) = map.get("score").and_then(parse_score) else {
        warn!("risk response has no usable score");
        return RiskAssessment {
            reasoning,
            mitigation_plan,
            claimed_level,
            degraded: Some(Degraded::new("risk response has no usable score", raw)),
            ..RiskAssessment::default()
        };
    };

    let level = RiskLevel::from_score(score);
    if let Some(claim) = claimed_level.as_deref() {
        if RiskLevel::parse_claim(claim) != Some(level) {
            warn!(score, claimed = claim, computed = %level, "risk level disagrees with score band");
        }
    }

    RiskAssessment {
        score: Some(score),
        level: Some(level),
        reasoning,
        mitigation_plan,
        claimed_level,
        degraded: None,
    }
}

/// Read a score from an integer, float or numeric string, clamped to [0, 100].
fn parse_score(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}

fn text_field(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
    }
}
