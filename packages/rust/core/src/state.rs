//! Pipeline state record and the typed views over stage outputs.
//!
//! [`PipelineState`] is created per run and threaded through the stages. Every
//! `with_*` method consumes the record and returns it with one more field set;
//! a field can be set once. [`PipelineState::finish`] turns a complete record
//! into a [`FinalState`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use eventintel_shared::{Degraded, EventIntelError, Result, RunId};

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Inference,
    Classification,
    Retrieval,
    Risk,
    Marketing,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Inference,
        Stage::Classification,
        Stage::Retrieval,
        Stage::Risk,
        Stage::Marketing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inference => "inference",
            Self::Classification => "classification",
            Self::Retrieval => "retrieval",
            Self::Risk => "risk",
            Self::Marketing => "marketing",
        }
    }

    /// One-based position in [`Stage::ALL`].
    pub fn number(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).map_or(0, |i| i + 1)
    }

    /// Human-readable label for progress output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inference => "Inferring event profile",
            Self::Classification => "Deriving risk tags",
            Self::Retrieval => "Retrieving rules and history",
            Self::Risk => "Scoring risk",
            Self::Marketing => "Generating landing page",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventDetails
// ---------------------------------------------------------------------------

/// Event category the inference stage is asked to choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Social,
    Academic,
    Fundraiser,
    Performance,
    Workshop,
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "social" => Ok(Self::Social),
            "academic" => Ok(Self::Academic),
            "fundraiser" => Ok(Self::Fundraiser),
            "performance" => Ok(Self::Performance),
            "workshop" => Ok(Self::Workshop),
            other => Err(format!("unknown event type '{other}'")),
        }
    }
}

/// Structured event profile produced by the inference stage.
///
/// The mapping is kept exactly as the model returned it; the accessors
/// interpret individual keys without rewriting them. A degraded profile
/// serializes as the two-key mapping `{error, raw}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventDetails {
    map: Map<String, Value>,
    #[serde(skip)]
    degraded: Option<Degraded>,
}

impl EventDetails {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            map,
            degraded: None,
        }
    }

    pub fn degraded(degraded: &Degraded) -> Self {
        let mut map = Map::new();
        map.insert("error".into(), Value::String(degraded.error.clone()));
        map.insert("raw".into(), Value::String(degraded.raw.clone()));
        Self {
            map,
            degraded: Some(degraded.clone()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// Why the profile could not be read, when it was not.
    pub fn degradation(&self) -> Option<&Degraded> {
        self.degraded.as_ref()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    pub fn event_type(&self) -> Option<EventType> {
        self.map.get("type")?.as_str()?.parse().ok()
    }

    /// Attendance estimate, if the model gave a non-negative whole number
    /// (as a JSON integer, an integral float, or a numeric string).
    pub fn estimated_attendees(&self) -> Option<u64> {
        match self.map.get("estimated_attendees")? {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            }),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
    }

    pub fn is_outdoors(&self) -> Option<bool> {
        self.map.get("is_outdoors")?.as_bool()
    }

    /// Compact JSON text of the mapping, as embedded into later prompts.
    pub fn to_json(&self) -> String {
        Value::Object(self.map.clone()).to_string()
    }
}

// ---------------------------------------------------------------------------
// RiskAssessment
// ---------------------------------------------------------------------------

/// Risk band derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// 0–20 Low, 21–60 Medium, 61–100 High.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=20 => Self::Low,
            21..=60 => Self::Medium,
            _ => Self::High,
        }
    }

    /// Lenient parse of a model-supplied level ("high", "High Risk", ...).
    pub fn parse_claim(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        if lower.starts_with("low") {
            Some(Self::Low)
        } else if lower.starts_with("medium") || lower.starts_with("moderate") {
            Some(Self::Medium)
        } else if lower.starts_with("high") {
            Some(Self::High)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the risk stage after validation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Clamped to [0, 100]. Absent when the response was unusable.
    pub score: Option<u8>,
    /// Always [`RiskLevel::from_score`] of `score`.
    pub level: Option<RiskLevel>,
    pub reasoning: String,
    pub mitigation_plan: String,
    /// The level as the model stated it, if any.
    pub claimed_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<Degraded>,
}

impl RiskAssessment {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

// ---------------------------------------------------------------------------
// Stage outputs
// ---------------------------------------------------------------------------

/// Output of the classification stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub queries: Vec<String>,
    /// Set when the response could not be read and `queries` fell back to empty.
    pub degraded: Option<Degraded>,
}

/// Output of the retrieval stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    pub knowledge_docs: Vec<String>,
    pub past_memories: Vec<String>,
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// Per-run state threaded through the stages.
#[derive(Debug, Clone)]
pub struct PipelineState {
    run_id: RunId,
    event_name: String,
    event_details: Option<EventDetails>,
    classification: Option<Classification>,
    retrieval: Option<Retrieval>,
    risk_assessment: Option<RiskAssessment>,
    marketing_code: Option<String>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &str) -> Result<()> {
    if slot.is_some() {
        return Err(EventIntelError::validation(format!(
            "{field} is already set for this run"
        )));
    }
    *slot = Some(value);
    Ok(())
}

fn missing(field: &str) -> EventIntelError {
    EventIntelError::validation(format!("{field} has not been produced yet"))
}

impl PipelineState {
    /// Start a run. The name is trimmed and must not be blank.
    pub fn new(event_name: &str) -> Result<Self> {
        let event_name = event_name.trim();
        if event_name.is_empty() {
            return Err(EventIntelError::validation("event name must not be empty"));
        }
        Ok(Self {
            run_id: RunId::new(),
            event_name: event_name.to_string(),
            event_details: None,
            classification: None,
            retrieval: None,
            risk_assessment: None,
            marketing_code: None,
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn event_details(&self) -> Result<&EventDetails> {
        self.event_details.as_ref().ok_or_else(|| missing("event_details"))
    }

    pub fn search_queries(&self) -> Result<&[String]> {
        self.classification
            .as_ref()
            .map(|c| c.queries.as_slice())
            .ok_or_else(|| missing("search_queries"))
    }

    pub fn knowledge_docs(&self) -> Result<&[String]> {
        self.retrieval
            .as_ref()
            .map(|r| r.knowledge_docs.as_slice())
            .ok_or_else(|| missing("knowledge_docs"))
    }

    pub fn past_memories(&self) -> Result<&[String]> {
        self.retrieval
            .as_ref()
            .map(|r| r.past_memories.as_slice())
            .ok_or_else(|| missing("past_memories"))
    }

    pub fn risk_assessment(&self) -> Result<&RiskAssessment> {
        self.risk_assessment
            .as_ref()
            .ok_or_else(|| missing("risk_assessment"))
    }

    pub fn with_event_details(mut self, details: EventDetails) -> Result<Self> {
        set_once(&mut self.event_details, details, "event_details")?;
        Ok(self)
    }

    pub fn with_classification(mut self, classification: Classification) -> Result<Self> {
        set_once(&mut self.classification, classification, "search_queries")?;
        Ok(self)
    }

    pub fn with_retrieval(mut self, retrieval: Retrieval) -> Result<Self> {
        set_once(&mut self.retrieval, retrieval, "knowledge_docs")?;
        Ok(self)
    }

    pub fn with_risk_assessment(mut self, assessment: RiskAssessment) -> Result<Self> {
        set_once(&mut self.risk_assessment, assessment, "risk_assessment")?;
        Ok(self)
    }

    pub fn with_marketing_code(mut self, html: String) -> Result<Self> {
        if html.trim().is_empty() {
            return Err(EventIntelError::validation("marketing_code must not be empty"));
        }
        set_once(&mut self.marketing_code, html, "marketing_code")?;
        Ok(self)
    }

    /// Convert a complete record into the run result.
    pub fn finish(self) -> Result<FinalState> {
        let event_details = self.event_details.ok_or_else(|| missing("event_details"))?;
        let classification = self.classification.ok_or_else(|| missing("search_queries"))?;
        let retrieval = self.retrieval.ok_or_else(|| missing("knowledge_docs"))?;
        let risk_assessment = self
            .risk_assessment
            .ok_or_else(|| missing("risk_assessment"))?;
        let marketing_code = self.marketing_code.ok_or_else(|| missing("marketing_code"))?;

        let mut degraded_stages = Vec::new();
        if event_details.is_degraded() {
            degraded_stages.push(Stage::Inference);
        }
        if classification.degraded.is_some() {
            degraded_stages.push(Stage::Classification);
        }
        if risk_assessment.is_degraded() {
            degraded_stages.push(Stage::Risk);
        }

        Ok(FinalState {
            run_id: self.run_id,
            event_name: self.event_name,
            event_details,
            search_queries: classification.queries,
            knowledge_docs: retrieval.knowledge_docs,
            past_memories: retrieval.past_memories,
            risk_assessment,
            marketing_code,
            degraded_stages,
        })
    }
}

// ---------------------------------------------------------------------------
// FinalState
// ---------------------------------------------------------------------------

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct FinalState {
    pub run_id: RunId,
    pub event_name: String,
    pub event_details: EventDetails,
    pub search_queries: Vec<String>,
    pub knowledge_docs: Vec<String>,
    pub past_memories: Vec<String>,
    pub risk_assessment: RiskAssessment,
    pub marketing_code: String,
    degraded_stages: Vec<Stage>,
}

impl FinalState {
    /// Stages whose output is a degraded result.
    pub fn degraded_stages(&self) -> &[Stage] {
        &self.degraded_stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(value: Value) -> EventDetails {
        match value {
            Value::Object(map) => EventDetails::from_map(map),
            other => panic!("not an object: {other}"),
        }
    }

    fn complete_state() -> PipelineState {
        PipelineState::new("  Spring Fling  ")
            .unwrap()
            .with_event_details(details(json!({"type": "Social"})))
            .unwrap()
            .with_classification(Classification {
                queries: vec!["crowd control".into()],
                degraded: None,
            })
            .unwrap()
            .with_retrieval(Retrieval::default())
            .unwrap()
            .with_risk_assessment(RiskAssessment::default())
            .unwrap()
            .with_marketing_code("<!DOCTYPE html></html>".into())
            .unwrap()
    }

    #[test]
    fn blank_event_name_is_rejected() {
        assert!(PipelineState::new("").is_err());
        let err = PipelineState::new("   \t").unwrap_err();
        assert!(matches!(err, EventIntelError::Validation { .. }));
    }

    #[test]
    fn event_name_is_trimmed() {
        let state = PipelineState::new("  Spring Fling  ").unwrap();
        assert_eq!(state.event_name(), "Spring Fling");
    }

    #[test]
    fn fields_can_only_be_set_once() {
        let state = PipelineState::new("Quiz Night")
            .unwrap()
            .with_event_details(EventDetails::default())
            .unwrap();
        let err = state.with_event_details(EventDetails::default()).unwrap_err();
        assert!(err.to_string().contains("already set"));
    }

    #[test]
    fn incomplete_state_cannot_finish() {
        let state = PipelineState::new("Quiz Night")
            .unwrap()
            .with_event_details(EventDetails::default())
            .unwrap();
        let err = state.finish().unwrap_err();
        assert!(err.to_string().contains("search_queries"));
    }

    #[test]
    fn missing_fields_are_reported_by_getters() {
        let state = PipelineState::new("Quiz Night").unwrap();
        assert!(state.event_details().is_err());
        assert!(state.risk_assessment().is_err());
    }

    #[test]
    fn finish_collects_degraded_stages() {
        let final_state = complete_state().finish().unwrap();
        assert_eq!(final_state.event_name, "Spring Fling");
        assert!(final_state.degraded_stages().is_empty());

        let state = PipelineState::new("Gala")
            .unwrap()
            .with_event_details(EventDetails::degraded(&Degraded::new("bad", "??")))
            .unwrap()
            .with_classification(Classification {
                queries: vec![],
                degraded: Some(Degraded::new("bad", "??")),
            })
            .unwrap()
            .with_retrieval(Retrieval::default())
            .unwrap()
            .with_risk_assessment(RiskAssessment {
                degraded: Some(Degraded::new("bad", "??")),
                ..RiskAssessment::default()
            })
            .unwrap()
            .with_marketing_code("<html></html>".into())
            .unwrap();
        let final_state = state.finish().unwrap();
        assert_eq!(
            final_state.degraded_stages(),
            &[Stage::Inference, Stage::Classification, Stage::Risk]
        );
    }

    #[test]
    fn empty_marketing_code_is_rejected() {
        let state = PipelineState::new("Gala").unwrap();
        assert!(state.with_marketing_code("  ".into()).is_err());
    }

    #[test]
    fn attendee_estimates_are_interpreted_leniently() {
        assert_eq!(details(json!({"estimated_attendees": 150})).estimated_attendees(), Some(150));
        assert_eq!(details(json!({"estimated_attendees": 150.0})).estimated_attendees(), Some(150));
        assert_eq!(details(json!({"estimated_attendees": " 80 "})).estimated_attendees(), Some(80));
        assert_eq!(details(json!({"estimated_attendees": -5})).estimated_attendees(), None);
        assert_eq!(details(json!({"estimated_attendees": 12.5})).estimated_attendees(), None);
        assert_eq!(details(json!({"estimated_attendees": "lots"})).estimated_attendees(), None);
        assert_eq!(details(json!({})).estimated_attendees(), None);
    }

    #[test]
    fn event_type_and_degraded_shape() {
        let d = details(json!({"type": "fundraiser", "is_outdoors": true}));
        assert_eq!(d.event_type(), Some(EventType::Fundraiser));
        assert_eq!(d.is_outdoors(), Some(true));
        assert!(!d.is_degraded());

        let d = details(json!({"type": "Social | Academic"}));
        assert_eq!(d.event_type(), None);

        let d = EventDetails::degraded(&Degraded::new("Failed to parse JSON", "oops"));
        assert!(d.is_degraded());
        assert_eq!(d.degradation().map(|g| g.raw.as_str()), Some("oops"));
        assert_eq!(d.get("raw"), Some(&json!("oops")));
        assert_eq!(d.to_json(), r#"{"error":"Failed to parse JSON","raw":"oops"}"#);
    }

    #[test]
    fn model_reply_shaped_like_degraded_is_not_degraded() {
        let d = details(json!({"error": "none", "raw": "fine"}));
        assert!(!d.is_degraded());

        let state = PipelineState::new("Debug Night")
            .unwrap()
            .with_event_details(d)
            .unwrap()
            .with_classification(Classification::default())
            .unwrap()
            .with_retrieval(Retrieval::default())
            .unwrap()
            .with_risk_assessment(RiskAssessment::default())
            .unwrap()
            .with_marketing_code("<html></html>".into())
            .unwrap();
        assert!(state.finish().unwrap().degraded_stages().is_empty());
    }

    #[test]
    fn stages_are_numbered_in_run_order() {
        let numbers: Vec<usize> = Stage::ALL.iter().map(Stage::number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(Stage::Risk.number(), 4);
    }

    #[test]
    fn risk_bands() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(20), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(21), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(61), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::High);
        assert_eq!(RiskLevel::parse_claim("High Risk"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse_claim("moderate"), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::parse_claim("unknown"), None);
    }
}
