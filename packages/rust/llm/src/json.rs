//! Best-effort JSON recovery for model output.
//!
//! Models asked for "strictly JSON" still wrap it in chatty preambles now and
//! then. Parsing runs in two phases: a strict parse of the whole text, then a
//! single retry on the span from the first `{` to the last `}`. Anything else
//! becomes a [`Degraded`] sentinel.

use eventintel_shared::Degraded;
use serde_json::{Map, Value};

/// Result of interpreting generated text as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonOutcome {
    Parsed(Value),
    Degraded(Degraded),
}

impl JsonOutcome {
    /// Require a JSON object, degrading any other JSON shape.
    pub fn into_object(self, raw: &str) -> Result<Map<String, Value>, Degraded> {
        match self {
            Self::Parsed(Value::Object(map)) => Ok(map),
            Self::Parsed(other) => Err(Degraded::new(
                format!("expected a JSON object, got {}", json_kind(&other)),
                raw,
            )),
            Self::Degraded(d) => Err(d),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Parse `text` as JSON, falling back to brace extraction.
pub fn parse_structured(text: &str) -> JsonOutcome {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return JsonOutcome::Parsed(value);
    }

    if let Some(span) = brace_span(text) {
        match serde_json::from_str::<Value>(span) {
            Ok(value) => {
                tracing::debug!(
                    skipped = text.len() - span.len(),
                    "recovered JSON from surrounding prose"
                );
                return JsonOutcome::Parsed(value);
            }
            Err(e) => {
                return JsonOutcome::Degraded(Degraded::new(
                    format!("Failed to parse JSON: {e}"),
                    text,
                ));
            }
        }
    }

    JsonOutcome::Degraded(Degraded::new(
        "Failed to parse JSON: no object found in response",
        text,
    ))
}

/// Substring from the first `{` through the last `}`, if both exist in order.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_parses() {
        let outcome = parse_structured(r#"{"queries": ["alcohol", "late night"]}"#);
        match outcome {
            JsonOutcome::Parsed(v) => assert_eq!(v["queries"][1], "late night"),
            JsonOutcome::Degraded(d) => panic!("unexpected degrade: {}", d.error),
        }
    }

    #[test]
    fn prose_around_object_is_recovered() {
        let text = "Sure! Here is the profile you asked for:\n\
                    {\"type\": \"Fundraiser\", \"estimated_attendees\": 150}\n\
                    Let me know if you need anything else.";
        let map = parse_structured(text).into_object(text).expect("object");
        assert_eq!(map["type"], "Fundraiser");
        assert_eq!(map["estimated_attendees"], 150);
    }

    #[test]
    fn nested_braces_use_outermost_span() {
        let text = r#"Result: {"score": 70, "extra": {"a": 1}} done"#;
        let map = parse_structured(text).into_object(text).expect("object");
        assert_eq!(map["extra"]["a"], 1);
    }

    #[test]
    fn garbage_degrades_with_raw_text() {
        let text = "I cannot help with that.";
        match parse_structured(text) {
            JsonOutcome::Degraded(d) => {
                assert!(d.error.contains("Failed to parse JSON"));
                assert_eq!(d.raw, text);
            }
            JsonOutcome::Parsed(_) => panic!("expected degrade"),
        }
    }

    #[test]
    fn broken_object_degrades() {
        let text = "{\"score\": 70, \"level\": }";
        assert!(parse_structured(text).is_degraded());
    }

    #[test]
    fn reversed_braces_degrade() {
        assert!(parse_structured("} nothing here {").is_degraded());
    }

    #[test]
    fn non_object_json_degrades_on_into_object() {
        let text = r#"["alcohol"]"#;
        let err = parse_structured(text).into_object(text).unwrap_err();
        assert!(err.error.contains("an array"));
        assert_eq!(err.raw, text);
    }
}
