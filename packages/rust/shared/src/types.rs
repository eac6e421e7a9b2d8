//! Core domain types shared across EventIntel crates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File-name fragments that mark a knowledge file as historical memory.
const MEMORY_FILE_MARKERS: [&str; 3] = ["incident", "log", "memory"];

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline invocation (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Knowledge domain of an indexed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Compliance rules and standard operating procedures.
    Rule,
    /// Historical incident records and lessons learned.
    Memory,
}

impl Category {
    /// Storage value for the category column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Memory => "memory",
        }
    }

    /// Classify a knowledge file by its name.
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if MEMORY_FILE_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::Memory
        } else {
            Self::Rule
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rule" => Ok(Self::Rule),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown category '{other}' (expected rule or memory)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Degraded
// ---------------------------------------------------------------------------

/// Placeholder for generated text that could not be read as structured output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degraded {
    /// What went wrong.
    pub error: String,
    /// The text the service actually returned.
    pub raw: String,
}

impl Degraded {
    pub fn new(error: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            raw: raw.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_display_is_uuid() {
        let id = RunId::new();
        let s = id.to_string();
        assert_eq!(s.len(), 36);
        assert!(s.contains('-'));
    }

    #[test]
    fn category_from_file_name() {
        assert_eq!(Category::from_file_name("incident_memory_log.txt"), Category::Memory);
        assert_eq!(Category::from_file_name("Spring_INCIDENTS.txt"), Category::Memory);
        assert_eq!(Category::from_file_name("changelog.txt"), Category::Memory);
        assert_eq!(Category::from_file_name("university_sops_policy.txt"), Category::Rule);
        assert_eq!(Category::from_file_name("fire_code.txt"), Category::Rule);
    }

    #[test]
    fn category_serde_and_parse() {
        assert_eq!(serde_json::to_string(&Category::Rule).unwrap(), r#""rule""#);
        let parsed: Category = serde_json::from_str(r#""memory""#).unwrap();
        assert_eq!(parsed, Category::Memory);
        assert_eq!("Rule".parse::<Category>().unwrap(), Category::Rule);
        assert!("policy".parse::<Category>().is_err());
    }
}
