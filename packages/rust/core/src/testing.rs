//! In-memory generation and search fakes shared by the stage and pipeline tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use eventintel_knowledge::{DocumentSearch, SearchHit};
use eventintel_llm::{GenerationService, SamplingConfig};
use eventintel_shared::{Category, EventIntelError, Result};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub sampling: SamplingConfig,
}

/// Answers each stage prompt with a canned response, recognised by a phrase
/// unique to that stage's template.
#[derive(Default)]
pub struct ScriptedGenerator {
    inference: Option<String>,
    classification: Option<String>,
    risk: Option<String>,
    marketing: Option<String>,
    delay: Option<Duration>,
    fail: bool,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn inference(mut self, response: &str) -> Self {
        self.inference = Some(response.into());
        self
    }

    pub fn classification(mut self, response: &str) -> Self {
        self.classification = Some(response.into());
        self
    }

    pub fn risk(mut self, response: &str) -> Self {
        self.risk = Some(response.into());
        self
    }

    pub fn marketing(mut self, response: &str) -> Self {
        self.marketing = Some(response.into());
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Well-formed responses for the rooftop fundraiser scenario.
    pub fn jazz_fundraiser() -> Self {
        Self::new()
            .inference(
                r#"{"type": "Fundraiser", "estimated_attendees": 150, "is_outdoors": true,
                    "duration_hours": 4, "vibes": "formal",
                    "venue_requirements": ["stage", "bar", "lighting"]}"#,
            )
            .classification(r#"{"queries": ["alcohol", "rooftop capacity", "late night", "noise"]}"#)
            .risk(
                r#"{"score": 78, "level": "High",
                    "reasoning": "Violates SOP-102 on alcohol service; repeat of 2023 overcrowding failure.",
                    "mitigation_plan": "Cap attendance at 120 and hire licensed bartenders."}"#,
            )
            .marketing(
                "```html\n<section class=\"text-center py-20\"><h1>Midnight Jazz</h1></section>\n\
                 <div class=\"grid grid-cols-1 md:grid-cols-3 gap-8 my-16\"></div>\n```",
            )
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn response_for(&self, prompt: &str) -> Option<&String> {
        if prompt.contains("Analyze the event name") {
            self.inference.as_ref()
        } else if prompt.contains("semantic search tags") {
            self.classification.as_ref()
        } else if prompt.contains("risk officer") {
            self.risk.as_ref()
        } else if prompt.contains("content designer") {
            self.marketing.as_ref()
        } else {
            None
        }
    }
}

impl GenerationService for ScriptedGenerator {
    async fn generate(&self, prompt: &str, sampling: &SamplingConfig) -> Result<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            prompt: prompt.to_string(),
            sampling: sampling.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(EventIntelError::service("generation", "connection refused"));
        }
        self.response_for(prompt)
            .cloned()
            .ok_or_else(|| EventIntelError::service("generation", "no scripted response"))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Fixed per-category documents; returns the first `k` of the requested category.
#[derive(Default)]
pub struct StaticSearch {
    rules: Vec<SearchHit>,
    memories: Vec<SearchHit>,
    fail: bool,
    queries: AtomicUsize,
}

fn hit(content: &str, source_file: &str, category: Category) -> SearchHit {
    SearchHit {
        content: content.into(),
        source_file: source_file.into(),
        category,
        score: 0.9,
    }
}

impl StaticSearch {
    pub fn seeded() -> Self {
        let rules = [
            "SOP-102: Alcohol may only be served by licensed bartenders.",
            "SOP-210: Rooftop venues are capped at 120 guests.",
            "SOP-305: Amplified music must end by 23:00 on weeknights.",
            "SOP-401: Two fire exits are required above 100 guests.",
            "SOP-500: Outdoor events need a weather contingency plan.",
        ]
        .iter()
        .map(|c| hit(c, "university_sops_policy.txt", Category::Rule))
        .collect();
        let memories = [
            "2023 Spring Fling: overcrowding at the gate after 22:00.",
            "2022 Rooftop Mixer: noise complaints ended the event early.",
            "2021 Gala: unlicensed bar led to a fine.",
            "2020 Hackathon: WiFi crashed.",
        ]
        .iter()
        .map(|c| hit(c, "incident_memory_log.txt", Category::Memory))
        .collect();
        Self {
            rules,
            memories,
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl DocumentSearch for StaticSearch {
    async fn search(&self, _query: &str, category: Category, k: usize) -> Result<Vec<SearchHit>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EventIntelError::Storage("database is locked".into()));
        }
        let source = match category {
            Category::Rule => &self.rules,
            Category::Memory => &self.memories,
        };
        Ok(source.iter().take(k).cloned().collect())
    }
}
