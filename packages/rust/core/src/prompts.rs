//! Prompt templates for the generation stages.
//!
//! Placeholders are `{name}` tokens filled with [`fill`]; literal braces in
//! the JSON examples are left alone because only known keys are replaced.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("valid regex"));

pub const INFERENCE: &str = r#"You are an expert event planner.
Analyze the event name: "{event_name}".
Infer the likely details. If the name is ambiguous, make a conservative estimate based on typical university events.

Return strictly JSON:
{
    "type": "Social | Academic | Fundraiser | Performance | Workshop",
    "estimated_attendees": integer,
    "is_outdoors": boolean,
    "duration_hours": integer,
    "vibes": "formal | casual | energetic | professional",
    "venue_requirements": ["stage", "projector", "open space", "tables"]
}
"#;

pub const CLASSIFICATION: &str = r#"Given these event details: {event_details}

Generate 3-5 specific semantic search tags to find relevant safety rules and past incidents in the knowledge base.
Focus on high-risk factors (for example "alcohol", "crowd control", "electrical", "late night", "outdoor weather").

Return strictly JSON:
{
    "queries": ["tag1", "tag2", "tag3", "tag4"]
}
"#;

pub const RISK: &str = r#"You are a university risk officer. Analyze this event plan against institutional rules and history.

Event Details:
{event_details}

Relevant Standard Operating Procedures (SOPs):
{rules}

Historical Lessons Learned (Memory):
{memories}

Task:
1. Check for specific SOP violations (for example capacity versus fire exits, or noise rules).
2. Check whether similar past failures might repeat, based on the memory logs.
3. Assign a risk score from 0 to 100.
   - 0-20: Low Risk
   - 21-60: Medium Risk
   - 61-100: High Risk (requires intervention)

Return strictly JSON:
{
    "score": integer,
    "level": "Low | Medium | High",
    "reasoning": "Clear explanation citing specific SOPs (e.g. 'Violates SOP-102') or past events (e.g. 'Repeat of 2023 failure').",
    "mitigation_plan": "A concrete step to reduce this risk."
}
"#;

pub const MARKETING: &str = r#"You are a content designer.
The event name is: "{event_name}"
Context: {event_details}

Generate HTML content blocks that will be injected into a dark glassmorphism page template.

Requirements:
1. Hero section: a section with class="text-center py-20". Include a large h1 (text-6xl font-bold mb-4 bg-clip-text text-transparent bg-gradient-to-r from-pink-400 to-purple-400) and a catchy p (text-xl text-gray-300 mb-8).
2. Features grid: a div with class="grid grid-cols-1 md:grid-cols-3 gap-8 my-16" holding 3 feature cards with class="glass-card p-8 hover:bg-white/10 transition duration-300". Use Font Awesome icons inside the cards, such as <i class="fas fa-music text-4xl mb-4 text-pink-500"></i>.
3. Details section: a centered div with date, time and location using class="glass-card inline-block px-10 py-6".

Constraints:
- Do not write <html>, <head>, <body> or <style> tags. The template adds them.
- Do not use markdown code fences. Return only the raw HTML blocks.
- Use Tailwind classes only.
"#;

/// Replace each `{key}` in `template` with its value in a single pass.
/// Inserted values are never scanned for placeholders.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            vars.iter()
                .find(|(key, _)| *key == &caps[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
