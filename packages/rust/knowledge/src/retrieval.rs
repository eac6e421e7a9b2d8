//! Tag-driven retrieval of rules and history for the analysis stage.
//!
//! Both functions build one natural-language query from the tags and format
//! each hit with a provenance header so the risk prompt can cite its sources.

use eventintel_shared::{Category, Result};
use tracing::debug;

use crate::store::{DocumentSearch, SearchHit};

pub const DEFAULT_RULES_K: usize = 4;
pub const DEFAULT_HISTORY_K: usize = 3;

/// Policy documents relevant to `tags`, each as
/// `"[RULE SOURCE: <file>]\n<content>"`.
pub async fn retrieve_rules<S: DocumentSearch>(
    search: &S,
    tags: &[String],
    k: usize,
) -> Result<Vec<String>> {
    if tags.is_empty() {
        return Ok(Vec::new());
    }
    let query = format!(
        "Standard operating procedures, safety rules, and compliance policies for {}",
        tags.join(", ")
    );
    let hits = search.search(&query, Category::Rule, k).await?;
    debug!(hits = hits.len(), "retrieved rules");
    Ok(format_hits(hits, "RULE SOURCE"))
}

/// Past incidents and lessons relevant to `tags`, each as
/// `"[HISTORY LOG: <file>]\n<content>"`.
pub async fn retrieve_history<S: DocumentSearch>(
    search: &S,
    tags: &[String],
    k: usize,
) -> Result<Vec<String>> {
    if tags.is_empty() {
        return Ok(Vec::new());
    }
    let query = format!(
        "Past failures, incidents, lessons learned, and success stories regarding {}",
        tags.join(", ")
    );
    let hits = search.search(&query, Category::Memory, k).await?;
    debug!(hits = hits.len(), "retrieved history");
    Ok(format_hits(hits, "HISTORY LOG"))
}

fn format_hits(hits: Vec<SearchHit>, label: &str) -> Vec<String> {
    hits.into_iter()
        .map(|hit| format!("[{label}: {}]\n{}", hit.source_file, hit.content))
        .collect()
}
