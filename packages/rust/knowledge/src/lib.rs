//! Knowledge store for EventIntel: chunking, ingestion, and
//! category-partitioned similarity search over rules and memories.

pub mod retrieval;
pub mod splitter;
pub mod store;

pub use retrieval::{DEFAULT_HISTORY_K, DEFAULT_RULES_K, retrieve_history, retrieve_rules};
pub use splitter::TextSplitter;
pub use store::{
    DocumentSearch, FEEDBACK_SOURCE, FailedFile, FeedbackEntry, IngestReport, KnowledgeStore,
    SearchHit, chunk_id,
};
