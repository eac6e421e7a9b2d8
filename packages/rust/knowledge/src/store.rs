//! Document store adapter over the libSQL chunk table.
//!
//! [`KnowledgeStore`] opens the database lazily on first use and, when it
//! finds the store empty, populates it from the configured knowledge folder.
//! The open-and-populate step runs at most once per process: concurrent first
//! callers wait on the same initialization through a [`OnceCell`].

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eventintel_llm::Embedder;
use eventintel_shared::{Category, EventIntelError, KnowledgeConfig, Result};
use eventintel_storage::{NewChunk, Storage};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::splitter::TextSplitter;

/// Source file name recorded for user-submitted feedback memories.
pub const FEEDBACK_SOURCE: &str = "user_feedback_log.txt";

/// Maximum number of texts sent to the embedder in one request.
const EMBED_BATCH: usize = 32;

/// One retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub content: String,
    pub source_file: String,
    pub category: Category,
    pub score: f64,
}

/// Query seam over the category-partitioned index.
pub trait DocumentSearch: Send + Sync {
    /// Top-`k` chunks of `category` most similar to `query`.
    /// No match is an empty vector, never an error.
    fn search(
        &self,
        query: &str,
        category: Category,
        k: usize,
    ) -> impl Future<Output = Result<Vec<SearchHit>>> + Send;
}

/// A file that could not be ingested.
#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}

/// Outcome of an ingestion pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// `.txt` files found in the source directory.
    pub files_seen: usize,
    /// Files skipped because they could not be read.
    pub failed_files: Vec<FailedFile>,
    /// Chunks produced by splitting.
    pub chunks_total: usize,
    /// Chunks newly written (the rest were already stored).
    pub chunks_inserted: usize,
}

/// A user-submitted lesson learned, stored as a memory chunk.
#[derive(Debug, Clone)]
pub struct FeedbackEntry {
    pub event_name: String,
    pub outcome: String,
    pub description: String,
    pub lesson_learned: String,
}

impl FeedbackEntry {
    /// Text stored for this feedback. Contains no timestamp, so submitting the
    /// same feedback twice stores it once.
    pub fn to_record(&self) -> String {
        format!(
            "EVENT ID: {}\nType: User Feedback\nOutcome: {}\nDescription: {}\nLesson Learned: {}",
            self.event_name.trim().to_uppercase(),
            self.outcome.trim(),
            self.description.trim(),
            self.lesson_learned.trim(),
        )
    }
}

/// Stable identifier for a chunk: hex SHA-256 of its content.
pub fn chunk_id(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Persistent, category-partitioned knowledge store.
pub struct KnowledgeStore<E> {
    config: KnowledgeConfig,
    embedder: Arc<E>,
    splitter: TextSplitter,
    storage: OnceCell<Storage>,
}

impl<E: Embedder> KnowledgeStore<E> {
    /// Create an adapter; nothing is opened until first use.
    pub fn new(config: KnowledgeConfig, embedder: Arc<E>) -> Result<Self> {
        let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap)?;
        Ok(Self {
            config,
            embedder,
            splitter,
            storage: OnceCell::new(),
        })
    }

    /// Open (or create) the store and auto-ingest if it is empty.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.storage().await.map(|_| ())
    }

    async fn storage(&self) -> Result<&Storage> {
        self.storage.get_or_try_init(|| self.initialize()).await
    }

    #[instrument(skip_all, fields(db = %self.config.db_path.display()))]
    async fn initialize(&self) -> Result<Storage> {
        let storage = Storage::open(&self.config.db_path).await?;
        let count = storage.count().await?;

        if count == 0 && self.config.auto_ingest {
            info!(dir = %self.config.data_dir.display(), "knowledge store is empty, ingesting");
            let report = self.ingest_into(&storage, &self.config.data_dir).await?;
            info!(
                files = report.files_seen,
                failed = report.failed_files.len(),
                inserted = report.chunks_inserted,
                "initial ingestion complete"
            );
        } else {
            debug!(count, "knowledge store ready");
        }

        Ok(storage)
    }

    /// Ingest every `.txt` file in `source_dir`.
    pub async fn ingest(&self, source_dir: &Path) -> Result<IngestReport> {
        let storage = self.storage().await?;
        self.ingest_into(storage, source_dir).await
    }

    /// Clear every chunk and ingest `source_dir` from scratch.
    pub async fn rebuild(&self, source_dir: &Path) -> Result<IngestReport> {
        let storage = self.storage().await?;
        let removed = storage.clear().await?;
        warn!(removed, "cleared knowledge store");
        self.ingest_into(storage, source_dir).await
    }

    #[instrument(skip_all, fields(dir = %source_dir.display()))]
    async fn ingest_into(&self, storage: &Storage, source_dir: &Path) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        if !source_dir.exists() {
            std::fs::create_dir_all(source_dir)
                .map_err(|e| EventIntelError::io(source_dir, e))?;
            warn!("created empty knowledge folder; add .txt files to populate the store");
            return Ok(report);
        }

        for path in list_text_files(source_dir)? {
            report.files_seen += 1;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = %file_name, error = %e, "skipping unreadable knowledge file");
                    report.failed_files.push(FailedFile {
                        file: file_name,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let category = Category::from_file_name(&file_name);
            let chunks = self.splitter.split(&content);
            report.chunks_total += chunks.len();

            let inserted = self
                .insert_new(storage, chunks, category, &file_name)
                .await?;
            report.chunks_inserted += inserted;

            info!(file = %file_name, %category, inserted, "ingested knowledge file");
        }

        Ok(report)
    }

    /// Embed and insert the chunks that are not stored yet.
    async fn insert_new(
        &self,
        storage: &Storage,
        chunks: Vec<String>,
        category: Category,
        source_file: &str,
    ) -> Result<usize> {
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        for content in chunks {
            let id = chunk_id(&content);
            if !seen.insert(id.clone()) || storage.contains(&id).await? {
                continue;
            }
            fresh.push((id, content));
        }

        let mut inserted = 0;
        for batch in fresh.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|(_, c)| c.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            for ((id, content), embedding) in batch.iter().zip(vectors) {
                let written = storage
                    .insert_chunk(&NewChunk {
                        id: id.clone(),
                        content: content.clone(),
                        category,
                        source_file: source_file.to_string(),
                        embedding,
                    })
                    .await?;
                if written {
                    inserted += 1;
                }
            }
        }
        Ok(inserted)
    }

    /// Top-`k` chunks of `category` by similarity to `query`.
    pub async fn similarity_search(
        &self,
        query: &str,
        category: Category,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let storage = self.storage().await?;
        if storage.count_in(category).await? == 0 {
            debug!(%category, "no chunks in category");
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EventIntelError::service("embedding", "no vector for query"))?;

        let hits = storage
            .nearest(&query_vec, category, k)
            .await?
            .into_iter()
            .map(|scored| SearchHit {
                content: scored.chunk.content,
                source_file: scored.chunk.source_file,
                category: scored.chunk.category,
                score: scored.score,
            })
            .collect::<Vec<_>>();

        debug!(%category, k, hits = hits.len(), "similarity search");
        Ok(hits)
    }

    /// Insert one chunk. Returns whether the chunk is stored afterwards;
    /// failures are logged, never raised.
    pub async fn add_record(&self, text: &str, category: Category, source_file: &str) -> bool {
        match self.try_add_record(text, category, source_file).await {
            Ok(present) => present,
            Err(e) => {
                warn!(error = %e, source_file, "failed to add record");
                false
            }
        }
    }

    async fn try_add_record(&self, text: &str, category: Category, source_file: &str) -> Result<bool> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EventIntelError::validation("record text is empty"));
        }

        let storage = self.storage().await?;
        let id = chunk_id(text);
        if storage.contains(&id).await? {
            return Ok(true);
        }

        self.insert_new(storage, vec![text.to_string()], category, source_file)
            .await?;
        storage.contains(&id).await
    }

    /// Store a user-feedback memory.
    pub async fn record_feedback(&self, entry: &FeedbackEntry) -> bool {
        info!(event = %entry.event_name, "saving feedback memory");
        self.add_record(&entry.to_record(), Category::Memory, FEEDBACK_SOURCE)
            .await
    }

    /// Total stored chunks.
    pub async fn count(&self) -> Result<u64> {
        self.storage().await?.count().await
    }

    /// Stored chunks in one category.
    pub async fn count_in(&self, category: Category) -> Result<u64> {
        self.storage().await?.count_in(category).await
    }

    /// Folder auto-ingest reads from.
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }
}

impl<E: Embedder> DocumentSearch for KnowledgeStore<E> {
    async fn search(&self, query: &str, category: Category, k: usize) -> Result<Vec<SearchHit>> {
        self.similarity_search(query, category, k).await
    }
}

/// `.txt` files directly inside `dir`, sorted by name.
fn list_text_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| EventIntelError::io(dir, e))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
        })
        .collect();
    files.sort();
    Ok(files)
}
