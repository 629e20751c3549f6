//! Document assistant vector store maintenance
//!
//! The document assistant answers from a vector store whose files should be
//! chunked at 400 tokens with 100 tokens of overlap, and whose `file_search`
//! tool should return at most 5 results above a 0.7 relevance score. When
//! either drifts, the files are re-indexed into a fresh store and the
//! assistant is pointed at it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;

use crate::assistant::VectorStoreApi;
use crate::assistant::types::{
    AssistantTool, AssistantUpdate, ChunkingStrategy, FileBatchRequest, FileBatchStatus,
    FileSearchResources, FileSearchSettings, RankingOptions, StaticChunking, ToolResources,
};
use crate::db::DocumentStore;
use crate::{Error, Result};

/// Collection holding bridge-wide records
pub const SYSTEM_COLLECTION: &str = "system";

/// Record holding the active vector store id
pub const VECTOR_STORE_RECORD: &str = "vectorStore";

pub const CHUNK_SIZE_TOKENS: u32 = 400;
pub const CHUNK_OVERLAP_TOKENS: u32 = 100;
pub const MAX_NUM_RESULTS: u32 = 5;
pub const SCORE_THRESHOLD: f64 = 0.7;
pub const RANKER: &str = "default_2024_08_21";

const STORE_NAME: &str = "Document Assistant Store";

/// Delay between file batch status checks
pub const BATCH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on waiting for a file batch
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(600);

/// Chunking applied to every indexed file
#[must_use]
pub const fn optimized_chunking() -> ChunkingStrategy {
    ChunkingStrategy::Static {
        params: StaticChunking {
            max_chunk_size_tokens: CHUNK_SIZE_TOKENS,
            chunk_overlap_tokens: CHUNK_OVERLAP_TOKENS,
        },
    }
}

/// Assistant update attaching `vector_store_id` with tuned search settings
#[must_use]
pub fn optimized_assistant_update(vector_store_id: &str) -> AssistantUpdate {
    AssistantUpdate {
        tools: vec![AssistantTool::FileSearch {
            file_search: Some(FileSearchSettings {
                max_num_results: Some(MAX_NUM_RESULTS),
                ranking_options: Some(RankingOptions {
                    ranker: Some(RANKER.to_string()),
                    score_threshold: SCORE_THRESHOLD,
                }),
            }),
        }],
        tool_resources: ToolResources {
            file_search: FileSearchResources {
                vector_store_ids: vec![vector_store_id.to_string()],
            },
        },
    }
}

/// Read the active vector store id
///
/// # Errors
///
/// Returns error if database operation fails
pub fn current_store_id(store: &DocumentStore) -> Result<Option<String>> {
    Ok(store
        .get(SYSTEM_COLLECTION, VECTOR_STORE_RECORD)?
        .and_then(|doc| doc.data.get("vectorStoreId")?.as_str().map(ToString::to_string)))
}

/// Persist the active vector store id
///
/// # Errors
///
/// Returns error if database operation fails
pub fn set_current_store_id(store: &DocumentStore, vector_store_id: &str) -> Result<()> {
    store.set(
        SYSTEM_COLLECTION,
        VECTOR_STORE_RECORD,
        &json!({
            "vectorStoreId": vector_store_id,
            "updatedAt": Utc::now().timestamp_millis(),
        }),
    )
}

/// Record `vector_store_id` as active unless one is already stored
///
/// # Errors
///
/// Returns error if database operation fails
pub fn seed_store_id(store: &DocumentStore, vector_store_id: &str) -> Result<bool> {
    if current_store_id(store)?.is_some() {
        return Ok(false);
    }
    set_current_store_id(store, vector_store_id)?;
    tracing::info!(vector_store_id, "seeded vector store id");
    Ok(true)
}

/// Wait until a file batch completes
///
/// # Errors
///
/// Returns `VectorStore` if the batch fails, is cancelled, or outlives the
/// timeout
pub async fn wait_for_batch(
    api: &dyn VectorStoreApi,
    vector_store_id: &str,
    batch_id: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<()> {
    let started = Instant::now();

    loop {
        let batch = api.retrieve_file_batch(vector_store_id, batch_id).await?;
        match batch.status {
            FileBatchStatus::Completed => return Ok(()),
            FileBatchStatus::Failed | FileBatchStatus::Cancelled => {
                return Err(Error::VectorStore(format!(
                    "file batch {batch_id} ended as {:?}",
                    batch.status
                )));
            }
            FileBatchStatus::InProgress | FileBatchStatus::Unknown => {
                if started.elapsed() > timeout {
                    return Err(Error::VectorStore(format!(
                        "file batch {batch_id} still processing after {}s",
                        timeout.as_secs()
                    )));
                }
                tokio::time::sleep(interval).await;
            }
        }
    }
}

/// Result of an optimisation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizeOutcome {
    /// No vector store recorded yet
    NoStore,
    /// Settings already match
    AlreadyOptimal,
    /// The store holds no files to re-index
    NoFiles,
    /// Files re-indexed into a new store
    Optimized {
        previous: String,
        current: String,
        file_count: usize,
    },
}

/// Re-indexes the document assistant's vector store when settings drift
#[derive(Clone)]
pub struct VectorStoreOptimizer {
    api: Arc<dyn VectorStoreApi>,
    store: DocumentStore,
    assistant_id: String,
    batch_interval: Duration,
    batch_timeout: Duration,
}

impl VectorStoreOptimizer {
    #[must_use]
    pub fn new(api: Arc<dyn VectorStoreApi>, store: DocumentStore, assistant_id: impl Into<String>) -> Self {
        Self {
            api,
            store,
            assistant_id: assistant_id.into(),
            batch_interval: BATCH_POLL_INTERVAL,
            batch_timeout: BATCH_TIMEOUT,
        }
    }

    /// Override the file batch polling cadence
    #[must_use]
    pub const fn batch_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.batch_interval = interval;
        self.batch_timeout = timeout;
        self
    }

    /// Check the active store and rebuild it if needed
    ///
    /// The new store id is persisted before the old store is deleted.
    ///
    /// # Errors
    ///
    /// Returns error if creating, populating or attaching the new store fails
    pub async fn run(&self) -> Result<OptimizeOutcome> {
        let Some(previous) = current_store_id(&self.store)? else {
            tracing::warn!("no vector store recorded, skipping optimization");
            return Ok(OptimizeOutcome::NoStore);
        };

        if !self.needs_optimization(&previous).await {
            tracing::info!(vector_store_id = %previous, "vector store optimization not needed");
            return Ok(OptimizeOutcome::AlreadyOptimal);
        }

        let file_ids = self.file_ids(&previous).await;
        if file_ids.is_empty() {
            tracing::warn!(vector_store_id = %previous, "no files found in current vector store");
            return Ok(OptimizeOutcome::NoFiles);
        }

        tracing::info!(file_count = file_ids.len(), "creating optimized vector store");
        let created = self.api.create_vector_store(STORE_NAME).await?;

        let request = FileBatchRequest {
            file_ids: file_ids.clone(),
            chunking_strategy: Some(optimized_chunking()),
        };
        let batch = self.api.create_file_batch(&created.id, &request).await?;
        wait_for_batch(
            self.api.as_ref(),
            &created.id,
            &batch.id,
            self.batch_interval,
            self.batch_timeout,
        )
        .await?;

        self.api
            .update_assistant(&self.assistant_id, &optimized_assistant_update(&created.id))
            .await?;
        set_current_store_id(&self.store, &created.id)?;
        self.api.delete_vector_store(&previous).await?;

        tracing::info!(
            previous = %previous,
            vector_store_id = %created.id,
            file_count = file_ids.len(),
            "vector store optimization complete"
        );

        Ok(OptimizeOutcome::Optimized {
            previous,
            current: created.id,
            file_count: file_ids.len(),
        })
    }

    /// Whether chunking or search settings differ from the tuned values
    ///
    /// An empty store needs nothing; a failed check counts as needed.
    async fn needs_optimization(&self, vector_store_id: &str) -> bool {
        match self.check_settings(vector_store_id).await {
            Ok(needed) => needed,
            Err(e) => {
                tracing::error!(error = %e, "error checking optimization status");
                true
            }
        }
    }

    async fn check_settings(&self, vector_store_id: &str) -> Result<bool> {
        let page = self.api.list_vector_store_files(vector_store_id, None).await?;
        let Some(first) = page.data.first() else {
            tracing::warn!(vector_store_id, "no files found in vector store to check settings");
            return Ok(false);
        };

        let chunking_ok = first.chunking_strategy == Some(optimized_chunking());

        let assistant = self.api.retrieve_assistant(&self.assistant_id).await?;
        let search_ok = assistant.file_search().is_some_and(|settings| {
            settings.max_num_results == Some(MAX_NUM_RESULTS)
                && settings
                    .ranking_options
                    .as_ref()
                    .is_some_and(|r| (r.score_threshold - SCORE_THRESHOLD).abs() < f64::EPSILON)
        });

        if chunking_ok && search_ok {
            return Ok(false);
        }

        tracing::info!(
            chunking_ok,
            search_ok,
            chunking = ?first.chunking_strategy,
            "optimization needed"
        );
        Ok(true)
    }

    /// Every file id in a store, following pagination
    ///
    /// A listing error stops the walk and keeps what was collected so far.
    async fn file_ids(&self, vector_store_id: &str) -> Vec<String> {
        let mut ids = Vec::new();
        let mut after: Option<String> = None;

        loop {
            match self
                .api
                .list_vector_store_files(vector_store_id, after.as_deref())
                .await
            {
                Ok(page) => {
                    ids.extend(page.data.into_iter().map(|f| f.id));
                    match page.last_id {
                        Some(last) if page.has_more => after = Some(last),
                        _ => break,
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "error listing vector store files");
                    break;
                }
            }
        }

        ids
    }
}
