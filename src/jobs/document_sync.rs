//! Rebuild the document assistant's knowledge from a directory of text files

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use super::vector_store::{
    BATCH_POLL_INTERVAL, BATCH_TIMEOUT, SYSTEM_COLLECTION, optimized_assistant_update,
    optimized_chunking, set_current_store_id, wait_for_batch,
};
use crate::assistant::VectorStoreApi;
use crate::assistant::types::FileBatchRequest;
use crate::db::DocumentStore;
use crate::{Error, Result};

/// Record describing the last sync
pub const DOCUMENT_SYNC_RECORD: &str = "documentSync";

const STORE_NAME: &str = "Document Assistant Documentation";

/// Outcome of a sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub vector_store_id: String,
    pub file_ids: Vec<String>,
}

/// Uploads `.txt` documents into a fresh vector store for the document assistant
#[derive(Clone)]
pub struct DocumentSync {
    api: Arc<dyn VectorStoreApi>,
    store: DocumentStore,
    assistant_id: String,
}

impl DocumentSync {
    #[must_use]
    pub fn new(api: Arc<dyn VectorStoreApi>, store: DocumentStore, assistant_id: impl Into<String>) -> Self {
        Self {
            api,
            store,
            assistant_id: assistant_id.into(),
        }
    }

    /// Upload every `.txt` file in `dir` and attach them to the assistant
    ///
    /// # Errors
    ///
    /// Returns error if the directory has no `.txt` files or any upload,
    /// indexing or assistant update fails
    pub async fn run(&self, dir: &Path) -> Result<SyncReport> {
        let files = text_files(dir)?;
        if files.is_empty() {
            return Err(Error::VectorStore(format!(
                "no .txt files found in {}",
                dir.display()
            )));
        }

        tracing::info!(count = files.len(), dir = %dir.display(), "uploading documents");
        let uploads = files.iter().map(|path| self.upload(path));
        let file_ids = futures::future::try_join_all(uploads).await?;
        tracing::info!(count = file_ids.len(), "files uploaded");

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
            BATCH_POLL_INTERVAL,
            BATCH_TIMEOUT,
        )
        .await?;

        self.api
            .update_assistant(&self.assistant_id, &optimized_assistant_update(&created.id))
            .await?;

        self.store.set(
            SYSTEM_COLLECTION,
            DOCUMENT_SYNC_RECORD,
            &json!({
                "vectorStoreId": created.id,
                "fileIds": file_ids,
                "lastSync": Utc::now().timestamp_millis(),
            }),
        )?;
        set_current_store_id(&self.store, &created.id)?;

        tracing::info!(
            vector_store_id = %created.id,
            file_count = file_ids.len(),
            "document sync completed"
        );

        Ok(SyncReport {
            vector_store_id: created.id,
            file_ids,
        })
    }

    async fn upload(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map_or_else(|| "document.txt".to_string(), |n| n.to_string_lossy().into_owned());
        let uploaded = self.api.upload_file(&name, bytes).await?;
        tracing::debug!(file = %name, file_id = %uploaded.id, "uploaded document");
        Ok(uploaded.id)
    }
}

/// `.txt` files directly inside `dir`, sorted by name
fn text_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("notes.md"), "m").unwrap();
        std::fs::create_dir(dir.path().join("nested.txt")).unwrap();

        let files = text_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
    }
}
