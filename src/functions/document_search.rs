//! Questions answered by the internal document assistant

use std::sync::Arc;

use serde_json::{Value, json};

use super::required_str;
use crate::assistant::{AssistantApi, RunPoller};
use crate::{Error, Result};

/// One-shot queries against the document assistant
#[derive(Clone)]
pub struct DocumentSearch {
    api: Arc<dyn AssistantApi>,
    assistant_id: String,
    poller: RunPoller,
}

impl DocumentSearch {
    #[must_use]
    pub fn new(api: Arc<dyn AssistantApi>, assistant_id: impl Into<String>, poller: RunPoller) -> Self {
        Self {
            api,
            assistant_id: assistant_id.into(),
            poller,
        }
    }

    /// `document_search { query }` → `{ answer }`
    ///
    /// Each query gets its own thread; the document assistant has no tools
    /// of its own, so the run must complete without requesting any.
    ///
    /// # Errors
    ///
    /// Returns an error if the run fails or the reply has no text
    pub async fn handle(&self, args: &Value, session_id: &str) -> Result<Value> {
        let query = required_str(args, "query")?;

        let thread = self.api.create_thread().await?;
        self.api.add_message(&thread.id, query).await?;
        let run = self.api.create_run(&thread.id, &self.assistant_id).await?;
        self.poller
            .poll(self.api.as_ref(), &thread.id, &run.id, false)
            .await?;

        let answer = self
            .api
            .latest_message(&thread.id)
            .await?
            .and_then(|m| m.first_text().map(ToString::to_string))
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                tracing::error!(thread_id = %thread.id, session_id, "empty reply from document assistant");
                Error::InvalidResponse("empty reply from document assistant".to_string())
            })?;

        tracing::info!(thread_id = %thread.id, session_id, "document search completed");
        Ok(json!({ "answer": answer }))
    }
}
