//! Assistants API client
//!
//! The orchestrator and jobs only see the [`AssistantApi`] and
//! [`VectorStoreApi`] traits; [`OpenAiClient`] is the HTTP implementation.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::types::{
    Assistant, AssistantUpdate, FileBatch, FileBatchRequest, ListResponse, Run, Thread,
    ThreadMessage, ToolOutput, UploadedFile, VectorStore, VectorStoreFile,
};
use crate::{Error, Result};

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Thread and run operations used by a conversation turn
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Create an empty thread
    async fn create_thread(&self) -> Result<Thread>;

    /// Append a user message to a thread
    async fn add_message(&self, thread_id: &str, content: &str) -> Result<()>;

    /// Start a run of `assistant_id` on a thread
    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run>;

    /// Fetch the current state of a run
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// Feed function results back into a run waiting on them
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run>;

    /// Cancel a run
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// The most recent message on a thread
    async fn latest_message(&self, thread_id: &str) -> Result<Option<ThreadMessage>>;
}

/// Vector store and assistant configuration operations used by maintenance jobs
#[async_trait]
pub trait VectorStoreApi: Send + Sync {
    /// One page of files in a vector store
    async fn list_vector_store_files(
        &self,
        vector_store_id: &str,
        after: Option<&str>,
    ) -> Result<ListResponse<VectorStoreFile>>;

    async fn create_vector_store(&self, name: &str) -> Result<VectorStore>;

    async fn delete_vector_store(&self, vector_store_id: &str) -> Result<()>;

    async fn create_file_batch(
        &self,
        vector_store_id: &str,
        request: &FileBatchRequest,
    ) -> Result<FileBatch>;

    async fn retrieve_file_batch(&self, vector_store_id: &str, batch_id: &str) -> Result<FileBatch>;

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant>;

    async fn update_assistant(&self, assistant_id: &str, update: &AssistantUpdate) -> Result<Assistant>;

    /// Upload a file for use by assistants
    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadedFile>;
}

/// HTTP client for the hosted Assistants API
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiClient {
    /// Create a client against `base_url`
    #[must_use]
    pub fn new(api_key: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::AssistantApi { status, body });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl AssistantApi for OpenAiClient {
    async fn create_thread(&self) -> Result<Thread> {
        Self::send(self.request(Method::POST, "/threads").json(&json!({}))).await
    }

    async fn add_message(&self, thread_id: &str, content: &str) -> Result<()> {
        let req = self
            .request(Method::POST, &format!("/threads/{thread_id}/messages"))
            .json(&json!({ "role": "user", "content": content }));
        let _: serde_json::Value = Self::send(req).await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run> {
        let req = self
            .request(Method::POST, &format!("/threads/{thread_id}/runs"))
            .json(&json!({ "assistant_id": assistant_id }));
        Self::send(req).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        Self::send(self.request(Method::GET, &format!("/threads/{thread_id}/runs/{run_id}"))).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run> {
        let req = self
            .request(
                Method::POST,
                &format!("/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            )
            .json(&json!({ "tool_outputs": outputs }));
        Self::send(req).await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        Self::send(self.request(
            Method::POST,
            &format!("/threads/{thread_id}/runs/{run_id}/cancel"),
        ))
        .await
    }

    async fn latest_message(&self, thread_id: &str) -> Result<Option<ThreadMessage>> {
        let req = self
            .request(Method::GET, &format!("/threads/{thread_id}/messages"))
            .query(&[("order", "desc"), ("limit", "1")]);
        let page: ListResponse<ThreadMessage> = Self::send(req).await?;
        Ok(page.data.into_iter().next())
    }
}

#[async_trait]
impl VectorStoreApi for OpenAiClient {
    async fn list_vector_store_files(
        &self,
        vector_store_id: &str,
        after: Option<&str>,
    ) -> Result<ListResponse<VectorStoreFile>> {
        let mut req = self
            .request(Method::GET, &format!("/vector_stores/{vector_store_id}/files"))
            .query(&[("limit", "100")]);
        if let Some(cursor) = after {
            req = req.query(&[("after", cursor)]);
        }
        Self::send(req).await
    }

    async fn create_vector_store(&self, name: &str) -> Result<VectorStore> {
        let req = self
            .request(Method::POST, "/vector_stores")
            .json(&json!({ "name": name }));
        Self::send(req).await
    }

    async fn delete_vector_store(&self, vector_store_id: &str) -> Result<()> {
        let _: serde_json::Value = Self::send(self.request(
            Method::DELETE,
            &format!("/vector_stores/{vector_store_id}"),
        ))
        .await?;
        Ok(())
    }

    async fn create_file_batch(
        &self,
        vector_store_id: &str,
        request: &FileBatchRequest,
    ) -> Result<FileBatch> {
        let req = self
            .request(
                Method::POST,
                &format!("/vector_stores/{vector_store_id}/file_batches"),
            )
            .json(request);
        Self::send(req).await
    }

    async fn retrieve_file_batch(&self, vector_store_id: &str, batch_id: &str) -> Result<FileBatch> {
        Self::send(self.request(
            Method::GET,
            &format!("/vector_stores/{vector_store_id}/file_batches/{batch_id}"),
        ))
        .await
    }

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        Self::send(self.request(Method::GET, &format!("/assistants/{assistant_id}"))).await
    }

    async fn update_assistant(&self, assistant_id: &str, update: &AssistantUpdate) -> Result<Assistant> {
        let req = self
            .request(Method::POST, &format!("/assistants/{assistant_id}"))
            .json(update);
        Self::send(req).await
    }

    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadedFile> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);
        Self::send(self.request(Method::POST, "/files").multipart(form)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = OpenAiClient::new(SecretString::from("sk-test".to_string()), "http://localhost:9/v1/");
        assert_eq!(client.base_url, "http://localhost:9/v1");
    }

    #[test]
    fn test_requests_carry_beta_header_and_auth() {
        let client = OpenAiClient::new(SecretString::from("sk-test".to_string()), DEFAULT_BASE_URL);
        let req = client
            .request(Method::GET, "/threads/t/runs/r")
            .build()
            .unwrap();

        assert_eq!(req.url().as_str(), "https://api.openai.com/v1/threads/t/runs/r");
        assert_eq!(req.headers()["OpenAI-Beta"], "assistants=v2");
        assert_eq!(req.headers()["authorization"], "Bearer sk-test");
    }
}
