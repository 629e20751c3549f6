//! Forms relay integration
//!
//! Submissions are forwarded as a JSON POST to an automation webhook that
//! routes them to the newsroom.

use reqwest::Client;
use serde_json::Value;

use crate::Result;

/// Client for the submission relay webhook
#[derive(Debug, Clone)]
pub struct FormsRelay {
    client: Client,
    url: String,
}

impl FormsRelay {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    /// Forward a payload; `Ok(false)` when the relay answers non-2xx
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be sent
    pub async fn forward(&self, payload: &Value) -> Result<bool> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body, "forms relay rejected submission");
            return Ok(false);
        }

        Ok(true)
    }
}
