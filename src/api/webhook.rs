//! Conversational platform webhook
//!
//! Each station has its own route. The platform posts the session context
//! and the user's text, and expects the reply inline in the response body.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ApiState;
use crate::db::MessageRole;
use crate::session::SessionStatus;
use crate::station::Station;
use crate::{Error, Result};

/// Header telling the platform the body carries the reply
pub const WEBHOOK_RETURN_HEADER: &str = "x-watson-assistant-webhook-return";

/// Inbound webhook body
#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    pub payload: WebhookPayload,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub context: WebhookContext,
    #[serde(default)]
    pub input: WebhookInput,
}

#[derive(Debug, Deserialize)]
pub struct WebhookContext {
    pub global: GlobalContext,
}

#[derive(Debug, Deserialize)]
pub struct GlobalContext {
    #[serde(default)]
    pub session_id: Option<String>,
    pub system: SystemContext,
}

#[derive(Debug, Deserialize)]
pub struct SystemContext {
    pub user_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookInput {
    #[serde(default)]
    pub text: Option<String>,
}

/// Outbound reply body
#[derive(Debug, Serialize)]
pub struct WebhookReply {
    pub output: ReplyOutput,
}

#[derive(Debug, Serialize)]
pub struct ReplyOutput {
    pub generic: Vec<ReplyItem>,
}

#[derive(Debug, Serialize)]
pub struct ReplyItem {
    pub response_type: &'static str,
    pub text: String,
}

impl WebhookReply {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            output: ReplyOutput {
                generic: vec![ReplyItem {
                    response_type: "text",
                    text: text.into(),
                }],
            },
        }
    }
}

impl IntoResponse for WebhookReply {
    fn into_response(self) -> Response {
        let mut response = Json(self).into_response();
        response
            .headers_mut()
            .insert(WEBHOOK_RETURN_HEADER, HeaderValue::from_static("true"));
        response
    }
}

/// Greeting sent when the platform opens a conversation without text
#[must_use]
pub fn welcome_message(station: &Station) -> String {
    format!(
        "Hi! I'm Newsy, your {} chatbot assistant. How can I help you today?",
        station.id
    )
}

/// Reply sent while a user is on cooldown
#[must_use]
pub fn cooldown_message(remaining: std::time::Duration) -> String {
    let minutes = remaining.as_secs().div_ceil(60).max(1);
    let unit = if minutes == 1 { "minute" } else { "minutes" };
    format!(
        "You've reached the message limit for this conversation. Please try again in {minutes} {unit}."
    )
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Handle `POST /webhook/{station}`
pub async fn handle_webhook(
    State(state): State<Arc<ApiState>>,
    Path(station_id): Path<String>,
    body: Bytes,
) -> Response {
    let station = match state.stations.get(&station_id) {
        Ok(station) => station.clone(),
        Err(_) => {
            tracing::warn!(station = %station_id, "webhook for unknown station");
            return error_response(StatusCode::NOT_FOUND, "Not Found");
        }
    };

    let request: WebhookRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(station = %station.id, error = %e, "malformed webhook body");
            return error_response(StatusCode::BAD_REQUEST, "Bad Request");
        }
    };

    match process(&state, &station, request).await {
        Ok(text) => WebhookReply::text(text).into_response(),
        Err(e) => {
            tracing::error!(station = %station.id, error = %e, "webhook failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

async fn process(state: &ApiState, station: &Station, request: WebhookRequest) -> Result<String> {
    let global = request.payload.context.global;
    let user_id = global.system.user_id;
    let session_id = global.session_id;
    let text = request.payload.input.text.unwrap_or_default();

    tracing::info!(
        station = %station.id,
        user_id = %user_id,
        session_id = session_id.as_deref().unwrap_or_default(),
        has_text = !text.is_empty(),
        "webhook received"
    );

    let session = match state
        .sessions
        .get_or_create_user_session(station, &user_id, session_id.as_deref())?
    {
        SessionStatus::Active(session) => session,
        SessionStatus::Cooldown { remaining } => return Ok(cooldown_message(remaining)),
    };

    if text.is_empty() {
        let welcome = welcome_message(station);
        state
            .sessions
            .add_message(station, &session.id, MessageRole::Assistant, &welcome)?;
        return Ok(welcome);
    }

    let updated = state
        .sessions
        .add_message(station, &session.id, MessageRole::User, &text)?
        .ok_or_else(|| Error::SessionNotFound(session.id.clone()))?;

    let mut reply = state
        .orchestrator
        .respond(station, &session.id, session_id.as_deref(), &user_id, &text)
        .await?;

    if let Some(warning) = state.sessions.check_message_limit(&updated).warning {
        reply.push_str(warning);
    }

    state
        .sessions
        .add_message(station, &session.id, MessageRole::Assistant, &reply)?;

    Ok(reply)
}
