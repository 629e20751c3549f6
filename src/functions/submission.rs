//! Story tips and feedback submissions

use chrono::Utc;
use chrono_tz::Tz;
use serde_json::{Value, json};

use super::CallContext;
use crate::db::{Submission, SubmissionRepo};
use crate::integrations::FormsRelay;
use crate::localtime::{self, TimeFormat};
use crate::Result;

/// Kinds of submission the assistant can file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Story,
    DigitalFeedback,
    BroadcastFeedback,
    DigitalTechnical,
    BroadcastTechnical,
    Advertising,
}

impl SubmissionKind {
    pub const ALL: [Self; 6] = [
        Self::Story,
        Self::DigitalFeedback,
        Self::BroadcastFeedback,
        Self::DigitalTechnical,
        Self::BroadcastTechnical,
        Self::Advertising,
    ];

    /// Stored `type` value
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Story => "story",
            Self::DigitalFeedback => "digital feedback",
            Self::BroadcastFeedback => "broadcast feedback",
            Self::DigitalTechnical => "digital technical",
            Self::BroadcastTechnical => "broadcast technical",
            Self::Advertising => "advertising",
        }
    }

    #[must_use]
    pub const fn function_name(self) -> &'static str {
        match self {
            Self::Story => "submit_story",
            Self::DigitalFeedback => "submit_digital_feedback",
            Self::BroadcastFeedback => "submit_broadcast_feedback",
            Self::DigitalTechnical => "submit_digital_technical",
            Self::BroadcastTechnical => "submit_broadcast_technical",
            Self::Advertising => "submit_advertising",
        }
    }

    #[must_use]
    pub fn from_function_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.function_name() == name)
    }
}

/// Forward a submission to the relay and record it on success
///
/// A relay rejection (or no relay configured) yields `{success: false}` and
/// stores nothing.
pub(super) async fn submit(
    relay: Option<&FormsRelay>,
    repo: &SubmissionRepo,
    kind: SubmissionKind,
    args: &Value,
    ctx: CallContext<'_>,
    tz: Tz,
) -> Result<Value> {
    let Some(relay) = relay else {
        tracing::warn!(kind = kind.label(), "forms relay not configured, dropping submission");
        return Ok(json!({ "success": false }));
    };

    let mut payload = match args {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    payload.insert("stationId".to_string(), json!(ctx.station.id));
    payload.insert(
        "time".to_string(),
        json!(localtime::format_now(TimeFormat::Submission, tz)),
    );

    if !relay.forward(&Value::Object(payload)).await? {
        tracing::error!(
            kind = kind.label(),
            station = %ctx.station.id,
            session_id = ctx.session_id,
            "submission relay failed"
        );
        return Ok(json!({ "success": false }));
    }

    let content = args
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let submission = Submission {
        kind: kind.label().to_string(),
        content,
        relay_response: "Success".to_string(),
        session_id: ctx.session_id.to_string(),
        user_id: ctx.user_id.to_string(),
        created: Utc::now().timestamp_millis(),
    };
    let id = repo.create(ctx.station, &submission)?;

    tracing::info!(
        kind = kind.label(),
        station = %ctx.station.id,
        session_id = ctx.session_id,
        submission_id = %id,
        "submission recorded"
    );

    Ok(json!({ "success": true }))
}
