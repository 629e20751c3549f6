//! One conversation turn against a station assistant

use std::sync::Arc;

use serde_json::Value;

use super::client::AssistantApi;
use super::poller::RunPoller;
use super::types::{Run, RunStatus, ToolOutput};
use crate::functions::{CallContext, FunctionDispatcher, SUBMIT_PREFIX};
use crate::session::SessionManager;
use crate::station::Station;
use crate::{Error, Result};

/// Reply used when a function call fails and its run is cancelled
pub const FUNCTION_FAILURE_REPLY: &str = "I apologize, but I'm having trouble processing that request. Please try asking in a different way.";

/// Drives a user message through a station assistant
#[derive(Clone)]
pub struct Orchestrator {
    api: Arc<dyn AssistantApi>,
    sessions: SessionManager,
    functions: FunctionDispatcher,
    poller: RunPoller,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        api: Arc<dyn AssistantApi>,
        sessions: SessionManager,
        functions: FunctionDispatcher,
        poller: RunPoller,
    ) -> Self {
        Self {
            api,
            sessions,
            functions,
            poller,
        }
    }

    /// Produce the assistant's reply to `text`
    ///
    /// The session's thread is created on first use and persisted. Function
    /// calls requested by the run are executed and fed back until the run
    /// completes. If a function fails the run is cancelled and a fixed
    /// apology is returned instead of an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is missing, the run fails or times
    /// out, or the final message is not the expected JSON envelope
    pub async fn respond(
        &self,
        station: &Station,
        doc_id: &str,
        session_id: Option<&str>,
        user_id: &str,
        text: &str,
    ) -> Result<String> {
        let session = self
            .sessions
            .get_session(station, doc_id)?
            .ok_or_else(|| Error::SessionNotFound(doc_id.to_string()))?;

        let thread_id = if let Some(id) = session.thread_id {
            id
        } else {
            let thread = self.api.create_thread().await?;
            self.sessions.update_thread_id(station, doc_id, &thread.id)?;
            thread.id
        };

        self.api.add_message(&thread_id, text).await?;
        let run = self.api.create_run(&thread_id, &station.assistant_id).await?;
        tracing::debug!(
            station = %station.id,
            session_id = session_id.unwrap_or_default(),
            thread_id = %thread_id,
            run_id = %run.id,
            "started run"
        );

        let mut run = self
            .poller
            .poll(self.api.as_ref(), &thread_id, &run.id, true)
            .await?;

        let ctx = CallContext {
            station,
            session_id: doc_id,
            user_id,
        };

        while run.status == RunStatus::RequiresAction {
            match self.handle_function_calls(&run, &thread_id, ctx).await {
                Ok(next) => {
                    run = self
                        .poller
                        .poll(self.api.as_ref(), &thread_id, &next.id, true)
                        .await?;
                }
                Err(Error::FunctionTerminated) => return Ok(FUNCTION_FAILURE_REPLY.to_string()),
                Err(e) => return Err(e),
            }
        }

        let message = self
            .api
            .latest_message(&thread_id)
            .await?
            .ok_or_else(|| Error::InvalidResponse("thread has no messages".to_string()))?;
        let raw = message
            .first_text()
            .ok_or_else(|| Error::InvalidResponse("latest message has no text".to_string()))?;

        tracing::debug!(thread_id = %thread_id, raw, "assistant reply");
        parse_reply(raw)
    }

    /// Execute every pending tool call and submit the outputs
    ///
    /// Any failing call cancels the run and yields `FunctionTerminated`.
    async fn handle_function_calls(
        &self,
        run: &Run,
        thread_id: &str,
        ctx: CallContext<'_>,
    ) -> Result<Run> {
        let mut outputs = Vec::with_capacity(run.tool_calls().len());

        for call in run.tool_calls() {
            let name = call.function.name.as_str();
            let result = match serde_json::from_str::<Value>(&call.function.arguments) {
                Ok(mut args) => {
                    if name.starts_with(SUBMIT_PREFIX) {
                        if let Value::Object(map) = &mut args {
                            map.insert("stationId".to_string(), Value::String(ctx.station.id.clone()));
                        }
                    }
                    self.functions.dispatch(name, &args, ctx).await
                }
                Err(e) => Err(Error::Function(format!("invalid arguments for {name}: {e}"))),
            };

            match result.and_then(|value| Ok(serde_json::to_string(&value)?)) {
                Ok(output) => outputs.push(ToolOutput {
                    tool_call_id: call.id.clone(),
                    output,
                }),
                Err(e) => {
                    tracing::error!(
                        function = name,
                        station = %ctx.station.id,
                        session_id = ctx.session_id,
                        error = %e,
                        "function execution failed, cancelling run"
                    );
                    if let Err(cancel_err) = self.api.cancel_run(thread_id, &run.id).await {
                        tracing::warn!(run_id = %run.id, error = %cancel_err, "failed to cancel run");
                    }
                    return Err(Error::FunctionTerminated);
                }
            }
        }

        self.api
            .submit_tool_outputs(thread_id, &run.id, &outputs)
            .await
    }
}

/// Extract the reply text from the assistant's JSON envelope
///
/// Accepts `{"response": {"message": ...}}` or `{"message": ...}`.
///
/// # Errors
///
/// Returns `InvalidResponse` when the text is not JSON or carries no
/// non-empty string message
pub fn parse_reply(raw: &str) -> Result<String> {
    let parsed: Value = serde_json::from_str(raw)
        .map_err(|e| Error::InvalidResponse(format!("reply is not JSON: {e}")))?;

    // Empty or non-string values count as absent
    let text = |v: &Value| v.as_str().filter(|s| !s.is_empty()).map(ToString::to_string);

    parsed
        .pointer("/response/message")
        .and_then(text)
        .or_else(|| parsed.get("message").and_then(text))
        .ok_or_else(|| Error::InvalidResponse("reply has no message".to_string()))
}
