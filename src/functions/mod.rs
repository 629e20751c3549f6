//! Function calls exposed to the station assistants
//!
//! The assistant asks for a function by name with a JSON argument object;
//! [`FunctionDispatcher`] routes the call to its handler and returns a JSON
//! result that is fed back into the run.

mod document_search;
mod search;
mod submission;
mod time;
mod weather;

use std::sync::Arc;

use chrono_tz::Tz;
use serde_json::Value;

pub use document_search::DocumentSearch;
pub use search::format_google_search;
pub use submission::SubmissionKind;
pub use time::get_current_time;

use crate::db::SubmissionRepo;
use crate::integrations::{FormsRelay, WeatherClient};
use crate::station::Station;
use crate::{Error, Result};

/// Prefix shared by every submission function; these receive `stationId`
pub const SUBMIT_PREFIX: &str = "submit_";

/// Functions the assistants may call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantFunction {
    GetWeather,
    GetCurrentTime,
    FormatGoogleSearch,
    DocumentSearch,
    Submit(SubmissionKind),
}

impl AssistantFunction {
    /// Resolve a function by the name the assistant uses
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "get_weather" => Some(Self::GetWeather),
            "get_current_time" => Some(Self::GetCurrentTime),
            "format_google_search" => Some(Self::FormatGoogleSearch),
            "document_search" => Some(Self::DocumentSearch),
            other => SubmissionKind::from_function_name(other).map(Self::Submit),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetWeather => "get_weather",
            Self::GetCurrentTime => "get_current_time",
            Self::FormatGoogleSearch => "format_google_search",
            Self::DocumentSearch => "document_search",
            Self::Submit(kind) => kind.function_name(),
        }
    }
}

/// Who a function call is made on behalf of
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    pub station: &'a Station,
    /// Session document id
    pub session_id: &'a str,
    pub user_id: &'a str,
}

/// Routes function calls to their handlers
#[derive(Clone)]
pub struct FunctionDispatcher {
    submissions: SubmissionRepo,
    timezone: Tz,
    weather: Option<Arc<WeatherClient>>,
    relay: Option<FormsRelay>,
    documents: Option<DocumentSearch>,
}

impl FunctionDispatcher {
    /// Dispatcher with only the local functions available
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(submissions: SubmissionRepo, timezone: Tz) -> Self {
        Self {
            submissions,
            timezone,
            weather: None,
            relay: None,
            documents: None,
        }
    }

    #[must_use]
    pub fn with_weather(mut self, client: WeatherClient) -> Self {
        self.weather = Some(Arc::new(client));
        self
    }

    #[must_use]
    pub fn with_relay(mut self, relay: FormsRelay) -> Self {
        self.relay = Some(relay);
        self
    }

    #[must_use]
    pub fn with_document_search(mut self, search: DocumentSearch) -> Self {
        self.documents = Some(search);
        self
    }

    /// Run a function by name
    ///
    /// # Errors
    ///
    /// Returns `UnknownFunction` for names outside the table, otherwise any
    /// error raised by the handler
    pub async fn dispatch(&self, name: &str, args: &Value, ctx: CallContext<'_>) -> Result<Value> {
        let function =
            AssistantFunction::from_name(name).ok_or_else(|| Error::UnknownFunction(name.to_string()))?;

        tracing::info!(
            function = function.name(),
            station = %ctx.station.id,
            session_id = ctx.session_id,
            "executing function"
        );

        let result = match function {
            AssistantFunction::GetWeather => {
                let client = self
                    .weather
                    .as_ref()
                    .ok_or_else(|| Error::Function("weather is not configured".to_string()))?;
                weather::get_weather(client, args).await
            }
            AssistantFunction::GetCurrentTime => get_current_time(args, self.timezone),
            AssistantFunction::FormatGoogleSearch => format_google_search(args),
            AssistantFunction::DocumentSearch => {
                let search = self
                    .documents
                    .as_ref()
                    .ok_or_else(|| Error::Function("document search is not configured".to_string()))?;
                search.handle(args, ctx.session_id).await
            }
            AssistantFunction::Submit(kind) => {
                submission::submit(
                    self.relay.as_ref(),
                    &self.submissions,
                    kind,
                    args,
                    ctx,
                    self.timezone,
                )
                .await
            }
        };

        if let Err(e) = &result {
            tracing::error!(function = function.name(), error = %e, "function failed");
        }
        result
    }
}

/// Fetch a required string argument
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Function(format!("missing string argument `{key}`")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db::{DocumentStore, init_memory};
    use crate::localtime::DEFAULT_TIMEZONE;

    fn dispatcher() -> FunctionDispatcher {
        let store = DocumentStore::new(init_memory().unwrap());
        FunctionDispatcher::new(SubmissionRepo::new(store), DEFAULT_TIMEZONE)
    }

    #[test]
    fn test_function_names() {
        for name in [
            "get_weather",
            "get_current_time",
            "format_google_search",
            "document_search",
            "submit_story",
            "submit_digital_feedback",
            "submit_broadcast_feedback",
            "submit_digital_technical",
            "submit_broadcast_technical",
            "submit_advertising",
        ] {
            let function = AssistantFunction::from_name(name).unwrap();
            assert_eq!(function.name(), name);
        }
        assert!(AssistantFunction::from_name("submit_poem").is_none());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_function() {
        let station = Station::new("n6", "News On 6", "asst_6");
        let ctx = CallContext { station: &station, session_id: "s", user_id: "u" };

        let err = dispatcher().dispatch("launch_rocket", &json!({}), ctx).await.unwrap_err();
        assert!(matches!(err, Error::UnknownFunction(name) if name == "launch_rocket"));
    }

    #[tokio::test]
    async fn test_dispatch_local_functions() {
        let station = Station::new("n6", "News On 6", "asst_6");
        let ctx = CallContext { station: &station, session_id: "s", user_id: "u" };
        let dispatcher = dispatcher();

        let time = dispatcher
            .dispatch("get_current_time", &json!({ "format": "submission" }), ctx)
            .await
            .unwrap();
        assert!(time["time"].as_str().unwrap().contains(" at "));

        let url = dispatcher
            .dispatch(
                "format_google_search",
                &json!({ "keywords": ["storm"], "siteUrl": "site:newson6.com" }),
                ctx,
            )
            .await
            .unwrap();
        assert_eq!(url["google_url"], "https://www.google.com/search?q=storm+site:newson6.com");
    }

    #[tokio::test]
    async fn test_unconfigured_integrations_error() {
        let station = Station::new("n6", "News On 6", "asst_6");
        let ctx = CallContext { station: &station, session_id: "s", user_id: "u" };
        let dispatcher = dispatcher();

        let err = dispatcher
            .dispatch("get_weather", &json!({ "location": "Tulsa" }), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Function(_)));

        let err = dispatcher
            .dispatch("document_search", &json!({ "query": "ratings" }), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Function(_)));
    }
}
