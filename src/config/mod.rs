//! Configuration management for the assistant bridge
//!
//! Every setting is resolved env > toml > default.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use secrecy::SecretString;

use crate::assistant::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, RunPoller};
use crate::localtime::{DEFAULT_TIMEZONE, parse_timezone};
use crate::session::SessionPolicy;
use crate::station::Station;
use crate::Result;

use self::file::BridgeConfigFile;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default seconds between cleanup runs (daily)
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Assistant bridge configuration
#[derive(Debug)]
pub struct Config {
    /// Path to data directory (database)
    pub data_dir: PathBuf,

    /// HTTP API server configuration
    pub server: ServerConfig,

    /// Assistants API configuration
    pub openai: OpenAiConfig,

    /// Weather integration, absent when no key is configured
    pub weather: Option<WeatherConfig>,

    /// Forms relay webhook for submissions
    pub forms_webhook_url: Option<String>,

    /// Zone used for session ids, submission times and cleanup weeks
    pub timezone: Tz,

    /// Session expiry, cooldown and message cap
    pub session: SessionPolicy,

    /// Run polling cadence
    pub poll_interval: Duration,
    pub poll_timeout: Duration,

    /// Background job schedule
    pub jobs: JobsConfig,

    /// Stations served
    pub stations: Vec<Station>,
}

/// HTTP API server configuration
#[derive(Debug)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// `SQLite` database path
    pub db_path: PathBuf,

    /// Shared secret expected in the webhook `Authorization` header
    pub webhook_secret: Option<SecretString>,

    /// Requests per minute across the API, unlimited when unset
    pub rate_limit_per_minute: Option<u32>,
}

#[derive(Debug)]
pub struct OpenAiConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    /// Assistant answering `document_search`
    pub doc_assistant_id: Option<String>,
    /// Seeds the stored vector store id on first start
    pub vector_store_id: Option<String>,
}

#[derive(Debug)]
pub struct WeatherConfig {
    pub api_key: SecretString,
    pub base_url: String,
}

/// Background job intervals; `None` disables a job
#[derive(Debug, Clone, Copy, Default)]
pub struct JobsConfig {
    pub cleanup_interval: Option<Duration>,
    pub vector_store_interval: Option<Duration>,
}

impl Config {
    /// Load configuration from the environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid (e.g. unknown timezone)
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(|key| std::env::var(key).ok(), fc)
    }

    /// Resolve configuration from an env lookup and a parsed config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn from_sources<F>(env: F, fc: BridgeConfigFile) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| env(key).and_then(|s| s.parse::<u64>().ok());

        // Determine data directory (~/.local/share/assistant-bridge on Linux)
        let data_dir = directories::BaseDirs::new()
            .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("assistant-bridge"));

        let server = ServerConfig {
            port: env("BRIDGE_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            db_path: env("BRIDGE_DB_PATH")
                .or(fc.server.db_path)
                .map_or_else(|| data_dir.join("bridge.db"), PathBuf::from),
            webhook_secret: env("WEBHOOK_SECRET")
                .or(fc.server.webhook_secret)
                .filter(|s| !s.is_empty())
                .map(SecretString::from),
            rate_limit_per_minute: env("BRIDGE_RATE_LIMIT_PER_MINUTE")
                .and_then(|s| s.parse().ok())
                .or(fc.server.rate_limit_per_minute)
                .filter(|n| *n > 0),
        };

        let openai = OpenAiConfig {
            api_key: env("OPENAI_API_KEY")
                .or(fc.openai.api_key)
                .map(SecretString::from),
            base_url: env("OPENAI_BASE_URL")
                .or(fc.openai.base_url)
                .unwrap_or_else(|| crate::assistant::DEFAULT_BASE_URL.to_string()),
            doc_assistant_id: env("DOC_ASSISTANT_ID").or(fc.openai.doc_assistant_id),
            vector_store_id: env("VECTOR_STORE_ID").or(fc.openai.vector_store_id),
        };

        let weather_base = env("WEATHER_BASE_URL")
            .or(fc.weather.base_url)
            .unwrap_or_else(|| crate::integrations::weather::DEFAULT_BASE_URL.to_string());
        let weather = env("WEATHER_API_KEY")
            .or(fc.weather.api_key)
            .map(|key| WeatherConfig {
                api_key: SecretString::from(key),
                base_url: weather_base,
            });

        let timezone = match env("BRIDGE_TIMEZONE").or(fc.server.timezone) {
            Some(name) => parse_timezone(&name)?,
            None => DEFAULT_TIMEZONE,
        };

        let defaults = SessionPolicy::default();
        let session = SessionPolicy {
            expiry: parsed("BRIDGE_SESSION_EXPIRY_SECS")
                .or(fc.session.expiry_secs)
                .map_or(defaults.expiry, Duration::from_secs),
            cooldown: parsed("BRIDGE_COOLDOWN_SECS")
                .or(fc.session.cooldown_secs)
                .map_or(defaults.cooldown, Duration::from_secs),
            max_messages: env("BRIDGE_MAX_MESSAGES")
                .and_then(|s| s.parse().ok())
                .or(fc.session.max_messages)
                .unwrap_or(defaults.max_messages),
        };

        let poll_interval = parsed("BRIDGE_POLL_INTERVAL_MS")
            .or(fc.polling.interval_ms)
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis);
        let poll_timeout = parsed("BRIDGE_POLL_TIMEOUT_MS")
            .or(fc.polling.timeout_ms)
            .map_or(DEFAULT_POLL_TIMEOUT, Duration::from_millis);

        let jobs = JobsConfig {
            cleanup_interval: interval(
                parsed("BRIDGE_CLEANUP_INTERVAL_SECS")
                    .or(fc.jobs.cleanup_interval_secs)
                    .unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS),
            ),
            vector_store_interval: interval(
                parsed("BRIDGE_VECTOR_STORE_INTERVAL_SECS")
                    .or(fc.jobs.vector_store_interval_secs)
                    .unwrap_or(0),
            ),
        };

        // Assistant ids may come from `{ID}_ASSISTANT_ID` for any station
        let stations = fc
            .stations
            .unwrap_or_else(default_stations)
            .into_iter()
            .map(|mut station| {
                if let Some(id) = env(&format!("{}_ASSISTANT_ID", station.id.to_uppercase())) {
                    station.assistant_id = id;
                }
                if station.assistant_id.is_empty() {
                    tracing::warn!(station = %station.id, "no assistant configured for station");
                }
                station
            })
            .collect();

        Ok(Self {
            data_dir,
            server,
            openai,
            weather,
            forms_webhook_url: env("FORMS_WEBHOOK_URL").or(fc.forms.webhook_url),
            timezone,
            session,
            poll_interval,
            poll_timeout,
            jobs,
            stations,
        })
    }

    /// Poller built from the configured cadence
    #[must_use]
    pub const fn poller(&self) -> RunPoller {
        RunPoller::new(self.poll_interval, self.poll_timeout)
    }
}

fn interval(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// The two stations served out of the box
#[must_use]
pub fn default_stations() -> Vec<Station> {
    vec![
        Station::new("n6", "News On 6", ""),
        Station::new("n9", "News 9", ""),
    ]
}
