//! TOML configuration file loading
//!
//! Supports `~/.config/assistant-bridge/config.toml` (or `$BRIDGE_CONFIG`) as
//! a persistent config source. All fields are optional; the file is a
//! partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::station::Station;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct BridgeConfigFile {
    #[serde(default)]
    pub server: ServerFileConfig,

    #[serde(default)]
    pub openai: OpenAiFileConfig,

    #[serde(default)]
    pub weather: WeatherFileConfig,

    #[serde(default)]
    pub forms: FormsFileConfig,

    #[serde(default)]
    pub session: SessionFileConfig,

    #[serde(default)]
    pub polling: PollingFileConfig,

    #[serde(default)]
    pub jobs: JobsFileConfig,

    /// Stations served; replaces the built-in pair when present
    #[serde(default)]
    pub stations: Option<Vec<Station>>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
    pub db_path: Option<String>,
    pub webhook_secret: Option<String>,
    pub rate_limit_per_minute: Option<u32>,
    /// IANA zone name (e.g. "America/Chicago")
    pub timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenAiFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub doc_assistant_id: Option<String>,
    pub vector_store_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WeatherFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FormsFileConfig {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    pub expiry_secs: Option<u64>,
    pub cooldown_secs: Option<u64>,
    pub max_messages: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PollingFileConfig {
    pub interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobsFileConfig {
    /// Seconds between cleanup runs, 0 disables
    pub cleanup_interval_secs: Option<u64>,
    /// Seconds between vector store checks, 0 disables
    pub vector_store_interval_secs: Option<u64>,
}

/// Load the TOML config file from `$BRIDGE_CONFIG` or the standard path
///
/// Returns `BridgeConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> BridgeConfigFile {
    let path = std::env::var("BRIDGE_CONFIG")
        .ok()
        .map(PathBuf::from)
        .or_else(config_file_path);

    path.map_or_else(BridgeConfigFile::default, |p| load_from(&p))
}

/// Load a config file from an explicit path
pub fn load_from(path: &Path) -> BridgeConfigFile {
    if !path.exists() {
        return BridgeConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                BridgeConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            BridgeConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/assistant-bridge/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("assistant-bridge").join("config.toml"))
}
