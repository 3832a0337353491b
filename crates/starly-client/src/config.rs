//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so a client starts with zero configuration;
//! without an API key the AI chat answers with the fallback text.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use starly_shared::constants::{AI_HISTORY_WINDOW, SYNC_CHANNEL_NAME};
use starly_store::{Database, SharedStore, StoreError};

pub const DEFAULT_AI_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_AI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gemini API key.
    /// Env: `GEMINI_API_KEY`, then `API_KEY`
    /// Default: none (AI replies fall back to a fixed error text).
    pub api_key: Option<String>,

    /// Env: `STARLY_AI_MODEL`
    /// Default: `gemini-3-flash-preview`
    pub ai_model: String,

    /// Env: `STARLY_AI_BASE_URL`
    pub ai_base_url: String,

    /// Messages preceding a prompt that are sent along as history.
    /// Env: `STARLY_HISTORY_WINDOW`
    /// Default: `15`
    pub history_window: usize,

    /// Longest wait for a single reply fragment before the stream is
    /// abandoned.
    /// Env: `STARLY_STREAM_TIMEOUT_SECS`
    /// Default: `60`
    pub stream_timeout: Duration,

    /// Env: `STARLY_SYNC_CHANNEL`
    /// Default: `starly_sync`
    pub sync_channel: String,

    /// SQLite file backing the key-value store.
    /// Env: `STARLY_DB_PATH`
    /// Default: the platform data directory.
    pub db_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            ai_model: DEFAULT_AI_MODEL.to_string(),
            ai_base_url: DEFAULT_AI_BASE_URL.to_string(),
            history_window: AI_HISTORY_WINDOW,
            stream_timeout: Duration::from_secs(60),
            sync_channel: SYNC_CHANNEL_NAME.to_string(),
            db_path: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        config.api_key = var("GEMINI_API_KEY")
            .or_else(|| var("API_KEY"))
            .filter(|key| !key.trim().is_empty());

        if let Some(model) = var("STARLY_AI_MODEL") {
            config.ai_model = model;
        }

        if let Some(url) = var("STARLY_AI_BASE_URL") {
            config.ai_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(val) = var("STARLY_HISTORY_WINDOW") {
            match val.parse::<usize>() {
                Ok(n) => config.history_window = n,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid STARLY_HISTORY_WINDOW, using default");
                }
            }
        }

        if let Some(val) = var("STARLY_STREAM_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.stream_timeout = Duration::from_secs(secs),
                _ => {
                    tracing::warn!(value = %val, "Invalid STARLY_STREAM_TIMEOUT_SECS, using default");
                }
            }
        }

        if let Some(name) = var("STARLY_SYNC_CHANNEL") {
            if !name.is_empty() {
                config.sync_channel = name;
            }
        }

        if let Some(path) = var("STARLY_DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }

        config
    }

    /// Open the SQLite-backed store this configuration points at.
    pub fn open_store(&self) -> Result<SharedStore, StoreError> {
        let db = match &self.db_path {
            Some(path) => Database::open_at(path)?,
            None => Database::new()?,
        };
        Ok(Arc::new(db))
    }
}
