//! Runtime configuration for the watcher.
//!
//! Settings come from an optional `beholder.toml` next to the binary, with
//! environment-variable overrides applied on top (the binary loads `.env`
//! first, so either works in development).

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::model::JobStatus;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/1";
pub const DEFAULT_DOWNLOAD_STAGE: &str = "download";
pub const DEFAULT_SWEEP_MINUTES: u64 = 10;

/// Trello API credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrelloConfig {
    pub key: String,
    pub token: String,
}

/// Emby-compatible media server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaServerConfig {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    /// Stage class the periodic ETA sweep watches.
    pub download_stage: String,
    pub sweep_interval_minutes: u64,
    /// When false, tracker comments and card moves are dropped entirely
    /// (for environments without a tracker configured).
    pub notify_tracker: bool,
    pub trello: Option<TrelloConfig>,
    pub chat_webhook: Option<String>,
    pub media_server: Option<MediaServerConfig>,
    /// Status code -> tracker list id, for card moves.
    pub lists: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            download_stage: DEFAULT_DOWNLOAD_STAGE.to_string(),
            sweep_interval_minutes: DEFAULT_SWEEP_MINUTES,
            notify_tracker: true,
            trello: None,
            chat_webhook: None,
            media_server: None,
            lists: HashMap::new(),
        }
    }
}

/// Raw `beholder.toml` shape. Everything is optional; absent sections fall
/// back to [`Config::default`].
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    redis_url: Option<String>,
    download_stage: Option<String>,
    sweep_interval_minutes: Option<u64>,
    notify_tracker: Option<bool>,
    trello: Option<TrelloConfig>,
    chat: Option<ChatConfig>,
    media_server: Option<MediaServerConfig>,
    #[serde(default)]
    lists: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ChatConfig {
    webhook: String,
}

impl Config {
    /// Load configuration from `path`, which may not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let file = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file at {}", path.display()))?;
            toml::from_str::<FileConfig>(&raw)
                .with_context(|| format!("Failed to parse config file at {}", path.display()))?
        } else {
            FileConfig::default()
        };

        let defaults = Config::default();
        Ok(Config {
            redis_url: file.redis_url.unwrap_or(defaults.redis_url),
            download_stage: file.download_stage.unwrap_or(defaults.download_stage),
            sweep_interval_minutes: file
                .sweep_interval_minutes
                .unwrap_or(defaults.sweep_interval_minutes),
            notify_tracker: file.notify_tracker.unwrap_or(defaults.notify_tracker),
            trello: file.trello,
            chat_webhook: file.chat.map(|c| c.webhook),
            media_server: file.media_server,
            lists: file.lists,
        })
    }

    /// Apply environment overrides through an injectable lookup, so tests
    /// never touch the process environment.
    pub fn overlay_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("BEHOLDER_REDIS_URL") {
            self.redis_url = url;
        }
        if let Some(stage) = var("BEHOLDER_DOWNLOAD_STAGE") {
            self.download_stage = stage;
        }
        if let Some(raw) = var("BEHOLDER_SWEEP_MINUTES") {
            match raw.parse() {
                Ok(minutes) => self.sweep_interval_minutes = minutes,
                Err(_) => warn!(value = %raw, "BEHOLDER_SWEEP_MINUTES is not a number, ignoring"),
            }
        }
        if let Some(raw) = var("BEHOLDER_NOTIFY_TRACKER") {
            self.notify_tracker = !matches!(raw.as_str(), "false" | "0" | "no");
        }
        if let (Some(key), Some(token)) = (var("TRELLO_KEY"), var("TRELLO_TOKEN")) {
            self.trello = Some(TrelloConfig { key, token });
        }
        if let Some(webhook) = var("BEHOLDER_CHAT_WEBHOOK") {
            self.chat_webhook = Some(webhook);
        }
        if let (Some(url), Some(token)) = (var("MEDIA_SERVER_URL"), var("MEDIA_SERVER_TOKEN")) {
            self.media_server = Some(MediaServerConfig { url, token });
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_minutes * 60)
    }

    /// Typed view of the status -> list map. Unknown status keys are a
    /// configuration mistake, reported once here and skipped.
    pub fn status_lists(&self) -> HashMap<JobStatus, String> {
        let mut map = HashMap::new();
        for (raw, list) in &self.lists {
            match raw.parse::<JobStatus>() {
                Ok(status) => {
                    map.insert(status, list.clone());
                }
                Err(_) => warn!(status = %raw, "unknown status in [lists] config, ignoring"),
            }
        }
        map
    }
}
