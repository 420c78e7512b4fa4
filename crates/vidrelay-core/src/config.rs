use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

/// Fetch exceeding this many seconds is abandoned (10 minutes).
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60 * 10;
/// Supervisor back-off after a crashed scheduler loop (an hour).
pub const DEFAULT_RESTART_DELAY_SECS: u64 = 60 * 60;
/// Inline-query cache sweep cadence (10 minutes).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10 * 60;
/// Telegram local Bot API server upload cap.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 2000;
/// Media longer than this (seconds) is filtered out by the extractor.
pub const DEFAULT_MAX_DURATION_SECS: u64 = 15_000;

/// Error signatures that mark a resource as permanently unavailable.
pub const PERMANENT_ERROR_SIGNATURES: &[&str] = &[
    "This video has been removed for violating",
    "Sign in to confirm your age",
    "Private video",
    "Video unavailable",
];

/// Top-level config (vidrelay.toml + VIDRELAY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VidrelayConfig {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Base URL of a self-hosted Bot API server. Required for uploads above 50 MB.
    pub api_url: Option<String>,
    /// Chat that receives the first upload of every asset (the staging chat).
    #[serde(deserialize_with = "chat_id")]
    pub primary_chat_id: String,
    /// Chat that receives operator alerts. Falls back to `primary_chat_id`.
    #[serde(default, deserialize_with = "optional_chat_id")]
    pub operator_chat_id: Option<String>,
    /// Already-uploaded loading animation used as the placeholder reply.
    pub placeholder_file_id: Option<String>,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

impl TelegramConfig {
    pub fn operator_chat_id(&self) -> &str {
        self.operator_chat_id
            .as_deref()
            .unwrap_or(&self.primary_chat_id)
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb << 20
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Files fetched for the operator are moved here instead of deleted.
    pub export_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("data").join("vidrelay.db")
    }

    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            export_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    #[serde(default = "default_binary")]
    pub binary: String,
    pub cookies_file: Option<PathBuf>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,
    /// Case-insensitive substrings of extractor errors that are never retried.
    #[serde(default = "default_permanent_errors")]
    pub permanent_errors: Vec<String>,
    /// Hosts known to serve a lower-quality rendition on re-fetch.
    #[serde(default = "default_degraded_hosts")]
    pub degraded_hosts: Vec<String>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            cookies_file: None,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            permanent_errors: default_permanent_errors(),
            degraded_hosts: default_degraded_hosts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Pause at the top of every cycle; throttles back-to-back fetches.
    #[serde(default = "default_cycle_delay_secs")]
    pub cycle_delay_secs: u64,
    /// Upper bound on an idle wait before the queue is re-checked.
    #[serde(default = "default_idle_wait_secs")]
    pub idle_wait_secs: u64,
    /// Pause after a transient failure before the next selection.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,
    /// Wipe the media folder after a supervised crash.
    #[serde(default)]
    pub empty_media_folder: bool,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_delay_secs: default_cycle_delay_secs(),
            idle_wait_secs: default_idle_wait_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            restart_delay_secs: DEFAULT_RESTART_DELAY_SECS,
            empty_media_folder: false,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

/// Chat ids arrive as numbers from TOML and env vars, but `@channel`
/// names are strings; both are kept as text.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChatIdRepr {
    Number(i64),
    Text(String),
}

impl From<ChatIdRepr> for String {
    fn from(repr: ChatIdRepr) -> Self {
        match repr {
            ChatIdRepr::Number(n) => n.to_string(),
            ChatIdRepr::Text(s) => s,
        }
    }
}

fn chat_id<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    ChatIdRepr::deserialize(d).map(String::from)
}

fn optional_chat_id<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<ChatIdRepr>::deserialize(d)?.map(String::from))
}

fn default_max_upload_mb() -> u64 {
    DEFAULT_MAX_UPLOAD_MB
}
fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".vidrelay")
}
fn default_binary() -> String {
    "yt-dlp".to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}
fn default_max_duration_secs() -> u64 {
    DEFAULT_MAX_DURATION_SECS
}
fn default_permanent_errors() -> Vec<String> {
    PERMANENT_ERROR_SIGNATURES
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_degraded_hosts() -> Vec<String> {
    vec!["youtube.com".to_string(), "youtu.be".to_string()]
}
fn default_cycle_delay_secs() -> u64 {
    10
}
fn default_idle_wait_secs() -> u64 {
    60
}
fn default_retry_delay_secs() -> u64 {
    30
}
fn default_restart_delay_secs() -> u64 {
    DEFAULT_RESTART_DELAY_SECS
}
fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

impl VidrelayConfig {
    /// Load config from a TOML file with VIDRELAY_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `VIDRELAY_TELEGRAM__BOT_TOKEN` or `VIDRELAY_SCHEDULER__IDLE_WAIT_SECS`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("VIDRELAY_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.vidrelay/vidrelay.toml", home)
}
