// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the autodm trigger pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level autodm configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AutodmConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Webhook subscription and signature settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Instagram Graph API client settings.
    #[serde(default)]
    pub instagram: InstagramConfig,

    /// OpenRouter AI provider settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Trigger pipeline tuning.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for AutodmConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            webhook: WebhookConfig::default(),
            instagram: InstagramConfig::default(),
            openrouter: OpenRouterConfig::default(),
            pipeline: PipelineConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token guarding the `/v1` event feed. `None` rejects every feed request.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Webhook subscription configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Token echoed back during the platform's subscription handshake.
    #[serde(default)]
    pub verify_token: Option<String>,

    /// App secret used to verify `X-Hub-Signature-256`.
    #[serde(default)]
    pub app_secret: Option<String>,
}

/// Instagram Graph API client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstagramConfig {
    /// Versioned Graph API root.
    #[serde(default = "default_instagram_base_url")]
    pub base_url: String,

    /// Timeout for read calls (follow check, comment listing).
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Timeout for write calls (private send, public reply).
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            base_url: default_instagram_base_url(),
            read_timeout_secs: default_read_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
        }
    }
}

fn default_instagram_base_url() -> String {
    "https://graph.facebook.com/v21.0".to_string()
}

fn default_read_timeout_secs() -> u64 {
    10
}

fn default_write_timeout_secs() -> u64 {
    30
}

/// OpenRouter provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenRouterConfig {
    /// OpenRouter API key. `None` disables AI enhancement.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL for the OpenRouter API.
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,

    /// Site URL sent as `HTTP-Referer` for OpenRouter attribution.
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Application name sent as `X-Title`.
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// Enhancement candidates, tried in order.
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Timeout for one generation call.
    #[serde(default = "default_openrouter_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openrouter_base_url(),
            site_url: default_site_url(),
            app_title: default_app_title(),
            models: default_models(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_openrouter_timeout_secs(),
        }
    }
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_site_url() -> String {
    "https://linkplease.co".to_string()
}

fn default_app_title() -> String {
    "LinkPlease Pro".to_string()
}

/// The default enhancement fallback order.
pub fn default_models() -> Vec<String> {
    [
        "anthropic/claude-3.5-sonnet",
        "anthropic/claude-3-haiku",
        "openai/gpt-4-turbo",
        "openai/gpt-3.5-turbo",
        "meta-llama/llama-3.1-70b-instruct",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}

fn default_max_tokens() -> u32 {
    400
}

fn default_temperature() -> f32 {
    0.7
}

fn default_openrouter_timeout_secs() -> u64 {
    60
}

/// Trigger pipeline tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Maximum outbound sends per account per rate window.
    #[serde(default = "default_rate_limit_per_hour")]
    pub rate_limit_per_hour: u32,

    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,

    /// How long a processed event id is remembered.
    #[serde(default = "default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,

    /// Number of concurrent trigger workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-task timeout; a task exceeding it is retried by the queue.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Queue attempts per task, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,

    /// Base of the exponential retry backoff.
    #[serde(default = "default_retry_base_secs")]
    pub retry_base_secs: u64,

    /// Idle sleep between queue polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Comment poller interval. Zero disables the poller.
    #[serde(default = "default_comment_poll_interval_secs")]
    pub comment_poll_interval_secs: u64,

    /// Age after which a `processing` trigger is considered abandoned.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Interval of the stale trigger sweep in `serve`. Zero disables it.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// How long completed and failed queue entries are kept before a sweep
    /// deletes them.
    #[serde(default = "default_queue_retention_secs")]
    pub queue_retention_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_hour: default_rate_limit_per_hour(),
            rate_window_secs: default_rate_window_secs(),
            dedup_ttl_secs: default_dedup_ttl_secs(),
            workers: default_workers(),
            task_timeout_secs: default_task_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_base_secs: default_retry_base_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            comment_poll_interval_secs: default_comment_poll_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            queue_retention_secs: default_queue_retention_secs(),
        }
    }
}

fn default_rate_limit_per_hour() -> u32 {
    100
}

fn default_rate_window_secs() -> u64 {
    3600
}

fn default_dedup_ttl_secs() -> u64 {
    86_400
}

fn default_workers() -> usize {
    4
}

fn default_task_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> i32 {
    3
}

fn default_retry_base_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_comment_poll_interval_secs() -> u64 {
    30
}

fn default_stale_after_secs() -> u64 {
    900
}

fn default_reconcile_interval_secs() -> u64 {
    300
}

fn default_queue_retention_secs() -> u64 {
    604_800
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("autodm").join("autodm.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("autodm.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}
