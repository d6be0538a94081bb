// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints that serde attributes cannot express, such as
//! valid bind addresses, positive intervals and parseable URLs.

use crate::diagnostic::ConfigError;
use crate::model::AutodmConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure rather than stopping at the first.
pub fn validate_config(config: &AutodmConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.log_level.as_str()) {
        fail(format!(
            "log_level `{}` must be one of {}",
            config.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    if let Some(token) = &config.server.bearer_token {
        if token.trim().is_empty() {
            fail("server.bearer_token must not be blank when set".to_string());
        }
    }

    if let Some(secret) = &config.webhook.app_secret {
        if secret.is_empty() {
            fail("webhook.app_secret must not be empty when set".to_string());
        }
    }

    for (key, url) in [
        ("instagram.base_url", &config.instagram.base_url),
        ("openrouter.base_url", &config.openrouter.base_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            fail(format!("{key} `{url}` must be an http(s) URL"));
        }
    }

    for (key, value) in [
        ("instagram.read_timeout_secs", config.instagram.read_timeout_secs),
        ("instagram.write_timeout_secs", config.instagram.write_timeout_secs),
        ("openrouter.timeout_secs", config.openrouter.timeout_secs),
        ("pipeline.rate_window_secs", config.pipeline.rate_window_secs),
        ("pipeline.dedup_ttl_secs", config.pipeline.dedup_ttl_secs),
        ("pipeline.task_timeout_secs", config.pipeline.task_timeout_secs),
        ("pipeline.poll_interval_ms", config.pipeline.poll_interval_ms),
        ("pipeline.stale_after_secs", config.pipeline.stale_after_secs),
    ] {
        if value == 0 {
            fail(format!("{key} must be greater than zero"));
        }
    }

    if config.openrouter.models.iter().any(|m| m.trim().is_empty()) {
        fail("openrouter.models must not contain empty model ids".to_string());
    }

    if !(0.0..=2.0).contains(&config.openrouter.temperature) {
        fail(format!(
            "openrouter.temperature must be between 0.0 and 2.0, got {}",
            config.openrouter.temperature
        ));
    }

    if config.pipeline.workers == 0 {
        fail("pipeline.workers must be at least 1".to_string());
    }

    if config.pipeline.max_attempts < 1 {
        fail(format!(
            "pipeline.max_attempts must be at least 1, got {}",
            config.pipeline.max_attempts
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
