// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./autodm.toml` > `~/.config/autodm/autodm.toml` > `/etc/autodm/autodm.toml`
//! with environment variable overrides via `AUTODM_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::AutodmConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/autodm/autodm.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "autodm.toml";

/// Sections addressable through `AUTODM_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &[
    "server",
    "webhook",
    "instagram",
    "openrouter",
    "pipeline",
    "storage",
];

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("autodm/autodm.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/autodm/autodm.toml` (system-wide)
/// 3. `~/.config/autodm/autodm.toml` (user XDG config)
/// 4. `./autodm.toml` (local directory)
/// 5. `AUTODM_*` environment variables
pub fn load_config() -> Result<AutodmConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string on top of the compiled defaults.
///
/// No files or environment variables are consulted.
pub fn load_config_from_str(toml_content: &str) -> Result<AutodmConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AutodmConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AutodmConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AutodmConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(AutodmConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Create the environment variable provider.
///
/// Uses `Env::map()` rather than `Env::split("_")`: `AUTODM_WEBHOOK_APP_SECRET`
/// must map to `webhook.app_secret`, not `webhook.app.secret`.
fn env_provider() -> Env {
    Env::prefixed("AUTODM_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped variable name to its dotted config key.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
