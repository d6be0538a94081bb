// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `autodm import` command implementation.
//!
//! Reads a JSON seed file and upserts its accounts and automations. The seed
//! is the only way to populate configuration records without an admin API.
//!
//! ```json
//! {
//!   "accounts": [{"id": "acc-1", "external_id": "1784...", "username": "shop",
//!                 "access_token": "...", "owner_id": "owner-1", "is_active": true}],
//!   "automations": [{"account_id": "acc-1", "name": "price", "trigger_type": "comment",
//!                    "id": "auto-price", "keywords": ["price"],
//!                    "dm_message": "Hi {username}!"}]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use autodm_config::model::AutodmConfig;
use autodm_core::AutodmError;
use autodm_core::traits::StorageAdapter;
use autodm_core::types::{Account, Automation, DmButton, MatchMode, TriggerType};
use autodm_storage::SqliteStorage;
use serde::Deserialize;
use tracing::info;

/// Contents of a seed file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub automations: Vec<AutomationSeed>,
}

/// An automation as written in a seed file. Omitted settings take the
/// platform defaults; counters and timestamps are never seeded.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutomationSeed {
    /// Stable id so re-importing updates instead of duplicating.
    #[serde(default)]
    pub id: Option<String>,
    pub account_id: String,
    pub name: String,
    pub trigger_type: TriggerType,
    pub dm_message: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default)]
    pub target_posts: Vec<String>,
    #[serde(default)]
    pub enable_comment_reply: Option<bool>,
    #[serde(default)]
    pub comment_reply_message: Option<String>,
    #[serde(default)]
    pub dm_buttons: Vec<DmButton>,
    #[serde(default)]
    pub require_follow: bool,
    #[serde(default)]
    pub follow_check_message: String,
    #[serde(default)]
    pub use_ai_enhancement: bool,
    #[serde(default)]
    pub ai_context: String,
    #[serde(default)]
    pub max_triggers_per_user: Option<i64>,
    #[serde(default)]
    pub cooldown_minutes: i64,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl AutomationSeed {
    pub fn to_automation(&self) -> Automation {
        let mut automation = Automation::new(
            &self.account_id,
            &self.name,
            self.trigger_type,
            &self.dm_message,
        );
        if let Some(id) = &self.id {
            automation.id = id.clone();
        }
        automation.keywords = self.keywords.clone();
        automation.match_mode = self.match_mode;
        automation.target_posts = self.target_posts.clone();
        if let Some(enabled) = self.enable_comment_reply {
            automation.enable_comment_reply = enabled;
        }
        if let Some(message) = &self.comment_reply_message {
            automation.comment_reply_message = message.clone();
        }
        automation.dm_buttons = self.dm_buttons.clone();
        automation.require_follow = self.require_follow;
        automation.follow_check_message = self.follow_check_message.clone();
        automation.use_ai_enhancement = self.use_ai_enhancement;
        automation.ai_context = self.ai_context.clone();
        if let Some(max) = self.max_triggers_per_user {
            automation.max_triggers_per_user = max;
        }
        automation.cooldown_minutes = self.cooldown_minutes;
        automation.priority = self.priority;
        if let Some(active) = self.is_active {
            automation.is_active = active;
        }
        automation
    }
}

/// Records written by one import.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub accounts: usize,
    pub automations: usize,
}

impl SeedFile {
    pub fn from_json(content: &str) -> Result<Self, AutodmError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Rejects automations whose account is neither in the seed nor stored.
    async fn check_references(&self, storage: &dyn StorageAdapter) -> Result<(), AutodmError> {
        let seeded: HashSet<&str> = self.accounts.iter().map(|a| a.id.as_str()).collect();
        for automation in &self.automations {
            let account_id = automation.account_id.as_str();
            if seeded.contains(account_id) {
                continue;
            }
            if storage.get_account(account_id).await?.is_none() {
                return Err(AutodmError::NotFound {
                    entity: "account",
                    id: account_id.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Upserts accounts first so automations always reference a stored account.
    pub async fn apply(&self, storage: &dyn StorageAdapter) -> Result<ImportSummary, AutodmError> {
        self.check_references(storage).await?;

        for account in &self.accounts {
            storage.upsert_account(account).await?;
        }
        for seed in &self.automations {
            storage.upsert_automation(&seed.to_automation()).await?;
        }
        Ok(ImportSummary {
            accounts: self.accounts.len(),
            automations: self.automations.len(),
        })
    }
}

/// Runs the `autodm import` command.
pub async fn run_import(config: &AutodmConfig, file: &Path) -> Result<(), AutodmError> {
    let content = std::fs::read_to_string(file).map_err(|e| {
        AutodmError::Config(format!("cannot read seed file {}: {e}", file.display()))
    })?;
    let seed = SeedFile::from_json(&content)?;

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let summary = seed.apply(&storage).await?;
    storage.close().await?;

    info!(
        accounts = summary.accounts,
        automations = summary.automations,
        "seed imported"
    );
    println!(
        "imported {} account(s) and {} automation(s) from {}",
        summary.accounts,
        summary.automations,
        file.display()
    );
    Ok(())
}
