// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `autodm status` and `autodm reconcile` command implementations.
//!
//! Both open the configured database directly; neither needs a running server.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use autodm_config::model::AutodmConfig;
use autodm_core::AutodmError;
use autodm_core::traits::StorageAdapter;
use autodm_core::types::TriggerStatus;
use autodm_pipeline::StaleTriggerReconciler;
use autodm_storage::SqliteStorage;
use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::info;

/// Trigger counts keyed by status, every status present.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub total: i64,
    pub triggers: BTreeMap<String, i64>,
}

impl StatusReport {
    pub fn from_counts(counts: &[(TriggerStatus, i64)]) -> Self {
        let mut triggers: BTreeMap<String, i64> = TriggerStatus::iter()
            .map(|status| (status.to_string(), 0))
            .collect();
        for (status, count) in counts {
            *triggers.entry(status.to_string()).or_default() += count;
        }
        Self {
            total: triggers.values().sum(),
            triggers,
        }
    }

    fn render(&self) -> String {
        let mut out = String::from("triggers by status:\n");
        for status in TriggerStatus::iter() {
            let name = status.to_string();
            let count = self.triggers.get(&name).copied().unwrap_or(0);
            out.push_str(&format!("  {name:<12}{count:>8}\n"));
        }
        out.push_str(&format!("  {:<12}{:>8}\n", "total", self.total));
        out
    }
}

async fn open_storage(config: &AutodmConfig) -> Result<SqliteStorage, AutodmError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    Ok(storage)
}

/// Runs the `autodm status` command.
pub async fn run_status(config: &AutodmConfig, json: bool) -> Result<(), AutodmError> {
    let storage = open_storage(config).await?;
    let report = StatusReport::from_counts(&storage.count_triggers_by_status().await?);
    storage.close().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }
    Ok(())
}

/// Runs the `autodm reconcile` command: one stale-trigger sweep plus purge.
pub async fn run_reconcile(config: &AutodmConfig) -> Result<(), AutodmError> {
    let storage = Arc::new(open_storage(config).await?);
    let stale_after = Duration::from_secs(config.pipeline.stale_after_secs);
    let retention = Duration::from_secs(config.pipeline.queue_retention_secs);
    let report = StaleTriggerReconciler::new(storage.clone(), stale_after)
        .with_housekeeping(storage.clone(), storage.clone(), retention)
        .sweep()
        .await?;
    storage.close().await?;

    info!(count = report.failed.len(), "reconcile finished");
    println!("failed {} stale trigger(s)", report.failed.len());
    for id in &report.failed {
        println!("  {id}");
    }
    println!(
        "purged {} dedup mark(s), {} queue row(s)",
        report.dedup_purged, report.queue_purged
    );
    Ok(())
}
