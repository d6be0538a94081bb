// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `autodm serve` command implementation.
//!
//! Opens SQLite storage, builds the Graph API connector and (when an API key
//! is configured) the OpenRouter provider, assembles the pipeline, spawns the
//! background stages and serves the gateway until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use autodm_config::model::AutodmConfig;
use autodm_core::AutodmError;
use autodm_core::traits::{ProviderAdapter, StorageAdapter};
use autodm_gateway::GatewayState;
use autodm_instagram::InstagramConnector;
use autodm_openrouter::OpenRouterProvider;
use autodm_pipeline::Pipeline;
use autodm_storage::SqliteStorage;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::shutdown;

/// Background stages get this long to finish after the gateway stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Runs the `autodm serve` command.
pub async fn run_serve(config: AutodmConfig) -> Result<(), AutodmError> {
    info!(version = env!("CARGO_PKG_VERSION"), "starting autodm serve");

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;

    let connector = Arc::new(InstagramConnector::new(&config.instagram)?);
    let provider = build_provider(&config)?;

    let pipeline = Pipeline::builder(storage.clone(), connector, config.pipeline.clone())
        .provider(provider)
        .openrouter(config.openrouter.clone())
        .build();

    let cancel = shutdown::install_signal_handler();
    let mut tasks = JoinSet::new();
    pipeline.spawn_background(&mut tasks, &cancel);
    info!(
        workers = config.pipeline.workers,
        rate_limit_per_hour = config.pipeline.rate_limit_per_hour,
        "pipeline started"
    );

    if config.webhook.app_secret.is_none() {
        error!("webhook.app_secret is not set; every webhook delivery will be rejected");
    }

    let state = GatewayState::new(
        pipeline.ingestor.clone(),
        pipeline.bus.clone(),
        config.webhook.clone(),
        &config.server,
    );
    let served = autodm_gateway::serve(&config.server, state, cancel.clone()).await;

    // A bind failure returns before any signal; stop the background stages too.
    cancel.cancel();
    shutdown::drain_tasks(&mut tasks, SHUTDOWN_GRACE).await;

    if let Err(e) = storage.close().await {
        error!(error = %e, "storage close failed");
    }
    info!("autodm stopped");
    served
}

/// OpenRouter provider when an API key is configured, otherwise none.
fn build_provider(config: &AutodmConfig) -> Result<Option<Arc<dyn ProviderAdapter>>, AutodmError> {
    let has_key = config
        .openrouter
        .api_key
        .as_deref()
        .is_some_and(|key| !key.trim().is_empty());
    if !has_key {
        info!("no OpenRouter API key configured, AI enhancement disabled");
        return Ok(None);
    }
    let provider = OpenRouterProvider::new(&config.openrouter)?;
    info!(models = ?config.openrouter.models, "AI enhancement enabled");
    Ok(Some(Arc::new(provider)))
}
