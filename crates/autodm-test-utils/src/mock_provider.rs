// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI provider with per-model scripted answers.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use autodm_core::AutodmError;
use autodm_core::traits::{PluginAdapter, ProviderAdapter};
use autodm_core::types::{
    AdapterType, GenerationRequest, GenerationResponse, HealthStatus,
};

/// A provider whose answer depends only on the requested model.
///
/// Models without a scripted answer fail.
#[derive(Default)]
pub struct MockProvider {
    answers: Mutex<HashMap<String, Result<String, String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn respond(&self, model: &str, text: &str) {
        self.answers
            .lock()
            .await
            .insert(model.to_string(), Ok(text.to_string()));
    }

    pub async fn fail(&self, model: &str, message: &str) {
        self.answers
            .lock()
            .await
            .insert(model.to_string(), Err(message.to_string()));
    }

    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }

    /// Models requested so far, in call order.
    pub async fn requested_models(&self) -> Vec<String> {
        self.requests
            .lock()
            .await
            .iter()
            .map(|r| r.model.clone())
            .collect()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, AutodmError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AutodmError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, AutodmError> {
        let model = request.model.clone();
        self.requests.lock().await.push(request);
        match self.answers.lock().await.get(&model).cloned() {
            Some(Ok(text)) => Ok(GenerationResponse { text, model }),
            Some(Err(message)) => Err(AutodmError::Provider {
                message,
                source: None,
            }),
            None => Err(AutodmError::Provider {
                message: format!("no answer scripted for {model}"),
                source: None,
            }),
        }
    }
}
