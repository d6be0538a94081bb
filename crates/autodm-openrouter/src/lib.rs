// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenRouter provider adapter for autodm.
//!
//! Implements [`ProviderAdapter`] over the OpenAI-compatible
//! `chat/completions` endpoint. One call, no retries: candidate fallback is
//! the enhancement chain's job.

pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use autodm_config::model::OpenRouterConfig;
use autodm_core::error::AutodmError;
use autodm_core::traits::{PluginAdapter, ProviderAdapter};
use autodm_core::types::{AdapterType, GenerationRequest, GenerationResponse, HealthStatus};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::debug;

use crate::types::{ApiErrorResponse, ChatMessage, ChatRequest, ChatResponse};

/// OpenRouter provider implementing [`ProviderAdapter`].
#[derive(Debug, Clone)]
pub struct OpenRouterProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl OpenRouterProvider {
    /// Creates a provider from configuration. Fails when no API key is set.
    pub fn new(config: &OpenRouterConfig) -> Result<Self, AutodmError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AutodmError::Config("openrouter.api_key is required for AI enhancement".into())
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {api_key}"))?);
        headers.insert("HTTP-Referer", header_value(&config.site_url)?);
        headers.insert("X-Title", header_value(&config.app_title)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AutodmError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }
}

fn header_value(value: &str) -> Result<HeaderValue, AutodmError> {
    HeaderValue::from_str(value)
        .map_err(|e| AutodmError::Config(format!("invalid header value: {e}")))
}

#[async_trait]
impl PluginAdapter for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
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
impl ProviderAdapter for OpenRouterProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, AutodmError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AutodmError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(model = %request.model, status = %status, "openrouter response received");

        let text = response.text().await.map_err(|e| AutodmError::Provider {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
            return Err(AutodmError::Provider {
                message,
                source: None,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| AutodmError::Provider {
            message: format!("failed to parse completion: {e}"),
            source: Some(Box::new(e)),
        })?;

        match parsed.first_text() {
            Some(content) if !content.is_empty() => Ok(GenerationResponse {
                text: content.to_string(),
                model: parsed.model.clone().unwrap_or(request.model),
            }),
            _ => Err(AutodmError::Provider {
                message: "empty completion".into(),
                source: None,
            }),
        }
    }
}
