// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI enhancement fallback chain.
//!
//! Tries each candidate model once, in order, and returns the first
//! non-empty rewrite. When every candidate fails the original template comes
//! back unchanged with `success == false`.

use std::sync::Arc;
use std::time::Duration;

use autodm_config::model::OpenRouterConfig;
use autodm_core::traits::ProviderAdapter;
use autodm_core::types::GenerationRequest;
use tracing::{debug, info, warn};

/// Result of one enhancement attempt across the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Enhancement {
    pub success: bool,
    pub text: String,
    pub provider_used: Option<String>,
    pub model_used: Option<String>,
}

impl Enhancement {
    fn unchanged(template: &str) -> Self {
        Self {
            success: false,
            text: template.to_string(),
            provider_used: None,
            model_used: None,
        }
    }

    /// `provider/model` label recorded on the trigger.
    pub fn label(&self) -> Option<String> {
        match (&self.provider_used, &self.model_used) {
            (Some(provider), Some(model)) => Some(format!("{provider}/{model}")),
            _ => None,
        }
    }
}

/// Ordered fallback over one provider's candidate models.
#[derive(Clone)]
pub struct EnhancementChain {
    provider: Option<Arc<dyn ProviderAdapter>>,
    models: Vec<String>,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl EnhancementChain {
    pub fn new(provider: Option<Arc<dyn ProviderAdapter>>, config: &OpenRouterConfig) -> Self {
        Self {
            provider,
            models: config.models.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// A chain with no provider; every call returns the template unchanged.
    pub fn disabled() -> Self {
        Self::new(None, &OpenRouterConfig::default())
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Rewrites `template` for one event. `models` overrides the configured candidates.
    pub async fn enhance(
        &self,
        template: &str,
        context: &str,
        event_text: &str,
        username: &str,
        models: Option<&[String]>,
    ) -> Enhancement {
        let Some(provider) = &self.provider else {
            return Enhancement::unchanged(template);
        };

        let prompt = build_prompt(template, context, event_text, username);
        let candidates = models.unwrap_or(self.models.as_slice());

        for model in candidates {
            let request = GenerationRequest {
                prompt: prompt.clone(),
                model: model.clone(),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            };
            match tokio::time::timeout(self.timeout, provider.generate(request)).await {
                Ok(Ok(response)) => {
                    let text = response.text.trim();
                    if text.is_empty() {
                        debug!(model = %model, "empty enhancement, trying next candidate");
                        continue;
                    }
                    info!(provider = provider.name(), model = %model, "message enhanced");
                    return Enhancement {
                        success: true,
                        text: text.to_string(),
                        provider_used: Some(provider.name().to_string()),
                        model_used: Some(model.clone()),
                    };
                }
                Ok(Err(e)) => {
                    warn!(model = %model, error = %e, "enhancement candidate failed");
                }
                Err(_) => {
                    warn!(model = %model, timeout = ?self.timeout, "enhancement candidate timed out");
                }
            }
        }

        warn!(candidates = candidates.len(), "all enhancement candidates failed, using template");
        Enhancement::unchanged(template)
    }
}

/// Builds the rewrite prompt for one event.
pub fn build_prompt(template: &str, context: &str, event_text: &str, username: &str) -> String {
    format!(
        "You are an Instagram DM automation assistant. Enhance this automated message to be \
         more personalized and engaging.\n\n\
         BASE MESSAGE TEMPLATE:\n{template}\n\n\
         BUSINESS CONTEXT:\n{context}\n\n\
         USER'S COMMENT:\n\"{event_text}\" by @{username}\n\n\
         INSTRUCTIONS:\n\
         1. Keep the core information from the base message\n\
         2. Acknowledge their specific comment naturally (don't just repeat it)\n\
         3. Use a friendly, conversational tone\n\
         4. Keep it concise (under 500 characters)\n\
         5. Don't be overly salesy or formal\n\
         6. Use the username naturally if appropriate\n\n\
         OUTPUT:\n\
         Return ONLY the enhanced message text, nothing else (no quotes, no explanation)."
    )
}
