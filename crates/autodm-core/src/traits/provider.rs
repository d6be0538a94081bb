// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for AI text-generation backends.

use async_trait::async_trait;

use crate::error::AutodmError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{GenerationRequest, GenerationResponse};

/// Adapter for an AI provider exposing a single generation call.
///
/// The enhancement chain tries several model identifiers against this one
/// call shape; implementations must not retry internally.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Generates text for a single prompt.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, AutodmError>;
}
