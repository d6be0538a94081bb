// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the autodm trigger pipeline.

use thiserror::Error;

/// The primary error type used across all autodm adapter traits and pipeline stages.
///
/// Business outcomes (rate limited, not following, delivery failure) are recorded
/// on the trigger record and are not represented here; only failures that must
/// reach a caller travel as `AutodmError`.
#[derive(Debug, Error)]
pub enum AutodmError {
    /// Configuration errors (invalid TOML, missing secrets, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The messaging platform rejected a call or could not be reached.
    ///
    /// `status` carries the upstream HTTP status when one was received.
    #[error("{message}")]
    Messaging {
        status: Option<u16>,
        message: String,
    },

    /// AI provider errors (API failure, malformed response, empty completion).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Inbound event addressed to an account that is unknown or inactive.
    #[error("unknown account: {0}")]
    UnknownAccount(String),

    /// A record referenced by id does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AutodmError {
    /// Builds a storage error from any error type.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Upstream HTTP status attached to a messaging failure, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Messaging { status, .. } => *status,
            _ => None,
        }
    }
}
