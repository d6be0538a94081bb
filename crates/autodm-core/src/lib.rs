// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the autodm trigger pipeline.
//!
//! This crate provides the error type, domain types and adapter traits used
//! throughout the autodm workspace. Platform clients, AI providers and
//! storage backends implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::AutodmError;
pub use types::{AdapterType, HealthStatus, MessageId};

// Re-export all adapter traits at crate root.
pub use traits::{
    DedupCache, MessagingAdapter, MessagingConnector, PluginAdapter, ProviderAdapter,
    RateLimiter, StorageAdapter, TaskQueue,
};
