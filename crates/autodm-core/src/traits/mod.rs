// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the pipeline's external collaborators.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod messaging;
pub mod provider;
pub mod storage;

pub use adapter::PluginAdapter;
pub use messaging::{MessagingAdapter, MessagingConnector};
pub use provider::ProviderAdapter;
pub use storage::{DedupCache, RateLimiter, StorageAdapter, TaskQueue};
