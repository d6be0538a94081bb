// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for autodm integration tests.
//!
//! # Components
//!
//! - [`MockMessaging`] / [`MockConnector`] - scripted messaging platform with call capture
//! - [`MockProvider`] - AI provider with per-model answers
//! - [`TestHarness`] - full pipeline over a temp SQLite database

pub mod harness;
pub mod mock_messaging;
pub mod mock_provider;

pub use harness::{TestHarness, comment_event, message_event};
pub use mock_messaging::{MessagingCall, MockConnector, MockMessaging};
pub use mock_provider::MockProvider;
