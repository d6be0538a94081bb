// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP ingress for autodm.
//!
//! Receives signed platform webhooks and hands them to the pipeline's
//! ingestor, streams account events over SSE, and answers liveness checks.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod signature;
pub mod sse;

pub use server::{GatewayState, router, serve};
