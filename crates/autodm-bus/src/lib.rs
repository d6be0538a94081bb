// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal notification bus for the autodm trigger pipeline.
//!
//! The state machine publishes `triggered` and `sent` events here; the
//! gateway streams them per account.

pub mod bus;
pub mod events;

pub use bus::{AccountSubscription, Delivery, EventBus};
pub use events::{BusEvent, PipelineEvent};
