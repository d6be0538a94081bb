// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-sent-events feed of one account's pipeline events.

use std::convert::Infallible;
use std::time::Duration;

use autodm_bus::{AccountSubscription, Delivery};
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};

use crate::server::GatewayState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// `GET /v1/accounts/{account_id}/events`
pub async fn account_events(
    State(state): State<GatewayState>,
    Path(account_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(account_id = %account_id, "event stream opened");
    let subscription = state.bus.subscribe_account(&account_id);
    Sse::new(event_stream(subscription)).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

/// Maps bus deliveries to SSE frames: `event: triggered|sent`, JSON data,
/// bus sequence as id. A lagging client gets a `warning` frame.
pub fn event_stream(
    subscription: AccountSubscription,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(subscription, |mut subscription| async move {
        let frame = match subscription.recv().await? {
            Delivery::Event(bus_event) => Event::default()
                .event(bus_event.event.kind())
                .id(bus_event.sequence.to_string())
                .data(serde_json::to_string(&bus_event.event).unwrap_or_default()),
            Delivery::Lagged(missed) => Event::default()
                .event("warning")
                .data(format!("{{\"type\":\"lagged\",\"missed_events\":{missed}}}")),
        };
        Some((Ok(frame), subscription))
    })
}
