//! Server-Sent Events support

use crate::runtime::{KioskSubscription, SseEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert a kiosk subscription to an SSE stream: `init` first, then state
/// changes, frames and device commands as they happen
pub fn sse_stream(
    session_id: String,
    init_event: SseEvent,
    subscription: KioskSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = session_events(session_id, init_event, subscription)
        .map(|event| Ok::<_, Infallible>(sse_event_to_axum(event)));

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn session_events(
    session_id: String,
    init_event: SseEvent,
    subscription: KioskSubscription,
) -> impl Stream<Item = SseEvent> {
    let init = futures::stream::once(async move { init_event });

    let updates_session = session_id.clone();
    let updates = BroadcastStream::new(subscription.updates)
        .filter_map(move |result| received(&updates_session, "updates", result));
    let commands = BroadcastStream::new(subscription.commands).filter_map(move |result| {
        received(&session_id, "commands", result.map(SseEvent::Command))
    });

    init.chain(updates.merge(commands))
}

/// Pass an item through; a lagged receiver has lost items, which is logged
fn received(
    session_id: &str,
    channel: &'static str,
    result: Result<SseEvent, BroadcastStreamRecvError>,
) -> Option<SseEvent> {
    match result {
        Ok(event) => Some(event),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(session = %session_id, channel, skipped, "SSE subscriber lagged");
            None
        }
    }
}

fn sse_event_to_axum(event: SseEvent) -> Event {
    let (event_type, data) = event_payload(event);
    Event::default().event(event_type).data(data.to_string())
}

/// SSE event name and JSON body for each session event
fn event_payload(event: SseEvent) -> (&'static str, Value) {
    match event {
        SseEvent::Init { snapshot, frames } => (
            "init",
            json!({
                "type": "init",
                "view": snapshot.view,
                "turns": snapshot.turns,
                "frames": frames
            }),
        ),
        SseEvent::StateChange { view } => (
            "state_change",
            json!({
                "type": "state_change",
                "view": view
            }),
        ),
        SseEvent::Frame { image } => (
            "frame",
            json!({
                "type": "frame",
                "image": image
            }),
        ),
        SseEvent::Command(command) => ("command", json!(command)),
    }
}
