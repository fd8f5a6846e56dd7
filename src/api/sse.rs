//! Server-Sent Events support

use crate::runtime::{SequencedUpdate, SessionSnapshot, SessionUpdate};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert a session's update broadcast into an SSE stream.
/// The first event carries the snapshot the updates apply on top of.
pub fn sse_stream(
    snapshot: SessionSnapshot,
    broadcast_rx: broadcast::Receiver<SequencedUpdate>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let broadcasts = updates_after(snapshot.seq, broadcast_rx).map(|sequenced| {
        let event = to_axum_event(update_name(&sequenced.update), &sequenced.update);
        Ok::<_, Infallible>(event.id(sequenced.seq.to_string()))
    });

    let init = futures::stream::once(async move {
        Ok::<_, Infallible>(to_axum_event(
            "init",
            &json!({
                "type": "init",
                "state": snapshot.state,
                "messages": snapshot.messages,
            }),
        )
        .id(snapshot.seq.to_string()))
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Updates newer than the snapshot with sequence number `seq`
fn updates_after(
    seq: u64,
    broadcast_rx: broadcast::Receiver<SequencedUpdate>,
) -> impl Stream<Item = SequencedUpdate> {
    BroadcastStream::new(broadcast_rx).filter_map(move |result| match result {
        Ok(sequenced) if sequenced.seq > seq => Some(sequenced),
        // Already in the snapshot, or lagged
        _ => None,
    })
}

fn update_name(update: &SessionUpdate) -> &'static str {
    match update {
        SessionUpdate::Message { .. } => "message",
        SessionUpdate::Typing { .. } => "typing",
        SessionUpdate::InputCleared => "input_cleared",
        SessionUpdate::OpenLink { .. } => "open_link",
        SessionUpdate::StateChange { .. } => "state_change",
        SessionUpdate::Error { .. } => "error",
    }
}

fn to_axum_event(event_type: &str, data: &impl Serialize) -> Event {
    let data = serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(event_type).data(data)
}
