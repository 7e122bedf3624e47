//! Server-Sent Events stream of committed changes. The event name is the table.

use super::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use std::convert::Infallible;
use tokio_stream::{
    Stream, StreamExt,
    wrappers::{BroadcastStream, errors::BroadcastStreamRecvError},
};
use tracing::{info, warn};

pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("realtime subscriber connected");
    let changes = BroadcastStream::new(state.feed.subscribe()).filter_map(|msg| match msg {
        Ok(change) => Event::default()
            .event(change.table.as_str())
            .json_data(&change)
            .ok()
            .map(Ok),
        // Client must refetch; tell it how much it missed.
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "realtime subscriber lagged");
            Some(Ok(Event::default()
                .event("lagged")
                .data(skipped.to_string())))
        }
    });
    Sse::new(changes).keep_alive(KeepAlive::default())
}
