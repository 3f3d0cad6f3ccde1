//! Server-Sent Events for realtime topics.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};

use super::{ApiError, AppState, AuthUser};
use crate::realtime::Topic;

/// Stream the latest state of a topic, then every change after it.
pub(crate) async fn realtime_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(topic): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let topic = Topic::from_str(&topic)
        .ok_or_else(|| ApiError::not_found(format!("Unknown topic: {}", topic)))?;
    let rx = state.hub.subscribe(user.id, topic);
    tracing::debug!(user_id = %user.id, topic = topic.as_str(), "Realtime subscriber connected");

    let events = stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let latest = rx.borrow_and_update().clone();
        Some((latest, (rx, false)))
    })
    .filter_map(move |latest| async move {
        latest.and_then(|change| Event::default().event(topic.as_str()).json_data(&change).ok())
    })
    .map(Ok);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
