//! Event Routes - Server-sent session updates

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use utoipa::IntoParams;

use callwatch::SessionUpdate;

use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct EventsQuery {
    /// Only stream updates for this job
    pub job_id: Option<String>,
}

/// Stream session updates as server-sent events
#[utoipa::path(
    get,
    path = "/api/events",
    params(EventsQuery),
    responses(
        (status = 200, description = "Stream of `session` events", content_type = "text/event-stream")
    ),
    tag = "Events"
)]
pub async fn stream_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let updates = stream::unfold(state.updates.subscribe(), |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(update) => return Some((update, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "⚠️ Event stream lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    let job_id = query.job_id;
    let events = updates
        .filter(move |update: &SessionUpdate| {
            let keep = job_id.as_deref().map_or(true, |id| update.job_id() == id);
            futures::future::ready(keep)
        })
        .map(|update| Ok(to_event(&update)));

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn to_event(update: &SessionUpdate) -> Event {
    Event::default()
        .event("session")
        .json_data(update)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/events", get(stream_events))
}
