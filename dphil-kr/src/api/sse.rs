//! Server-Sent Events for knowledge research progress

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::config::MODULE_NAME;
use crate::AppState;

/// GET /knowledge/events
///
/// Streams ResearchStarted, ResearchCompleted and ResearchFailed events so
/// clients can listen instead of polling status.
pub async fn knowledge_event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    dphil_common::sse::create_event_sse_stream(MODULE_NAME, &state.event_bus)
}
