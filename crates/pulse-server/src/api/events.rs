//! Server-Sent Events feed of session progress

use crate::api::error::ApiError;
use crate::api::handlers::parse_session_id;
use crate::broadcaster::{EventSubscription, ProgressEnvelope, ProgressEvent};
use crate::service::AnalysisService;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;

enum Feed {
    /// The session already finished; replay its outcome once
    Resync(ProgressEnvelope),
    Live(EventSubscription),
    Done,
}

fn event_name(event: &ProgressEvent) -> &'static str {
    match event {
        ProgressEvent::Progress { .. } => "progress",
        ProgressEvent::Complete { .. } => "complete",
        ProgressEvent::Error { .. } => "error",
    }
}

fn to_sse(envelope: &ProgressEnvelope) -> Event {
    let event = Event::default()
        .event(event_name(&envelope.event))
        .id(envelope.seq.to_string());
    match serde_json::to_string(envelope) {
        Ok(data) => event.data(data),
        Err(e) => {
            tracing::error!(session_id = %envelope.session_id, error = %e, "Could not encode progress event");
            event.comment("encoding error")
        },
    }
}

/// `GET /api/session/:id/events`
///
/// Streams the session's events until its terminal event. A session that
/// already finished yields one event rebuilt from its snapshot.
pub async fn stream_events(
    State(service): State<AnalysisService>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let id = parse_session_id(&id)?;

    // Subscribe before reading the snapshot so nothing slips between them.
    let subscription = service.subscribe(id)?;
    let snapshot = service.status(id)?;

    let feed = match ProgressEvent::terminal_for(&snapshot) {
        Some(event) => Feed::Resync(ProgressEnvelope {
            session_id: id,
            seq: 0,
            event,
        }),
        None => Feed::Live(subscription),
    };

    let events = stream::unfold(feed, |feed| async move {
        match feed {
            Feed::Resync(envelope) => Some((envelope, Feed::Done)),
            Feed::Live(mut subscription) => subscription
                .recv()
                .await
                .map(|envelope| (envelope, Feed::Live(subscription))),
            Feed::Done => None,
        }
    })
    .map(|envelope| Ok(to_sse(&envelope)));

    tracing::debug!(session_id = %id, "Event stream opened");
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
