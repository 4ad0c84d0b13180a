use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use std::convert::Infallible;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

/// GET /api/events: SSE stream that emits `update` with the rendered status
/// on connect and after every state transition.
pub async fn sse_events(State(app): State<AppState>) -> impl axum::response::IntoResponse {
    let gateway = app.gateway.clone();
    let rx = gateway.scheduler().subscribe();
    let stream = WatchStream::new(rx).filter_map(move |snap| {
        let view = gateway.render(&snap);
        Event::default()
            .event("update")
            .json_data(&view)
            .ok()
            .map(Ok::<Event, Infallible>)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
