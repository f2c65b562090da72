use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::debug;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct SessionsQuery {
    stream: Option<String>,
}

/// `GET /api/sessions` — one-shot dashboard snapshot, or a continuous SSE
/// stream of snapshots with `?stream=1`.
pub async fn get_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionsQuery>,
) -> Response {
    if query.stream.as_deref() == Some("1") {
        sessions_sse(state).into_response()
    } else {
        Json(state.hub.latest()).into_response()
    }
}

/// Each SSE event is one whole snapshot as a single JSON line. Subscribers
/// that fall behind skip intermediate snapshots (last value wins).
fn sessions_sse(state: AppState) -> Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>>
{
    let mut rx = state.hub.subscribe();
    let current = state.hub.latest();

    let stream = async_stream::stream! {
        yield Ok(Event::default().data(serde_json::to_string(&*current).unwrap()));

        loop {
            match rx.recv().await {
                Ok(snapshot) => {
                    yield Ok(Event::default().data(serde_json::to_string(&*snapshot).unwrap()));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "dashboard subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
