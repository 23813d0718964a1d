// Logs endpoints - what the side-panel UI reads

use super::AppState;
use crate::events::StoredRecord;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use serde::Serialize;
use std::convert::Infallible;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<StoredRecord>,
}

/// All records in insertion order
///
/// A storage error is logged and answered with an empty list; the UI has no
/// error state to show.
pub async fn get_logs(State(state): State<AppState>) -> Json<LogsResponse> {
    let logs = match state.pipeline.store().list_all().await {
        Ok(logs) => logs,
        Err(e) => {
            tracing::error!("Failed to read audit log: {}", e);
            Vec::new()
        }
    };
    Json(LogsResponse { logs })
}

/// One `log_saved` event per append, from subscription onwards
pub async fn stream_logs(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.pipeline.store().subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|message| match message {
        Ok(saved) => match Event::default().event("log_saved").json_data(&saved) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::error!("Failed to encode log_saved event: {}", e);
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!("Log stream listener lagged, skipped {} entries", skipped);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
