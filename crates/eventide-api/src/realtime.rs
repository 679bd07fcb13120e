// Realtime change notifications over server-sent events.
//
// Mutations publish a small JSON message after their transaction commits;
// connected clients receive it on /v1/events/stream. Delivery is best-effort:
// a message sent while nobody is listening is simply dropped.

use std::convert::Infallible;

use async_trait::async_trait;
use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use eventide_core::{RealtimeSink, Result};

use crate::AppState;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct RealtimeMessage {
    pub event_id: Uuid,
    pub payload: serde_json::Value,
}

/// Fans published messages out to every connected SSE subscriber.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<RealtimeMessage>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        BroadcastSink { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimeSink for BroadcastSink {
    async fn publish(&self, event_id: Uuid, payload: serde_json::Value) -> Result<()> {
        // send() only errors when there are no subscribers; that is fine.
        let _ = self.tx.send(RealtimeMessage { event_id, payload });
        Ok(())
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/events/stream", get(stream_changes))
        .with_state(state)
}

/// GET /v1/events/stream - SSE stream of event mutations
#[utoipa::path(
    get,
    path = "/v1/events/stream",
    responses(
        (status = 200, description = "SSE stream of event changes", content_type = "text/event-stream")
    ),
    tag = "realtime"
)]
pub async fn stream_changes(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<SseEvent, Infallible>>> {
    let rx = state.realtime.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(msg) => {
            let json =
                serde_json::to_string(&msg.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default()
                .event("event_changed")
                .id(msg.event_id.to_string())
                .data(json)))
        }
        // Lagged receivers skip the dropped messages and keep going.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let sink = BroadcastSink::new();
        let result = sink
            .publish(Uuid::now_v7(), serde_json::json!({"action": "created"}))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn subscribers_receive_published_messages() {
        let sink = BroadcastSink::new();
        let mut rx = sink.subscribe();

        let event_id = Uuid::now_v7();
        sink.publish(event_id, serde_json::json!({"action": "updated"}))
            .await
            .unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.event_id, event_id);
        assert_eq!(msg.payload["action"], "updated");
    }
}
