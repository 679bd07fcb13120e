// Trait seams to external collaborators

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// Publish sink for realtime updates.
///
/// Called after a successful commit with the serialized event payload.
/// Delivery is best-effort: callers log a failure and move on; a sink error
/// never rolls back or surfaces to the mutating request.
#[async_trait]
pub trait RealtimeSink: Send + Sync {
    async fn publish(&self, event_id: Uuid, payload: serde_json::Value) -> Result<()>;
}

/// Sink that drops every payload; used in tests and when no transport is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl RealtimeSink for NoopSink {
    async fn publish(&self, _event_id: Uuid, _payload: serde_json::Value) -> Result<()> {
        Ok(())
    }
}
