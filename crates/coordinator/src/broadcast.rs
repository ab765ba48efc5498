//! Best-effort notifications for live UI rendering.
//!
//! Fire-and-forget: a failed publish is logged and swallowed — it never
//! fails the coordinating operation, and subscribers get no ordering or
//! delivery guarantee.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use wf_domain::tool::{ExecutionStatus, ToolStatus};
use wf_domain::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Payload
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Point-in-time status notification for one tool (or, with no index, the
/// execution as a whole).
#[derive(Debug, Clone, Serialize)]
pub struct ToolNotification {
    pub execution_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_index: Option<u32>,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl ToolNotification {
    pub fn tool(execution_id: Uuid, tool_index: u32, status: ToolStatus) -> Self {
        Self {
            execution_id,
            tool_index: Some(tool_index),
            status: status_str(&status),
            timestamp: Utc::now(),
        }
    }

    pub fn execution(execution_id: Uuid, status: ExecutionStatus) -> Self {
        Self {
            execution_id,
            tool_index: None,
            status: status_str(&status),
            timestamp: Utc::now(),
        }
    }
}

fn status_str<S: Serialize>(status: &S) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bus trait + broadcaster
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Message-bus seam: at-most-once, best-effort publish.
#[async_trait]
pub trait NotificationBus: Send + Sync {
    async fn publish(&self, channel: &str, payload: Value) -> Result<()>;
}

/// Emits notifications on the conversation channel, absorbing failures.
#[derive(Clone)]
pub struct Broadcaster {
    bus: Arc<dyn NotificationBus>,
    channel: String,
}

impl Broadcaster {
    pub fn new(bus: Arc<dyn NotificationBus>, record_id: &str) -> Self {
        Self {
            bus,
            channel: format!("conversation:{record_id}"),
        }
    }

    pub async fn emit(&self, notification: ToolNotification) {
        let payload = match serde_json::to_value(&notification) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize notification");
                return;
            }
        };
        if let Err(e) = self.bus.publish(&self.channel, payload).await {
            tracing::warn!(
                channel = %self.channel,
                execution_id = %notification.execution_id,
                error = %e,
                "broadcast failed"
            );
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BroadcastBus — in-process bus over tokio broadcast channels
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// In-process bus: one tokio broadcast channel per topic, created lazily.
/// Publishing to a channel with no subscribers is a no-op.
#[derive(Default)]
pub struct BroadcastBus {
    channels: RwLock<HashMap<String, broadcast::Sender<Value>>>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a channel (creating it if needed).
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Value> {
        let mut channels = self.channels.write();
        channels
            .entry(channel.to_owned())
            .or_insert_with(|| broadcast::channel(128).0)
            .subscribe()
    }
}

#[async_trait]
impl NotificationBus for BroadcastBus {
    async fn publish(&self, channel: &str, payload: Value) -> Result<()> {
        let channels = self.channels.read();
        if let Some(tx) = channels.get(channel) {
            // send only errors when there are no receivers — fine for
            // at-most-once semantics.
            let _ = tx.send(payload);
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use wf_domain::Error;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = Arc::new(BroadcastBus::new());
        let mut rx = bus.subscribe("conversation:m1");

        let broadcaster = Broadcaster::new(bus, "m1");
        let exec_id = Uuid::new_v4();
        broadcaster
            .emit(ToolNotification::tool(exec_id, 0, ToolStatus::Queued))
            .await;

        let got = rx.recv().await.unwrap();
        assert_eq!(got["execution_id"], exec_id.to_string());
        assert_eq!(got["tool_index"], 0);
        assert_eq!(got["status"], "queued");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let bus = Arc::new(BroadcastBus::new());
        let broadcaster = Broadcaster::new(bus, "m1");
        // Nothing to assert beyond not blocking or erroring.
        broadcaster
            .emit(ToolNotification::execution(
                Uuid::new_v4(),
                ExecutionStatus::Complete,
            ))
            .await;
    }

    #[tokio::test]
    async fn bus_failure_is_absorbed() {
        struct FailingBus;

        #[async_trait]
        impl NotificationBus for FailingBus {
            async fn publish(&self, _channel: &str, _payload: Value) -> Result<()> {
                Err(Error::Other("bus down".into()))
            }
        }

        let broadcaster = Broadcaster::new(Arc::new(FailingBus), "m1");
        // Must not panic or propagate.
        broadcaster
            .emit(ToolNotification::tool(Uuid::new_v4(), 1, ToolStatus::Error))
            .await;
    }

    #[test]
    fn execution_notification_has_no_index() {
        let n = ToolNotification::execution(Uuid::new_v4(), ExecutionStatus::Timeout);
        assert!(n.tool_index.is_none());
        assert_eq!(n.status, "timeout");
        let json = serde_json::to_value(&n).unwrap();
        assert!(json.get("tool_index").is_none());
    }
}
