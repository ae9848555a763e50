//! Notification sinks

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;
use verdant_common::DomainEvent;

/// Receives committed domain events
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Deliver one event. Errors are logged by the dispatcher and dropped.
    async fn notify(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

/// Logs every event at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn notify(&self, event: &DomainEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(event)?;
        info!(
            event = event.name(),
            user = event.user().map(|u| u.as_str()).unwrap_or("-"),
            %payload,
            "Domain event"
        );
        Ok(())
    }
}

/// Fans events out to in-process subscribers
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<DomainEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    fn name(&self) -> &str {
        "broadcast"
    }

    async fn notify(&self, event: &DomainEvent) -> anyhow::Result<()> {
        // no subscribers is not a failure
        if self.tx.receiver_count() > 0 {
            self.tx
                .send(event.clone())
                .map_err(|_| anyhow::anyhow!("broadcast channel closed"))?;
        }
        Ok(())
    }
}
