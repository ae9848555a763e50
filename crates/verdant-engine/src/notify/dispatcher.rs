//! EventDispatcher - drains the engine's event queue into sinks

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use verdant_common::DomainEvent;

use super::sink::NotificationSink;

#[derive(Clone, Default)]
pub struct EventDispatcher {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Deliver to every sink; returns how many accepted the event
    pub async fn dispatch(&self, event: &DomainEvent) -> usize {
        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.notify(event).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    sink = sink.name(),
                    event = event.name(),
                    error = %e,
                    "Notification sink failed"
                ),
            }
        }
        delivered
    }

    /// Run until every sender is dropped
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<DomainEvent>) {
        info!(sinks = self.sinks.len(), "Event dispatcher started");
        while let Some(event) = rx.recv().await {
            let delivered = self.dispatch(&event).await;
            debug!(event = event.name(), delivered, "Event dispatched");
        }
        info!("Event dispatcher stopped");
    }

    pub fn spawn(self, rx: mpsc::UnboundedReceiver<DomainEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }
}
