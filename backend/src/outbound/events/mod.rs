//! Event sink adapters bridging to the notification-delivery subsystem.
//!
//! Delivery itself lives outside this service; these adapters only hand
//! committed progression events over. [`ChannelEventSink`] feeds a bounded
//! in-process channel whose consumer forwards to the real delivery pipeline;
//! [`NullEventSink`] discards events for deployments (and tests) that run
//! without one.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::events::ProgressionEvent;
use crate::domain::ports::{EventSink, EventSinkError};

/// Event sink backed by a bounded in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::Sender<ProgressionEvent>,
}

impl ChannelEventSink {
    /// Create a sink and the receiving end of its channel.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` is zero, as the underlying channel does.
    #[must_use]
    pub fn pair(capacity: usize) -> (Self, mpsc::Receiver<ProgressionEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: ProgressionEvent) -> Result<(), EventSinkError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| EventSinkError::unavailable("event channel closed"))
    }
}

/// Sink that discards all events.
///
/// Logs at warn level so a misconfigured deployment is noticed.
#[derive(Debug, Clone, Default)]
pub struct NullEventSink;

impl NullEventSink {
    /// Create a new discarding sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventSink for NullEventSink {
    async fn emit(&self, event: ProgressionEvent) -> Result<(), EventSinkError> {
        tracing::warn!(?event, "NullEventSink: progression event discarded");
        Ok(())
    }
}
