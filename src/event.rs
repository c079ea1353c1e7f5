//! Multi-fire notification surface shared by the barriers and the lifecycle.

use crate::lifecycle::LifecycleError;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// Emitted every time a readiness task completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadyStat {
    /// Name of the task that just completed
    pub id: String,
    /// Number of tasks still pending on the same barrier
    pub remaining: usize,
    /// Names of the tasks still pending, in registration order
    pub pending: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// Overall readiness resolved; fired at most once
    Ready(Option<LifecycleError>),
    /// A task was still pending when its deadline passed
    ReadyTimeout(String),
    ReadyStat(ReadyStat),
    Error(LifecycleError),
    /// Teardown drained; fired once
    Close,
}

/// Broadcast bus for [`LifecycleEvent`]s
///
/// Subscribers only see events published after they subscribed. Once
/// [`detach`](Self::detach) is called the bus stays silent.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
    detached: Arc<AtomicBool>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    /// Bus that buffers up to `capacity` undelivered events per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            detached: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn publish(&self, event: LifecycleEvent) {
        if self.detached.load(Ordering::Acquire) {
            return;
        }
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    /// Receive every event published from now on.
    ///
    /// Each subscriber buffers at most the bus capacity (256 by default). A
    /// subscriber that falls further behind gets `RecvError::Lagged` and the
    /// oldest events, `Error` included, are lost to it. Keep receivers
    /// drained while many readiness tasks are running.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Stop delivering events to anyone.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(LifecycleEvent::ReadyTimeout("db".into()));
        assert_eq!(
            rx.recv().await.unwrap(),
            LifecycleEvent::ReadyTimeout("db".into())
        );
    }

    #[tokio::test]
    async fn detached_bus_drops_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.detach();
        bus.publish(LifecycleEvent::Close);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_subscriber_lags_past_capacity() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();
        bus.publish(LifecycleEvent::Error(LifecycleError::init_failed("first")));
        bus.publish(LifecycleEvent::ReadyTimeout("a".into()));
        bus.publish(LifecycleEvent::ReadyTimeout("b".into()));

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap(), LifecycleEvent::ReadyTimeout("a".into()));
    }
}
