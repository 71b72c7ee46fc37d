//! In-process fan-out of engine events.
//!
//! Scans, the scheduler and the dispatcher all publish [`MonitorEvent`]s
//! onto one [`EventBus`]. Observers either take the whole stream with
//! [`EventBus::subscribe`] or follow a single store with
//! [`EventBus::subscribe_store`].

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::warn;

use super::{MonitorEvent, StoreId};

/// Broadcast bus for [`MonitorEvent`]s.
///
/// Publishing never blocks a scan: with no observers the event is dropped,
/// and an observer that falls more than `capacity` events behind loses the
/// oldest ones.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per observer.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes `event`, returning how many observers will see it.
    pub fn publish(&self, event: MonitorEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Receives every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    /// Receives only the events of `store_id` published from now on.
    #[must_use]
    pub fn subscribe_store(&self, store_id: StoreId) -> StoreEvents {
        StoreEvents {
            store_id,
            receiver: self.sender.subscribe(),
            missed: 0,
        }
    }

    /// Number of live observers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Event stream of one store.
///
/// Lag is absorbed rather than surfaced: events dropped because the
/// observer fell behind are counted in [`StoreEvents::missed`].
#[derive(Debug)]
pub struct StoreEvents {
    store_id: StoreId,
    receiver: broadcast::Receiver<MonitorEvent>,
    missed: u64,
}

impl StoreEvents {
    /// Store this stream follows.
    #[must_use]
    pub const fn store_id(&self) -> StoreId {
        self.store_id
    }

    /// Events lost to lag so far, across all stores.
    #[must_use]
    pub const fn missed(&self) -> u64 {
        self.missed
    }

    /// Waits for the store's next event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<MonitorEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.store_id() == self.store_id => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => self.note_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the store's next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<MonitorEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.store_id() == self.store_id => return Some(event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => self.note_lag(skipped),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    fn note_lag(&mut self, skipped: u64) {
        self.missed = self.missed.saturating_add(skipped);
        warn!(store_id = %self.store_id, skipped, "store event observer lagged");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::SkipReason;
    use chrono::Utc;

    fn skipped(store_id: StoreId) -> MonitorEvent {
        MonitorEvent::ScanSkipped {
            store_id,
            reason: SkipReason::Overlap,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn publish_without_observers_is_dropped() {
        let bus = EventBus::new(100);
        assert_eq!(bus.publish(skipped(StoreId::new())), 0);
    }

    #[tokio::test]
    async fn store_stream_filters_other_stores() {
        let bus = EventBus::new(100);
        let watched = StoreId::new();
        let mut stream = bus.subscribe_store(watched);
        let mut all = bus.subscribe();

        bus.publish(skipped(StoreId::new()));
        bus.publish(skipped(watched));

        let Some(event) = stream.recv().await else {
            panic!("stream closed");
        };
        assert_eq!(event.store_id(), watched);
        assert!(stream.try_recv().is_none());

        let Ok(first) = all.recv().await else {
            panic!("full stream closed");
        };
        assert_ne!(first.store_id(), watched);
    }

    #[test]
    fn lagging_store_stream_counts_missed_events() {
        let bus = EventBus::new(2);
        let watched = StoreId::new();
        let mut stream = bus.subscribe_store(watched);

        for _ in 0..5 {
            bus.publish(skipped(watched));
        }

        let mut received = 0;
        while stream.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, 2);
        assert_eq!(stream.missed(), 3);
        assert_eq!(stream.store_id(), watched);
    }

    #[test]
    fn dropped_stream_releases_its_receiver() {
        let bus = EventBus::new(100);
        let stream = bus.subscribe_store(StoreId::new());
        assert_eq!(bus.receiver_count(), 1);
        drop(stream);
        assert_eq!(bus.receiver_count(), 0);
    }
}
