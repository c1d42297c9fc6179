//! Broadcast listener registry
//!
//! Every registered listener receives every [`LinkEvent`] for every device, in
//! registration order; filtering by device or characteristic is the listener's
//! job. Listeners are bounded channel receivers, so consumers poll or block on
//! their own context instead of running callbacks on the dispatch thread.
//!
//! Registration and unregistration are safe at any time, including from a
//! thread that is mid-drain of its own receiver. Dispatch snapshots the
//! listener list under the lock, so an unregistration takes effect no later
//! than the next dispatched event. A listener whose queue is full loses that
//! event (counted and logged); a listener whose receiver was dropped is pruned
//! on the next dispatch.

use super::LinkEvent;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Handle identifying a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A listener's end of the event stream
#[derive(Debug)]
pub struct Subscription {
    id: ListenerId,
    receiver: Receiver<LinkEvent>,
}

impl Subscription {
    /// The identity to pass to `unregister`
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Receive the next event without blocking
    pub fn try_recv(&self) -> Option<LinkEvent> {
        self.receiver.try_recv().ok()
    }

    /// Block for the next event with a timeout
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<LinkEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Drain all currently pending events
    pub fn drain(&self) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

struct Entry {
    id: ListenerId,
    sender: Sender<LinkEvent>,
}

/// Process-wide listener registry
///
/// Shared between the worker (dispatch) and the handle (registration) behind
/// an `Arc`; the `Mutex` covers the listener list only, sends happen on a
/// snapshot taken under the lock.
pub struct ListenerRegistry {
    listeners: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
    dropped_events: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            dropped_events: AtomicU64::new(0),
        }
    }

    /// Register a listener with the given queue depth
    pub fn register(&self, queue_depth: usize) -> Subscription {
        let (sender, receiver) = bounded(queue_depth.max(1));
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .expect("listener registry poisoned")
            .push(Entry { id, sender });
        tracing::debug!(listener = id.0, "listener registered");
        Subscription { id, receiver }
    }

    /// Remove a listener; no events are delivered after this returns
    /// (an event already snapshotted by an in-flight dispatch may still land)
    pub fn unregister(&self, id: ListenerId) {
        let mut listeners = self.listeners.lock().expect("listener registry poisoned");
        listeners.retain(|entry| entry.id != id);
        tracing::debug!(listener = id.0, "listener unregistered");
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.lock().expect("listener registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events lost to full listener queues since construction
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Deliver an event to every registered listener, in registration order
    pub fn broadcast(&self, event: &LinkEvent) {
        let snapshot: Vec<(ListenerId, Sender<LinkEvent>)> = {
            let listeners = self.listeners.lock().expect("listener registry poisoned");
            listeners
                .iter()
                .map(|entry| (entry.id, entry.sender.clone()))
                .collect()
        };

        let mut dead = Vec::new();
        for (id, sender) in snapshot {
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped_events.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(listener = id.0, "listener queue full, event dropped");
                }
                Err(TrySendError::Disconnected(_)) => dead.push(id),
            }
        }

        if !dead.is_empty() {
            let mut listeners = self.listeners.lock().expect("listener registry poisoned");
            listeners.retain(|entry| !dead.contains(&entry.id));
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceId;

    fn event() -> LinkEvent {
        LinkEvent::Connected {
            device: DeviceId::new("AA:BB"),
        }
    }

    #[test]
    fn test_broadcast_reaches_all_listeners_in_order() {
        let registry = ListenerRegistry::new();
        let first = registry.register(8);
        let second = registry.register(8);

        registry.broadcast(&event());

        assert!(matches!(first.try_recv(), Some(LinkEvent::Connected { .. })));
        assert!(matches!(second.try_recv(), Some(LinkEvent::Connected { .. })));
        assert!(first.try_recv().is_none());
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let registry = ListenerRegistry::new();
        let sub = registry.register(8);
        registry.unregister(sub.id());

        registry.broadcast(&event());
        assert!(sub.try_recv().is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_each_event_delivered_exactly_once() {
        let registry = ListenerRegistry::new();
        let sub = registry.register(8);
        registry.broadcast(&event());
        registry.broadcast(&event());
        assert_eq!(sub.drain().len(), 2);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_full_listener_drops_without_blocking() {
        let registry = ListenerRegistry::new();
        let sub = registry.register(1);
        registry.broadcast(&event());
        registry.broadcast(&event());
        assert_eq!(registry.dropped_events(), 1);
        assert_eq!(sub.drain().len(), 1);
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let registry = ListenerRegistry::new();
        let sub = registry.register(8);
        drop(sub);
        registry.broadcast(&event());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_concurrent_register_and_broadcast() {
        use std::sync::Arc;

        let registry = Arc::new(ListenerRegistry::new());
        let dispatcher = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    registry.broadcast(&event());
                }
            })
        };

        let mut subs = Vec::new();
        for _ in 0..50 {
            subs.push(registry.register(1024));
        }
        for sub in &subs {
            registry.unregister(sub.id());
        }
        dispatcher.join().unwrap();
        assert_eq!(registry.len(), 0);
    }
}
