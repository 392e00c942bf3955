// SPDX-License-Identifier: GPL-3.0-only

//! In-process state broadcast channel
//!
//! Siblings that share no owner use this to tell each other that something
//! changed. Events carry no payload: a subscriber that reacts must re-read
//! the authoritative state instead of trusting when the event arrived.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::trace;

/// The fixed set of events on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEvent {
    /// Desired mute/camera state was mutated
    StateChanged,
    /// The local tile lost or failed to open its capture while the camera
    /// was wanted on
    CaptureFailed,
    /// The user asked to leave the meeting
    Leave,
}

type Handler = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    handlers: HashMap<MediaEvent, Vec<(u64, Handler)>>,
}

/// Cloneable handle to one bus
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

/// Live registration; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    bus: Weak<Mutex<BusInner>>,
    event: MediaEvent,
    id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `handler` on every future `publish(event)`
    pub fn subscribe(
        &self,
        event: MediaEvent,
        handler: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = lock(&self.inner);
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .handlers
            .entry(event)
            .or_default()
            .push((id, Arc::new(handler)));
        trace!(?event, id, "Subscribed");

        Subscription {
            bus: Arc::downgrade(&self.inner),
            event,
            id,
        }
    }

    /// Fire-and-forget notification of `event`
    ///
    /// Handlers run on the caller's thread after the registry lock is
    /// released, so they may publish or subscribe themselves.
    pub fn publish(&self, event: MediaEvent) {
        let handlers: Vec<Handler> = lock(&self.inner)
            .handlers
            .get(&event)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        trace!(?event, subscribers = handlers.len(), "Publishing");
        for handler in handlers {
            handler();
        }
    }

    /// Number of live subscriptions for `event`
    pub fn subscriber_count(&self, event: MediaEvent) -> usize {
        lock(&self.inner)
            .handlers
            .get(&event)
            .map_or(0, Vec::len)
    }
}

impl Subscription {
    /// Explicit form of dropping the subscription
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.bus.upgrade() else {
            return;
        };
        // Removed handlers are dropped after the lock is released; their
        // captures may own subscriptions of their own
        let removed: Vec<(u64, Handler)> = {
            let mut inner = lock(&inner);
            match inner.handlers.get_mut(&self.event) {
                Some(list) => {
                    let (removed, kept) = std::mem::take(list)
                        .into_iter()
                        .partition(|(id, _)| *id == self.id);
                    *list = kept;
                    removed
                }
                None => Vec::new(),
            }
        };
        trace!(event = ?self.event, id = self.id, "Unsubscribed");
        drop(removed);
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("EventBus")
            .field(
                "subscribers",
                &inner.handlers.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

fn lock(inner: &Mutex<BusInner>) -> MutexGuard<'_, BusInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(bus: &EventBus, event: MediaEvent) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let sub = bus.subscribe(event, move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn delivers_only_matching_events() {
        let bus = EventBus::new();
        let (changed, _a) = counter(&bus, MediaEvent::StateChanged);
        let (left, _b) = counter(&bus, MediaEvent::Leave);

        bus.publish(MediaEvent::StateChanged);
        bus.publish(MediaEvent::StateChanged);

        assert_eq!(changed.load(Ordering::SeqCst), 2);
        assert_eq!(left.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let bus = EventBus::new();
        let (count, sub) = counter(&bus, MediaEvent::StateChanged);
        assert_eq!(bus.subscriber_count(MediaEvent::StateChanged), 1);

        sub.unsubscribe();
        bus.publish(MediaEvent::StateChanged);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count(MediaEvent::StateChanged), 0);
    }

    #[test]
    fn handlers_may_publish_reentrantly() {
        let bus = EventBus::new();
        let (changed, _a) = counter(&bus, MediaEvent::StateChanged);
        let relay = bus.clone();
        let _b = bus.subscribe(MediaEvent::CaptureFailed, move || {
            relay.publish(MediaEvent::StateChanged);
        });

        bus.publish(MediaEvent::CaptureFailed);

        assert_eq!(changed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let bus = EventBus::new();
        let (_count, sub) = counter(&bus, MediaEvent::Leave);
        drop(bus);
        drop(sub);
    }
}
