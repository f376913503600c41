//! Generic observer/notification bus (§4.I).
//!
//! Every cache that exposes change notifications (station, MBO/WNM, SNR,
//! RRM beacon report) embeds one of these rather than reimplementing
//! subscriber bookkeeping. Handles are slab keys, a stable-handle pattern
//! borrowed from pooled-buffer allocators.

use slab::Slab;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(usize);

struct Subscriber<E> {
    filter: Box<dyn Fn(&E) -> bool>,
    callback: Box<dyn FnMut(&E)>,
}

/// A bus of (filter, callback) subscribers for one event type.
///
/// Callbacks run synchronously from whatever call site drives `notify`,
/// which on the live path is always the dispatcher thread. Re-entrant
/// `register`/`unregister` from inside a callback is supported: newly
/// added subscribers are not invoked for the event still being dispatched,
/// and subscribers removed mid-dispatch are skipped cleanly.
pub struct ObserverBus<E> {
    subscribers: Slab<Subscriber<E>>,
}

impl<E> Default for ObserverBus<E> {
    fn default() -> Self {
        ObserverBus {
            subscribers: Slab::new(),
        }
    }
}

impl<E> ObserverBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. `replay` is the set of synthetic events
    /// representing current state that match `filter`; each is delivered
    /// to `callback` before `register` returns, per §4.I's replay contract.
    pub fn register<F, C>(
        &mut self,
        filter: F,
        mut callback: C,
        replay: impl IntoIterator<Item = E>,
    ) -> ObserverHandle
    where
        F: Fn(&E) -> bool + 'static,
        C: FnMut(&E) + 'static,
    {
        for event in replay {
            if filter(&event) {
                callback(&event);
            }
        }
        let key = self.subscribers.insert(Subscriber {
            filter: Box::new(filter),
            callback: Box::new(callback),
        });
        ObserverHandle(key)
    }

    /// Unregister a subscriber. Guaranteed no further callbacks after this
    /// returns, even if called from inside a callback for the same bus.
    pub fn unregister(&mut self, handle: ObserverHandle) {
        if self.subscribers.contains(handle.0) {
            self.subscribers.remove(handle.0);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Dispatch `event` to every subscriber whose filter matches.
    pub fn notify(&mut self, event: &E) {
        let keys: Vec<usize> = self.subscribers.iter().map(|(k, _)| k).collect();
        for key in keys {
            if !self.subscribers.contains(key) {
                continue; // unregistered by an earlier callback this round
            }
            let matches = (self.subscribers[key].filter)(event);
            if !matches {
                continue;
            }
            // Swap the callback out so invoking it doesn't hold a borrow of
            // `self.subscribers`, which lets the callback itself call
            // register/unregister reentrantly.
            let mut callback = std::mem::replace(
                &mut self.subscribers[key].callback,
                Box::new(|_: &E| {}),
            );
            callback(event);
            if self.subscribers.contains(key) {
                self.subscribers[key].callback = callback;
            }
        }
    }
}
