//! In-process event fan-out
//!
//! [`EventBus`] is a plain single-threaded publish/subscribe list: every
//! published event reaches every handler, in subscription order, with no
//! filtering. [`FeedAdapter`] is the bridge from the cross-thread event
//! channel into a bus.

use crate::event::{PianoEvent, TimedEvent};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::time::Instant;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

type Handler<E> = Box<dyn FnMut(&E)>;

/// Synchronous publish/subscribe channel
pub struct EventBus<E> {
    handlers: Vec<(SubscriptionId, Handler<E>)>,
    next_id: usize,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a handler, invoked once for every published event
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&E) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sub, _)| *sub != id);
        self.handlers.len() != before
    }

    /// Deliver an event to every handler
    pub fn publish(&mut self, event: &E) {
        for (_, handler) in self.handlers.iter_mut() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Drains the cross-thread event channel into a bus
pub struct FeedAdapter {
    rx: Receiver<PianoEvent>,
}

impl FeedAdapter {
    /// Create the event channel; producers keep clones of the sender
    pub fn channel() -> (Sender<PianoEvent>, Self) {
        let (tx, rx) = unbounded();
        (tx, Self { rx })
    }

    /// Publish every pending event, in arrival order, stamped with `now`.
    /// Returns the number of events delivered.
    pub fn pump(&self, bus: &mut EventBus<TimedEvent>, now: Instant) -> usize {
        let mut delivered = 0;
        for event in self.rx.try_iter() {
            bus.publish(&TimedEvent::new(event, now));
            delivered += 1;
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_publish_reaches_all_handlers_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        for tag in 0..3 {
            let seen = seen.clone();
            bus.subscribe(move |value: &u32| seen.borrow_mut().push((tag, *value)));
        }

        bus.publish(&7);
        bus.publish(&8);

        assert_eq!(
            *seen.borrow(),
            vec![(0, 7), (1, 7), (2, 7), (0, 8), (1, 8), (2, 8)]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        let counter = count.clone();
        let id = bus.subscribe(move |_: &()| *counter.borrow_mut() += 1);
        assert_eq!(bus.len(), 1);

        bus.publish(&());
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&());

        assert_eq!(*count.borrow(), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_pump_preserves_arrival_order() {
        let (tx, adapter) = FeedAdapter::channel();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let sink = seen.clone();
        bus.subscribe(move |e: &TimedEvent| sink.borrow_mut().push(e.event.clone()));

        tx.send(PianoEvent::press(60, 100)).unwrap();
        tx.send(PianoEvent::release(60)).unwrap();
        tx.send(PianoEvent::press(62, 100)).unwrap();

        let delivered = adapter.pump(&mut bus, Instant::now());
        assert_eq!(delivered, 3);
        let ids: Vec<_> = seen.borrow().iter().map(|e| (e.key_id, e.is_press())).collect();
        assert_eq!(ids, vec![(60, true), (60, false), (62, true)]);

        assert_eq!(adapter.pump(&mut bus, Instant::now()), 0);
    }
}
