//! Hot, push-based event streams
//!
//! - `Publisher<T>`: the emitting side, owned by whatever adapts an external
//!   source (a notification feed, a gesture recognizer, ...)
//! - `EventStream<T>`: the subscribing side, cheap to clone and compose
//!
//! # Architecture
//!
//! ```text
//! Publisher<T> ──┐
//!                ▼
//!          StreamCore<T>
//!          ├── slots: Vec<Arc<ListenerSlot<T>>>   (strong, pruned lazily)
//!          ├── queue: pending values + emitting flag (trampoline)
//!          ├── latest: Option<T>                  (replaying streams only)
//!          └── upstream: SubscriptionBag          (derived streams only)
//!                ▲
//! EventStream<T> ┘
//! ```
//!
//! Emission is serialized per stream. A stream asked to emit while it is
//! already emitting (a listener feeding back into its own source) queues the
//! value and the outer emission delivers it once the current round is done,
//! so listeners are never re-entered and values keep their arrival order.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::subscription::{ListenerSlot, Subscription, SubscriptionBag};

/// Bound shared by every value that flows through a stream
pub trait StreamValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> StreamValue for T {}

struct EmitQueue<T> {
    pending: VecDeque<T>,
    emitting: bool,
}

/// Resets the emit queue if a listener panics mid-emission
struct EmitGuard<'a, T> {
    queue: &'a Mutex<EmitQueue<T>>,
}

impl<T> Drop for EmitGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut queue = self.queue.lock();
            queue.pending.clear();
            queue.emitting = false;
        }
    }
}

pub(crate) struct StreamCore<T> {
    slots: Mutex<Vec<Arc<ListenerSlot<T>>>>,
    queue: Mutex<EmitQueue<T>>,
    /// `Some` for replaying streams: new listeners get the latest value first
    latest: Option<Mutex<Option<T>>>,
    upstream: SubscriptionBag,
    retained: Mutex<Vec<Arc<dyn Any + Send + Sync>>>,
}

impl<T: StreamValue> StreamCore<T> {
    pub(crate) fn new(replays: bool) -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            queue: Mutex::new(EmitQueue {
                pending: VecDeque::new(),
                emitting: false,
            }),
            latest: replays.then(|| Mutex::new(None)),
            upstream: SubscriptionBag::new(),
            retained: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_latest(value: T) -> Self {
        let core = Self::new(true);
        if let Some(latest) = &core.latest {
            *latest.lock() = Some(value);
        }
        core
    }

    pub(crate) fn replays(&self) -> bool {
        self.latest.is_some()
    }

    /// Forget the value handed to new listeners
    pub(crate) fn clear_latest(&self) {
        if let Some(latest) = &self.latest {
            latest.lock().take();
        }
    }

    pub(crate) fn add_upstream(&self, subscription: Subscription) {
        self.upstream.add(subscription);
    }

    pub(crate) fn retain(&self, value: Arc<dyn Any + Send + Sync>) {
        self.retained.lock().push(value);
    }

    pub(crate) fn emit(&self, value: T) {
        {
            let mut queue = self.queue.lock();
            queue.pending.push_back(value);
            if queue.emitting {
                return;
            }
            queue.emitting = true;
        }

        let _guard = EmitGuard { queue: &self.queue };

        loop {
            let value = {
                let mut queue = self.queue.lock();
                match queue.pending.pop_front() {
                    Some(value) => value,
                    None => {
                        queue.emitting = false;
                        return;
                    }
                }
            };

            if let Some(latest) = &self.latest {
                *latest.lock() = Some(value.clone());
            }

            for slot in self.snapshot() {
                slot.deliver(value.clone());
            }
        }
    }

    fn snapshot(&self) -> Vec<Arc<ListenerSlot<T>>> {
        use crate::subscription::Detach;

        let mut slots = self.slots.lock();
        slots.retain(|slot| slot.is_attached());
        slots.clone()
    }

    fn listener_count(&self) -> usize {
        self.snapshot().len()
    }
}

/// Subscribing side of a stream
///
/// Streams are hot: values emitted while nobody listens are gone. The
/// exception is a *replaying* stream ([`crate::Relay::stream`],
/// [`EventStream::just`], and anything derived from them), which hands its
/// most recent value to every new listener before live values.
pub struct EventStream<T> {
    pub(crate) core: Arc<StreamCore<T>>,
}

impl<T: StreamValue> EventStream<T> {
    pub(crate) fn from_core(core: Arc<StreamCore<T>>) -> Self {
        Self { core }
    }

    /// A replaying stream that hands `value` to each listener and never emits again
    pub fn just(value: T) -> Self {
        Self::from_core(Arc::new(StreamCore::with_latest(value)))
    }

    /// A stream that never emits
    pub fn empty() -> Self {
        Self::from_core(Arc::new(StreamCore::new(false)))
    }

    /// Attach `listener`, invoked once per emitted value on the emitting thread
    ///
    /// The listener stays attached until the returned [`Subscription`] is
    /// cancelled or dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(T) + Send + 'static,
    {
        let slot = Arc::new(ListenerSlot::new(Box::new(listener)));
        self.core.slots.lock().push(Arc::clone(&slot));

        if let Some(latest) = &self.core.latest {
            let current = latest.lock().clone();
            if let Some(value) = current {
                slot.deliver(value);
            }
        }

        let source: Arc<dyn Any + Send + Sync> = Arc::clone(&self.core) as Arc<dyn Any + Send + Sync>;
        Subscription::new(&slot, source)
    }

    /// Whether new listeners receive the most recent value on subscribe
    pub fn is_replaying(&self) -> bool {
        self.core.replays()
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.core.listener_count()
    }
}

impl<T> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: StreamValue> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("listeners", &self.listener_count())
            .field("replaying", &self.is_replaying())
            .finish()
    }
}

/// Emitting side of a stream
///
/// Fire-and-forget: `emit` pushes to every current listener and returns.
/// There is no buffering and no backpressure.
pub struct Publisher<T> {
    core: Arc<StreamCore<T>>,
}

impl<T: StreamValue> Publisher<T> {
    /// Create a publisher with no listeners
    pub fn new() -> Self {
        Self {
            core: Arc::new(StreamCore::new(false)),
        }
    }

    /// Deliver `value` to every listener
    pub fn emit(&self, value: T) {
        self.core.emit(value);
    }

    /// The stream listeners subscribe to
    pub fn stream(&self) -> EventStream<T> {
        EventStream::from_core(Arc::clone(&self.core))
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.core.listener_count()
    }
}

impl<T: StreamValue> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: StreamValue> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn collect<T: StreamValue>(stream: &EventStream<T>) -> (Arc<Mutex<Vec<T>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = stream.subscribe(move |value| sink.lock().push(value));
        (seen, subscription)
    }

    #[test]
    fn test_publisher_delivers_in_order() {
        let publisher = Publisher::new();
        let (seen, _sub) = collect(&publisher.stream());

        publisher.emit(1);
        publisher.emit(2);
        publisher.emit(3);

        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_multiple_listeners_each_get_one_call() {
        let publisher = Publisher::new();
        let (first, _a) = collect(&publisher.stream());
        let (second, _b) = collect(&publisher.stream());

        publisher.emit("tap");

        assert_eq!(*first.lock(), vec!["tap"]);
        assert_eq!(*second.lock(), vec!["tap"]);
        assert_eq!(publisher.listener_count(), 2);
    }

    #[test]
    fn test_no_delivery_after_cancel() {
        let publisher = Publisher::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscription = publisher.stream().subscribe(move |_: u8| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        publisher.emit(0);
        subscription.cancel();
        for value in 0..25 {
            publisher.emit(value);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.listener_count(), 0);
    }

    #[test]
    fn test_dropped_handle_detaches_from_publisher() {
        let publisher = Publisher::new();
        let (seen, subscription) = collect(&publisher.stream());

        publisher.emit(1);
        drop(subscription);
        publisher.emit(2);

        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(publisher.listener_count(), 0);
    }

    #[test]
    fn test_cancel_from_inside_listener() {
        let publisher = Publisher::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let holder: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let counter = Arc::clone(&calls);
        let own = Arc::clone(&holder);
        let subscription = publisher.stream().subscribe(move |_: u8| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(subscription) = own.lock().as_ref() {
                subscription.cancel();
            }
        });
        *holder.lock() = Some(subscription);

        publisher.emit(1);
        publisher.emit(2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reentrant_emit_is_queued() {
        let publisher: Publisher<u32> = Publisher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let feedback = publisher.clone();
        let sink = Arc::clone(&seen);
        let _sub = publisher.stream().subscribe(move |value| {
            sink.lock().push(value);
            if value < 3 {
                feedback.emit(value + 1);
            }
        });

        publisher.emit(0);
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_just_replays_to_every_listener() {
        let stream = EventStream::just(7);
        let (first, _a) = collect(&stream);
        let (second, _b) = collect(&stream);

        assert_eq!(*first.lock(), vec![7]);
        assert_eq!(*second.lock(), vec![7]);
        assert!(stream.is_replaying());
    }

    #[test]
    fn test_empty_never_emits() {
        let stream: EventStream<u8> = EventStream::empty();
        let (seen, _sub) = collect(&stream);
        assert!(seen.lock().is_empty());
        assert!(!stream.is_replaying());
    }

    #[test]
    fn test_concurrent_emitters_are_serialized() {
        let publisher: Publisher<usize> = Publisher::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let _sub = publisher.stream().subscribe(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let publisher = publisher.clone();
                std::thread::spawn(move || {
                    for value in 0..100 {
                        publisher.emit(value);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(seen.load(Ordering::SeqCst), 400);
    }
}
