//! Stream combinators
//!
//! Every operator subscribes to its upstream immediately and returns a new
//! hot stream. The derived stream keeps its upstream alive and cancels its
//! upstream subscriptions when the last handle to it is dropped. Listener
//! closures only hold weak references to the derived stream, so no cycles
//! are created between stages.
//!
//! A derived stream replays (hands its latest value to new listeners) when
//! at least one of its upstreams replays.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::stream::{EventStream, StreamCore, StreamValue};
use crate::subscription::SerialSubscription;

fn forward<U: StreamValue>(target: &Weak<StreamCore<U>>, value: U) {
    if let Some(core) = target.upgrade() {
        core.emit(value);
    }
}

impl<T: StreamValue> EventStream<T> {
    /// Build a derived stream fed by a single listener on `self`
    fn derive<U, F>(&self, make_listener: impl FnOnce(Weak<StreamCore<U>>) -> F) -> EventStream<U>
    where
        U: StreamValue,
        F: FnMut(T) + Send + 'static,
    {
        let core = Arc::new(StreamCore::new(self.is_replaying()));
        let listener = make_listener(Arc::downgrade(&core));
        let subscription = self.subscribe(listener);
        core.add_upstream(subscription);
        EventStream::from_core(core)
    }

    /// Transform every value
    pub fn map<U, F>(&self, mut f: F) -> EventStream<U>
    where
        U: StreamValue,
        F: FnMut(T) -> U + Send + 'static,
    {
        self.derive(move |target| move |value| forward(&target, f(value)))
    }

    /// Keep only values matching `predicate`
    pub fn filter<F>(&self, mut predicate: F) -> EventStream<T>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        self.derive(move |target| {
            move |value| {
                if predicate(&value) {
                    forward(&target, value);
                }
            }
        })
    }

    /// Transform and filter in one step
    pub fn filter_map<U, F>(&self, mut f: F) -> EventStream<U>
    where
        U: StreamValue,
        F: FnMut(T) -> Option<U> + Send + 'static,
    {
        self.derive(move |target| {
            move |value| {
                if let Some(mapped) = f(value) {
                    forward(&target, mapped);
                }
            }
        })
    }

    /// Suppress values equal to the previously forwarded one
    ///
    /// The first value always passes.
    pub fn distinct(&self) -> EventStream<T>
    where
        T: PartialEq,
    {
        self.derive(move |target| {
            let mut last: Option<T> = None;
            move |value| {
                if last.as_ref() == Some(&value) {
                    return;
                }
                last = Some(value.clone());
                forward(&target, value);
            }
        })
    }

    /// Fold values into an accumulator, emitting each new accumulator
    pub fn scan<A, F>(&self, seed: A, mut step: F) -> EventStream<A>
    where
        A: StreamValue,
        F: FnMut(&A, T) -> A + Send + 'static,
    {
        self.derive(move |target| {
            let mut accumulator = seed;
            move |value| {
                accumulator = step(&accumulator, value);
                forward(&target, accumulator.clone());
            }
        })
    }

    /// Switch to the stream produced by `f` for the latest value
    ///
    /// Each new value cancels the subscription to the previous inner stream
    /// before subscribing to the next one. When replaying, only values of
    /// the current inner stream are replayed.
    pub fn flat_map_latest<U, F>(&self, mut f: F) -> EventStream<U>
    where
        U: StreamValue,
        F: FnMut(T) -> EventStream<U> + Send + 'static,
    {
        let core = Arc::new(StreamCore::new(self.is_replaying()));
        let inner = Arc::new(SerialSubscription::new());
        core.retain(Arc::clone(&inner) as Arc<dyn std::any::Any + Send + Sync>);

        let target = Arc::downgrade(&core);
        let current = Arc::downgrade(&inner);
        let subscription = self.subscribe(move |value| {
            let Some(inner) = current.upgrade() else {
                return;
            };
            inner.cancel();
            if let Some(core) = target.upgrade() {
                core.clear_latest();
            }

            let next = f(value);
            let forward_to = target.clone();
            inner.replace(next.subscribe(move |value| forward(&forward_to, value)));
        });

        core.add_upstream(subscription);
        EventStream::from_core(core)
    }

    /// Forward values from every stream in arrival order
    ///
    /// Replays when any source replays. The replayed value is the last one
    /// forwarded, whichever source it came from.
    pub fn merge<I>(sources: I) -> EventStream<T>
    where
        I: IntoIterator<Item = EventStream<T>>,
    {
        let sources: Vec<EventStream<T>> = sources.into_iter().collect();
        let replays = sources.iter().any(EventStream::is_replaying);
        let core = Arc::new(StreamCore::new(replays));

        for source in &sources {
            let target = Arc::downgrade(&core);
            core.add_upstream(source.subscribe(move |value| forward(&target, value)));
        }

        EventStream::from_core(core)
    }

    /// Pair the latest values of `self` and `other`
    ///
    /// Emits whenever either side emits, once both have emitted at least once.
    pub fn combine_latest<B>(&self, other: &EventStream<B>) -> EventStream<(T, B)>
    where
        B: StreamValue,
    {
        let replays = self.is_replaying() || other.is_replaying();
        let core = Arc::new(StreamCore::new(replays));
        let latest: Arc<Mutex<(Option<T>, Option<B>)>> = Arc::new(Mutex::new((None, None)));

        let target = Arc::downgrade(&core);
        let state = Arc::clone(&latest);
        core.add_upstream(self.subscribe(move |a: T| {
            let pair = {
                let mut state = state.lock();
                state.0 = Some(a);
                match &*state {
                    (Some(a), Some(b)) => Some((a.clone(), b.clone())),
                    _ => None,
                }
            };
            if let Some(pair) = pair {
                forward(&target, pair);
            }
        }));

        let target = Arc::downgrade(&core);
        let state = Arc::clone(&latest);
        core.add_upstream(other.subscribe(move |b: B| {
            let pair = {
                let mut state = state.lock();
                state.1 = Some(b);
                match &*state {
                    (Some(a), Some(b)) => Some((a.clone(), b.clone())),
                    _ => None,
                }
            };
            if let Some(pair) = pair {
                forward(&target, pair);
            }
        }));

        EventStream::from_core(core)
    }
}
