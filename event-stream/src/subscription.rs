//! Cancellable subscriptions
//!
//! A [`Subscription`] represents one listener attached to one stream. It only
//! holds a weak reference to the listener slot owned by the stream, so a
//! cancelled or dropped listener can never be resurrected by the handle.
//!
//! Cancellation is synchronous: once [`Subscription::cancel`] returns, no
//! delivery that starts afterwards will reach the listener. A delivery that
//! was already running on another thread is allowed to finish.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a subscription, mostly useful in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value of the identifier
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Type-erased view of a listener slot, used by [`Subscription`]
pub(crate) trait Detach: Send + Sync {
    fn detach(&self);
    fn is_attached(&self) -> bool;
}

type ListenerFn<T> = Box<dyn FnMut(T) + Send>;

/// Storage for a single listener, owned (strongly) by the stream it listens to
pub(crate) struct ListenerSlot<T> {
    id: SubscriptionId,
    attached: AtomicBool,
    listener: Mutex<Option<ListenerFn<T>>>,
}

impl<T: Send + 'static> ListenerSlot<T> {
    pub(crate) fn new(listener: ListenerFn<T>) -> Self {
        Self {
            id: SubscriptionId::next(),
            attached: AtomicBool::new(true),
            listener: Mutex::new(Some(listener)),
        }
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Invoke the listener with `value` unless the slot was detached
    ///
    /// The attached flag is checked again after the listener lock is taken so
    /// that a cancel which completed while we were waiting wins.
    pub(crate) fn deliver(&self, value: T) {
        if !self.is_attached() {
            return;
        }

        let mut guard = self.listener.lock();
        if !self.is_attached() {
            return;
        }

        if let Some(listener) = guard.as_mut() {
            listener(value);
        }
    }
}

impl<T: Send + 'static> Detach for ListenerSlot<T> {
    fn detach(&self) {
        if self.attached.swap(false, Ordering::AcqRel) {
            // Free captured state right away unless a delivery is in flight
            // (or we are being cancelled from inside our own listener). The
            // owning stream prunes detached slots on its next emission.
            if let Some(mut guard) = self.listener.try_lock() {
                guard.take();
            }
        }
    }

    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}

/// Handle to a listener attached to a stream
///
/// Cancelling is idempotent, and dropping the handle cancels. Hold
/// subscriptions in a [`SubscriptionBag`] to tie their lifetime to an owner.
#[must_use = "dropping a Subscription cancels it"]
pub struct Subscription {
    id: Option<SubscriptionId>,
    slot: Option<Weak<dyn Detach>>,
    cancelled: AtomicBool,
    /// Keeps derived streams alive while someone listens to them
    _source: Option<Arc<dyn Any + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new<T: Send + 'static>(
        slot: &Arc<ListenerSlot<T>>,
        source: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        let weak: Weak<dyn Detach> = Arc::downgrade(slot) as Weak<dyn Detach>;
        Self {
            id: Some(slot.id()),
            slot: Some(weak),
            cancelled: AtomicBool::new(false),
            _source: Some(source),
        }
    }

    /// A subscription that is already cancelled and attached to nothing
    pub fn empty() -> Self {
        Self {
            id: None,
            slot: None,
            cancelled: AtomicBool::new(true),
            _source: None,
        }
    }

    /// Identifier of this subscription (`None` for [`Subscription::empty`])
    pub fn id(&self) -> Option<SubscriptionId> {
        self.id
    }

    /// Stop receiving further events
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(slot) = self.slot.as_ref().and_then(Weak::upgrade) {
            slot.detach();
        }

        if let Some(id) = self.id {
            trace!(subscription = %id, "subscription cancelled");
        }
    }

    /// Whether the listener can still receive events
    ///
    /// Also reports `true` once the source stream itself is gone.
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }

        match self.slot.as_ref().and_then(Weak::upgrade) {
            Some(slot) => !slot.is_attached(),
            None => true,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A collection of subscriptions cancelled together when the bag drops
///
/// Owners that wire several pipelines keep one bag and let its `Drop` tear
/// everything down.
#[derive(Default)]
pub struct SubscriptionBag {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SubscriptionBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a subscription
    pub fn add(&self, subscription: Subscription) {
        let mut subscriptions = self.subscriptions.lock();
        subscriptions.retain(|s| !s.is_cancelled());
        subscriptions.push(subscription);
    }

    /// Number of subscriptions held (including ones cancelled externally)
    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Check if the bag holds nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel and release every subscription in the bag
    pub fn cancel_all(&self) {
        let drained: Vec<Subscription> = std::mem::take(&mut *self.subscriptions.lock());
        for subscription in &drained {
            subscription.cancel();
        }
    }
}

impl Extend<Subscription> for SubscriptionBag {
    fn extend<I: IntoIterator<Item = Subscription>>(&mut self, iter: I) {
        for subscription in iter {
            self.add(subscription);
        }
    }
}

impl Drop for SubscriptionBag {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

impl fmt::Debug for SubscriptionBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionBag")
            .field("len", &self.len())
            .finish()
    }
}

/// Holds at most one subscription, cancelling the previous one on replace
///
/// This is what switching operators use to track their current inner stream.
#[derive(Default)]
pub struct SerialSubscription {
    current: Mutex<Option<Subscription>>,
}

impl SerialSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `subscription`, cancelling whatever was held before
    pub fn replace(&self, subscription: Subscription) {
        let previous = self.current.lock().replace(subscription);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Cancel the current subscription, if any
    pub fn cancel(&self) {
        let previous = self.current.lock().take();
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Whether a live subscription is currently held
    pub fn is_active(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .map(|s| !s.is_cancelled())
            .unwrap_or(false)
    }
}

impl Drop for SerialSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
