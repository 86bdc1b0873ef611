//! Push-based Event Streams
//!
//! A small, synchronous stream engine for adapting callback-style sources
//! into cancellable, composable streams.
//!
//! # Features
//!
//! - **Cancellable Subscriptions**: idempotent cancel, weak listener references
//! - **Fire-and-forget Delivery**: no buffering, no backpressure
//! - **Re-entrancy Safe**: feedback loops are trampolined, never re-entered
//! - **Combinators**: `map`, `filter`, `filter_map`, `distinct`, `scan`,
//!   `merge`, `combine_latest`, `flat_map_latest`
//! - **Relays**: current value + update stream
//! - **Delivery Context**: one serialization point for cross-thread sources
//!
//! # Quick Start
//!
//! ```rust
//! use event_stream::Publisher;
//! use std::sync::{Arc, Mutex};
//!
//! let taps = Publisher::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&seen);
//! let subscription = taps
//!     .stream()
//!     .scan(0u32, |count, _: ()| count + 1)
//!     .subscribe(move |count| sink.lock().unwrap().push(count));
//!
//! taps.emit(());
//! taps.emit(());
//! subscription.cancel();
//! taps.emit(());
//!
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
//! ```
//!
//! # Architecture
//!
//! ```text
//! callback source ──dispatch──▶ DeliveryContext ──▶ Publisher<T>
//!                                                     │
//!                                        EventStream<T> (map/filter/merge/...)
//!                                                     │
//!                                                  listener ◀── Subscription (weak)
//! ```

// Modules
pub mod context;
pub mod operators;
pub mod relay;
pub mod stream;
pub mod subscription;

// Re-exports - Public API
pub use context::{DeliveryContext, DispatchError, Job};
pub use relay::Relay;
pub use stream::{EventStream, Publisher, StreamValue};
pub use subscription::{SerialSubscription, Subscription, SubscriptionBag, SubscriptionId};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::context::DeliveryContext;
    pub use crate::relay::Relay;
    pub use crate::stream::{EventStream, Publisher, StreamValue};
    pub use crate::subscription::{Subscription, SubscriptionBag};
}
