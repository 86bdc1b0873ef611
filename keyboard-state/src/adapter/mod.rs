//! Event adapters
//!
//! Each adapter registers one target with a callback-driven primitive and
//! republishes every callback as a value on an [`event_stream::EventStream`].
//! Callbacks may arrive on any thread; adapters always hand the value to the
//! [`event_stream::DeliveryContext`] before emitting, so listeners only ever
//! run on the context.
//!
//! Dropping an adapter removes its target from the primitive. Values already
//! queued on the context are still emitted, to whoever is still subscribed.

mod control;
mod gesture;
mod notification;

pub use control::ControlAdapter;
pub use gesture::GestureAdapter;
pub use notification::NotificationAdapter;

use event_stream::{DeliveryContext, Publisher, StreamValue};
use tracing::debug;

/// Emit `value` on `publisher` from the delivery context
fn deliver<T: StreamValue>(context: &DeliveryContext, publisher: &Publisher<T>, value: T) {
    let publisher = publisher.clone();
    if let Err(e) = context.dispatch(move || publisher.emit(value)) {
        debug!(error = %e, "dropping event, delivery context is closed");
    }
}
