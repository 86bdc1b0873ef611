//! Relay - a current value plus the stream of its updates
//!
//! A `Relay<T>` always holds a value. It can be read instantly with
//! [`Relay::get`] or observed through two streams:
//!
//! - [`Relay::stream`]: replays the current value to each new listener, then
//!   forwards every update
//! - [`Relay::changes`]: only updates made after subscribing
//!
//! `set` always emits, even when the value is unchanged. Put a
//! [`EventStream::distinct`] upstream when duplicates must be suppressed.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::stream::{EventStream, Publisher, StreamCore, StreamValue};

pub struct Relay<T> {
    value: Arc<Mutex<T>>,
    replaying: Arc<StreamCore<T>>,
    changes: Publisher<T>,
}

impl<T: StreamValue> Relay<T> {
    /// Create a relay holding `initial`
    pub fn new(initial: T) -> Self {
        Self {
            value: Arc::new(Mutex::new(initial.clone())),
            replaying: Arc::new(StreamCore::with_latest(initial)),
            changes: Publisher::new(),
        }
    }

    /// Current value
    pub fn get(&self) -> T {
        self.value.lock().clone()
    }

    /// Store `value` and push it to every listener
    pub fn set(&self, value: T) {
        *self.value.lock() = value.clone();
        self.replaying.emit(value.clone());
        self.changes.emit(value);
    }

    /// Stream that starts with the current value
    pub fn stream(&self) -> EventStream<T> {
        EventStream::from_core(Arc::clone(&self.replaying))
    }

    /// Stream of updates made after subscribing
    pub fn changes(&self) -> EventStream<T> {
        self.changes.stream()
    }
}

impl<T> Clone for Relay<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            replaying: Arc::clone(&self.replaying),
            changes: self.changes.clone(),
        }
    }
}

impl<T: StreamValue + fmt::Debug> fmt::Debug for Relay<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay").field("value", &self.get()).finish()
    }
}
