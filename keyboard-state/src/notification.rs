//! In-process notification center
//!
//! Observers register for a notification name and are called once per post.
//! Posts may come from any thread; observers run on the posting thread, so
//! anything touching shared state must re-marshal (see
//! [`crate::adapter::NotificationAdapter`]).

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::trace;

/// Name of a broadcast notification
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationName(Cow<'static, str>);

impl NotificationName {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The keyboard is about to move to a new frame
pub const KEYBOARD_WILL_CHANGE_FRAME: NotificationName =
    NotificationName::from_static("keyboard.will_change_frame");

/// The keyboard is about to hide
pub const KEYBOARD_WILL_HIDE: NotificationName = NotificationName::from_static("keyboard.will_hide");

/// The application finished launching and its root surface exists
pub const APPLICATION_DID_FINISH_LAUNCHING: NotificationName =
    NotificationName::from_static("application.did_finish_launching");

/// A posted notification: name plus free-form payload
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub name: NotificationName,
    pub user_info: Value,
}

impl Notification {
    pub fn new(name: NotificationName, user_info: Value) -> Self {
        Self { name, user_info }
    }

    /// Notification without a payload
    pub fn bare(name: NotificationName) -> Self {
        Self::new(name, Value::Null)
    }
}

static NEXT_OBSERVER: AtomicU64 = AtomicU64::new(1);

/// Handle for removing an observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

type Observer = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Broadcast hub keyed by notification name
#[derive(Default)]
pub struct NotificationCenter {
    observers: DashMap<ObserverToken, (NotificationName, Observer)>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `observer` for every notification named `name`
    pub fn add_observer<F>(&self, name: NotificationName, observer: F) -> ObserverToken
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let token = ObserverToken(NEXT_OBSERVER.fetch_add(1, Ordering::Relaxed));
        self.observers.insert(token, (name, Arc::new(observer)));
        token
    }

    /// Returns false if the token was not registered
    pub fn remove_observer(&self, token: ObserverToken) -> bool {
        self.observers.remove(&token).is_some()
    }

    /// Deliver `notification` to every matching observer on the calling thread
    pub fn post(&self, notification: Notification) {
        // Observers are collected first so none runs while a map shard is locked
        let matching: Vec<Observer> = self
            .observers
            .iter()
            .filter(|entry| entry.value().0 == notification.name)
            .map(|entry| Arc::clone(&entry.value().1))
            .collect();

        trace!(name = %notification.name, observers = matching.len(), "posting notification");

        for observer in matching {
            observer(&notification);
        }
    }

    /// Post `name` with `user_info`
    pub fn post_named(&self, name: NotificationName, user_info: Value) {
        self.post(Notification::new(name, user_info));
    }

    /// Number of observers registered for `name`
    pub fn observer_count(&self, name: &NotificationName) -> usize {
        self.observers
            .iter()
            .filter(|entry| &entry.value().0 == name)
            .count()
    }
}

impl fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("observers", &self.observers.len())
            .finish()
    }
}
