//! Keyboard Geometry Tracking
//!
//! Follows the on-screen keyboard by reconciling layout notifications with
//! live interactive-dismiss drags, and publishes the result as a single
//! deduplicated frame plus three derived values.
//!
//! # Features
//!
//! - **One Authoritative Frame**: notifications and drag candidates merged in
//!   arrival order, deduplicated
//! - **Derived Values**: visible height, hidden flag, hidden-to-visible edges
//! - **Interactive Dismiss**: a pan recognizer on the root surface, gated to
//!   touches inside interactive-dismiss scroll surfaces
//! - **Event Adapters**: gestures, controls and notifications as streams
//! - **Single Delivery Context**: off-thread notifications are re-marshalled
//!   before they touch any state
//! - **Async Bridges**: follow any value through a `tokio::sync::watch` channel
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use keyboard_state::prelude::*;
//!
//! let screen = Arc::new(Screen::new(400.0, 800.0));
//! let views = Arc::new(ViewTree::new());
//! views.set_root(Rect::new(0.0, 0.0, 400.0, 800.0));
//!
//! let center = Arc::new(NotificationCenter::new());
//! let env = KeyboardEnvironment::new(DeliveryContext::new(), center.clone(), screen, views);
//! let tracker = KeyboardTracker::new(env, TrackerConfig::default()).unwrap();
//! assert!(tracker.is_hidden());
//!
//! center.post(KeyboardNotification::will_change_frame(Rect::new(0.0, 500.0, 400.0, 300.0)).into_notification());
//!
//! assert_eq!(tracker.visible_height(), 300.0);
//! assert_eq!(tracker.will_show_visible_height(), 300.0);
//! assert!(!tracker.is_hidden());
//! ```
//!
//! # Architecture
//!
//! ```text
//! NotificationCenter ──▶ NotificationAdapter ──┐
//!                                              ├─▶ DeliveryContext ─▶ KeyboardTracker
//! GestureRecognizer ───▶ GestureAdapter ───────┘                         │
//!        ▲                                                         Relay<Rect>, Relay<f64>,
//!        └── InteractiveDismissGate (ViewHierarchy)                Relay<f64>, Relay<bool>
//! ```

// Modules
pub mod adapter;
pub mod config;
pub mod control;
pub mod error;
pub mod gate;
pub mod geometry;
pub mod gesture;
pub mod keyboard;
pub mod logging;
pub mod notification;
pub mod screen;
pub mod target;
pub mod tracker;
pub mod view;
pub mod watcher;

// Re-exports - Public API
pub use adapter::{ControlAdapter, GestureAdapter, NotificationAdapter};
pub use config::TrackerConfig;
pub use control::{Control, ControlEvent};
pub use error::{KeyboardError, Result};
pub use gate::InteractiveDismissGate;
pub use geometry::{Point, Rect, Size};
pub use gesture::{
    GestureDelegate, GestureEvent, GestureKind, GestureRecognizer, GestureRegistry, RecognizerId,
    RecognizerState,
};
pub use keyboard::{KeyboardNotification, KeyboardNotificationKind, FRAME_END_KEY};
pub use logging::{init_logging, init_logging_from_env, init_silent, LoggingError, LoggingMode};
pub use notification::{
    Notification, NotificationCenter, NotificationName, ObserverToken, APPLICATION_DID_FINISH_LAUNCHING,
    KEYBOARD_WILL_CHANGE_FRAME, KEYBOARD_WILL_HIDE,
};
pub use screen::{Screen, ScreenMetrics};
pub use target::TargetId;
pub use tracker::{KeyboardEnvironment, KeyboardSnapshot, KeyboardTracker};
pub use view::{KeyboardDismissMode, ViewHierarchy, ViewId, ViewTree};

// Stream engine types that appear in this crate's API
pub use event_stream::{DeliveryContext, EventStream, Relay, Subscription, SubscriptionBag};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::TrackerConfig;
    pub use crate::error::KeyboardError;
    pub use crate::geometry::{Point, Rect};
    pub use crate::keyboard::KeyboardNotification;
    pub use crate::notification::NotificationCenter;
    pub use crate::screen::Screen;
    pub use crate::tracker::{KeyboardEnvironment, KeyboardTracker};
    pub use crate::view::{KeyboardDismissMode, ViewTree};
    pub use event_stream::{DeliveryContext, EventStream, Subscription};
}
