//! Keyboard geometry tracker
//!
//! Reconciles two asynchronous sources of keyboard geometry into one
//! authoritative frame:
//!
//! - layout notifications (`will change frame`, `will hide`), sanitized
//! - live drag candidates from a pan recognizer on the root surface, while
//!   the user interactively drags the keyboard down
//!
//! ```text
//! will_change ──map(settle)──────┐
//! will_hide ────map(settle)──────┼─ merge ─ distinct ─▶ frame ─┬─▶ visible_height ─┬─▶ is_hidden (distinct)
//! pan ─ combine_latest(frame) ───┘                       ▲     │                   └─▶ will_show (edges)
//!        └ flat_map_latest(candidate | nothing)          └─────┘
//! ```
//!
//! Everything runs on the environment's [`DeliveryContext`]. The four
//! published values are relays, so each one can be read instantly or
//! observed as a stream, and all of them agree with the current frame
//! whenever no job is running.

use std::fmt;
use std::sync::Arc;

use event_stream::{DeliveryContext, EventStream, Publisher, Relay, SubscriptionBag};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::adapter::{GestureAdapter, NotificationAdapter};
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::gate::InteractiveDismissGate;
use crate::geometry::Rect;
use crate::gesture::{GestureEvent, GestureKind, GestureRecognizer, GestureRegistry, RecognizerId, RecognizerState};
use crate::keyboard::KeyboardNotification;
use crate::notification::{
    Notification, NotificationCenter, APPLICATION_DID_FINISH_LAUNCHING, KEYBOARD_WILL_CHANGE_FRAME,
    KEYBOARD_WILL_HIDE,
};
use crate::screen::ScreenMetrics;
use crate::view::{ViewHierarchy, ViewId};
use crate::watcher::RelayWatch;

/// Host primitives a tracker is wired to
#[derive(Clone)]
pub struct KeyboardEnvironment {
    pub context: DeliveryContext,
    pub notifications: Arc<NotificationCenter>,
    pub screen: Arc<dyn ScreenMetrics>,
    pub hierarchy: Arc<dyn ViewHierarchy>,
    pub gestures: Arc<GestureRegistry>,
}

impl KeyboardEnvironment {
    /// Environment with a fresh gesture registry
    pub fn new(
        context: DeliveryContext,
        notifications: Arc<NotificationCenter>,
        screen: Arc<dyn ScreenMetrics>,
        hierarchy: Arc<dyn ViewHierarchy>,
    ) -> Self {
        Self {
            context,
            notifications,
            screen,
            hierarchy,
            gestures: Arc::new(GestureRegistry::new()),
        }
    }

    /// Share an existing gesture registry with other components
    pub fn with_gestures(mut self, gestures: Arc<GestureRegistry>) -> Self {
        self.gestures = gestures;
        self
    }
}

impl fmt::Debug for KeyboardEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyboardEnvironment")
            .field("context", &self.context)
            .field("screen", &self.screen.bounds())
            .field("root", &self.hierarchy.root())
            .finish_non_exhaustive()
    }
}

/// Consistent copy of the four published values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyboardSnapshot {
    pub frame: Rect,
    pub visible_height: f64,
    pub will_show_visible_height: f64,
    pub is_hidden: bool,
}

/// Keyboard parked just below the screen with zero height
pub fn default_frame(screen: Rect) -> Rect {
    Rect::new(screen.min_x(), screen.max_y(), screen.width, 0.0)
}

/// Frame to adopt for a `will change frame` notification
///
/// A negative origin is re-anchored so the frame's bottom sits on the
/// screen's bottom edge.
pub fn settle_changing_frame(proposed: Option<Rect>, screen: Rect, config: &TrackerConfig) -> Rect {
    match proposed {
        None => default_frame(screen),
        Some(frame) if config.correct_negative_origin && frame.y < 0.0 => {
            let corrected = frame.with_y(screen.max_y() - frame.height);
            debug!(?frame, ?corrected, "corrected negative keyboard origin");
            corrected
        }
        Some(frame) => frame,
    }
}

/// Frame to adopt for a `will hide` notification
///
/// A negative origin is moved fully off-screen.
pub fn settle_hiding_frame(proposed: Option<Rect>, screen: Rect, config: &TrackerConfig) -> Rect {
    match proposed {
        None => default_frame(screen),
        Some(frame) if config.correct_negative_origin && frame.y < 0.0 => {
            let corrected = frame.with_y(screen.max_y());
            debug!(?frame, ?corrected, "corrected negative keyboard origin while hiding");
            corrected
        }
        Some(frame) => frame,
    }
}

/// Frame proposed by a drag tick, if any
///
/// Only a `Changed` drag over a keyboard that is still on screen yields a
/// candidate. The keyboard follows the touch downwards but never rises above
/// its fully shown position.
pub fn drag_candidate(event: &GestureEvent, frame: Rect, screen: Rect) -> Option<Rect> {
    if event.state != RecognizerState::Changed || frame.y >= screen.max_y() {
        return None;
    }

    let resting = screen.max_y() - frame.height;
    Some(frame.with_y(event.location.y.max(resting)))
}

/// Height of the part of `frame` that is on screen
pub fn visible_height_of(frame: Rect, screen: Rect) -> f64 {
    screen.intersection(&frame).map_or(0.0, |visible| visible.height)
}

/// Accumulator of the show-edge detector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct VisibilityState {
    visible_height: f64,
    is_showing: bool,
}

/// Heights at the instants the keyboard goes from hidden to visible
///
/// Heights at or below `epsilon` count as hidden.
pub fn show_edges(heights: &EventStream<f64>, epsilon: f64) -> EventStream<f64> {
    heights
        .scan(VisibilityState::default(), move |last, height| VisibilityState {
            visible_height: height,
            is_showing: last.visible_height <= epsilon && height > epsilon,
        })
        .filter(|state| state.is_showing)
        .map(|state| state.visible_height)
}

/// Hidden flag for each height, without repeats
pub fn hidden_flags(heights: &EventStream<f64>, epsilon: f64) -> EventStream<bool> {
    heights.map(move |height| height <= epsilon).distinct()
}

fn proposed_frame(notification: &Notification) -> Option<Rect> {
    KeyboardNotification::decode(notification).and_then(|decoded| decoded.proposed_frame)
}

/// Owns the root pan recognizer once the root surface exists
struct DragAttachment {
    env: KeyboardEnvironment,
    hysteresis: f64,
    feed: Publisher<EventStream<GestureEvent>>,
    adapter: Mutex<Option<GestureAdapter>>,
}

impl DragAttachment {
    /// Attach to the root surface unless already attached
    ///
    /// `Ok(false)` means there is no root yet.
    fn try_attach(&self) -> Result<bool> {
        let mut slot = self.adapter.lock();
        if slot.is_some() {
            return Ok(true);
        }

        let Some(root) = self.env.hierarchy.root() else {
            debug!("no root surface yet, deferring drag tracking");
            return Ok(false);
        };

        let adapter = GestureAdapter::attach(&self.env.gestures, root, GestureKind::Pan, &self.env.context)?;
        let recognizer = adapter.recognizer();
        recognizer.set_hysteresis(self.hysteresis);
        recognizer.set_delegate(Arc::new(InteractiveDismissGate::new(Arc::clone(&self.env.hierarchy))));
        info!(%root, recognizer = %recognizer.id(), "tracking interactive keyboard dismissal");

        let events = adapter.events();
        *slot = Some(adapter);
        drop(slot);

        self.feed.emit(events);
        Ok(true)
    }

    fn recognizer(&self) -> Option<Arc<GestureRecognizer>> {
        self.adapter.lock().as_ref().map(|adapter| Arc::clone(adapter.recognizer()))
    }
}

/// Tracks the on-screen keyboard
///
/// Build it on the thread that owns the environment's delivery context.
/// Dropping the tracker cancels every internal subscription and detaches
/// its pan recognizer.
pub struct KeyboardTracker {
    env: KeyboardEnvironment,
    config: TrackerConfig,
    frame: Relay<Rect>,
    visible_height: Relay<f64>,
    will_show_visible_height: Relay<f64>,
    is_hidden: Relay<bool>,
    frame_watch: RelayWatch<Rect>,
    visible_height_watch: RelayWatch<f64>,
    will_show_visible_height_watch: RelayWatch<f64>,
    is_hidden_watch: RelayWatch<bool>,
    subscriptions: SubscriptionBag,
    drag: Arc<DragAttachment>,
    _notifications: Vec<NotificationAdapter>,
}

impl KeyboardTracker {
    /// Wire a tracker with the default configuration
    pub fn with_defaults(env: KeyboardEnvironment) -> Result<Self> {
        Self::new(env, TrackerConfig::default())
    }

    /// Wire a tracker to `env`
    ///
    /// Fails on an invalid configuration, or when the root surface already
    /// carries a pan recognizer owned by someone else.
    pub fn new(env: KeyboardEnvironment, config: TrackerConfig) -> Result<Self> {
        config.validate()?;

        let frame = Relay::new(default_frame(env.screen.bounds()));
        let visible_height = Relay::new(0.0);
        let will_show_visible_height = Relay::new(0.0);
        let is_hidden = Relay::new(true);
        let subscriptions = SubscriptionBag::new();

        let will_change = NotificationAdapter::observe(&env.notifications, KEYBOARD_WILL_CHANGE_FRAME, &env.context);
        let will_hide = NotificationAdapter::observe(&env.notifications, KEYBOARD_WILL_HIDE, &env.context);

        let changing = {
            let screen = Arc::clone(&env.screen);
            let config = config.clone();
            will_change
                .events()
                .map(move |n| settle_changing_frame(proposed_frame(&n), screen.bounds(), &config))
        };

        let hiding = {
            let screen = Arc::clone(&env.screen);
            let config = config.clone();
            will_hide
                .events()
                .map(move |n| settle_hiding_frame(proposed_frame(&n), screen.bounds(), &config))
        };

        let drag = Arc::new(DragAttachment {
            env: env.clone(),
            hysteresis: config.pan_hysteresis,
            feed: Publisher::new(),
            adapter: Mutex::new(None),
        });

        let candidates = {
            let screen = Arc::clone(&env.screen);
            drag.feed
                .stream()
                .flat_map_latest(|events: EventStream<GestureEvent>| events)
                .combine_latest(&frame.stream())
                .flat_map_latest(move |(event, current)| {
                    match drag_candidate(&event, current, screen.bounds()) {
                        Some(candidate) => EventStream::just(candidate),
                        None => EventStream::empty(),
                    }
                })
        };

        let relay = frame.clone();
        subscriptions.add(
            EventStream::merge([candidates, changing, hiding])
                .distinct()
                .subscribe(move |next| {
                    trace!(frame = ?next, "authoritative keyboard frame");
                    relay.set(next);
                }),
        );

        let screen = Arc::clone(&env.screen);
        let relay = visible_height.clone();
        subscriptions.add(
            frame
                .stream()
                .map(move |current| visible_height_of(current, screen.bounds()))
                .subscribe(move |height| relay.set(height)),
        );

        let relay = is_hidden.clone();
        subscriptions.add(
            hidden_flags(&visible_height.stream(), config.hidden_epsilon).subscribe(move |hidden| relay.set(hidden)),
        );

        let relay = will_show_visible_height.clone();
        subscriptions.add(
            show_edges(&visible_height.stream(), config.hidden_epsilon).subscribe(move |height| relay.set(height)),
        );

        let mut notifications = vec![will_change, will_hide];
        if config.interactive_dismiss {
            if !drag.try_attach()? {
                let launched =
                    NotificationAdapter::observe(&env.notifications, APPLICATION_DID_FINISH_LAUNCHING, &env.context);
                let pending = Arc::downgrade(&drag);
                subscriptions.add(launched.events().subscribe(move |_| {
                    let Some(drag) = pending.upgrade() else {
                        return;
                    };
                    if let Err(e) = drag.try_attach() {
                        warn!(error = %e, "could not attach drag recognizer to the root surface");
                    }
                }));
                notifications.push(launched);
            }
        } else {
            debug!("interactive dismissal disabled");
        }

        let frame_watch = RelayWatch::new(&frame, &subscriptions);
        let visible_height_watch = RelayWatch::new(&visible_height, &subscriptions);
        let will_show_visible_height_watch = RelayWatch::new(&will_show_visible_height, &subscriptions);
        let is_hidden_watch = RelayWatch::new(&is_hidden, &subscriptions);

        info!(context = %env.context.name(), "keyboard tracker started");

        Ok(Self {
            env,
            config,
            frame,
            visible_height,
            will_show_visible_height,
            is_hidden,
            frame_watch,
            visible_height_watch,
            will_show_visible_height_watch,
            is_hidden_watch,
            subscriptions,
            drag,
            _notifications: notifications,
        })
    }

    /// Current authoritative frame
    pub fn frame(&self) -> Rect {
        self.frame.get()
    }

    pub fn visible_height(&self) -> f64 {
        self.visible_height.get()
    }

    /// Height reported at the last hidden-to-visible transition
    pub fn will_show_visible_height(&self) -> f64 {
        self.will_show_visible_height.get()
    }

    pub fn is_hidden(&self) -> bool {
        self.is_hidden.get()
    }

    /// All four values at once
    ///
    /// Consistent when read on the delivery context.
    pub fn state(&self) -> KeyboardSnapshot {
        KeyboardSnapshot {
            frame: self.frame(),
            visible_height: self.visible_height(),
            will_show_visible_height: self.will_show_visible_height(),
            is_hidden: self.is_hidden(),
        }
    }

    /// Current frame, then every change
    pub fn frame_stream(&self) -> EventStream<Rect> {
        self.frame.stream()
    }

    /// Current visible height, then one value per frame change
    pub fn visible_height_stream(&self) -> EventStream<f64> {
        self.visible_height.stream()
    }

    /// Current hidden flag, then every flip
    pub fn is_hidden_stream(&self) -> EventStream<bool> {
        self.is_hidden.stream()
    }

    /// Future hidden-to-visible transitions only
    pub fn will_show_visible_height_stream(&self) -> EventStream<f64> {
        self.will_show_visible_height.changes()
    }

    /// Receiver following the frame; all receivers share one channel
    pub fn watch_frame(&self) -> watch::Receiver<Rect> {
        self.frame_watch.subscribe()
    }

    pub fn watch_visible_height(&self) -> watch::Receiver<f64> {
        self.visible_height_watch.subscribe()
    }

    pub fn watch_will_show_visible_height(&self) -> watch::Receiver<f64> {
        self.will_show_visible_height_watch.subscribe()
    }

    pub fn watch_is_hidden(&self) -> watch::Receiver<bool> {
        self.is_hidden_watch.subscribe()
    }

    /// The pan recognizer on the root surface, once attached
    ///
    /// Hosts feed it touches and read its state. The tracker stays its only
    /// owner, so its targets, delegate and registration cannot be changed
    /// through this handle.
    pub fn pan_recognizer(&self) -> Option<Arc<GestureRecognizer>> {
        self.drag.recognizer()
    }

    pub fn pan_recognizer_id(&self) -> Option<RecognizerId> {
        self.pan_recognizer().map(|recognizer| recognizer.id())
    }

    /// Root surface of the host hierarchy
    pub fn root(&self) -> Option<ViewId> {
        self.env.hierarchy.root()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn context(&self) -> &DeliveryContext {
        &self.env.context
    }
}

impl Drop for KeyboardTracker {
    fn drop(&mut self) {
        self.subscriptions.cancel_all();
        info!("keyboard tracker released");
    }
}

impl fmt::Debug for KeyboardTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyboardTracker")
            .field("state", &self.state())
            .field("pan_recognizer", &self.pan_recognizer_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    const SCREEN: Rect = Rect::new(0.0, 0.0, 400.0, 800.0);

    fn collect<T: event_stream::StreamValue>(stream: &EventStream<T>) -> (Arc<Mutex<Vec<T>>>, event_stream::Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = stream.subscribe(move |v| sink.lock().push(v));
        (seen, sub)
    }

    fn pan(state: RecognizerState, y: f64) -> GestureEvent {
        GestureEvent {
            recognizer: RecognizerId::next(),
            kind: GestureKind::Pan,
            state,
            location: Point::new(200.0, y),
        }
    }

    #[test]
    fn test_default_frame_sits_below_screen() {
        assert_eq!(default_frame(SCREEN), Rect::new(0.0, 800.0, 400.0, 0.0));
        assert_eq!(visible_height_of(default_frame(SCREEN), SCREEN), 0.0);
    }

    #[test]
    fn test_negative_origin_correction() {
        let config = TrackerConfig::default();
        let proposed = Some(Rect::new(0.0, -10.0, 400.0, 300.0));

        assert_eq!(settle_changing_frame(proposed, SCREEN, &config).y, 500.0);
        assert_eq!(settle_hiding_frame(proposed, SCREEN, &config).y, 800.0);

        let strict = TrackerConfig::strict();
        assert_eq!(settle_changing_frame(proposed, SCREEN, &strict).y, -10.0);
    }

    #[test]
    fn test_missing_payload_settles_to_default() {
        let config = TrackerConfig::default();
        assert_eq!(settle_changing_frame(None, SCREEN, &config), default_frame(SCREEN));
        assert_eq!(settle_hiding_frame(None, SCREEN, &config), default_frame(SCREEN));
    }

    #[test]
    fn test_drag_candidate_rules() {
        let shown = Rect::new(0.0, 500.0, 400.0, 300.0);

        assert_eq!(drag_candidate(&pan(RecognizerState::Began, 650.0), shown, SCREEN), None);
        assert_eq!(drag_candidate(&pan(RecognizerState::Ended, 650.0), shown, SCREEN), None);
        assert_eq!(
            drag_candidate(&pan(RecognizerState::Changed, 650.0), shown, SCREEN),
            Some(shown.with_y(650.0))
        );
        // Touch above the keyboard keeps it at its resting position
        assert_eq!(
            drag_candidate(&pan(RecognizerState::Changed, 100.0), shown, SCREEN),
            Some(shown)
        );
        // Already off screen
        let hidden = shown.with_y(800.0);
        assert_eq!(drag_candidate(&pan(RecognizerState::Changed, 650.0), hidden, SCREEN), None);
    }

    #[test]
    fn test_show_edges() {
        let heights = Publisher::new();
        let (seen, _sub) = collect(&show_edges(&heights.stream(), 0.0));

        for h in [0.0, 0.0, 40.0, 40.0, 0.0, 55.0] {
            heights.emit(h);
        }

        assert_eq!(*seen.lock(), vec![40.0, 55.0]);
    }

    #[test]
    fn test_hidden_flags() {
        let heights = Publisher::new();
        let (seen, _sub) = collect(&hidden_flags(&heights.stream(), 0.0));

        for h in [0.0, 0.0, 12.0, 12.0, 0.0] {
            heights.emit(h);
        }

        assert_eq!(*seen.lock(), vec![true, false, true]);
    }

    fn tracker() -> KeyboardTracker {
        let views = Arc::new(crate::view::ViewTree::new());
        views.set_root(SCREEN);
        let env = KeyboardEnvironment::new(
            DeliveryContext::new(),
            Arc::new(NotificationCenter::new()),
            Arc::new(crate::screen::Screen::new(SCREEN.width, SCREEN.height)),
            views,
        );
        KeyboardTracker::with_defaults(env).unwrap()
    }

    #[test]
    fn test_repeated_watch_calls_reuse_bridges() {
        let tracker = tracker();
        let wired = tracker.subscriptions.len();

        let frames: Vec<_> = (0..16).map(|_| tracker.watch_frame()).collect();
        let flags: Vec<_> = (0..16).map(|_| tracker.watch_is_hidden()).collect();

        assert_eq!(tracker.subscriptions.len(), wired);
        assert_eq!(tracker.frame_watch.receiver_count(), 16);

        drop(frames);
        drop(flags);
        assert_eq!(tracker.frame_watch.receiver_count(), 0);
        assert_eq!(tracker.subscriptions.len(), wired);
    }

    #[test]
    fn test_epsilon_treats_slivers_as_hidden() {
        let heights = Publisher::new();
        let (flags, _a) = collect(&hidden_flags(&heights.stream(), 1.0));
        let (edges, _b) = collect(&show_edges(&heights.stream(), 1.0));

        for h in [0.5, 0.0, 260.0] {
            heights.emit(h);
        }

        assert_eq!(*flags.lock(), vec![true, false]);
        assert_eq!(*edges.lock(), vec![260.0]);
    }
}
