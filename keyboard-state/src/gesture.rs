//! Gesture recognizers
//!
//! A [`GestureRecognizer`] turns raw touches fed by the host into recognizer
//! state changes and calls its action targets on every change. Whether it
//! accepts a touch at all is decided by an optional [`GestureDelegate`].
//!
//! Recognizers are attached to views by a [`crate::GestureAdapter`], and the
//! [`GestureRegistry`] allows one per `(view, kind)` pair. Anyone holding a
//! recognizer may feed it touches and read its state. Only the owning adapter
//! changes its targets, delegate or enabled flag, or detaches it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{KeyboardError, Result};
use crate::geometry::Point;
use crate::target::TargetId;
use crate::view::ViewId;

static NEXT_RECOGNIZER: AtomicU64 = AtomicU64::new(1);

/// Identity of a recognizer instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecognizerId(u64);

impl RecognizerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_RECOGNIZER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecognizerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recognizer-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    /// Continuous drag
    Pan,
    /// Discrete tap
    Tap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecognizerState {
    #[default]
    Possible,
    Began,
    Changed,
    Ended,
    Cancelled,
    Failed,
}

impl RecognizerState {
    /// Began or Changed
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Began | Self::Changed)
    }
}

/// One recognizer state change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureEvent {
    pub recognizer: RecognizerId,
    pub kind: GestureKind,
    pub state: RecognizerState,
    /// Touch position in screen coordinates
    pub location: Point,
}

/// Policy consulted by a recognizer before it takes a touch
pub trait GestureDelegate: Send + Sync {
    /// Whether `recognizer` should track a touch starting at `location`
    fn should_begin_receiving_touch(&self, recognizer: RecognizerId, location: Point) -> bool;

    /// Whether `recognizer` may recognize at the same time as `other`
    fn should_run_simultaneously_with(&self, recognizer: RecognizerId, other: RecognizerId) -> bool;
}

type Action = Arc<dyn Fn(GestureEvent) + Send + Sync>;

#[derive(Default)]
struct Tracking {
    state: RecognizerState,
    touching: bool,
    start: Point,
}

/// Touch-driven recognizer attached to a single view
pub struct GestureRecognizer {
    id: RecognizerId,
    kind: GestureKind,
    view: ViewId,
    tracking: Mutex<Tracking>,
    hysteresis: Mutex<f64>,
    enabled: Mutex<bool>,
    delegate: Mutex<Option<Arc<dyn GestureDelegate>>>,
    targets: Mutex<Vec<(TargetId, Action)>>,
}

impl GestureRecognizer {
    /// Default distance a pan travels before it begins
    pub const DEFAULT_HYSTERESIS: f64 = 10.0;

    pub fn new(view: ViewId, kind: GestureKind) -> Self {
        Self {
            id: RecognizerId::next(),
            kind,
            view,
            tracking: Mutex::new(Tracking::default()),
            hysteresis: Mutex::new(Self::DEFAULT_HYSTERESIS),
            enabled: Mutex::new(true),
            delegate: Mutex::new(None),
            targets: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> RecognizerId {
        self.id
    }

    pub fn kind(&self) -> GestureKind {
        self.kind
    }

    pub fn view(&self) -> ViewId {
        self.view
    }

    /// Most recent state
    pub fn state(&self) -> RecognizerState {
        self.tracking.lock().state
    }

    pub(crate) fn set_hysteresis(&self, distance: f64) {
        *self.hysteresis.lock() = distance.max(0.0);
    }

    pub(crate) fn set_delegate(&self, delegate: Arc<dyn GestureDelegate>) {
        *self.delegate.lock() = Some(delegate);
    }

    pub(crate) fn clear_delegate(&self) {
        *self.delegate.lock() = None;
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.lock()
    }

    /// Disabling an active recognizer cancels the gesture in progress
    pub(crate) fn set_enabled(&self, enabled: bool) {
        *self.enabled.lock() = enabled;
        if !enabled {
            self.finish(Point::default(), RecognizerState::Cancelled);
        }
    }

    /// Register an action called on every state change
    pub(crate) fn add_target<F>(&self, action: F) -> TargetId
    where
        F: Fn(GestureEvent) + Send + Sync + 'static,
    {
        let id = TargetId::next();
        self.targets.lock().push((id, Arc::new(action)));
        id
    }

    pub(crate) fn remove_target(&self, target: TargetId) -> bool {
        let mut targets = self.targets.lock();
        let before = targets.len();
        targets.retain(|(id, _)| *id != target);
        targets.len() != before
    }

    pub fn target_count(&self) -> usize {
        self.targets.lock().len()
    }

    /// Ask the delegate whether this recognizer may run alongside `other`
    ///
    /// Without a delegate recognizers never run simultaneously.
    pub fn can_recognize_simultaneously_with(&self, other: RecognizerId) -> bool {
        let delegate = self.delegate.lock().clone();
        delegate.is_some_and(|d| d.should_run_simultaneously_with(self.id, other))
    }

    pub fn touch_began(&self, location: Point) {
        if !self.is_enabled() {
            return;
        }

        let delegate = self.delegate.lock().clone();
        if let Some(delegate) = delegate {
            if !delegate.should_begin_receiving_touch(self.id, location) {
                trace!(recognizer = %self.id, ?location, "delegate declined touch");
                return;
            }
        }

        let mut tracking = self.tracking.lock();
        tracking.touching = true;
        tracking.start = location;
        tracking.state = RecognizerState::Possible;
    }

    pub fn touch_moved(&self, location: Point) {
        let hysteresis = *self.hysteresis.lock();
        let next = {
            let mut tracking = self.tracking.lock();
            if !tracking.touching {
                return;
            }

            let next = match (self.kind, tracking.state) {
                (GestureKind::Pan, RecognizerState::Possible) => {
                    if tracking.start.distance_to(location) < hysteresis {
                        return;
                    }
                    RecognizerState::Began
                }
                (GestureKind::Pan, _) => RecognizerState::Changed,
                (GestureKind::Tap, _) => {
                    if tracking.start.distance_to(location) < hysteresis {
                        return;
                    }
                    tracking.touching = false;
                    RecognizerState::Failed
                }
            };
            tracking.state = next;
            next
        };

        self.fire(next, location);
    }

    pub fn touch_ended(&self, location: Point) {
        self.finish(location, RecognizerState::Ended);
    }

    pub fn touch_cancelled(&self, location: Point) {
        self.finish(location, RecognizerState::Cancelled);
    }

    fn finish(&self, location: Point, outcome: RecognizerState) {
        let next = {
            let mut tracking = self.tracking.lock();
            if !tracking.touching {
                return;
            }
            tracking.touching = false;

            let next = match (self.kind, tracking.state, outcome) {
                (GestureKind::Tap, RecognizerState::Possible, RecognizerState::Ended) => RecognizerState::Ended,
                (_, state, outcome) if state.is_active() => outcome,
                _ => RecognizerState::Failed,
            };
            tracking.state = next;
            next
        };

        self.fire(next, location);
    }

    fn fire(&self, state: RecognizerState, location: Point) {
        let event = GestureEvent {
            recognizer: self.id,
            kind: self.kind,
            state,
            location,
        };

        // Snapshot so actions may add or remove targets
        let targets: Vec<Action> = self.targets.lock().iter().map(|(_, a)| Arc::clone(a)).collect();
        trace!(recognizer = %self.id, ?state, targets = targets.len(), "recognizer state changed");

        for action in targets {
            action(event);
        }
    }
}

impl fmt::Debug for GestureRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureRecognizer")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("view", &self.view)
            .field("state", &self.state())
            .finish()
    }
}

/// Recognizers attached to views, at most one per `(view, kind)`
#[derive(Debug, Default)]
pub struct GestureRegistry {
    attached: DashMap<(ViewId, GestureKind), Arc<GestureRecognizer>>,
}

impl GestureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and attach a recognizer of `kind` to `view`
    pub(crate) fn attach(&self, view: ViewId, kind: GestureKind) -> Result<Arc<GestureRecognizer>> {
        match self.attached.entry((view, kind)) {
            Entry::Occupied(_) => Err(KeyboardError::GestureAlreadyAttached { view, kind }),
            Entry::Vacant(slot) => {
                let recognizer = Arc::new(GestureRecognizer::new(view, kind));
                debug!(recognizer = %recognizer.id(), %view, ?kind, "attached recognizer");
                slot.insert(Arc::clone(&recognizer));
                Ok(recognizer)
            }
        }
    }

    pub fn get(&self, view: ViewId, kind: GestureKind) -> Option<Arc<GestureRecognizer>> {
        self.attached.get(&(view, kind)).map(|entry| Arc::clone(entry.value()))
    }

    /// Detach `recognizer` if it is still the one attached for its view and kind
    pub(crate) fn detach(&self, recognizer: &GestureRecognizer) -> bool {
        let key = (recognizer.view(), recognizer.kind());
        let removed = self
            .attached
            .remove_if(&key, |_, attached| attached.id() == recognizer.id())
            .is_some();
        if removed {
            debug!(recognizer = %recognizer.id(), view = %key.0, "detached recognizer");
        }
        removed
    }

    /// Every recognizer attached to `view`
    pub fn recognizers_on(&self, view: ViewId) -> Vec<Arc<GestureRecognizer>> {
        self.attached
            .iter()
            .filter(|entry| entry.key().0 == view)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.attached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(recognizer: &GestureRecognizer) -> Arc<Mutex<Vec<RecognizerState>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        recognizer.add_target(move |event: GestureEvent| sink.lock().push(event.state));
        seen
    }

    fn view() -> ViewId {
        crate::view::ViewTree::new().set_root(crate::geometry::Rect::new(0.0, 0.0, 1.0, 1.0))
    }

    struct Decline;

    impl GestureDelegate for Decline {
        fn should_begin_receiving_touch(&self, _: RecognizerId, _: Point) -> bool {
            false
        }

        fn should_run_simultaneously_with(&self, _: RecognizerId, _: RecognizerId) -> bool {
            true
        }
    }

    #[test]
    fn test_pan_lifecycle() {
        let pan = GestureRecognizer::new(view(), GestureKind::Pan);
        let seen = record(&pan);

        pan.touch_began(Point::new(100.0, 100.0));
        pan.touch_moved(Point::new(100.0, 105.0));
        assert!(seen.lock().is_empty());

        pan.touch_moved(Point::new(100.0, 120.0));
        pan.touch_moved(Point::new(100.0, 140.0));
        pan.touch_ended(Point::new(100.0, 150.0));

        assert_eq!(
            *seen.lock(),
            vec![RecognizerState::Began, RecognizerState::Changed, RecognizerState::Ended]
        );
        assert_eq!(pan.state(), RecognizerState::Ended);
    }

    #[test]
    fn test_pan_released_before_hysteresis_fails() {
        let pan = GestureRecognizer::new(view(), GestureKind::Pan);
        let seen = record(&pan);

        pan.touch_began(Point::new(0.0, 0.0));
        pan.touch_ended(Point::new(0.0, 1.0));

        assert_eq!(*seen.lock(), vec![RecognizerState::Failed]);
    }

    #[test]
    fn test_tap() {
        let tap = GestureRecognizer::new(view(), GestureKind::Tap);
        let seen = record(&tap);

        tap.touch_began(Point::new(0.0, 0.0));
        tap.touch_ended(Point::new(0.0, 0.0));

        tap.touch_began(Point::new(0.0, 0.0));
        tap.touch_moved(Point::new(0.0, 50.0));
        tap.touch_ended(Point::new(0.0, 50.0));

        assert_eq!(*seen.lock(), vec![RecognizerState::Ended, RecognizerState::Failed]);
    }

    #[test]
    fn test_delegate_can_decline_touch() {
        let pan = GestureRecognizer::new(view(), GestureKind::Pan);
        pan.set_delegate(Arc::new(Decline));
        let seen = record(&pan);

        pan.touch_began(Point::new(0.0, 0.0));
        pan.touch_moved(Point::new(0.0, 100.0));
        pan.touch_ended(Point::new(0.0, 100.0));

        assert!(seen.lock().is_empty());
        assert!(pan.can_recognize_simultaneously_with(pan.id()));
    }

    #[test]
    fn test_disable_cancels_active_gesture() {
        let pan = GestureRecognizer::new(view(), GestureKind::Pan);
        let seen = record(&pan);

        pan.touch_began(Point::new(0.0, 0.0));
        pan.touch_moved(Point::new(0.0, 50.0));
        pan.set_enabled(false);
        pan.touch_moved(Point::new(0.0, 60.0));

        assert_eq!(*seen.lock(), vec![RecognizerState::Began, RecognizerState::Cancelled]);
    }

    #[test]
    fn test_registry_one_per_view_and_kind() {
        let registry = GestureRegistry::new();
        let view = view();

        let pan = registry.attach(view, GestureKind::Pan).unwrap();
        assert!(matches!(
            registry.attach(view, GestureKind::Pan),
            Err(KeyboardError::GestureAlreadyAttached { kind: GestureKind::Pan, .. })
        ));
        registry.attach(view, GestureKind::Tap).unwrap();
        assert_eq!(registry.recognizers_on(view).len(), 2);

        assert!(registry.detach(&pan));
        assert!(!registry.detach(&pan));
        assert!(registry.get(view, GestureKind::Pan).is_none());
        assert!(registry.attach(view, GestureKind::Pan).is_ok());
    }
}
