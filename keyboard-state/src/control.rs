//! Target-action controls
//!
//! A [`Control`] stands in for a host button, switch or text field. The host
//! calls [`Control::send_actions`] when the real control fires, and every
//! target registered for that event runs on the calling thread.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::target::TargetId;

/// Events a control can fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlEvent {
    /// Button tap
    TouchUpInside,
    ValueChanged,
    EditingChanged,
    EditingDidBegin,
    EditingDidEnd,
    PrimaryActionTriggered,
}

type Action = Arc<dyn Fn() + Send + Sync>;

pub struct Control {
    enabled: AtomicBool,
    targets: Mutex<Vec<(TargetId, ControlEvent, Action)>>,
}

impl Control {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Register `action` for `event`
    pub fn add_target<F>(&self, event: ControlEvent, action: F) -> TargetId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = TargetId::next();
        self.targets.lock().push((id, event, Arc::new(action)));
        id
    }

    pub fn remove_target(&self, target: TargetId) -> bool {
        let mut targets = self.targets.lock();
        let before = targets.len();
        targets.retain(|(id, _, _)| *id != target);
        targets.len() != before
    }

    pub fn target_count(&self) -> usize {
        self.targets.lock().len()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Fire `event`; a disabled control fires nothing
    pub fn send_actions(&self, event: ControlEvent) {
        if !self.is_enabled() {
            return;
        }

        let actions: Vec<Action> = self
            .targets
            .lock()
            .iter()
            .filter(|(_, e, _)| *e == event)
            .map(|(_, _, action)| Arc::clone(action))
            .collect();

        trace!(?event, targets = actions.len(), "control fired");
        for action in actions {
            action();
        }
    }

    /// Shorthand for a button tap
    pub fn tap(&self) {
        self.send_actions(ControlEvent::TouchUpInside);
    }
}

impl Default for Control {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Control")
            .field("enabled", &self.is_enabled())
            .field("targets", &self.target_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_fire_per_event() {
        let control = Control::new();
        let taps = Arc::new(Mutex::new(0));
        let edits = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&taps);
        control.add_target(ControlEvent::TouchUpInside, move || *counter.lock() += 1);
        let counter = Arc::clone(&edits);
        control.add_target(ControlEvent::EditingChanged, move || *counter.lock() += 1);

        control.tap();
        control.tap();
        control.send_actions(ControlEvent::EditingChanged);
        control.send_actions(ControlEvent::ValueChanged);

        assert_eq!(*taps.lock(), 2);
        assert_eq!(*edits.lock(), 1);
    }

    #[test]
    fn test_disabled_and_removed_targets() {
        let control = Control::new();
        let taps = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&taps);
        let target = control.add_target(ControlEvent::TouchUpInside, move || *counter.lock() += 1);

        control.set_enabled(false);
        control.tap();
        control.set_enabled(true);
        control.tap();

        assert!(control.remove_target(target));
        control.tap();

        assert_eq!(*taps.lock(), 1);
        assert_eq!(control.target_count(), 0);
    }
}
