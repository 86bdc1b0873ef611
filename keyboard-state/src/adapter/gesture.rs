use std::sync::Arc;

use event_stream::{DeliveryContext, EventStream, Publisher};

use crate::error::Result;
use crate::gesture::{GestureEvent, GestureKind, GestureRecognizer, GestureRegistry};
use crate::target::TargetId;
use crate::view::ViewId;

/// Stream of state changes of the recognizer attached to one view
///
/// Owns the recognizer: dropping the adapter detaches it from the registry.
pub struct GestureAdapter {
    registry: Arc<GestureRegistry>,
    recognizer: Arc<GestureRecognizer>,
    target: TargetId,
    events: Publisher<GestureEvent>,
}

impl GestureAdapter {
    /// Attach a `kind` recognizer to `view`
    ///
    /// Fails with [`crate::KeyboardError::GestureAlreadyAttached`] if that
    /// pair is already taken.
    pub fn attach(
        registry: &Arc<GestureRegistry>,
        view: ViewId,
        kind: GestureKind,
        context: &DeliveryContext,
    ) -> Result<Self> {
        let recognizer = registry.attach(view, kind)?;
        let events = Publisher::new();

        let publisher = events.clone();
        let context = context.clone();
        let target = recognizer.add_target(move |event| super::deliver(&context, &publisher, event));

        Ok(Self {
            registry: Arc::clone(registry),
            recognizer,
            target,
            events,
        })
    }

    /// The owned recognizer, for feeding touches
    pub fn recognizer(&self) -> &Arc<GestureRecognizer> {
        &self.recognizer
    }

    /// Disabling cancels the gesture in progress
    pub fn set_enabled(&self, enabled: bool) {
        self.recognizer.set_enabled(enabled);
    }

    /// Every state change, Began through Failed
    pub fn events(&self) -> EventStream<GestureEvent> {
        self.events.stream()
    }
}

impl Drop for GestureAdapter {
    fn drop(&mut self) {
        self.recognizer.remove_target(self.target);
        self.recognizer.clear_delegate();
        self.registry.detach(&self.recognizer);
    }
}
