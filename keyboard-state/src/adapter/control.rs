use std::sync::Arc;

use event_stream::{DeliveryContext, EventStream, Publisher};

use crate::control::{Control, ControlEvent};
use crate::target::TargetId;

/// Emits `()` once per firing of a control event
pub struct ControlAdapter {
    control: Arc<Control>,
    target: TargetId,
    events: Publisher<()>,
}

impl ControlAdapter {
    pub fn new(control: &Arc<Control>, event: ControlEvent, context: &DeliveryContext) -> Self {
        let events = Publisher::new();

        let publisher = events.clone();
        let context = context.clone();
        let target = control.add_target(event, move || super::deliver(&context, &publisher, ()));

        Self {
            control: Arc::clone(control),
            target,
            events,
        }
    }

    /// Button taps
    pub fn tap(control: &Arc<Control>, context: &DeliveryContext) -> Self {
        Self::new(control, ControlEvent::TouchUpInside, context)
    }

    pub fn events(&self) -> EventStream<()> {
        self.events.stream()
    }
}

impl Drop for ControlAdapter {
    fn drop(&mut self) {
        self.control.remove_target(self.target);
    }
}
