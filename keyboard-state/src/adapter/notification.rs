use std::sync::Arc;

use event_stream::{DeliveryContext, EventStream, Publisher};

use crate::notification::{Notification, NotificationCenter, NotificationName, ObserverToken};

/// Emits each posted notification of one name
///
/// Posts from other threads wait on the delivery context until its owner
/// drains it.
pub struct NotificationAdapter {
    center: Arc<NotificationCenter>,
    token: ObserverToken,
    events: Publisher<Notification>,
}

impl NotificationAdapter {
    pub fn observe(center: &Arc<NotificationCenter>, name: NotificationName, context: &DeliveryContext) -> Self {
        let events = Publisher::new();

        let publisher = events.clone();
        let context = context.clone();
        let token = center.add_observer(name, move |notification| {
            super::deliver(&context, &publisher, notification.clone())
        });

        Self {
            center: Arc::clone(center),
            token,
            events,
        }
    }

    pub fn events(&self) -> EventStream<Notification> {
        self.events.stream()
    }
}

impl Drop for NotificationAdapter {
    fn drop(&mut self) {
        self.center.remove_observer(self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{KEYBOARD_WILL_CHANGE_FRAME, KEYBOARD_WILL_HIDE};
    use parking_lot::Mutex;

    #[test]
    fn test_same_thread_posts_arrive_immediately() {
        let context = DeliveryContext::new();
        let center = Arc::new(NotificationCenter::new());
        let adapter = NotificationAdapter::observe(&center, KEYBOARD_WILL_HIDE, &context);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = adapter.events().subscribe(move |n: Notification| sink.lock().push(n.name));

        center.post(Notification::bare(KEYBOARD_WILL_HIDE));
        center.post(Notification::bare(KEYBOARD_WILL_CHANGE_FRAME));

        assert_eq!(*seen.lock(), vec![KEYBOARD_WILL_HIDE]);
    }

    #[test]
    fn test_off_thread_posts_wait_for_drain() {
        let context = DeliveryContext::new();
        let center = Arc::new(NotificationCenter::new());
        let adapter = NotificationAdapter::observe(&center, KEYBOARD_WILL_HIDE, &context);

        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let _sub = adapter.events().subscribe(move |_| *counter.lock() += 1);

        let poster = Arc::clone(&center);
        std::thread::spawn(move || {
            poster.post(Notification::bare(KEYBOARD_WILL_HIDE));
            poster.post(Notification::bare(KEYBOARD_WILL_HIDE));
        })
        .join()
        .unwrap();

        assert_eq!(*count.lock(), 0);
        assert_eq!(context.drain(), 2);
        assert_eq!(*count.lock(), 2);
    }

    #[test]
    fn test_posts_after_close_are_dropped() {
        let context = DeliveryContext::new();
        let center = Arc::new(NotificationCenter::new());
        let adapter = NotificationAdapter::observe(&center, KEYBOARD_WILL_HIDE, &context);

        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let _sub = adapter.events().subscribe(move |_| *counter.lock() += 1);

        context.close();
        center.post(Notification::bare(KEYBOARD_WILL_HIDE));

        assert_eq!(*count.lock(), 0);
        assert_eq!(context.pending(), 0);
    }

    #[test]
    fn test_drop_removes_observer() {
        let context = DeliveryContext::new();
        let center = Arc::new(NotificationCenter::new());
        let adapter = NotificationAdapter::observe(&center, KEYBOARD_WILL_HIDE, &context);
        assert_eq!(center.observer_count(&KEYBOARD_WILL_HIDE), 1);

        drop(adapter);
        assert_eq!(center.observer_count(&KEYBOARD_WILL_HIDE), 0);
    }
}
