//! Async bridges for tracker values
//!
//! Relays live on the delivery context. Code running elsewhere, typically a
//! tokio task, can follow a value through a `watch::Receiver` instead.

use std::sync::Arc;

use event_stream::{Relay, StreamValue, SubscriptionBag};
use tokio::sync::watch;

/// One watch channel mirroring a relay
///
/// The bridge is wired once; every receiver handed out shares its sender.
pub struct RelayWatch<T> {
    sender: Arc<watch::Sender<T>>,
}

impl<T: StreamValue> RelayWatch<T> {
    /// Mirror `relay` for as long as `bag` lives
    pub fn new(relay: &Relay<T>, bag: &SubscriptionBag) -> Self {
        let (tx, _rx) = watch::channel(relay.get());
        let sender = Arc::new(tx);

        let bridge = Arc::clone(&sender);
        bag.add(relay.changes().subscribe(move |value| {
            // send() fails without receivers; send_replace() always stores
            bridge.send_replace(value);
        }));

        Self { sender }
    }

    /// Receiver starting at the current value
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_receiver_follows_relay() {
        let relay = Relay::new(0.0_f64);
        let bag = SubscriptionBag::new();
        let watch = RelayWatch::new(&relay, &bag);
        let mut rx = watch.subscribe();

        assert_eq!(*rx.borrow(), 0.0);

        relay.set(291.0);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 291.0);
    }

    #[tokio::test]
    async fn test_late_receiver_sees_latest_value() {
        let relay = Relay::new(1u32);
        let bag = SubscriptionBag::new();
        let watch = RelayWatch::new(&relay, &bag);

        relay.set(2);
        relay.set(3);

        assert_eq!(*watch.subscribe().borrow(), 3);
    }

    #[test]
    fn test_receivers_share_one_bridge() {
        let relay = Relay::new(false);
        let bag = SubscriptionBag::new();
        let watch = RelayWatch::new(&relay, &bag);

        let receivers: Vec<_> = (0..8).map(|_| watch.subscribe()).collect();
        assert_eq!(bag.len(), 1);
        assert_eq!(watch.receiver_count(), 8);

        drop(receivers);
        assert_eq!(watch.receiver_count(), 0);
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_bridge_stops_with_bag() {
        let relay = Relay::new(false);
        let bag = SubscriptionBag::new();
        let watch = RelayWatch::new(&relay, &bag);
        let rx = watch.subscribe();

        drop(bag);
        relay.set(true);

        assert!(!*rx.borrow());
    }
}
