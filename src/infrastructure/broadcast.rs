//! Broadcast hub
//!
//! Fans state-change events out to every connected subscriber over a tokio
//! broadcast channel. Sends never block: a subscriber that falls behind the
//! channel capacity misses messages instead of delaying the publisher.
//!
//! Market-price events are additionally throttled to one publish per
//! interval. The throttle is a single last-sent timestamp guarded by the
//! publish lock, so intermediate updates are dropped and the next allowed
//! publish always carries the latest table snapshot.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::domain::{PushEvent, Quote};

pub struct BroadcastHub {
    tx: broadcast::Sender<PushEvent>,
    market_throttle: Duration,
    last_market_publish: Mutex<Option<Instant>>,
}

impl BroadcastHub {
    pub fn new(capacity: usize, market_throttle: Duration) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        BroadcastHub {
            tx,
            market_throttle,
            last_market_publish: Mutex::new(None),
        }
    }

    /// Subscribe to all events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish an event to every subscriber. Trade and status events go
    /// through here and are never throttled.
    pub fn publish(&self, event: PushEvent) {
        // Send errors only mean there are no subscribers.
        let _ = self.tx.send(event);
    }

    /// Publish a market snapshot, rate-limited. Returns whether the snapshot
    /// was actually sent; a dropped publish is made up for by the next
    /// allowed one carrying the then-current table.
    pub fn publish_market(&self, quotes: HashMap<String, Quote>) -> bool {
        {
            let mut last = self.last_market_publish.lock();
            match *last {
                Some(at) if at.elapsed() < self.market_throttle => return false,
                _ => *last = Some(Instant::now()),
            }
        }
        self.publish(PushEvent::MarketUpdate(quotes));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SystemStatus;

    fn quotes(price: f64) -> HashMap<String, Quote> {
        let mut map = HashMap::new();
        map.insert("BTCUSDT".to_string(), Quote { price, time: 0 });
        map
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = BroadcastHub::new(16, Duration::from_millis(100));
        let mut rx = hub.subscribe();

        hub.publish(PushEvent::SystemStatus(SystemStatus {
            instrument: "BTCUSDT".to_string(),
            oscillator: 50.0,
            confidence: 0.5,
        }));

        match rx.recv().await.unwrap() {
            PushEvent::SystemStatus(status) => assert_eq!(status.instrument, "BTCUSDT"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn market_publishes_are_throttled_to_one_per_interval() {
        let hub = BroadcastHub::new(16, Duration::from_millis(50));
        let mut rx = hub.subscribe();

        assert!(hub.publish_market(quotes(1.0)));
        assert!(!hub.publish_market(quotes(2.0)));
        assert!(!hub.publish_market(quotes(3.0)));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(hub.publish_market(quotes(4.0)));

        // Subscriber sees the first and the latest, nothing in between.
        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());
        match (first, second) {
            (PushEvent::MarketUpdate(a), PushEvent::MarketUpdate(b)) => {
                assert_eq!(a["BTCUSDT"].price, 1.0);
                assert_eq!(b["BTCUSDT"].price, 4.0);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn trade_events_bypass_the_throttle() {
        let hub = BroadcastHub::new(16, Duration::from_millis(1000));
        let mut rx = hub.subscribe();

        assert!(hub.publish_market(quotes(1.0)));
        for osc in [10.0, 20.0, 30.0] {
            hub.publish(PushEvent::SystemStatus(SystemStatus {
                instrument: "BTCUSDT".to_string(),
                oscillator: osc,
                confidence: 0.5,
            }));
        }

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 4);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let hub = BroadcastHub::new(16, Duration::from_millis(10));
        hub.publish(PushEvent::MarketUpdate(quotes(1.0)));
        assert_eq!(hub.subscriber_count(), 0);
    }
}
