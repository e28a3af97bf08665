//! Typed publish/subscribe event bus (§4.8).
//!
//! Each subscriber gets its own bounded queue (default 1024 events); a
//! subscriber that falls behind has its oldest events dropped to make
//! room for new ones rather than blocking the publisher, and an alert is
//! raised for that subscriber at most once every 10 seconds so a
//! permanently-stuck subscriber doesn't flood the alert log.

use core_model::alert::{Alert, AlertLog};
use core_model::wire::AlertLevel;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    Session,
    Node,
    Link,
    Alert,
    Throughput,
    Config,
    Position,
    Exec,
}

#[derive(Clone, Debug)]
pub struct Event {
    pub topic: Topic,
    pub payload: String,
}

struct Subscriber {
    id: u64,
    topics: Vec<Topic>,
    queue: VecDeque<Event>,
    capacity: usize,
}

/// The bus itself. Not `Send`-free — it's meant to sit behind an `Arc<Mutex<_>>`
/// shared by the session actor and anything consuming its events.
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    next_id: u64,
    alert_log: AlertLog,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 1,
            alert_log: AlertLog::for_lossy_subscribers(),
        }
    }

    pub fn subscribe(&mut self, topics: Vec<Topic>) -> u64 {
        self.subscribe_with_capacity(topics, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn subscribe_with_capacity(&mut self, topics: Vec<Topic>, capacity: usize) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            topics,
            queue: VecDeque::new(),
            capacity,
        });
        id
    }

    pub fn unsubscribe(&mut self, id: u64) {
        self.subscribers.retain(|s| s.id != id);
    }

    /// Publish `event` to every subscriber of its topic. A subscriber
    /// whose queue is at capacity drops its oldest event to make room.
    pub fn publish(&mut self, event: Event) {
        let now = Instant::now();
        for sub in self.subscribers.iter_mut().filter(|s| s.topics.contains(&event.topic)) {
            if sub.queue.len() >= sub.capacity {
                sub.queue.pop_front();
                let source = format!("subscriber-{}", sub.id);
                self.alert_log.record(
                    Alert::new(AlertLevel::Warning, source, "subscriber queue full, dropping oldest event"),
                    now,
                );
            }
            sub.queue.push_back(event.clone());
        }
    }

    /// Drain everything currently queued for `id`, oldest first.
    pub fn drain(&mut self, id: u64) -> Vec<Event> {
        self.subscribers
            .iter_mut()
            .find(|s| s.id == id)
            .map(|s| s.queue.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn queue_len(&self, id: u64) -> usize {
        self.subscribers.iter().find(|s| s.id == id).map(|s| s.queue.len()).unwrap_or(0)
    }

    pub fn lossy_subscriber_alerts(&self) -> &[Alert] {
        self.alert_log.history()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedEventBus = Arc<Mutex<EventBus>>;

pub fn shared() -> SharedEventBus {
    Arc::new(Mutex::new(EventBus::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(topic: Topic, payload: &str) -> Event {
        Event {
            topic,
            payload: payload.to_string(),
        }
    }

    #[test]
    fn subscriber_only_receives_subscribed_topics() {
        let mut bus = EventBus::new();
        let id = bus.subscribe(vec![Topic::Node]);
        bus.publish(event(Topic::Link, "link-up"));
        bus.publish(event(Topic::Node, "node-up"));
        let drained = bus.drain(id);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].payload, "node-up");
    }

    #[test]
    fn full_queue_drops_oldest_first() {
        let mut bus = EventBus::new();
        let id = bus.subscribe_with_capacity(vec![Topic::Node], 2);
        bus.publish(event(Topic::Node, "a"));
        bus.publish(event(Topic::Node, "b"));
        bus.publish(event(Topic::Node, "c"));
        let drained = bus.drain(id);
        assert_eq!(drained.iter().map(|e| e.payload.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn dropping_events_raises_rate_limited_alert() {
        let mut bus = EventBus::new();
        bus.subscribe_with_capacity(vec![Topic::Node], 1);
        bus.publish(event(Topic::Node, "a"));
        bus.publish(event(Topic::Node, "b"));
        bus.publish(event(Topic::Node, "c"));
        // Multiple drops within the window collapse into one alert.
        assert_eq!(bus.lossy_subscriber_alerts().len(), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let id = bus.subscribe(vec![Topic::Node]);
        bus.unsubscribe(id);
        bus.publish(event(Topic::Node, "a"));
        assert_eq!(bus.queue_len(id), 0);
    }
}
