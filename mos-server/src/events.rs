//! Typed topic pub/sub with bounded per-subscriber queues and drop-on-full
//! backpressure (spec §4.3). Grounded on the Go original's `events.EventBus`.

use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    RoUpdated,
    StoryModified,
    ItemChanged,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::RoUpdated => "ro.updated",
            Topic::StoryModified => "story.modified",
            Topic::ItemChanged => "item.changed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub topic: Topic,
    pub payload: String,
    pub source: String,
}

#[derive(Default)]
struct Subscribers {
    ro_updated: Vec<mpsc::Sender<Event>>,
    story_modified: Vec<mpsc::Sender<Event>>,
    item_changed: Vec<mpsc::Sender<Event>>,
}

impl Subscribers {
    fn list_mut(&mut self, topic: Topic) -> &mut Vec<mpsc::Sender<Event>> {
        match topic {
            Topic::RoUpdated => &mut self.ro_updated,
            Topic::StoryModified => &mut self.story_modified,
            Topic::ItemChanged => &mut self.item_changed,
        }
    }

    fn list(&self, topic: Topic) -> &Vec<mpsc::Sender<Event>> {
        match topic {
            Topic::RoUpdated => &self.ro_updated,
            Topic::StoryModified => &self.story_modified,
            Topic::ItemChanged => &self.item_changed,
        }
    }
}

/// A typed topic registry. `subscribe` takes the writer lock; `publish`
/// takes the reader lock and never blocks on a full subscriber queue.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Subscribers>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, topic: Topic, buffer_size: usize) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let mut subs = self.subscribers.write().await;
        subs.list_mut(topic).push(tx);
        rx
    }

    /// Enqueues `event` onto every subscriber of its topic. Delivery to a
    /// subscriber whose queue is full is silently dropped — this is the
    /// explicit backpressure policy, not a bug: slow consumers catch up on
    /// the next state-carrying event instead of stalling the publisher.
    pub async fn publish(&self, event: Event) {
        let subs = self.subscribers.read().await;
        for tx in subs.list(event.topic) {
            let _ = tx.try_send(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_subscriber_queue_gets_some_not_all_with_no_duplicates() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(Topic::RoUpdated, 1).await;

        for i in 0..10 {
            bus.publish(Event {
                topic: Topic::RoUpdated,
                payload: i.to_string(),
                source: "test".into(),
            })
            .await;
        }

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event.payload);
        }

        assert!(!received.is_empty());
        assert!(received.len() <= 10);
        let mut sorted = received.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), received.len(), "no duplicates");
        // publish order preserved among what was received
        let mut prev: Option<i32> = None;
        for p in &received {
            let n: i32 = p.parse().unwrap();
            if let Some(prev) = prev {
                assert!(n > prev);
            }
            prev = Some(n);
        }
    }

    #[tokio::test]
    async fn unrelated_topic_does_not_receive() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(Topic::StoryModified, 4).await;
        bus.publish(Event {
            topic: Topic::RoUpdated,
            payload: "RO1".into(),
            source: "test".into(),
        })
        .await;
        assert!(rx.try_recv().is_err());
    }
}
