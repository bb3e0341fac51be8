//! Synchronization Bus: typed fan-out of selection, hover and search events.
//!
//! Publishing only enqueues. `dispatch` drains the queue in publish order and
//! hands each event to the subscribers of its channel, so a subscriber never
//! runs in the middle of the mutation that produced the event.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::logging::{log, obj, v_str, Domain, Level};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    SelectionChanged,
    ItemHovered,
    SampleHovered,
    SampleVisibilityChanged,
    QueryApplied,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::SelectionChanged,
        Channel::ItemHovered,
        Channel::SampleHovered,
        Channel::SampleVisibilityChanged,
        Channel::QueryApplied,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::SelectionChanged => "selection_changed",
            Channel::ItemHovered => "item_hovered",
            Channel::SampleHovered => "sample_hovered",
            Channel::SampleVisibilityChanged => "sample_visibility_changed",
            Channel::QueryApplied => "query_applied",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    SelectionChanged { active: Vec<String> },
    ItemHovered { id: Option<String> },
    SampleHovered { sample: Option<String> },
    SampleVisibilityChanged { sample: String, visible: bool },
    QueryApplied { query: String },
}

impl SyncEvent {
    pub fn channel(&self) -> Channel {
        match self {
            SyncEvent::SelectionChanged { .. } => Channel::SelectionChanged,
            SyncEvent::ItemHovered { .. } => Channel::ItemHovered,
            SyncEvent::SampleHovered { .. } => Channel::SampleHovered,
            SyncEvent::SampleVisibilityChanged { .. } => Channel::SampleVisibilityChanged,
            SyncEvent::QueryApplied { .. } => Channel::QueryApplied,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub seq: u64,
    pub event: SyncEvent,
}

pub trait Subscriber {
    fn on_event(&mut self, event: &SyncEvent);
}

pub type SubscriberId = u64;

struct Subscription {
    channels: BTreeSet<Channel>,
    subscriber: Box<dyn Subscriber>,
}

#[derive(Default)]
pub struct SyncBus {
    queue: VecDeque<Envelope>,
    seq_counter: u64,
    next_id: SubscriberId,
    subscriptions: BTreeMap<SubscriberId, Subscription>,
}

impl SyncBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        channels: &[Channel],
        subscriber: Box<dyn Subscriber>,
    ) -> SubscriberId {
        self.next_id += 1;
        self.subscriptions.insert(
            self.next_id,
            Subscription {
                channels: channels.iter().copied().collect(),
                subscriber,
            },
        );
        self.next_id
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    pub fn publish(&mut self, event: SyncEvent) -> u64 {
        self.seq_counter += 1;
        self.queue.push_back(Envelope {
            seq: self.seq_counter,
            event,
        });
        self.seq_counter
    }

    /// Deliver everything queued, oldest first, and return what was delivered.
    pub fn dispatch(&mut self) -> Vec<Envelope> {
        let drained: Vec<Envelope> = self.queue.drain(..).collect();
        for envelope in &drained {
            let channel = envelope.event.channel();
            let mut delivered = 0usize;
            for sub in self.subscriptions.values_mut() {
                if sub.channels.contains(&channel) {
                    sub.subscriber.on_event(&envelope.event);
                    delivered += 1;
                }
            }
            log(
                Level::Trace,
                Domain::Bus,
                "dispatch",
                obj(&[
                    ("seq", json!(envelope.seq)),
                    ("channel", v_str(channel.as_str())),
                    ("subscribers", json!(delivered)),
                ]),
            );
        }
        drained
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder(Rc<RefCell<Vec<SyncEvent>>>);

    impl Subscriber for Recorder {
        fn on_event(&mut self, event: &SyncEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    fn recorder() -> (Rc<RefCell<Vec<SyncEvent>>>, Box<dyn Subscriber>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        (log.clone(), Box::new(Recorder(log)))
    }

    #[test]
    fn test_fifo_with_sequence_numbers() {
        let mut bus = SyncBus::new();
        bus.publish(SyncEvent::ItemHovered { id: Some("a".into()) });
        bus.publish(SyncEvent::ItemHovered { id: None });
        let drained = bus.dispatch();
        assert_eq!(drained.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(drained[1].event, SyncEvent::ItemHovered { id: None });
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn test_delivery_by_channel() {
        let mut bus = SyncBus::new();
        let (hover_log, hover) = recorder();
        let (all_log, all) = recorder();
        bus.subscribe(&[Channel::ItemHovered], hover);
        bus.subscribe(&Channel::ALL, all);

        bus.publish(SyncEvent::SelectionChanged { active: vec!["a".into()] });
        bus.publish(SyncEvent::ItemHovered { id: Some("a".into()) });
        bus.dispatch();

        assert_eq!(hover_log.borrow().len(), 1);
        assert_eq!(all_log.borrow().len(), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = SyncBus::new();
        let (events, sub) = recorder();
        let id = bus.subscribe(&[Channel::QueryApplied], sub);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(SyncEvent::QueryApplied { query: "x".into() });
        bus.dispatch();
        assert!(events.borrow().is_empty());
    }
}
