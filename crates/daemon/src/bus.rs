// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topic-based in-process publish/subscribe.
//!
//! One broadcast channel per topic, with per-subscriber buffered
//! deliveries. Delivery is best-effort and fire-and-forget: publishing
//! never blocks and never fails back into the writer; a subscriber that
//! falls more than the backlog behind observes a lag marker and misses
//! the overwritten events. The HTTP/SSE layer subscribes here and fans
//! out to network clients.

use relay_core::{BusEvent, EventSink, Topic};
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Default per-subscriber backlog before lagging drops old events.
pub const DEFAULT_BACKLOG: usize = 256;

/// The daemon's event bus.
pub struct EventBus {
    topics: HashMap<Topic, broadcast::Sender<BusEvent>>,
}

impl EventBus {
    pub fn new(backlog: usize) -> Self {
        let topics = Topic::ALL
            .into_iter()
            .map(|topic| {
                let (tx, _) = broadcast::channel(backlog.max(1));
                (topic, tx)
            })
            .collect();
        Self { topics }
    }

    /// Subscribe to one topic. Events published after this call arrive
    /// in publication order.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<BusEvent> {
        // Every topic is created in `new`, so the lookup cannot miss.
        match self.topics.get(&topic) {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Number of live subscribers on a topic (diagnostics).
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topics
            .get(&topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BACKLOG)
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: BusEvent) {
        if let Some(tx) = self.topics.get(&event.topic()) {
            // A send error only means nobody is subscribed.
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
