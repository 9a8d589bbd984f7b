// 📡 Live Feed - canned messages pushed on an interval
// No acknowledgement, ordering, or delivery guarantees.

use crate::ids::generate_id_with;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_FEED_INTERVAL: Duration = Duration::from_secs(30);

pub const CANNED_MESSAGES: &[&str] = &[
    "Quantum coherence stabilized at golden ratio baseline",
    "Gate735 rate table refreshed",
    "Debt nullification batch settled",
    "Trust unit issuance within scarcity bounds",
    "Cross-chain bridge heartbeat received",
    "Scarcity Reflection Index recalculated",
    "Mining pulse synchronized across gates",
    "Economic indicator snapshot archived",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMessage {
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

pub struct LiveFeed<R = StdRng> {
    rng: R,
    messages: Vec<String>,
}

impl LiveFeed<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for LiveFeed<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> LiveFeed<R> {
    pub fn with_rng(rng: R) -> Self {
        LiveFeed {
            rng,
            messages: CANNED_MESSAGES.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Replace the message pool; an empty pool keeps the canned one
    pub fn with_messages(mut self, messages: Vec<String>) -> Self {
        if !messages.is_empty() {
            self.messages = messages;
        }
        self
    }

    pub fn next_message(&mut self) -> FeedMessage {
        let now = Utc::now();
        let message = self
            .messages
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_default();

        FeedMessage {
            id: generate_id_with("feed", now.timestamp_millis(), &mut self.rng),
            message,
            timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_come_from_pool() {
        let mut feed = LiveFeed::seeded(5);
        for _ in 0..30 {
            let msg = feed.next_message();
            assert!(CANNED_MESSAGES.contains(&msg.message.as_str()));
            assert!(msg.id.starts_with("feed-"));
        }
    }

    #[test]
    fn test_custom_pool() {
        let mut feed = LiveFeed::seeded(5).with_messages(vec!["only".to_string()]);
        assert_eq!(feed.next_message().message, "only");

        let mut fallback = LiveFeed::seeded(5).with_messages(Vec::new());
        assert!(CANNED_MESSAGES.contains(&fallback.next_message().message.as_str()));
    }

    #[test]
    fn test_seeded_feed_is_reproducible() {
        let mut a = LiveFeed::seeded(11);
        let mut b = LiveFeed::seeded(11);
        for _ in 0..5 {
            assert_eq!(a.next_message().message, b.next_message().message);
        }
    }
}
