// 🧾 Mock Operations - append-only rolling log of fabricated records
//
// Records are values: never mutated after creation. Settling a pending
// record swaps in a new value that keeps the same id.

use crate::ids::IdGenerator;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// Default rolling window size
pub const DEFAULT_LOG_CAPACITY: usize = 20;

/// Default probability that a simulated operation succeeds
pub const DEFAULT_SUCCESS_RATE: f64 = 0.9;

/// Artificial delay before a pending record settles
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1500;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(DEFAULT_SETTLE_DELAY_MS);

// ============================================================================
// RECORD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Success,
    Error,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Success => "success",
            OperationStatus::Error => "error",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockOperationRecord {
    pub id: String,
    pub kind: String,
    /// Serialized as RFC 3339
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
    pub unit: String,
    pub status: OperationStatus,
}

impl MockOperationRecord {
    pub fn new(id: String, kind: &str, amount: f64, unit: &str, status: OperationStatus) -> Self {
        MockOperationRecord {
            id,
            kind: kind.to_string(),
            timestamp: Utc::now(),
            amount,
            unit: unit.to_string(),
            status,
        }
    }

    /// Same identity, new status and timestamp
    pub fn with_status(&self, status: OperationStatus) -> Self {
        MockOperationRecord {
            timestamp: Utc::now(),
            status,
            ..self.clone()
        }
    }
}

// ============================================================================
// OPERATION LOG
// ============================================================================

/// Newest-first list capped at `capacity` records
#[derive(Debug, Clone)]
pub struct OperationLog {
    records: VecDeque<MockOperationRecord>,
    capacity: usize,
}

impl OperationLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        OperationLog {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Prepend a record, dropping the oldest beyond capacity
    pub fn push(&mut self, record: MockOperationRecord) {
        self.records.push_front(record);
        self.records.truncate(self.capacity);
    }

    /// Replace the record with `id` by a copy carrying `status`.
    /// Returns false when the record already fell out of the window.
    pub fn settle(&mut self, id: &str, status: OperationStatus) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(slot) => {
                *slot = slot.with_status(status);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &MockOperationRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&MockOperationRecord> {
        self.records.front()
    }

    pub fn get(&self, id: &str) -> Option<&MockOperationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn count_by_status(&self, status: OperationStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    /// Sum of successful amounts in `unit`
    pub fn total_amount(&self, unit: &str) -> f64 {
        self.records
            .iter()
            .filter(|r| r.unit == unit && r.status == OperationStatus::Success)
            .map(|r| r.amount)
            .sum()
    }

    pub fn to_vec(&self) -> Vec<MockOperationRecord> {
        self.records.iter().cloned().collect()
    }
}

impl Default for OperationLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

// ============================================================================
// SIMULATOR
// ============================================================================

/// Fabricates operation outcomes from an injectable random source
pub struct OperationSimulator<R = StdRng> {
    rng: R,
    ids: IdGenerator<StdRng>,
    success_rate: f64,
}

impl OperationSimulator<StdRng> {
    pub fn new(success_rate: f64) -> Self {
        Self::from_rng(StdRng::from_entropy(), success_rate)
    }

    /// Deterministic simulator for tests and replays
    pub fn seeded(seed: u64, success_rate: f64) -> Self {
        OperationSimulator {
            ids: IdGenerator::seeded(seed.wrapping_add(1)),
            ..Self::from_rng(StdRng::seed_from_u64(seed), success_rate)
        }
    }
}

impl Default for OperationSimulator<StdRng> {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_RATE)
    }
}

impl<R: Rng> OperationSimulator<R> {
    /// Outcomes drawn from `rng`; ids keep their own entropy-seeded source
    pub fn from_rng(rng: R, success_rate: f64) -> Self {
        OperationSimulator {
            rng,
            ids: IdGenerator::new(),
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    /// Fresh pending record, settled later through [`OperationLog::settle`]
    pub fn begin(&mut self, kind: &str, amount: f64, unit: &str) -> MockOperationRecord {
        let id = self.ids.next_id(kind);
        MockOperationRecord::new(id, kind, amount, unit, OperationStatus::Pending)
    }

    /// Record for an operation that cannot fail
    pub fn completed(&mut self, kind: &str, amount: f64, unit: &str) -> MockOperationRecord {
        let id = self.ids.next_id(kind);
        MockOperationRecord::new(id, kind, amount, unit, OperationStatus::Success)
    }

    /// Roll the outcome for an operation
    pub fn outcome(&mut self) -> OperationStatus {
        if self.rng.gen::<f64>() < self.success_rate {
            OperationStatus::Success
        } else {
            OperationStatus::Error
        }
    }

    /// Pending record resolved immediately
    pub fn simulate(&mut self, kind: &str, amount: f64, unit: &str) -> MockOperationRecord {
        let status = self.outcome();
        let id = self.ids.next_id(kind);
        MockOperationRecord::new(id, kind, amount, unit, status)
    }
}

// ============================================================================
// SETTLE QUEUE
// ============================================================================

/// Pending record ids waiting out the artificial delay, oldest first
#[derive(Debug, Clone)]
pub struct SettleQueue {
    delay: Duration,
    due: VecDeque<(String, Instant)>,
}

impl SettleQueue {
    pub fn new(delay: Duration) -> Self {
        SettleQueue {
            delay,
            due: VecDeque::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Queue `id` to settle `delay` after `now`
    pub fn schedule(&mut self, id: String, now: Instant) {
        self.due.push_back((id, now + self.delay));
    }

    /// Pop every id whose delay has elapsed at `now`
    pub fn take_due(&mut self, now: Instant) -> Vec<String> {
        let mut ready = Vec::new();
        while let Some((_, at)) = self.due.front() {
            if *at > now {
                break;
            }
            if let Some((id, _)) = self.due.pop_front() {
                ready.push(id);
            }
        }
        ready
    }

    pub fn clear(&mut self) {
        self.due.clear();
    }

    pub fn len(&self) -> usize {
        self.due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.due.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn record(id: &str, status: OperationStatus) -> MockOperationRecord {
        MockOperationRecord::new(id.to_string(), "tx", 1.0, "TU", status)
    }

    #[test]
    fn test_log_is_newest_first() {
        let mut log = OperationLog::new(5);
        log.push(record("a", OperationStatus::Success));
        log.push(record("b", OperationStatus::Success));

        assert_eq!(log.latest().unwrap().id, "b");
        let ids: Vec<_> = log.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_log_caps_window() {
        let mut log = OperationLog::new(3);
        for i in 0..10 {
            log.push(record(&format!("r{i}"), OperationStatus::Success));
        }

        assert_eq!(log.len(), 3);
        let ids: Vec<_> = log.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r9", "r8", "r7"]);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut log = OperationLog::new(0);
        log.push(record("a", OperationStatus::Pending));
        log.push(record("b", OperationStatus::Pending));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_settle_keeps_identity() {
        let mut log = OperationLog::default();
        log.push(record("op-1", OperationStatus::Pending));

        assert!(log.settle("op-1", OperationStatus::Success));
        assert_eq!(log.get("op-1").unwrap().status, OperationStatus::Success);
        assert_eq!(log.len(), 1);
        assert!(!log.settle("missing", OperationStatus::Error));
    }

    #[test]
    fn test_clear_and_counts() {
        let mut log = OperationLog::default();
        log.push(record("a", OperationStatus::Success));
        log.push(record("b", OperationStatus::Error));
        log.push(record("c", OperationStatus::Success));

        assert_eq!(log.count_by_status(OperationStatus::Success), 2);
        assert_eq!(log.count_by_status(OperationStatus::Error), 1);
        assert_eq!(log.total_amount("TU"), 2.0);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_simulator_branches_are_forced_by_rate() {
        let mut always = OperationSimulator::seeded(1, 1.0);
        let mut never = OperationSimulator::seeded(1, 0.0);

        for _ in 0..50 {
            assert_eq!(always.simulate("mine", 1.0, "TU").status, OperationStatus::Success);
            assert_eq!(never.simulate("mine", 1.0, "TU").status, OperationStatus::Error);
        }
    }

    #[test]
    fn test_seeded_simulator_is_reproducible() {
        let mut a = OperationSimulator::seeded(99, 0.5);
        let mut b = OperationSimulator::seeded(99, 0.5);

        let outcomes_a: Vec<_> = (0..20).map(|_| a.outcome()).collect();
        let outcomes_b: Vec<_> = (0..20).map(|_| b.outcome()).collect();
        assert_eq!(outcomes_a, outcomes_b);
        assert!(outcomes_a.contains(&OperationStatus::Success));
        assert!(outcomes_a.contains(&OperationStatus::Error));
    }

    #[test]
    fn test_begin_is_pending_with_kind_prefix() {
        let mut sim = OperationSimulator::seeded(3, 0.9);
        let rec = sim.begin("bridge", 2.0, "BTC");

        assert_eq!(rec.status, OperationStatus::Pending);
        assert!(rec.id.starts_with("bridge-"));
        assert_eq!(rec.unit, "BTC");
    }

    #[test]
    fn test_simulator_from_custom_rng() {
        // StepRng(0, 0) always rolls 0.0
        let mut sure = OperationSimulator::from_rng(StepRng::new(0, 0), 0.5);
        let mut never = OperationSimulator::from_rng(StepRng::new(0, 0), 0.0);

        assert_eq!(sure.outcome(), OperationStatus::Success);
        assert_eq!(never.outcome(), OperationStatus::Error);
        assert_eq!(sure.completed("pdf", 3.0, "bytes").status, OperationStatus::Success);
    }

    #[test]
    fn test_pending_record_settles_after_delay() {
        let mut sim = OperationSimulator::seeded(4, 0.0);
        let mut log = OperationLog::default();
        let mut queue = SettleQueue::new(Duration::from_secs(2));
        let start = Instant::now();

        let rec = sim.begin("mine", 1.0, "TU");
        queue.schedule(rec.id.clone(), start);
        log.push(rec.clone());

        assert!(queue.take_due(start + Duration::from_secs(1)).is_empty());
        assert_eq!(log.get(&rec.id).unwrap().status, OperationStatus::Pending);

        let ready = queue.take_due(start + Duration::from_secs(2));
        assert_eq!(ready, vec![rec.id.clone()]);
        for id in ready {
            log.settle(&id, sim.outcome());
        }

        let settled = log.get(&rec.id).unwrap();
        assert_eq!(settled.status, OperationStatus::Error);
        assert_eq!(settled.kind, "mine");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_settle_queue_releases_in_order() {
        let mut queue = SettleQueue::new(Duration::from_millis(100));
        let start = Instant::now();
        queue.schedule("a".to_string(), start);
        queue.schedule("b".to_string(), start + Duration::from_millis(50));
        queue.schedule("c".to_string(), start + Duration::from_millis(500));

        assert_eq!(queue.take_due(start + Duration::from_millis(150)), vec!["a", "b"]);
        assert_eq!(queue.len(), 1);
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_record_serializes_lowercase_status() {
        let rec = record("x", OperationStatus::Error);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }
}
