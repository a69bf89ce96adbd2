//! Per-user check-in history
//!
//! Bounded ring buffer per user; the oldest entry is evicted once
//! [`HISTORY_CAPACITY`](super::HISTORY_CAPACITY) is reached. Held in memory
//! only, so history resets on restart.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{BreathCheckIn, HISTORY_CAPACITY};

#[derive(Debug, Clone)]
pub struct CheckinHistory {
    entries: Arc<RwLock<HashMap<String, VecDeque<BreathCheckIn>>>>,
    capacity: usize,
}

impl Default for CheckinHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl CheckinHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Store a check-in and return the user's history, oldest first
    pub async fn record(&self, checkin: BreathCheckIn) -> Vec<BreathCheckIn> {
        let mut entries = self.entries.write().await;
        let history = entries
            .entry(checkin.user_id.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back(checkin);
        history.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkin(user: &str, rate: i64) -> BreathCheckIn {
        BreathCheckIn {
            user_id: user.to_string(),
            text: String::new(),
            breath_rate: rate,
            hrv: 50,
        }
    }

    #[tokio::test]
    async fn test_oldest_evicted_at_capacity() {
        let history = CheckinHistory::default();
        let mut latest = Vec::new();
        for rate in [10, 11, 12, 13] {
            latest = history.record(checkin("u1", rate)).await;
        }
        let rates: Vec<i64> = latest.iter().map(|c| c.breath_rate).collect();
        assert_eq!(rates, vec![11, 12, 13]);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let history = CheckinHistory::default();
        history.record(checkin("u1", 10)).await;
        let u2 = history.record(checkin("u2", 20)).await;
        assert_eq!(u2.len(), 1);
        let u1 = history.record(checkin("u1", 11)).await;
        let rates: Vec<i64> = u1.iter().map(|c| c.breath_rate).collect();
        assert_eq!(rates, vec![10, 11]);
    }
}
