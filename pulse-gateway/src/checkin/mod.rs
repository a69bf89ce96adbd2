//! Breath check-in
//!
//! Scores a check-in, tracks the last few per user to detect a rising
//! breath-rate trend, and asks the coaching collaborator for a reply.

pub mod coach;
pub mod history;
pub mod scoring;

use serde::{Deserialize, Serialize};

pub use coach::{CoachClient, CoachError};
pub use history::CheckinHistory;
pub use scoring::coherence_score;

/// Check-ins kept per user for trend detection
pub const HISTORY_CAPACITY: usize = 3;

pub const RISING_TREND_NOTE: &str =
    "User's breath rate has been rising over the last 3 check-ins.";

/// POST /breath-check-in request
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BreathCheckIn {
    pub user_id: String,
    pub text: String,
    pub breath_rate: i64,
    pub hrv: i64,
}

/// POST /breath-check-in response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreathResponse {
    pub coherence_score: f64,
    pub message: String,
}

/// Trend note when a full history shows strictly rising breath rates
pub fn rising_trend_note(history: &[BreathCheckIn]) -> Option<&'static str> {
    if history.len() < HISTORY_CAPACITY {
        return None;
    }
    history
        .windows(2)
        .all(|pair| pair[0].breath_rate < pair[1].breath_rate)
        .then_some(RISING_TREND_NOTE)
}
