//! Coherence scoring
//!
//! Optimal breath rate is centred on 16/min (zero credit at ±10); HRV earns
//! full credit at 100 ms. Both halves weigh equally.

const OPTIMAL_BREATH_RATE: f64 = 16.0;
const BREATH_RATE_SPAN: f64 = 10.0;
const FULL_CREDIT_HRV: f64 = 100.0;

/// Coherence score in `[0, 100]`, rounded to two decimals
pub fn coherence_score(breath_rate: i64, hrv: i64) -> f64 {
    let breath = (1.0 - (breath_rate as f64 - OPTIMAL_BREATH_RATE).abs() / BREATH_RATE_SPAN).max(0.0);
    let hrv = (hrv as f64 / FULL_CREDIT_HRV).clamp(0.0, 1.0);
    let score = (0.5 * breath + 0.5 * hrv) * 100.0;
    (score * 100.0).round() / 100.0
}
