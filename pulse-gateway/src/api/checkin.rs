//! Breath check-in endpoint

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use crate::checkin::{coherence_score, rising_trend_note, BreathCheckIn, BreathResponse, CoachError};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /breath-check-in
///
/// Records the check-in before scoring so it counts toward the trend even
/// when the coaching call fails.
pub async fn breath_check_in(
    State(state): State<AppState>,
    Json(checkin): Json<BreathCheckIn>,
) -> ApiResult<Json<BreathResponse>> {
    if checkin.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id must not be empty".to_string()));
    }

    let coach = state.coach.as_ref().ok_or(CoachError::NotConfigured)?;

    let score = coherence_score(checkin.breath_rate, checkin.hrv);
    let text = checkin.text.clone();
    let history = state.checkins.record(checkin).await;
    let trend = rising_trend_note(&history);

    let message = coach.generate(&text, score, trend).await?;
    info!(coherence_score = score, rising = trend.is_some(), "Breath check-in answered");

    Ok(Json(BreathResponse {
        coherence_score: score,
        message,
    }))
}

pub fn checkin_routes() -> Router<AppState> {
    Router::new().route("/breath-check-in", post(breath_check_in))
}
