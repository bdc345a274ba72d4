use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::AppState;
use crate::domain::{LedgerEvent, TimeMs};
use crate::error::AppError;
use crate::orchestration::{EventOutcome, SweepOutcome};

/// Deliver one typed event to the dispatcher.
pub async fn post_event(
    State(state): State<AppState>,
    Json(event): Json<LedgerEvent>,
) -> Result<Json<EventOutcome>, AppError> {
    let outcome = state.dispatcher.dispatch(&event).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepQuery {
    /// Settlement time in ms; defaults to wall-clock now.
    pub now_ms: Option<i64>,
}

/// Trigger a sweep outside the regular cadence.
pub async fn post_sweep(
    Query(params): Query<SweepQuery>,
    State(state): State<AppState>,
) -> Result<Json<SweepOutcome>, AppError> {
    let now = params.now_ms.map(TimeMs::new).unwrap_or_else(TimeMs::now);
    if now.as_ms() < 0 {
        return Err(AppError::BadRequest("nowMs must be >= 0".into()));
    }
    let outcome = state.dispatcher.tick(now).await?;
    Ok(Json(outcome))
}
