use axum::extract::State;
use axum::Json;

use crate::api::AppState;
use crate::domain::PointTotals;
use crate::error::AppError;

pub async fn get_totals(State(state): State<AppState>) -> Result<Json<PointTotals>, AppError> {
    Ok(Json(state.repo.totals().await?))
}

/// Rebuild the running totals from the account table.
pub async fn recompute_totals(
    State(state): State<AppState>,
) -> Result<Json<PointTotals>, AppError> {
    let totals = state.repo.recompute_totals().await?;
    tracing::info!(
        linear = %totals.linear_points,
        boosted = %totals.boosted_points,
        "Point totals recomputed"
    );
    Ok(Json(totals))
}
