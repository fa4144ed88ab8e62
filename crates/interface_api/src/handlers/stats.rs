//! Dashboard statistics

use axum::{extract::State, Json};

use crate::dto::billing::StatsResponse;
use crate::{error::ApiError, AppState};

/// Invoice counts by status and paid revenue per currency
pub async fn billing_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let summary = state.ledger.summary().await?;
    Ok(Json(summary.into()))
}
