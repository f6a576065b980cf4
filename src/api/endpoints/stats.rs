use axum::extract::{Path, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StatsResponse};

/// `GET /api/owners/:owner_id/stats`: computed from current rows.
pub async fn owner_stats(
    State(ctx): State<ApiContext>,
    Path(owner_id): Path<String>,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = ctx.core.documents().stats(&owner_id)?;
    Ok(Json(StatsResponse {
        owner_id,
        verified_count: stats.verified_count,
        pending_or_failed_count: stats.pending_or_failed_count,
        approx_storage_used: stats.approx_storage_used,
    }))
}
