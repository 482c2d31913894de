//! Session statistics endpoint

use axum::{
    extract::{Query, State},
    Json,
};

use crate::api::error::ApiError;
use crate::api::params::ScopeQuery;
use crate::{aggregate, AppState};

/// GET /api/stats?academicYear=...&academicSession=...
///
/// Mentor/mentee counts from the session's embedded assignment list plus
/// the meeting total from the session tree.
pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<aggregate::SessionStats>, ApiError> {
    let (start, end) = query.years()?;
    let stats = aggregate::session_stats(&state.db, start, end, &query.academic_session).await?;
    Ok(Json(stats))
}
