//! Mentor endpoints: registration, listing, semester grouping, recount

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::api::params::ScopeQuery;
use crate::{aggregate, mutation, store, AppState};
use mentorlink_common::model::{Mentor, MentorRole};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMentorRequest {
    pub mujid: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<MentorRole>,
}

/// POST /api/mentors
///
/// Register a mentor row. MUJid and email are unique; duplicates conflict.
pub async fn register_mentor(
    State(state): State<AppState>,
    Json(request): Json<RegisterMentorRequest>,
) -> Result<Json<Mentor>, ApiError> {
    if request.mujid.trim().is_empty() || request.email.trim().is_empty() {
        return Err(mentorlink_common::Error::Validation(
            "mujid and email are required".to_string(),
        )
        .into());
    }
    let mentor = Mentor {
        mujid: request.mujid,
        name: request.name,
        email: request.email,
        phone: request.phone,
        role: request.role.unwrap_or_default(),
        meetings_scheduled: 0,
        assigned_mentees: Vec::new(),
    };
    store::insert_mentor(&state.db, &mentor).await?;
    Ok(Json(mentor))
}

/// GET /api/mentors/:mujid
pub async fn get_mentor(
    State(state): State<AppState>,
    Path(mujid): Path<String>,
) -> Result<Json<Mentor>, ApiError> {
    let mentor = store::find_mentor(&state.db, &mujid).await?;
    Ok(Json(mentor))
}

/// GET /api/mentors?academicYear=...&academicSession=...
///
/// Mentors with at least one meeting in the scope, with their distinct
/// mentee sets.
pub async fn list_mentors(
    State(state): State<AppState>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<aggregate::Listing<aggregate::MentorRow>>, ApiError> {
    let (start, end) = query.years()?;
    let listing =
        aggregate::mentors_listing(&state.db, start, end, &query.academic_session).await?;
    Ok(Json(listing))
}

/// GET /api/mentors/:mujid/semester-counts
///
/// The mentor's mentees grouped by semester, numerically ordered.
pub async fn semester_counts(
    State(state): State<AppState>,
    Path(mujid): Path<String>,
) -> Result<Json<Vec<aggregate::SemesterCount>>, ApiError> {
    store::find_mentor(&state.db, &mujid).await?;
    let counts = aggregate::semester_counts(&state.db, &mujid).await?;
    Ok(Json(counts))
}

/// POST /api/mentors/:mujid/recount
///
/// Recompute the denormalized meetings_scheduled counter.
pub async fn recount_meetings(
    State(state): State<AppState>,
    Path(mujid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let total = mutation::recount_meetings_scheduled(&state.db, &mujid).await?;
    Ok(Json(json!({ "mujid": mujid, "meetingsScheduled": total })))
}
