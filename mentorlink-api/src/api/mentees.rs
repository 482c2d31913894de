//! Mentee endpoints: registration, listing, assignment

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::api::params::ScopeQuery;
use crate::mutation::{BulkAssignItem, BulkAssignOutcome};
use crate::{aggregate, mutation, store, AppState};
use mentorlink_common::model::{normalize_section_name, validate_semester_number, Mentee};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMenteeRequest {
    pub mujid: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub semester: i64,
    pub section: String,
}

/// POST /api/mentees
///
/// Register a mentee row, unassigned until a mentor is set.
pub async fn register_mentee(
    State(state): State<AppState>,
    Json(request): Json<RegisterMenteeRequest>,
) -> Result<Json<Mentee>, ApiError> {
    if request.mujid.trim().is_empty() || request.email.trim().is_empty() {
        return Err(mentorlink_common::Error::Validation(
            "mujid and email are required".to_string(),
        )
        .into());
    }
    validate_semester_number(request.semester)?;
    let section = normalize_section_name(&request.section)?;

    let mentee = Mentee {
        mujid: request.mujid,
        name: request.name,
        email: request.email,
        phone: request.phone,
        mentor_mujid: None,
        semester: request.semester,
        section,
    };
    store::insert_mentee(&state.db, &mentee).await?;
    Ok(Json(mentee))
}

/// GET /api/mentees/:mujid
pub async fn get_mentee(
    State(state): State<AppState>,
    Path(mujid): Path<String>,
) -> Result<Json<Mentee>, ApiError> {
    let mentee = store::find_mentee(&state.db, &mujid).await?;
    Ok(Json(mentee))
}

/// GET /api/mentees?academicYear=...&academicSession=...
///
/// Mentees assigned in the scope, via the session's embedded mentor list,
/// sorted by mentee name.
pub async fn list_mentees(
    State(state): State<AppState>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<aggregate::Listing<aggregate::MenteeRow>>, ApiError> {
    let (start, end) = query.years()?;
    let listing = aggregate::mentees_listing(
        &state.db,
        start,
        end,
        &query.academic_session,
        query.semester,
        query.mentor_id.as_deref(),
    )
    .await?;
    Ok(Json(listing))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub mentee_mujid: String,
    pub mentor_mujid: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkAssignRequest {
    pub assignments: Vec<BulkAssignItem>,
}

/// POST /api/mentees/assign
pub async fn assign_mentor(
    State(state): State<AppState>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<Value>, ApiError> {
    mutation::assign_mentor(&state.db, &request.mentee_mujid, &request.mentor_mujid).await?;
    Ok(Json(json!({ "status": "assigned" })))
}

/// POST /api/mentees/unassign
///
/// Conditional: only succeeds when the mentee is currently assigned to
/// the given mentor.
pub async fn unassign_mentor(
    State(state): State<AppState>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<Value>, ApiError> {
    mutation::unassign_mentor(&state.db, &request.mentee_mujid, &request.mentor_mujid).await?;
    Ok(Json(json!({ "status": "unassigned" })))
}

/// POST /api/mentees/assign/bulk
///
/// Every item is attempted; the response carries per-item outcomes.
/// Overall status is 200 only when all items succeeded, 400 otherwise
/// (successes are not rolled back).
pub async fn bulk_assign(
    State(state): State<AppState>,
    Json(request): Json<BulkAssignRequest>,
) -> Response {
    let outcomes: Vec<BulkAssignOutcome> =
        mutation::bulk_assign(&state.db, request.assignments).await;

    let all_succeeded = outcomes.iter().all(|o| o.success);
    let status = if all_succeeded {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    (status, Json(json!({ "results": outcomes }))).into_response()
}
