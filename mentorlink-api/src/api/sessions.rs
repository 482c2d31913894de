//! Session management endpoints: create, list, set-current, archive

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::api::params::parse_academic_year;
use crate::{mutation, store, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// `"STARTYEAR-ENDYEAR"`
    pub academic_year: String,
    /// `"JULY-DECEMBER YYYY"` or `"JANUARY-JUNE YYYY"`
    pub session_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub guid: String,
    pub name: String,
    pub is_current: bool,
    pub is_archived: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSummary {
    pub academic_year: String,
    pub sessions: Vec<SessionSummary>,
}

/// POST /api/sessions
///
/// Create a session inside an academic year; the year is created on
/// demand with find-or-create semantics.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionSummary>, ApiError> {
    let (start, end) = parse_academic_year(&request.academic_year)?;
    let session = mutation::create_session(&state.db, start, end, &request.session_name).await?;
    Ok(Json(SessionSummary {
        guid: session.guid,
        name: session.name,
        is_current: session.is_current,
        is_archived: session.is_archived,
    }))
}

/// GET /api/sessions
///
/// All academic years and their sessions, oldest year first.
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<YearSummary>>, ApiError> {
    let years = store::list_years(&state.db).await?;
    let out = years
        .into_iter()
        .map(|doc| YearSummary {
            academic_year: doc.label(),
            sessions: doc
                .sessions
                .iter()
                .map(|s| SessionSummary {
                    guid: s.guid.clone(),
                    name: s.name.clone(),
                    is_current: s.is_current,
                    is_archived: s.is_archived,
                })
                .collect(),
        })
        .collect();
    Ok(Json(out))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCurrentRequest {
    pub academic_year: String,
    pub session_name: String,
}

/// POST /api/sessions/current
///
/// Flip the store-wide current-session pointer to the named session.
pub async fn set_current_session(
    State(state): State<AppState>,
    Json(request): Json<SetCurrentRequest>,
) -> Result<Json<Value>, ApiError> {
    let (start, end) = parse_academic_year(&request.academic_year)?;
    mutation::set_current_session(&state.db, start, end, &request.session_name).await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// POST /api/sessions/:guid/archive
pub async fn archive_session(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    mutation::archive_session(&state.db, &guid).await?;
    Ok(Json(json!({ "status": "archived" })))
}
