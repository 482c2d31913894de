//! Meeting endpoints: scheduling, listing, report filling and assembly

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::params::{parse_academic_year, ScopeQuery};
use crate::{aggregate, mutation, report, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMeetingRequest {
    pub mentor_id: String,
    pub academic_year: String,
    pub academic_session: String,
    #[serde(flatten)]
    pub meeting: mutation::MeetingSpec,
}

/// POST /api/meetings
///
/// Schedule a meeting under the mentor's container for the scope. The
/// caller supplies the unique meeting id.
pub async fn schedule_meeting(
    State(state): State<AppState>,
    Json(request): Json<ScheduleMeetingRequest>,
) -> Result<Json<mentorlink_common::model::Meeting>, ApiError> {
    let (start, end) = parse_academic_year(&request.academic_year)?;
    let meeting = mutation::add_meeting(
        &state.db,
        &request.mentor_id,
        start,
        end,
        &request.academic_session,
        request.meeting,
    )
    .await?;
    Ok(Json(meeting))
}

/// GET /api/meetings?academicYear=2023-2024&academicSession=JULY-DECEMBER%202023
///
/// Flattened meetings listing for the scope, newest first, with serials.
pub async fn list_meetings(
    State(state): State<AppState>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<aggregate::Listing<aggregate::MeetingRow>>, ApiError> {
    let (start, end) = query.years()?;
    let listing = aggregate::meetings_listing(
        &state.db,
        start,
        end,
        &query.academic_session,
        query.mentor_id.as_deref(),
        query.section.as_deref(),
        query.semester,
    )
    .await?;
    Ok(Json(listing))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportScope {
    pub academic_year: String,
    pub academic_session: String,
    pub mentor_id: String,
    pub meeting_id: String,
}

/// GET /api/meetings/report
///
/// Assembled report payload for one meeting: the meeting record joined
/// with full mentee details.
pub async fn get_meeting_report(
    State(state): State<AppState>,
    Query(query): Query<ReportScope>,
) -> Result<Json<report::MeetingReport>, ApiError> {
    let (start, end) = parse_academic_year(&query.academic_year)?;
    let payload = report::meeting_report(
        &state.db,
        &query.mentor_id,
        &query.meeting_id,
        start,
        end,
        &query.academic_session,
    )
    .await?;
    Ok(Json(payload))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillReportRequest {
    pub academic_year: String,
    pub academic_session: String,
    pub mentor_id: String,
    pub meeting_id: String,
    #[serde(flatten)]
    pub report: mutation::ReportSpec,
}

/// POST /api/meetings/report
///
/// Fill in attendance and closure details for a scheduled meeting.
pub async fn fill_meeting_report(
    State(state): State<AppState>,
    Json(request): Json<FillReportRequest>,
) -> Result<Json<mentorlink_common::model::Meeting>, ApiError> {
    let (start, end) = parse_academic_year(&request.academic_year)?;
    let meeting = mutation::fill_report(
        &state.db,
        &request.mentor_id,
        start,
        end,
        &request.academic_session,
        &request.meeting_id,
        request.report,
    )
    .await?;
    Ok(Json(meeting))
}
