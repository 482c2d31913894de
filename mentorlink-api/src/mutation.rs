//! Mutation Engine
//!
//! Structural edits over the academic record store. Every operation writes
//! at most one document per step; a step is a compare-and-swap mutation of
//! that document (`store::update_year` / `store::update_container`), so
//! concurrent writers to the same document interleave instead of
//! overwriting each other. Steps that touch two logically related rows
//! (current-session flip, mentee row + session assignment cache) are NOT
//! transactional across rows: a crash between steps leaves transient
//! inconsistency rather than silent compensation.

use chrono::Utc;
use futures::future::join_all;
use mentorlink_common::model::{
    validate_semester_number, validate_session_name, normalize_section_name, AssignedMentee,
    Meeting, MeetingNotes, MenteeSummary, MentorAssignment, Section, Semester, Session,
};
use mentorlink_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::store;

/// Inputs for scheduling one meeting
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSpec {
    pub meeting_id: String,
    pub mentee_ids: Vec<String>,
    pub meeting_date: chrono::NaiveDate,
    pub meeting_time: String,
    pub semester: i64,
    pub section: String,
    pub topic: String,
    #[serde(default)]
    pub meeting_type: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub is_online: bool,
}

/// Create a session inside an academic year, creating the year on demand.
///
/// The year row is inserted with set-on-insert semantics: a concurrent
/// second session-add never overwrites the year fields. Fails with
/// `Validation` on a malformed name (no write issued) and `Conflict` when
/// the session name already exists within the year.
pub async fn create_session(
    pool: &SqlitePool,
    start: i32,
    end: i32,
    session_name: &str,
) -> Result<Session> {
    validate_session_name(session_name)?;

    let year = store::upsert_year(pool, start, end).await?;

    // Duplicate check and append are one swap, so two racing creates of
    // different sessions both land and a racing duplicate conflicts
    let session = store::update_year(pool, start, end, |doc| {
        if doc.session_by_name(session_name).is_some() {
            return Err(Error::Conflict(format!(
                "Session '{}' already exists in academic year {}",
                session_name,
                doc.label()
            )));
        }
        let session = Session::new(session_name);
        doc.sessions.push(session.clone());
        Ok(session)
    })
    .await?;

    info!("Created session '{}' in {}", session_name, year.label());
    Ok(session)
}

/// Make one session the current session, store-wide.
///
/// Two-phase: clear `is_current` everywhere, then set it on the target.
/// Each phase is a per-row atomic write; a reader between the phases may
/// observe zero current sessions, but never two. Accepted race.
pub async fn set_current_session(
    pool: &SqlitePool,
    start: i32,
    end: i32,
    session_name: &str,
) -> Result<()> {
    // Validate the target up front so a rejected request leaves the
    // existing current flag untouched. The swap below re-checks under CAS.
    let target = store::find_year(pool, start, end).await?;
    match target.session_by_name(session_name) {
        None => {
            return Err(Error::NotFound(format!("Session '{}' not found", session_name)));
        }
        Some(session) if session.is_archived => {
            return Err(Error::Validation(format!(
                "Session '{}' is archived and cannot be made current",
                session_name
            )));
        }
        Some(_) => {}
    }

    // Phase 1: clear every current flag in the store
    for doc in store::list_years(pool).await? {
        if doc.sessions.iter().any(|s| s.is_current) {
            store::update_year(pool, doc.start_year, doc.end_year, |doc| {
                for session in &mut doc.sessions {
                    session.is_current = false;
                }
                Ok(())
            })
            .await?;
        }
    }

    // Phase 2: set the target
    store::update_year(pool, start, end, |doc| {
        let session = doc
            .session_by_name_mut(session_name)
            .ok_or_else(|| Error::NotFound(format!("Session '{}' not found", session_name)))?;
        if session.is_archived {
            return Err(Error::Validation(format!(
                "Session '{}' is archived and cannot be made current",
                session_name
            )));
        }
        session.is_current = true;
        Ok(())
    })
    .await?;

    info!("Current session is now '{}' ({}-{})", session_name, start, end);
    Ok(())
}

/// Schedule a meeting under a mentor's (year, session) container.
///
/// The container is the canonical owner of the meeting; the year tree's
/// section node only receives the meeting id as a reference. The mentor's
/// `meetings_scheduled` counter is a trailing denormalized write and is
/// not rolled back if it fails.
pub async fn add_meeting(
    pool: &SqlitePool,
    mentor_mujid: &str,
    start: i32,
    end: i32,
    session_name: &str,
    spec: MeetingSpec,
) -> Result<Meeting> {
    if spec.meeting_id.trim().is_empty() {
        return Err(Error::Validation("meetingId must not be empty".to_string()));
    }
    validate_semester_number(spec.semester)?;
    let section_name = normalize_section_name(&spec.section)?;

    // Mentor must exist before any container can be created for it
    store::find_mentor(pool, mentor_mujid).await.map_err(|_| {
        Error::NotFound(format!("Mentor {} not found", mentor_mujid))
    })?;

    // The session must exist in the year tree so the reference has a home
    let year_doc = store::find_year(pool, start, end).await?;
    if year_doc.session_by_name(session_name).is_none() {
        return Err(Error::NotFound(format!(
            "Session '{}' not found in academic year {}-{}",
            session_name, start, end
        )));
    }

    store::upsert_container(pool, mentor_mujid, start, end, session_name).await?;

    let meeting = Meeting {
        meeting_id: spec.meeting_id.clone(),
        mentor_mujid: mentor_mujid.to_string(),
        semester: spec.semester,
        section: section_name.clone(),
        mentee_ids: spec.mentee_ids,
        meeting_date: spec.meeting_date,
        meeting_time: spec.meeting_time,
        notes: MeetingNotes {
            topic: spec.topic,
            meeting_type: spec.meeting_type,
            outcome: None,
            venue: spec.venue,
            is_online: spec.is_online,
            closure_remarks: None,
        },
        scheduled_at: Utc::now(),
        is_report_filled: false,
        attendance: Vec::new(),
    };

    // Duplicate check and append are one swap over the container
    store::update_container(pool, mentor_mujid, start, end, session_name, |container| {
        if container.meeting_by_id(&spec.meeting_id).is_some() {
            return Err(Error::Conflict(format!(
                "Meeting '{}' already exists for mentor {} in this session",
                spec.meeting_id, mentor_mujid
            )));
        }
        container.meetings.push(meeting.clone());
        Ok(())
    })
    .await?;

    // Trailing write 1: record the reference in the year tree
    store::update_year(pool, start, end, |doc| {
        let session = doc
            .session_by_name_mut(session_name)
            .ok_or_else(|| Error::NotFound(format!("Session '{}' not found", session_name)))?;
        let semester = match session.semester_mut(spec.semester) {
            Some(s) => s,
            None => {
                session.semesters.push(Semester {
                    semester_number: spec.semester,
                    sections: Vec::new(),
                });
                session.semesters.last_mut().unwrap()
            }
        };
        let section = match semester.sections.iter_mut().find(|s| s.name == section_name) {
            Some(s) => s,
            None => {
                semester.sections.push(Section {
                    name: section_name.clone(),
                    meeting_ids: Vec::new(),
                });
                semester.sections.last_mut().unwrap()
            }
        };
        section.meeting_ids.push(meeting.meeting_id.clone());
        Ok(())
    })
    .await?;

    // Trailing write 2: denormalized counter; failure leaves the meeting
    // in place and the counter stale (recount endpoint repairs it)
    if let Err(e) = store::bump_meetings_scheduled(pool, mentor_mujid).await {
        warn!(
            "Meeting {} stored but meetings_scheduled bump failed for {}: {}",
            meeting.meeting_id, mentor_mujid, e
        );
    }

    info!(
        "Scheduled meeting {} for mentor {} in '{}'",
        meeting.meeting_id, mentor_mujid, session_name
    );
    Ok(meeting)
}

/// Assign a mentee to a mentor. Unbounded: no capacity check on purpose.
///
/// The mentee row is the source write; the current session's embedded
/// mentor list and the mentor's `assigned_mentees` cache are trailing
/// denormalized writes.
pub async fn assign_mentor(pool: &SqlitePool, mentee_mujid: &str, mentor_mujid: &str) -> Result<()> {
    let mentee = store::find_mentee(pool, mentee_mujid).await?;
    store::find_mentor(pool, mentor_mujid).await?;

    sqlx::query("UPDATE mentees SET mentor_mujid = ? WHERE mujid = ?")
        .bind(mentor_mujid)
        .bind(mentee_mujid)
        .execute(pool)
        .await?;

    // Trailing write: mirror into the current session's assignment list.
    // Concurrent assigns to the same mentor interleave through the swap,
    // so no successful item's summary is lost.
    if let Some(doc) = find_current_year(pool).await? {
        let (start, end) = (doc.start_year, doc.end_year);
        let in_current = store::update_year(pool, start, end, |doc| {
            let session = match doc.sessions.iter_mut().find(|s| s.is_current) {
                Some(s) => s,
                None => return Ok(false),
            };
            let entry = match session
                .mentors
                .iter_mut()
                .find(|m| m.mentor_mujid == mentor_mujid)
            {
                Some(entry) => entry,
                None => {
                    session.mentors.push(MentorAssignment {
                        mentor_mujid: mentor_mujid.to_string(),
                        mentees: Vec::new(),
                    });
                    session.mentors.last_mut().unwrap()
                }
            };
            if !entry.mentees.iter().any(|m| m.mujid == mentee.mujid) {
                entry.mentees.push(MenteeSummary {
                    mujid: mentee.mujid.clone(),
                    name: mentee.name.clone(),
                    email: mentee.email.clone(),
                    semester: mentee.semester,
                });
            }
            Ok(true)
        })
        .await?;

        // Trailing write: mentor's own cache
        if in_current {
            store::update_mentor_assigned_mentees(pool, mentor_mujid, |list| {
                if list.iter().any(|m| m.mujid == mentee.mujid) {
                    return false;
                }
                list.push(AssignedMentee {
                    mujid: mentee.mujid.clone(),
                    start_year: start,
                    end_year: end,
                    semester: mentee.semester,
                });
                true
            })
            .await?;
        }
    }

    info!("Assigned mentee {} to mentor {}", mentee_mujid, mentor_mujid);
    Ok(())
}

/// Unassign a mentee from a mentor. Conditional: succeeds only when the
/// mentee's current mentor equals the given one (optimistic check at the
/// store, a single conditional UPDATE).
pub async fn unassign_mentor(
    pool: &SqlitePool,
    mentee_mujid: &str,
    mentor_mujid: &str,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE mentees SET mentor_mujid = NULL WHERE mujid = ? AND mentor_mujid = ?",
    )
    .bind(mentee_mujid)
    .bind(mentor_mujid)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        // Distinguish a missing mentee from a wrong-mentor condition
        store::find_mentee(pool, mentee_mujid).await?;
        return Err(Error::Validation(format!(
            "Mentee {} is not assigned to mentor {}",
            mentee_mujid, mentor_mujid
        )));
    }

    // Trailing writes: drop from the current session list and mentor cache
    if let Some(doc) = find_current_year(pool).await? {
        store::update_year(pool, doc.start_year, doc.end_year, |doc| {
            if let Some(session) = doc.sessions.iter_mut().find(|s| s.is_current) {
                if let Some(entry) = session
                    .mentors
                    .iter_mut()
                    .find(|m| m.mentor_mujid == mentor_mujid)
                {
                    entry.mentees.retain(|m| m.mujid != mentee_mujid);
                }
            }
            Ok(())
        })
        .await?;
    }
    store::update_mentor_assigned_mentees(pool, mentor_mujid, |list| {
        let before = list.len();
        list.retain(|m| m.mujid != mentee_mujid);
        list.len() != before
    })
    .await?;

    info!("Unassigned mentee {} from mentor {}", mentee_mujid, mentor_mujid);
    Ok(())
}

/// One item of a bulk assignment request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAssignItem {
    pub mentee_mujid: String,
    pub mentor_mujid: String,
}

/// Per-item outcome of a bulk assignment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAssignOutcome {
    pub mentee_mujid: String,
    pub mentor_mujid: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Apply each assignment independently and concurrently. Every item is
/// attempted; failures are reported per item and successes are never
/// rolled back.
pub async fn bulk_assign(pool: &SqlitePool, items: Vec<BulkAssignItem>) -> Vec<BulkAssignOutcome> {
    let futures = items.into_iter().map(|item| async move {
        let result = assign_mentor(pool, &item.mentee_mujid, &item.mentor_mujid).await;
        match result {
            Ok(()) => BulkAssignOutcome {
                mentee_mujid: item.mentee_mujid,
                mentor_mujid: item.mentor_mujid,
                success: true,
                error: None,
            },
            Err(e) => BulkAssignOutcome {
                mentee_mujid: item.mentee_mujid,
                mentor_mujid: item.mentor_mujid,
                success: false,
                error: Some(e.to_string()),
            },
        }
    });
    join_all(futures).await
}

/// Archive a session by its guid. Archived sessions drop out of current
/// listings but stay queryable for history.
pub async fn archive_session(pool: &SqlitePool, session_guid: &str) -> Result<()> {
    for doc in store::list_years(pool).await? {
        if doc.sessions.iter().any(|s| s.guid == session_guid) {
            let name = store::update_year(pool, doc.start_year, doc.end_year, |doc| {
                let session = doc
                    .sessions
                    .iter_mut()
                    .find(|s| s.guid == session_guid)
                    .ok_or_else(|| {
                        Error::NotFound(format!("Session {} not found", session_guid))
                    })?;
                session.is_archived = true;
                session.is_current = false;
                session.archived_at = Some(Utc::now());
                Ok(session.name.clone())
            })
            .await?;
            info!("Archived session '{}'", name);
            return Ok(());
        }
    }
    Err(Error::NotFound(format!("Session {} not found", session_guid)))
}

/// Attendance and closure input for filling a meeting report
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSpec {
    pub present_mujids: Vec<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub closure_remarks: Option<String>,
}

/// Fill in the report of an existing meeting: attendance flags per mentee,
/// outcome and closure remarks. Idempotent over re-submission.
pub async fn fill_report(
    pool: &SqlitePool,
    mentor_mujid: &str,
    start: i32,
    end: i32,
    session_name: &str,
    meeting_id: &str,
    spec: ReportSpec,
) -> Result<Meeting> {
    store::update_container(pool, mentor_mujid, start, end, session_name, |container| {
        let meeting = container
            .meeting_by_id_mut(meeting_id)
            .ok_or_else(|| Error::NotFound(format!("Meeting {} not found", meeting_id)))?;

        meeting.is_report_filled = true;
        meeting.notes.outcome = spec.outcome.clone();
        meeting.notes.closure_remarks = spec.closure_remarks.clone();
        meeting.attendance = meeting
            .mentee_ids
            .iter()
            .map(|id| mentorlink_common::model::Attendance {
                mujid: id.clone(),
                is_present: spec.present_mujids.contains(id),
            })
            .collect();

        Ok(meeting.clone())
    })
    .await
}

/// Recompute a mentor's `meetings_scheduled` counter from its containers.
/// The counter is a derived view; this is its repair job.
pub async fn recount_meetings_scheduled(pool: &SqlitePool, mentor_mujid: &str) -> Result<i64> {
    store::find_mentor(pool, mentor_mujid).await?;

    let containers = store::containers_for_mentor(pool, mentor_mujid).await?;
    let total = containers.iter().map(|c| c.meetings.len() as i64).sum();

    store::set_meetings_scheduled(pool, mentor_mujid, total).await?;
    info!("Recounted meetings for {}: {}", mentor_mujid, total);
    Ok(total)
}

/// Year document containing the current session, if any
async fn find_current_year(
    pool: &SqlitePool,
) -> Result<Option<mentorlink_common::model::AcademicYearDoc>> {
    Ok(store::list_years(pool)
        .await?
        .into_iter()
        .find(|doc| doc.sessions.iter().any(|s| s.is_current)))
}
