//! Domain models for the mentoring program
//!
//! One `AcademicYearDoc` is the canonical nested document per academic year:
//! sessions -> semesters -> sections, with mentor assignment state embedded
//! in each session. Meetings themselves live in per-mentor containers
//! (`MeetingContainer`), one per (mentor, year, session); the section nodes
//! of the year tree hold meeting-id references only, so a meeting has a
//! single owning document and the tree never carries a second copy.
//!
//! Mentor and Mentee are separate top-level entities referenced by MUJid
//! from inside the documents. These are weak references: deleting a mentor
//! never cascades into historical meeting records.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Valid session names: "JULY-DECEMBER 2023" or "JANUARY-JUNE 2024"
static SESSION_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(JULY-DECEMBER|JANUARY-JUNE) \d{4}$").unwrap());

/// Validate a session name against the two allowed patterns
pub fn validate_session_name(name: &str) -> Result<()> {
    if SESSION_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Invalid session name '{}': expected 'JULY-DECEMBER YYYY' or 'JANUARY-JUNE YYYY'",
            name
        )))
    }
}

/// Normalize a section name to its canonical single uppercase letter form
pub fn normalize_section_name(name: &str) -> Result<String> {
    let normalized = name.trim().to_uppercase();
    let mut chars = normalized.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_uppercase() => Ok(normalized),
        _ => Err(Error::Validation(format!(
            "Invalid section '{}': expected a single letter A-Z",
            name
        ))),
    }
}

/// Validate a semester number (1-8)
pub fn validate_semester_number(semester: i64) -> Result<()> {
    if (1..=8).contains(&semester) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Invalid semester {}: expected 1-8",
            semester
        )))
    }
}

/// Root document: one per academic year.
///
/// `start_year`/`end_year` are unique as a pair; `end_year` is always
/// `start_year + 1`. The `sessions` list is kept in insertion order,
/// which is chronological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicYearDoc {
    pub guid: String,
    pub start_year: i32,
    pub end_year: i32,
    pub sessions: Vec<Session>,
}

impl AcademicYearDoc {
    /// Human-readable "2023-2024" label
    pub fn label(&self) -> String {
        format!("{}-{}", self.start_year, self.end_year)
    }

    pub fn session_by_name(&self, name: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.name == name)
    }

    pub fn session_by_name_mut(&mut self, name: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.name == name)
    }
}

/// One half-year session inside an academic year.
///
/// At most one session across the entire store may have `is_current` set.
/// The embedded `mentors` list is the assignment state for the session --
/// a denormalized cache of the mentor<->mentee relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub semesters: Vec<Semester>,
    #[serde(default)]
    pub mentors: Vec<MentorAssignment>,
}

impl Session {
    pub fn new(name: &str) -> Self {
        Self {
            guid: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            is_current: false,
            is_archived: false,
            archived_at: None,
            semesters: Vec::new(),
            mentors: Vec::new(),
        }
    }

    pub fn semester_mut(&mut self, number: i64) -> Option<&mut Semester> {
        self.semesters.iter_mut().find(|s| s.semester_number == number)
    }
}

/// Mentor assignment record embedded in a session: which mentees a mentor
/// carries for that session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorAssignment {
    pub mentor_mujid: String,
    #[serde(default)]
    pub mentees: Vec<MenteeSummary>,
}

/// Compact mentee record embedded under a session's mentor assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenteeSummary {
    pub mujid: String,
    pub name: String,
    pub email: String,
    pub semester: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    pub semester_number: i64,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// A section holds meeting-id references; the meetings themselves live in
/// the owning mentor's container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub name: String,
    #[serde(default)]
    pub meeting_ids: Vec<String>,
}

/// Per-mentor meeting container, one per (mentor, year, session).
/// This is the canonical owner of Meeting records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingContainer {
    pub guid: String,
    pub mentor_mujid: String,
    pub start_year: i32,
    pub end_year: i32,
    pub session_name: String,
    pub meetings: Vec<Meeting>,
}

impl MeetingContainer {
    pub fn meeting_by_id(&self, meeting_id: &str) -> Option<&Meeting> {
        self.meetings.iter().find(|m| m.meeting_id == meeting_id)
    }

    pub fn meeting_by_id_mut(&mut self, meeting_id: &str) -> Option<&mut Meeting> {
        self.meetings.iter_mut().find(|m| m.meeting_id == meeting_id)
    }
}

/// Leaf meeting record. Never hard-deleted; report filling mutates it
/// in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub meeting_id: String,
    pub mentor_mujid: String,
    pub semester: i64,
    pub section: String,
    pub mentee_ids: Vec<String>,
    pub meeting_date: NaiveDate,
    pub meeting_time: String,
    pub notes: MeetingNotes,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub is_report_filled: bool,
    /// Per-mentee attendance, populated when the report is filled
    #[serde(default)]
    pub attendance: Vec<Attendance>,
}

impl Meeting {
    pub fn present_count(&self) -> usize {
        self.attendance.iter().filter(|a| a.is_present).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingNotes {
    pub topic: String,
    #[serde(default)]
    pub meeting_type: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub closure_remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub mujid: String,
    pub is_present: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentorRole {
    Mentor,
    Admin,
    Superadmin,
}

impl Default for MentorRole {
    fn default() -> Self {
        MentorRole::Mentor
    }
}

/// Top-level mentor entity, keyed by MUJid
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mentor {
    pub mujid: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: MentorRole,
    /// Denormalized counter, recomputable from the meeting containers
    #[serde(default)]
    pub meetings_scheduled: i64,
    /// Denormalized assignment cache (mentee id + year + semester tuples)
    #[serde(default)]
    pub assigned_mentees: Vec<AssignedMentee>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedMentee {
    pub mujid: String,
    pub start_year: i32,
    pub end_year: i32,
    pub semester: i64,
}

/// Top-level mentee entity, keyed by MUJid.
/// `mentor_mujid = None` means unassigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mentee {
    pub mujid: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub mentor_mujid: Option<String>,
    pub semester: i64,
    pub section: String,
}
