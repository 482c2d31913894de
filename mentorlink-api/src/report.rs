//! Report Assembler
//!
//! Joins one resolved meeting with full mentee detail records. The two
//! lookup stages fail distinctly: a missing container means the session
//! identifier was wrong for that mentor, a missing meeting id means the
//! session exists but the meeting does not.

use mentorlink_common::model::{Meeting, Mentee};
use mentorlink_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::store;

/// Assembled meeting report payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingReport {
    pub meeting: Meeting,
    pub mentee_details: Vec<Mentee>,
}

/// Resolve a meeting and join in its mentees' full detail rows.
pub async fn meeting_report(
    pool: &SqlitePool,
    mentor_mujid: &str,
    meeting_id: &str,
    start: i32,
    end: i32,
    session_name: &str,
) -> Result<MeetingReport> {
    let container = store::find_container(pool, mentor_mujid, start, end, session_name)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "Session '{}' not found for mentor {} in {}-{}",
                session_name, mentor_mujid, start, end
            ))
        })?;

    let meeting = container
        .meeting_by_id(meeting_id)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("Meeting {} not found", meeting_id)))?;

    let mentee_details = store::mentees_by_ids(pool, &meeting.mentee_ids).await?;

    Ok(MeetingReport { meeting, mentee_details })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{self, MeetingSpec};
    use mentorlink_common::db::init_memory_database;
    use mentorlink_common::model::{Mentee, Mentor, MentorRole};

    const SESSION: &str = "JULY-DECEMBER 2023";

    async fn seed(pool: &SqlitePool) {
        store::insert_mentor(
            pool,
            &Mentor {
                mujid: "M1".into(),
                name: "Dr. Rao".into(),
                email: "rao@muj.edu".into(),
                phone: None,
                role: MentorRole::Mentor,
                meetings_scheduled: 0,
                assigned_mentees: vec![],
            },
        )
        .await
        .unwrap();
        for (id, name) in [("A1", "Asha"), ("A2", "Arjun")] {
            store::insert_mentee(
                pool,
                &Mentee {
                    mujid: id.into(),
                    name: name.into(),
                    email: format!("{}@muj.edu", id.to_lowercase()),
                    phone: None,
                    mentor_mujid: None,
                    semester: 3,
                    section: "A".into(),
                },
            )
            .await
            .unwrap();
        }
        mutation::create_session(pool, 2023, 2024, SESSION).await.unwrap();
        mutation::add_meeting(
            pool,
            "M1",
            2023,
            2024,
            SESSION,
            MeetingSpec {
                meeting_id: "mt-1".into(),
                mentee_ids: vec!["A1".into(), "A2".into(), "GONE".into()],
                meeting_date: chrono::NaiveDate::from_ymd_opt(2023, 9, 1).unwrap(),
                meeting_time: "10:00".into(),
                semester: 3,
                section: "A".into(),
                topic: "Kickoff".into(),
                meeting_type: None,
                venue: None,
                is_online: true,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_report_joins_mentee_details() {
        let pool = init_memory_database().await.unwrap();
        seed(&pool).await;

        let report = meeting_report(&pool, "M1", "mt-1", 2023, 2024, SESSION).await.unwrap();
        assert_eq!(report.meeting.meeting_id, "mt-1");
        // The id with no mentee row is skipped, not an error
        assert_eq!(report.mentee_details.len(), 2);
        assert_eq!(report.mentee_details[0].mujid, "A1");
    }

    #[tokio::test]
    async fn test_report_wrong_session_is_session_not_found() {
        let pool = init_memory_database().await.unwrap();
        seed(&pool).await;

        let err = meeting_report(&pool, "M1", "mt-1", 2023, 2024, "JANUARY-JUNE 2024")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Session"));
    }

    #[tokio::test]
    async fn test_report_missing_meeting_is_meeting_not_found() {
        let pool = init_memory_database().await.unwrap();
        seed(&pool).await;

        let err = meeting_report(&pool, "M1", "mt-404", 2023, 2024, SESSION)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Meeting"));
    }
}
