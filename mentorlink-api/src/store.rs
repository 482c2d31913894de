//! Academic Record Store
//!
//! Owns persistence of the nested academic-year documents and the
//! per-mentor meeting containers, plus lookups of the mentor/mentee
//! entity rows. Each document is one SQLite row whose `doc` column holds
//! the JSON payload. Document mutations go through `update_year` /
//! `update_container`: load, apply the closure, then compare-and-swap the
//! row against the previously loaded body, retrying the whole cycle when
//! a concurrent writer got there first. One committed swap is the
//! per-document atomicity unit the rest of the system assumes.

use mentorlink_common::model::{
    AcademicYearDoc, AssignedMentee, Meeting, MeetingContainer, Mentee, Mentor, MentorRole,
    Session,
};
use mentorlink_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Retry bound for the compare-and-swap document writes. Contention is
/// short-lived (one row per document), so losing this many swaps in a row
/// means something is wrong.
const CAS_MAX_RETRIES: usize = 32;

// ---------------------------------------------------------------------------
// Academic year documents
// ---------------------------------------------------------------------------

fn year_doc_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<AcademicYearDoc> {
    let sessions: Vec<Session> = serde_json::from_str(&row.get::<String, _>("doc"))?;
    Ok(AcademicYearDoc {
        guid: row.get("guid"),
        start_year: row.get("start_year"),
        end_year: row.get("end_year"),
        sessions,
    })
}

/// Find one academic year by its `(start, end)` pair
pub async fn find_year(pool: &SqlitePool, start: i32, end: i32) -> Result<AcademicYearDoc> {
    let row = sqlx::query(
        "SELECT guid, start_year, end_year, doc FROM academic_years
         WHERE start_year = ? AND end_year = ?",
    )
    .bind(start)
    .bind(end)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Academic year {}-{} not found", start, end)))?;

    year_doc_from_row(&row)
}

/// All academic years, oldest first
pub async fn list_years(pool: &SqlitePool) -> Result<Vec<AcademicYearDoc>> {
    let rows = sqlx::query(
        "SELECT guid, start_year, end_year, doc FROM academic_years ORDER BY start_year ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(year_doc_from_row).collect()
}

/// Find-or-create an academic year. Idempotent: a second call for the same
/// pair returns the existing record untouched (year fields are set only on
/// insert, never overwritten).
pub async fn upsert_year(pool: &SqlitePool, start: i32, end: i32) -> Result<AcademicYearDoc> {
    if end != start + 1 {
        return Err(Error::Validation(format!(
            "Invalid academic year {}-{}: end year must be start year + 1",
            start, end
        )));
    }

    sqlx::query(
        "INSERT INTO academic_years (guid, start_year, end_year, doc)
         VALUES (?, ?, ?, '[]')
         ON CONFLICT(start_year, end_year) DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(start)
    .bind(end)
    .execute(pool)
    .await?;

    find_year(pool, start, end).await
}

/// Atomically mutate one year document.
///
/// The closure runs over a freshly loaded copy; the save compares the row
/// against the body that was loaded and the whole load-mutate-save cycle
/// retries when a concurrent writer won the swap. Concurrent mutations of
/// the same year therefore interleave instead of overwriting each other.
/// An `Err` from the closure aborts without writing.
pub async fn update_year<T, F>(pool: &SqlitePool, start: i32, end: i32, mut mutate: F) -> Result<T>
where
    F: FnMut(&mut AcademicYearDoc) -> Result<T>,
{
    for _ in 0..CAS_MAX_RETRIES {
        let row = sqlx::query(
            "SELECT guid, start_year, end_year, doc FROM academic_years
             WHERE start_year = ? AND end_year = ?",
        )
        .bind(start)
        .bind(end)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Academic year {}-{} not found", start, end)))?;

        let previous: String = row.get("doc");
        let mut doc = year_doc_from_row(&row)?;
        let value = mutate(&mut doc)?;

        let payload = serde_json::to_string(&doc.sessions)?;
        let result = sqlx::query("UPDATE academic_years SET doc = ? WHERE guid = ? AND doc = ?")
            .bind(payload)
            .bind(&doc.guid)
            .bind(&previous)
            .execute(pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(value);
        }
        // Lost the swap; reload and reapply
    }
    Err(Error::Internal(format!(
        "Academic year {}-{} update kept losing to concurrent writers",
        start, end
    )))
}

// ---------------------------------------------------------------------------
// Per-mentor meeting containers
// ---------------------------------------------------------------------------

fn container_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<MeetingContainer> {
    let meetings: Vec<Meeting> = serde_json::from_str(&row.get::<String, _>("doc"))?;
    Ok(MeetingContainer {
        guid: row.get("guid"),
        mentor_mujid: row.get("mentor_mujid"),
        start_year: row.get("start_year"),
        end_year: row.get("end_year"),
        session_name: row.get("session_name"),
        meetings,
    })
}

/// Find the meeting container for one (mentor, year, session)
pub async fn find_container(
    pool: &SqlitePool,
    mentor_mujid: &str,
    start: i32,
    end: i32,
    session_name: &str,
) -> Result<Option<MeetingContainer>> {
    let row = sqlx::query(
        "SELECT guid, mentor_mujid, start_year, end_year, session_name, doc
         FROM mentor_meetings
         WHERE mentor_mujid = ? AND start_year = ? AND end_year = ? AND session_name = ?",
    )
    .bind(mentor_mujid)
    .bind(start)
    .bind(end)
    .bind(session_name)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(container_from_row).transpose()
}

/// Find-or-create the meeting container for one (mentor, year, session)
pub async fn upsert_container(
    pool: &SqlitePool,
    mentor_mujid: &str,
    start: i32,
    end: i32,
    session_name: &str,
) -> Result<MeetingContainer> {
    sqlx::query(
        "INSERT INTO mentor_meetings (guid, mentor_mujid, start_year, end_year, session_name, doc)
         VALUES (?, ?, ?, ?, ?, '[]')
         ON CONFLICT(mentor_mujid, start_year, end_year, session_name) DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(mentor_mujid)
    .bind(start)
    .bind(end)
    .bind(session_name)
    .execute(pool)
    .await?;

    find_container(pool, mentor_mujid, start, end, session_name)
        .await?
        .ok_or_else(|| {
            Error::Internal(format!(
                "Meeting container for mentor {} vanished after upsert",
                mentor_mujid
            ))
        })
}

/// All meeting containers in one (year, session) scope
pub async fn containers_for_scope(
    pool: &SqlitePool,
    start: i32,
    end: i32,
    session_name: &str,
) -> Result<Vec<MeetingContainer>> {
    let rows = sqlx::query(
        "SELECT guid, mentor_mujid, start_year, end_year, session_name, doc
         FROM mentor_meetings
         WHERE start_year = ? AND end_year = ? AND session_name = ?
         ORDER BY mentor_mujid ASC",
    )
    .bind(start)
    .bind(end)
    .bind(session_name)
    .fetch_all(pool)
    .await?;

    rows.iter().map(container_from_row).collect()
}

/// All meeting containers belonging to one mentor (any year/session)
pub async fn containers_for_mentor(
    pool: &SqlitePool,
    mentor_mujid: &str,
) -> Result<Vec<MeetingContainer>> {
    let rows = sqlx::query(
        "SELECT guid, mentor_mujid, start_year, end_year, session_name, doc
         FROM mentor_meetings
         WHERE mentor_mujid = ?",
    )
    .bind(mentor_mujid)
    .fetch_all(pool)
    .await?;

    rows.iter().map(container_from_row).collect()
}

/// Atomically mutate one meeting container, compare-and-swap with retry
/// like `update_year`. A missing container is `NotFound` (the session has
/// no record for this mentor).
pub async fn update_container<T, F>(
    pool: &SqlitePool,
    mentor_mujid: &str,
    start: i32,
    end: i32,
    session_name: &str,
    mut mutate: F,
) -> Result<T>
where
    F: FnMut(&mut MeetingContainer) -> Result<T>,
{
    for _ in 0..CAS_MAX_RETRIES {
        let row = sqlx::query(
            "SELECT guid, mentor_mujid, start_year, end_year, session_name, doc
             FROM mentor_meetings
             WHERE mentor_mujid = ? AND start_year = ? AND end_year = ? AND session_name = ?",
        )
        .bind(mentor_mujid)
        .bind(start)
        .bind(end)
        .bind(session_name)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "Session '{}' not found for mentor {}",
                session_name, mentor_mujid
            ))
        })?;

        let previous: String = row.get("doc");
        let mut container = container_from_row(&row)?;
        let value = mutate(&mut container)?;

        let payload = serde_json::to_string(&container.meetings)?;
        let result = sqlx::query("UPDATE mentor_meetings SET doc = ? WHERE guid = ? AND doc = ?")
            .bind(payload)
            .bind(&container.guid)
            .bind(&previous)
            .execute(pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(value);
        }
    }
    Err(Error::Internal(format!(
        "Meeting container for mentor {} kept losing to concurrent writers",
        mentor_mujid
    )))
}

// ---------------------------------------------------------------------------
// Mentor / mentee entity rows
// ---------------------------------------------------------------------------

fn mentor_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Mentor> {
    let role = match row.get::<String, _>("role").as_str() {
        "admin" => MentorRole::Admin,
        "superadmin" => MentorRole::Superadmin,
        _ => MentorRole::Mentor,
    };
    let assigned_mentees = serde_json::from_str(&row.get::<String, _>("assigned_mentees"))?;
    Ok(Mentor {
        mujid: row.get("mujid"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        role,
        meetings_scheduled: row.get("meetings_scheduled"),
        assigned_mentees,
    })
}

fn mentee_from_row(row: &sqlx::sqlite::SqliteRow) -> Mentee {
    Mentee {
        mujid: row.get("mujid"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        mentor_mujid: row.get("mentor_mujid"),
        semester: row.get("semester"),
        section: row.get("section"),
    }
}

pub async fn find_mentor(pool: &SqlitePool, mujid: &str) -> Result<Mentor> {
    let row = sqlx::query(
        "SELECT mujid, name, email, phone, role, meetings_scheduled, assigned_mentees
         FROM mentors WHERE mujid = ?",
    )
    .bind(mujid)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Mentor {} not found", mujid)))?;

    mentor_from_row(&row)
}

/// Mentor rows for a set of ids, keyed by MUJid. Ids with no mentor row
/// are simply absent from the map (weak references, never an error).
pub async fn mentors_by_ids(
    pool: &SqlitePool,
    ids: &[String],
) -> Result<std::collections::HashMap<String, Mentor>> {
    let mut out = std::collections::HashMap::new();
    for id in ids {
        let row = sqlx::query(
            "SELECT mujid, name, email, phone, role, meetings_scheduled, assigned_mentees
             FROM mentors WHERE mujid = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        if let Some(row) = &row {
            let mentor = mentor_from_row(row)?;
            out.insert(mentor.mujid.clone(), mentor);
        }
    }
    Ok(out)
}

pub async fn insert_mentor(pool: &SqlitePool, mentor: &Mentor) -> Result<()> {
    let role = match mentor.role {
        MentorRole::Mentor => "mentor",
        MentorRole::Admin => "admin",
        MentorRole::Superadmin => "superadmin",
    };
    sqlx::query(
        "INSERT INTO mentors (mujid, name, email, phone, role, meetings_scheduled, assigned_mentees)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&mentor.mujid)
    .bind(&mentor.name)
    .bind(&mentor.email)
    .bind(&mentor.phone)
    .bind(role)
    .bind(mentor.meetings_scheduled)
    .bind(serde_json::to_string(&mentor.assigned_mentees)?)
    .execute(pool)
    .await
    .map_err(|e| Error::conflict_on_unique(e, "Mentor with this MUJid or email already exists"))?;
    Ok(())
}

/// Atomically mutate a mentor's `assigned_mentees` cache, compare-and-swap
/// with retry. The closure returns whether it changed the list; an
/// unchanged list skips the write.
pub async fn update_mentor_assigned_mentees<F>(
    pool: &SqlitePool,
    mujid: &str,
    mut mutate: F,
) -> Result<()>
where
    F: FnMut(&mut Vec<AssignedMentee>) -> bool,
{
    for _ in 0..CAS_MAX_RETRIES {
        let row = sqlx::query("SELECT assigned_mentees FROM mentors WHERE mujid = ?")
            .bind(mujid)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Mentor {} not found", mujid)))?;

        let previous: String = row.get("assigned_mentees");
        let mut list: Vec<AssignedMentee> = serde_json::from_str(&previous)?;
        if !mutate(&mut list) {
            return Ok(());
        }

        let result = sqlx::query(
            "UPDATE mentors SET assigned_mentees = ? WHERE mujid = ? AND assigned_mentees = ?",
        )
        .bind(serde_json::to_string(&list)?)
        .bind(mujid)
        .bind(&previous)
        .execute(pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
    }
    Err(Error::Internal(format!(
        "Mentor {} assigned_mentees update kept losing to concurrent writers",
        mujid
    )))
}

pub async fn bump_meetings_scheduled(pool: &SqlitePool, mujid: &str) -> Result<()> {
    sqlx::query("UPDATE mentors SET meetings_scheduled = meetings_scheduled + 1 WHERE mujid = ?")
        .bind(mujid)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_meetings_scheduled(pool: &SqlitePool, mujid: &str, count: i64) -> Result<()> {
    sqlx::query("UPDATE mentors SET meetings_scheduled = ? WHERE mujid = ?")
        .bind(count)
        .bind(mujid)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn find_mentee(pool: &SqlitePool, mujid: &str) -> Result<Mentee> {
    let row = sqlx::query(
        "SELECT mujid, name, email, phone, mentor_mujid, semester, section
         FROM mentees WHERE mujid = ?",
    )
    .bind(mujid)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound("Mentee not found".to_string()))?;

    Ok(mentee_from_row(&row))
}

/// Full mentee rows for a list of ids, preserving input order; missing
/// ids are skipped (historical meeting records may reference mentees that
/// were since removed).
pub async fn mentees_by_ids(pool: &SqlitePool, ids: &[String]) -> Result<Vec<Mentee>> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let row = sqlx::query(
            "SELECT mujid, name, email, phone, mentor_mujid, semester, section
             FROM mentees WHERE mujid = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        if let Some(row) = row {
            out.push(mentee_from_row(&row));
        }
    }
    Ok(out)
}

pub async fn insert_mentee(pool: &SqlitePool, mentee: &Mentee) -> Result<()> {
    sqlx::query(
        "INSERT INTO mentees (mujid, name, email, phone, mentor_mujid, semester, section)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&mentee.mujid)
    .bind(&mentee.name)
    .bind(&mentee.email)
    .bind(&mentee.phone)
    .bind(&mentee.mentor_mujid)
    .bind(mentee.semester)
    .bind(&mentee.section)
    .execute(pool)
    .await
    .map_err(|e| Error::conflict_on_unique(e, "Mentee with this MUJid or email already exists"))?;
    Ok(())
}

/// Mentees currently assigned to a mentor
pub async fn mentees_for_mentor(pool: &SqlitePool, mentor_mujid: &str) -> Result<Vec<Mentee>> {
    let rows = sqlx::query(
        "SELECT mujid, name, email, phone, mentor_mujid, semester, section
         FROM mentees WHERE mentor_mujid = ? ORDER BY name ASC",
    )
    .bind(mentor_mujid)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(mentee_from_row).collect())
}
