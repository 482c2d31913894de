//! mentorlink-api library - mentoring program record service
//!
//! Owns the nested academic-record documents (year -> sessions ->
//! semesters -> sections) and the per-mentor meeting containers, and
//! exposes the mutation, aggregation and report operations over HTTP.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod aggregate;
pub mod api;
pub mod mutation;
pub mod report;
pub mod store;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let api_routes = Router::new()
        // Sessions
        .route(
            "/api/sessions",
            post(api::sessions::create_session).get(api::sessions::list_sessions),
        )
        .route("/api/sessions/current", post(api::sessions::set_current_session))
        .route("/api/sessions/:guid/archive", post(api::sessions::archive_session))
        // Meetings
        .route(
            "/api/meetings",
            post(api::meetings::schedule_meeting).get(api::meetings::list_meetings),
        )
        .route(
            "/api/meetings/report",
            get(api::meetings::get_meeting_report).post(api::meetings::fill_meeting_report),
        )
        // Mentors
        .route(
            "/api/mentors",
            post(api::mentors::register_mentor).get(api::mentors::list_mentors),
        )
        .route("/api/mentors/:mujid", get(api::mentors::get_mentor))
        .route("/api/mentors/:mujid/semester-counts", get(api::mentors::semester_counts))
        .route("/api/mentors/:mujid/recount", post(api::mentors::recount_meetings))
        // Mentees
        .route(
            "/api/mentees",
            post(api::mentees::register_mentee).get(api::mentees::list_mentees),
        )
        .route("/api/mentees/:mujid", get(api::mentees::get_mentee))
        .route("/api/mentees/assign", post(api::mentees::assign_mentor))
        .route("/api/mentees/unassign", post(api::mentees::unassign_mentor))
        .route("/api/mentees/assign/bulk", post(api::mentees::bulk_assign))
        // Stats
        .route("/api/stats", get(api::stats::get_stats));

    Router::new()
        .merge(api_routes)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
