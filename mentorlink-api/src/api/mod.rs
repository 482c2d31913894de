//! HTTP API handlers for mentorlink-api

pub mod error;
pub mod health;
pub mod meetings;
pub mod mentees;
pub mod mentors;
pub mod params;
pub mod sessions;
pub mod stats;

pub use error::ApiError;
pub use health::health_routes;
