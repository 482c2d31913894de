//! # MentorLink Common Library
//!
//! Shared code for the MentorLink service:
//! - Domain models (academic year documents, meetings, mentors, mentees)
//! - Database initialization and schema
//! - Error taxonomy
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod model;

pub use error::{Error, Result};
