//! Shared query parameters for read endpoints

use mentorlink_common::{Error, Result};
use serde::Deserialize;

/// Query parameters taken by the scoped read endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeQuery {
    /// `"STARTYEAR-ENDYEAR"`, e.g. `"2023-2024"`
    pub academic_year: String,
    /// Exact session name, e.g. `"JULY-DECEMBER 2023"`
    pub academic_session: String,
    #[serde(default)]
    pub mentor_id: Option<String>,
    #[serde(default)]
    pub semester: Option<i64>,
    #[serde(default)]
    pub section: Option<String>,
}

impl ScopeQuery {
    pub fn years(&self) -> Result<(i32, i32)> {
        parse_academic_year(&self.academic_year)
    }
}

/// Parse `"2023-2024"` into `(2023, 2024)`
pub fn parse_academic_year(value: &str) -> Result<(i32, i32)> {
    let mut parts = value.splitn(2, '-');
    let start = parts.next().and_then(|p| p.trim().parse::<i32>().ok());
    let end = parts.next().and_then(|p| p.trim().parse::<i32>().ok());
    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(Error::Validation(format!(
            "Invalid academicYear '{}': expected 'STARTYEAR-ENDYEAR'",
            value
        ))),
    }
}
