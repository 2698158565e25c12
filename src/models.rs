use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PLACEHOLDER_TITLE: &str = "Actuarial Position";
pub const PLACEHOLDER_COMPANY: &str = "Unknown Company";
pub const PLACEHOLDER_LOCATION: &str = "Location Not Specified";
pub const DEFAULT_JOB_TYPE: &str = "Full-time";

/// Accepted values for `job_type`, both on extraction and API input.
pub const JOB_TYPES: &[&str] = &["Full-time", "Part-time", "Contract", "Internship"];

/// One scraped posting. Built once per detected element (or per mined title),
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    pub location: String,
    pub posting_date: DateTime<Utc>,
    pub job_type: String,
    pub tags: Vec<String>,
    pub description: String,
    pub url: String,
}

impl JobRecord {
    pub fn empty() -> Self {
        Self {
            title: String::new(),
            company: String::new(),
            location: String::new(),
            posting_date: Utc::now(),
            job_type: DEFAULT_JOB_TYPE.to_string(),
            tags: Vec::new(),
            description: String::new(),
            url: String::new(),
        }
    }
}

/// A persisted job row, as served by the CRUD API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredJob {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub posting_date: String,
    pub job_type: String,
    pub tags: Vec<String>,
    pub description: String,
    pub url: String,
}

/// Truncate to at most `max` characters (not bytes), so multi-byte text
/// never panics a slice.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
