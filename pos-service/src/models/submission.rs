//! Submission log model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Terminal result of a submission attempt sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Success,
    Error,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Success => "SUCCESS",
            SubmissionStatus::Error => "ERROR",
        }
    }

}

/// One durable outcome per invoice number.
///
/// `response_payload` is the authority body when it parsed as JSON, or a JSON
/// string wrapping the raw text when it did not.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubmissionRecord {
    pub invoice_number: String,
    pub status: String,
    pub response_payload: serde_json::Value,
    pub submitted_utc: DateTime<Utc>,
}
