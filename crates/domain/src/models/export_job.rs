//! Export job domain models.
//!
//! An export job tracks one sourcing run: the external system announces the
//! job, later attaches the produced CSV export, and operators review its rows
//! until the file empties and the job record is deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

/// Status of an export job as reported by the sourcing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportJobStatus {
    Pending,
    Completed,
    Failed,
}

impl ExportJobStatus {
    /// Database representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportJobStatus::Pending => "pending",
            ExportJobStatus::Completed => "completed",
            ExportJobStatus::Failed => "failed",
        }
    }
}

impl FromStr for ExportJobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ExportJobStatus::Pending),
            "completed" => Ok(ExportJobStatus::Completed),
            "failed" => Ok(ExportJobStatus::Failed),
            _ => Err(format!("Unknown export job status: {}", s)),
        }
    }
}

impl std::fmt::Display for ExportJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An export job row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    /// External sourcing-job identifier, primary key.
    pub log_id: String,
    pub user_id: i64,
    pub file_name: String,
    /// Relative location of the stored export, set once the file landed.
    pub file_location: Option<String>,
    pub status: ExportJobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request announcing a new sourcing job.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExportJobRequest {
    #[validate(length(min = 1, max = 64, message = "logId must be 1-64 characters"))]
    #[validate(custom(function = "validate_log_id"))]
    pub log_id: String,

    #[validate(length(min = 1, max = 255, message = "fileName must be 1-255 characters"))]
    pub file_name: String,
}

/// Request marking a sourcing job as failed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailExportJobRequest {
    pub reason: Option<String>,
}

/// Per-status counts shown alongside job listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJobsSummary {
    pub total: i64,
    pub pending: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Query parameters for the export job listing.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListExportJobsQuery {
    #[serde(default = "default_jobs_limit")]
    #[validate(range(min = 1, max = 200, message = "limit must be between 1 and 200"))]
    pub limit: i64,
}

fn default_jobs_limit() -> i64 {
    50
}

/// Response for the export job listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExportJobsResponse {
    pub jobs: Vec<ExportJob>,
    pub summary: ExportJobsSummary,
}

/// Response after storing an export file for a job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreExportFileResponse {
    pub log_id: String,
    pub file_location: String,
    /// SHA-256 of the stored bytes, for the uploader to verify against.
    pub checksum: String,
}

/// One reviewable row decoded from a stored export file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFileLead {
    pub temp_id: u32,
    pub name: Option<String>,
    pub email: Option<String>,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    pub job_title: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub country_name: Option<String>,
    pub state_name: Option<String>,
}

/// Decoded listing of a job's current export file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFileLeadsResponse {
    pub log_id: String,
    pub records: Vec<ExportFileLead>,
    /// All data lines in the file, including skipped ones.
    pub total_rows: u32,
    pub skipped_rows: u32,
}

/// Validate log id format: the id names the stored file on disk, so it must
/// never contain path separators or dots.
fn validate_log_id(log_id: &str) -> Result<(), validator::ValidationError> {
    if LOG_ID_REGEX.is_match(log_id) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("log_id_format")
            .with_message(std::borrow::Cow::Borrowed(
                "logId may only contain alphanumeric characters, hyphens, and underscores",
            )))
    }
}

lazy_static::lazy_static! {
    pub static ref LOG_ID_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap();
}
