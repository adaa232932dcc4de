//! Export job entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::export_job::{ExportJob, ExportJobStatus};
use sqlx::FromRow;

/// Database row mapping for the export_jobs table.
#[derive(Debug, Clone, FromRow)]
pub struct ExportJobEntity {
    pub log_id: String,
    pub user_id: i64,
    pub file_name: String,
    pub file_location: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ExportJobEntity> for ExportJob {
    fn from(entity: ExportJobEntity) -> Self {
        let status = entity
            .status
            .parse::<ExportJobStatus>()
            .unwrap_or(ExportJobStatus::Pending);
        Self {
            log_id: entity.log_id,
            user_id: entity.user_id,
            file_name: entity.file_name,
            file_location: entity.file_location,
            status,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
