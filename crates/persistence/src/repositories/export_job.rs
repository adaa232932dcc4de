//! Export job repository for database operations.

use domain::models::export_job::ExportJobsSummary;
use sqlx::PgPool;

use crate::entities::ExportJobEntity;
use crate::metrics::QueryTimer;

const JOB_COLUMNS: &str =
    "log_id, user_id, file_name, file_location, status, created_at, updated_at";

/// Repository for export job database operations.
#[derive(Clone)]
pub struct ExportJobRepository {
    pool: PgPool,
}

impl ExportJobRepository {
    /// Creates a new ExportJobRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an export job, or reset it if the sourcing system announces
    /// the same log id again. Returns `None` when the log id is already
    /// taken by a different owner.
    pub async fn create(
        &self,
        user_id: i64,
        log_id: &str,
        file_name: &str,
    ) -> Result<Option<ExportJobEntity>, sqlx::Error> {
        let timer = QueryTimer::new("create_export_job");
        let result = sqlx::query_as::<_, ExportJobEntity>(&format!(
            r#"
            INSERT INTO export_jobs (log_id, user_id, file_name, status)
            VALUES ($1, $2, $3, 'pending')
            ON CONFLICT (log_id) DO UPDATE SET
                file_name = EXCLUDED.file_name,
                file_location = NULL,
                status = 'pending',
                updated_at = NOW()
            WHERE export_jobs.user_id = EXCLUDED.user_id
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(log_id)
        .bind(user_id)
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find an export job by its log id, scoped to the owner.
    pub async fn find_by_log_id(
        &self,
        user_id: i64,
        log_id: &str,
    ) -> Result<Option<ExportJobEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_export_job");
        let result = sqlx::query_as::<_, ExportJobEntity>(&format!(
            r#"
            SELECT {} FROM export_jobs
            WHERE log_id = $1 AND user_id = $2
            "#,
            JOB_COLUMNS
        ))
        .bind(log_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Recent export jobs for an owner, newest first.
    pub async fn list_recent(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<ExportJobEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_export_jobs");
        let result = sqlx::query_as::<_, ExportJobEntity>(&format!(
            r#"
            SELECT {} FROM export_jobs
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            JOB_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Per-status job counts for an owner.
    pub async fn counts_by_status(&self, user_id: i64) -> Result<ExportJobsSummary, sqlx::Error> {
        let timer = QueryTimer::new("count_export_jobs");
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT status, COUNT(*) FROM export_jobs
            WHERE user_id = $1
            GROUP BY status
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        let mut summary = ExportJobsSummary::default();
        for (status, count) in rows? {
            summary.total += count;
            match status.as_str() {
                "pending" => summary.pending = count,
                "completed" => summary.completed = count,
                "failed" => summary.failed = count,
                _ => {}
            }
        }
        Ok(summary)
    }

    /// Attach the stored file to a job and mark it completed. Failed jobs
    /// stay failed.
    pub async fn set_file(
        &self,
        user_id: i64,
        log_id: &str,
        file_location: &str,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("set_export_job_file");
        let result = sqlx::query(
            r#"
            UPDATE export_jobs
            SET file_location = $3, status = 'completed', updated_at = NOW()
            WHERE log_id = $2 AND user_id = $1 AND status IN ('pending', 'completed')
            "#,
        )
        .bind(user_id)
        .bind(log_id)
        .bind(file_location)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    /// Mark a pending job failed.
    pub async fn mark_failed(&self, user_id: i64, log_id: &str) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("fail_export_job");
        let result = sqlx::query(
            r#"
            UPDATE export_jobs
            SET status = 'failed', updated_at = NOW()
            WHERE log_id = $2 AND user_id = $1 AND status = 'pending'
            "#,
        )
        .bind(user_id)
        .bind(log_id)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    /// Delete a job record. Deleting an absent row is not an error.
    pub async fn delete(&self, user_id: i64, log_id: &str) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_export_job");
        let result = sqlx::query(
            r#"
            DELETE FROM export_jobs
            WHERE log_id = $2 AND user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(log_id)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }
}
