//! Undo-window expiry job.
//!
//! Reviewed leads stay undoable (and visible in the recent-reviews ledger)
//! while their `reviewed_at` is within the undo window. This job clears the
//! timestamp on rows that have aged out, which is what actually closes the
//! window.

use sqlx::PgPool;
use tracing::info;

use super::scheduler::{Job, JobFrequency};

/// Scheduled job that closes expired undo windows.
pub struct ReviewPurgeJob {
    pool: PgPool,
    undo_window_hours: u32,
    interval_minutes: u64,
    batch_size: i64,
}

impl ReviewPurgeJob {
    /// Create a new purge job.
    ///
    /// # Arguments
    /// * `pool` - Database connection pool
    /// * `undo_window_hours` - How long a review stays undoable
    /// * `interval_minutes` - How often the job runs
    pub fn new(pool: PgPool, undo_window_hours: u32, interval_minutes: u64) -> Self {
        Self {
            pool,
            undo_window_hours,
            interval_minutes,
            batch_size: 5_000,
        }
    }

    /// Clear `reviewed_at` on expired rows, in batches to avoid long locks.
    ///
    /// Only rows holding a decision with a non-null `reviewed_at` older than
    /// the window are touched, so a second pass over the same data affects
    /// zero rows.
    async fn close_expired_windows(&self) -> Result<u64, sqlx::Error> {
        let mut total_cleared: u64 = 0;

        loop {
            let result = sqlx::query(
                r#"
                WITH expired AS (
                    SELECT id FROM leads
                    WHERE status IN ('accepted', 'rejected')
                      AND reviewed_at IS NOT NULL
                      AND reviewed_at < NOW() - ($1 || ' hours')::INTERVAL
                    LIMIT $2
                )
                UPDATE leads
                SET reviewed_at = NULL, updated_at = NOW()
                WHERE id IN (SELECT id FROM expired)
                "#,
            )
            .bind(self.undo_window_hours as i32)
            .bind(self.batch_size)
            .execute(&self.pool)
            .await?;

            let cleared = result.rows_affected();
            total_cleared += cleared;

            if cleared < self.batch_size as u64 {
                break;
            }

            // Yield between batches so other queries get pool time.
            tokio::task::yield_now().await;
        }

        Ok(total_cleared)
    }
}

#[async_trait::async_trait]
impl Job for ReviewPurgeJob {
    fn name(&self) -> &'static str {
        "review_purge"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(self.interval_minutes)
    }

    async fn execute(&self) -> Result<(), String> {
        let cleared = self
            .close_expired_windows()
            .await
            .map_err(|e| format!("Failed to close expired undo windows: {}", e))?;

        if cleared > 0 {
            info!(
                cleared,
                undo_window_hours = self.undo_window_hours,
                "Closed expired undo windows"
            );
        }

        Ok(())
    }
}
