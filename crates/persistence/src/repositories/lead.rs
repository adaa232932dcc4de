//! Lead repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::lead::{LeadStatus, NewLead};
use sqlx::PgPool;

use crate::entities::LeadEntity;
use crate::metrics::QueryTimer;

const LEAD_COLUMNS: &str = "id, user_id, name, email, company_name, company_website, job_title, \
                            phone, linkedin_url, country_name, state_name, status, campaign_id, \
                            reviewed_at, accepted_at, created_at, updated_at";

/// Query parameters for the review ledger.
#[derive(Debug, Clone)]
pub struct LedgerQuery {
    pub user_id: i64,
    /// Only rows reviewed after this instant are part of the ledger.
    pub cutoff: DateTime<Utc>,
    pub status: Option<LeadStatus>,
    /// Keyset cursor: rows strictly before this (reviewed_at, id) pair.
    pub cursor: Option<(DateTime<Utc>, i64)>,
    pub limit: i64,
}

/// One page of the review ledger.
#[derive(Debug, Clone)]
pub struct LedgerPage {
    pub leads: Vec<LeadEntity>,
    pub next_cursor: Option<(DateTime<Utc>, i64)>,
}

/// Repository for lead-related database operations.
#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    /// Creates a new LeadRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find the stored lead id owned by `user_id` with the given email.
    pub async fn find_id_by_email(
        &self,
        user_id: i64,
        email: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        let timer = QueryTimer::new("find_lead_by_email");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM leads
            WHERE user_id = $1 AND email = $2
            "#,
        )
        .bind(user_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find one email from `emails` that already belongs to a stored lead
    /// of this owner, if any.
    pub async fn find_any_email(
        &self,
        user_id: i64,
        emails: &[String],
    ) -> Result<Option<String>, sqlx::Error> {
        let timer = QueryTimer::new("find_any_lead_email");
        let result = sqlx::query_scalar::<_, String>(
            r#"
            SELECT email FROM leads
            WHERE user_id = $1 AND email = ANY($2)
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(emails)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Insert a batch of accepted leads inside one transaction. Any failure
    /// rolls the whole batch back.
    pub async fn insert_accepted_batch(&self, leads: &[NewLead]) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("insert_accepted_batch");
        let mut tx = self.pool.begin().await?;

        for lead in leads {
            sqlx::query(
                r#"
                INSERT INTO leads (
                    user_id, name, email, company_name, company_website, job_title,
                    phone, linkedin_url, country_name, state_name, status,
                    campaign_id, reviewed_at, accepted_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(lead.user_id)
            .bind(&lead.name)
            .bind(&lead.email)
            .bind(&lead.company_name)
            .bind(&lead.company_website)
            .bind(&lead.job_title)
            .bind(&lead.phone)
            .bind(&lead.linkedin_url)
            .bind(&lead.country_name)
            .bind(&lead.state_name)
            .bind(lead.status.as_str())
            .bind(&lead.campaign_id)
            .bind(lead.reviewed_at)
            .bind(lead.accepted_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        timer.record();
        Ok(leads.len() as u64)
    }

    /// Insert a single lead, returning its id. Unique violations propagate
    /// so the caller can fall back to an update.
    pub async fn insert(&self, lead: &NewLead) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("insert_lead");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO leads (
                user_id, name, email, company_name, company_website, job_title,
                phone, linkedin_url, country_name, state_name, status,
                campaign_id, reviewed_at, accepted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(lead.user_id)
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(&lead.company_name)
        .bind(&lead.company_website)
        .bind(&lead.job_title)
        .bind(&lead.phone)
        .bind(&lead.linkedin_url)
        .bind(&lead.country_name)
        .bind(&lead.state_name)
        .bind(lead.status.as_str())
        .bind(&lead.campaign_id)
        .bind(lead.reviewed_at)
        .bind(lead.accepted_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Mark an existing lead rejected with the given review timestamp.
    pub async fn mark_rejected(
        &self,
        user_id: i64,
        lead_id: i64,
        reviewed_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("mark_lead_rejected");
        let result = sqlx::query(
            r#"
            UPDATE leads
            SET status = 'rejected', reviewed_at = $3, updated_at = NOW()
            WHERE id = $2 AND user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(lead_id)
        .bind(reviewed_at)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    /// Flip a reviewed lead to `target` and clear its review timestamp.
    ///
    /// Only rows currently accepted or rejected qualify, and a row already
    /// in the target state with no review timestamp matches zero rows, so a
    /// repeated undo reports no change.
    pub async fn undo_review(
        &self,
        user_id: i64,
        lead_id: i64,
        target: LeadStatus,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("undo_lead_review");
        let result = sqlx::query(
            r#"
            UPDATE leads
            SET status = $3, reviewed_at = NULL, updated_at = NOW()
            WHERE id = $2 AND user_id = $1
              AND status IN ('accepted', 'rejected')
              AND (status <> $3 OR reviewed_at IS NOT NULL)
            "#,
        )
        .bind(user_id)
        .bind(lead_id)
        .bind(target.as_str())
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    /// Fetch one page of recently reviewed leads, newest first, with a
    /// keyset cursor for the next page.
    pub async fn recently_reviewed(&self, query: &LedgerQuery) -> Result<LedgerPage, sqlx::Error> {
        let timer = QueryTimer::new("recently_reviewed");

        let mut sql = format!(
            "SELECT {} FROM leads \
             WHERE user_id = $1 \
               AND status IN ('accepted', 'rejected') \
               AND reviewed_at IS NOT NULL \
               AND reviewed_at > $2",
            LEAD_COLUMNS
        );

        // Fetch one extra row to learn whether another page exists.
        let fetch = query.limit + 1;
        let rows = match (query.status, query.cursor) {
            (None, None) => {
                sql.push_str(" ORDER BY reviewed_at DESC, id DESC LIMIT $3");
                sqlx::query_as::<_, LeadEntity>(&sql)
                    .bind(query.user_id)
                    .bind(query.cutoff)
                    .bind(fetch)
                    .fetch_all(&self.pool)
                    .await
            }
            (Some(status), None) => {
                sql.push_str(" AND status = $3 ORDER BY reviewed_at DESC, id DESC LIMIT $4");
                sqlx::query_as::<_, LeadEntity>(&sql)
                    .bind(query.user_id)
                    .bind(query.cutoff)
                    .bind(status.as_str())
                    .bind(fetch)
                    .fetch_all(&self.pool)
                    .await
            }
            (None, Some((reviewed_at, id))) => {
                sql.push_str(
                    " AND (reviewed_at, id) < ($3, $4) ORDER BY reviewed_at DESC, id DESC LIMIT $5",
                );
                sqlx::query_as::<_, LeadEntity>(&sql)
                    .bind(query.user_id)
                    .bind(query.cutoff)
                    .bind(reviewed_at)
                    .bind(id)
                    .bind(fetch)
                    .fetch_all(&self.pool)
                    .await
            }
            (Some(status), Some((reviewed_at, id))) => {
                sql.push_str(
                    " AND status = $3 AND (reviewed_at, id) < ($4, $5) \
                     ORDER BY reviewed_at DESC, id DESC LIMIT $6",
                );
                sqlx::query_as::<_, LeadEntity>(&sql)
                    .bind(query.user_id)
                    .bind(query.cutoff)
                    .bind(status.as_str())
                    .bind(reviewed_at)
                    .bind(id)
                    .bind(fetch)
                    .fetch_all(&self.pool)
                    .await
            }
        };
        timer.record();

        let mut leads = rows?;
        let next_cursor = if leads.len() as i64 > query.limit {
            leads.truncate(query.limit as usize);
            leads
                .last()
                .and_then(|lead| lead.reviewed_at.map(|at| (at, lead.id)))
        } else {
            None
        };

        Ok(LedgerPage { leads, next_cursor })
    }
}
