//! PostgreSQL implementation of the review store seam.

use chrono::Utc;
use domain::models::export_job::ExportJob;
use domain::models::lead::NewLead;
use domain::models::review::ReviewDecision;
use domain::services::review_store::{RejectWrite, ReviewStore, StoreError};
use sqlx::PgPool;
use tracing::warn;

use super::export_job::ExportJobRepository;
use super::lead::LeadRepository;

/// Review store backed by the leads and export_jobs tables.
#[derive(Clone)]
pub struct PgReviewStore {
    leads: LeadRepository,
    jobs: ExportJobRepository,
}

impl PgReviewStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            leads: LeadRepository::new(pool.clone()),
            jobs: ExportJobRepository::new(pool),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait::async_trait]
impl ReviewStore for PgReviewStore {
    async fn find_job(&self, user_id: i64, log_id: &str) -> Result<Option<ExportJob>, StoreError> {
        let entity = self
            .jobs
            .find_by_log_id(user_id, log_id)
            .await
            .map_err(backend)?;
        Ok(entity.map(Into::into))
    }

    async fn insert_accepted(&self, leads: &[NewLead]) -> Result<u64, StoreError> {
        let Some(user_id) = leads.first().map(|lead| lead.user_id) else {
            return Ok(0);
        };

        // Surface identity collisions before opening the transaction, both
        // within the batch and against stored rows. A write racing past
        // this check still trips the unique index below.
        let mut emails: Vec<String> = Vec::new();
        for lead in leads {
            if let Some(email) = &lead.email {
                if emails.contains(email) {
                    return Err(StoreError::DuplicateIdentity {
                        email: email.clone(),
                    });
                }
                emails.push(email.clone());
            }
        }
        if let Some(email) = self
            .leads
            .find_any_email(user_id, &emails)
            .await
            .map_err(backend)?
        {
            return Err(StoreError::DuplicateIdentity { email });
        }

        match self.leads.insert_accepted_batch(leads).await {
            Ok(count) => Ok(count),
            Err(err) if is_unique_violation(&err) => {
                let email = self
                    .leads
                    .find_any_email(user_id, &emails)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| "unknown".to_string());
                Err(StoreError::DuplicateIdentity { email })
            }
            Err(err) => Err(backend(err)),
        }
    }

    async fn reject_one(&self, lead: &NewLead) -> Result<RejectWrite, StoreError> {
        let reviewed_at = lead.reviewed_at.unwrap_or_else(Utc::now);

        if let Some(email) = &lead.email {
            if let Some(id) = self
                .leads
                .find_id_by_email(lead.user_id, email)
                .await
                .map_err(backend)?
            {
                self.leads
                    .mark_rejected(lead.user_id, id, reviewed_at)
                    .await
                    .map_err(backend)?;
                return Ok(RejectWrite::Updated);
            }
        }

        match self.leads.insert(lead).await {
            Ok(_) => Ok(RejectWrite::Inserted),
            Err(err) if is_unique_violation(&err) => {
                // The "not found" above was advisory: a concurrent writer
                // inserted this email first. Fall back to the update path.
                let email = lead.email.as_deref().unwrap_or_default();
                warn!(user_id = lead.user_id, email, "reject insert raced, updating instead");
                match self
                    .leads
                    .find_id_by_email(lead.user_id, email)
                    .await
                    .map_err(backend)?
                {
                    Some(id) => {
                        self.leads
                            .mark_rejected(lead.user_id, id, reviewed_at)
                            .await
                            .map_err(backend)?;
                        Ok(RejectWrite::Updated)
                    }
                    None => Err(StoreError::Backend(
                        "lead vanished while resolving reject conflict".to_string(),
                    )),
                }
            }
            Err(err) => Err(backend(err)),
        }
    }

    async fn undo_review(
        &self,
        user_id: i64,
        lead_id: i64,
        target: ReviewDecision,
    ) -> Result<bool, StoreError> {
        self.leads
            .undo_review(user_id, lead_id, target.as_status())
            .await
            .map_err(backend)
    }

    async fn delete_job(&self, user_id: i64, log_id: &str) -> Result<(), StoreError> {
        self.jobs.delete(user_id, log_id).await.map_err(backend)?;
        Ok(())
    }
}
