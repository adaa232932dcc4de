//! Store seam for the reconciliation engine.
//!
//! The engine writes review decisions through this trait so its semantics
//! can be exercised without a database. The production implementation
//! lives in the persistence crate; [`MockReviewStore`] backs engine tests
//! and local development.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::models::export_job::ExportJob;
use crate::models::lead::{LeadStatus, NewLead};
use crate::models::review::{ReviewDecision, ReviewError};

/// Error surface of review store writes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("A lead with email {email} already exists for this owner")]
    DuplicateIdentity { email: String },

    #[error("{0}")]
    Backend(String),
}

impl From<StoreError> for ReviewError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateIdentity { email } => ReviewError::DuplicateIdentity { email },
            StoreError::Backend(message) => ReviewError::StoreWrite(message),
        }
    }
}

/// How a reject write landed: an update of an existing row or a fresh
/// insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectWrite {
    Updated,
    Inserted,
}

/// Store operations the reconciliation engine performs.
#[async_trait::async_trait]
pub trait ReviewStore: Send + Sync {
    /// Looks up an export job owned by the operator.
    async fn find_job(&self, user_id: i64, log_id: &str) -> Result<Option<ExportJob>, StoreError>;

    /// Inserts accepted leads as one atomic batch. Any collision on
    /// (owner, email) aborts the whole batch with no partial commit.
    async fn insert_accepted(&self, leads: &[NewLead]) -> Result<u64, StoreError>;

    /// Writes one rejected lead, updating the existing (owner, email) row
    /// when there is one and inserting otherwise.
    async fn reject_one(&self, lead: &NewLead) -> Result<RejectWrite, StoreError>;

    /// Flips a reviewed lead to `target` and clears its review timestamp.
    /// Returns false when the row was already in the requested state (or
    /// does not exist), keeping undo idempotent.
    async fn undo_review(
        &self,
        user_id: i64,
        lead_id: i64,
        target: ReviewDecision,
    ) -> Result<bool, StoreError>;

    /// Deletes a fully reconciled export job record. Deleting a job that
    /// is already gone is not an error.
    async fn delete_job(&self, user_id: i64, log_id: &str) -> Result<(), StoreError>;
}

/// In-memory review store for engine tests and local development.
#[derive(Debug, Default)]
pub struct MockReviewStore {
    state: Mutex<MockState>,
    /// Fail every accept batch with a backend error.
    pub fail_accepts: bool,
    /// Emails whose reject write fails with a backend error.
    pub failing_emails: Vec<String>,
    /// Sleep before each write, to hold the review guard open in tests.
    pub write_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct MockState {
    jobs: HashMap<(i64, String), ExportJob>,
    /// (owner, email) -> stored lead id.
    existing: HashMap<(i64, String), i64>,
    leads: HashMap<i64, MockLead>,
    accepted_batches: Vec<Vec<NewLead>>,
    rejected_writes: Vec<NewLead>,
    deleted_jobs: Vec<(i64, String)>,
    next_id: i64,
}

#[derive(Debug, Clone)]
struct MockLead {
    status: LeadStatus,
    reviewed: bool,
}

impl MockReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose accept batches fail.
    pub fn failing_accepts() -> Self {
        Self {
            fail_accepts: true,
            ..Self::default()
        }
    }

    /// A store whose reject writes fail for the given emails.
    pub fn failing_rejects(emails: &[&str]) -> Self {
        Self {
            failing_emails: emails.iter().map(|email| email.to_string()).collect(),
            ..Self::default()
        }
    }

    /// A store that sleeps before each write.
    pub fn with_write_delay(delay: Duration) -> Self {
        Self {
            write_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Registers an export job the engine can find.
    pub fn seed_job(&self, job: ExportJob) {
        let mut state = self.state.lock().unwrap();
        state.jobs.insert((job.user_id, job.log_id.clone()), job);
    }

    /// Registers a pre-existing stored lead, returning its id.
    pub fn seed_lead(&self, user_id: i64, email: &str, status: LeadStatus) -> i64 {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.existing.insert((user_id, email.to_string()), id);
        state.leads.insert(
            id,
            MockLead {
                status,
                reviewed: matches!(status, LeadStatus::Accepted | LeadStatus::Rejected),
            },
        );
        id
    }

    /// Number of accept batches committed.
    pub fn accepted_batch_count(&self) -> usize {
        self.state.lock().unwrap().accepted_batches.len()
    }

    /// All accepted leads across batches, in write order.
    pub fn accepted_leads(&self) -> Vec<NewLead> {
        self.state
            .lock()
            .unwrap()
            .accepted_batches
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn rejected_writes(&self) -> Vec<NewLead> {
        self.state.lock().unwrap().rejected_writes.clone()
    }

    pub fn deleted_jobs(&self) -> Vec<(i64, String)> {
        self.state.lock().unwrap().deleted_jobs.clone()
    }

    /// Current (status, reviewed) pair of a stored lead.
    pub fn lead_state(&self, lead_id: i64) -> Option<(LeadStatus, bool)> {
        self.state
            .lock()
            .unwrap()
            .leads
            .get(&lead_id)
            .map(|lead| (lead.status, lead.reviewed))
    }

    async fn delay(&self) {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl ReviewStore for MockReviewStore {
    async fn find_job(&self, user_id: i64, log_id: &str) -> Result<Option<ExportJob>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.jobs.get(&(user_id, log_id.to_string())).cloned())
    }

    async fn insert_accepted(&self, leads: &[NewLead]) -> Result<u64, StoreError> {
        self.delay().await;
        if self.fail_accepts {
            return Err(StoreError::Backend("simulated store failure".to_string()));
        }

        let mut state = self.state.lock().unwrap();
        // Check the whole batch before committing any of it.
        let mut batch_emails = Vec::new();
        for lead in leads {
            if let Some(email) = &lead.email {
                let key = (lead.user_id, email.clone());
                if state.existing.contains_key(&key) || batch_emails.contains(&key) {
                    return Err(StoreError::DuplicateIdentity {
                        email: email.clone(),
                    });
                }
                batch_emails.push(key);
            }
        }

        for lead in leads {
            state.next_id += 1;
            let id = state.next_id;
            if let Some(email) = &lead.email {
                state.existing.insert((lead.user_id, email.clone()), id);
            }
            state.leads.insert(
                id,
                MockLead {
                    status: lead.status,
                    reviewed: lead.reviewed_at.is_some(),
                },
            );
        }
        state.accepted_batches.push(leads.to_vec());
        Ok(leads.len() as u64)
    }

    async fn reject_one(&self, lead: &NewLead) -> Result<RejectWrite, StoreError> {
        self.delay().await;
        if let Some(email) = &lead.email {
            if self.failing_emails.contains(email) {
                return Err(StoreError::Backend("simulated store failure".to_string()));
            }
        }

        let mut state = self.state.lock().unwrap();
        let existing_id = lead
            .email
            .as_ref()
            .and_then(|email| state.existing.get(&(lead.user_id, email.clone())).copied());

        let write = match existing_id {
            Some(id) => {
                state.leads.insert(
                    id,
                    MockLead {
                        status: lead.status,
                        reviewed: lead.reviewed_at.is_some(),
                    },
                );
                RejectWrite::Updated
            }
            None => {
                state.next_id += 1;
                let id = state.next_id;
                if let Some(email) = &lead.email {
                    state.existing.insert((lead.user_id, email.clone()), id);
                }
                state.leads.insert(
                    id,
                    MockLead {
                        status: lead.status,
                        reviewed: lead.reviewed_at.is_some(),
                    },
                );
                RejectWrite::Inserted
            }
        };
        state.rejected_writes.push(lead.clone());
        Ok(write)
    }

    async fn undo_review(
        &self,
        _user_id: i64,
        lead_id: i64,
        target: ReviewDecision,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        let Some(lead) = state.leads.get_mut(&lead_id) else {
            return Ok(false);
        };
        if !matches!(lead.status, LeadStatus::Accepted | LeadStatus::Rejected) {
            return Ok(false);
        }
        let changed = lead.status != target.as_status() || lead.reviewed;
        lead.status = target.as_status();
        lead.reviewed = false;
        Ok(changed)
    }

    async fn delete_job(&self, user_id: i64, log_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.jobs.remove(&(user_id, log_id.to_string()));
        state.deleted_jobs.push((user_id, log_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::export_job::ExportJobStatus;
    use chrono::Utc;

    fn new_lead(user_id: i64, email: &str, status: LeadStatus) -> NewLead {
        NewLead {
            user_id,
            name: Some("Test Lead".to_string()),
            email: Some(email.to_string()),
            company_name: None,
            company_website: None,
            job_title: None,
            phone: None,
            linkedin_url: None,
            country_name: None,
            state_name: None,
            status,
            campaign_id: None,
            reviewed_at: Some(Utc::now()),
            accepted_at: None,
        }
    }

    fn job(user_id: i64, log_id: &str) -> ExportJob {
        ExportJob {
            log_id: log_id.to_string(),
            user_id,
            file_name: format!("{}.csv", log_id),
            file_location: Some(format!("{}.csv", log_id)),
            status: ExportJobStatus::Completed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_mock_finds_seeded_job() {
        tokio_test::block_on(async {
            let store = MockReviewStore::new();
            store.seed_job(job(1, "job-1"));

            let found = store.find_job(1, "job-1").await.unwrap();
            assert_eq!(found.unwrap().log_id, "job-1");
            assert!(store.find_job(2, "job-1").await.unwrap().is_none());
        });
    }

    #[test]
    fn test_mock_accept_batch_is_atomic_on_duplicates() {
        tokio_test::block_on(async {
            let store = MockReviewStore::new();
            store.seed_lead(1, "taken@x.com", LeadStatus::New);

            let batch = vec![
                new_lead(1, "fresh@x.com", LeadStatus::Accepted),
                new_lead(1, "taken@x.com", LeadStatus::Accepted),
            ];
            let err = store.insert_accepted(&batch).await.unwrap_err();
            assert!(matches!(err, StoreError::DuplicateIdentity { email } if email == "taken@x.com"));
            // Nothing from the failed batch may land.
            assert_eq!(store.accepted_batch_count(), 0);
            assert!(store.accepted_leads().is_empty());
        });
    }

    #[test]
    fn test_mock_reject_updates_existing_row() {
        tokio_test::block_on(async {
            let store = MockReviewStore::new();
            let id = store.seed_lead(1, "known@x.com", LeadStatus::New);

            let write = store
                .reject_one(&new_lead(1, "known@x.com", LeadStatus::Rejected))
                .await
                .unwrap();
            assert_eq!(write, RejectWrite::Updated);
            assert_eq!(store.lead_state(id), Some((LeadStatus::Rejected, true)));
        });
    }

    #[test]
    fn test_mock_reject_inserts_unknown_row() {
        tokio_test::block_on(async {
            let store = MockReviewStore::new();

            let write = store
                .reject_one(&new_lead(1, "new@x.com", LeadStatus::Rejected))
                .await
                .unwrap();
            assert_eq!(write, RejectWrite::Inserted);
            assert_eq!(store.rejected_writes().len(), 1);
        });
    }

    #[test]
    fn test_mock_undo_is_idempotent() {
        tokio_test::block_on(async {
            let store = MockReviewStore::new();
            let id = store.seed_lead(1, "lead@x.com", LeadStatus::Rejected);

            let first = store.undo_review(1, id, ReviewDecision::Accepted).await.unwrap();
            assert!(first);
            assert_eq!(store.lead_state(id), Some((LeadStatus::Accepted, false)));

            let second = store.undo_review(1, id, ReviewDecision::Accepted).await.unwrap();
            assert!(!second);
            assert_eq!(store.lead_state(id), Some((LeadStatus::Accepted, false)));
        });
    }

    #[test]
    fn test_mock_undo_ignores_unreviewed_rows() {
        tokio_test::block_on(async {
            let store = MockReviewStore::new();
            let id = store.seed_lead(1, "lead@x.com", LeadStatus::Contacted);

            let changed = store.undo_review(1, id, ReviewDecision::Rejected).await.unwrap();
            assert!(!changed);
            assert_eq!(store.lead_state(id), Some((LeadStatus::Contacted, false)));
            assert!(!store.undo_review(1, 9999, ReviewDecision::Accepted).await.unwrap());
        });
    }

    #[test]
    fn test_mock_delete_job_is_idempotent() {
        tokio_test::block_on(async {
            let store = MockReviewStore::new();
            store.seed_job(job(1, "job-1"));

            store.delete_job(1, "job-1").await.unwrap();
            store.delete_job(1, "job-1").await.unwrap();
            assert!(store.find_job(1, "job-1").await.unwrap().is_none());
            assert_eq!(store.deleted_jobs().len(), 2);
        });
    }

    #[test]
    fn test_failing_store_reports_backend_error() {
        tokio_test::block_on(async {
            let store = MockReviewStore::failing_accepts();

            let err = store
                .insert_accepted(&[new_lead(1, "a@x.com", LeadStatus::Accepted)])
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::Backend(_)));
        });
    }

    #[test]
    fn test_store_error_converts_to_review_error() {
        let err: ReviewError = StoreError::DuplicateIdentity {
            email: "dup@x.com".to_string(),
        }
        .into();
        assert!(matches!(err, ReviewError::DuplicateIdentity { email } if email == "dup@x.com"));

        let err: ReviewError = StoreError::Backend("boom".to_string()).into();
        assert!(matches!(err, ReviewError::StoreWrite(message) if message == "boom"));
    }
}
