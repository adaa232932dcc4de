//! Lead review reconciliation engine.
//!
//! Drives accept, reject, and undo passes over an export: resolves the
//! operator's selection against a freshly decoded file, writes the decisions
//! to the store, then mirrors the removals into the export file. The store
//! write is authoritative; a failed file rewrite degrades to a warning on
//! the outcome instead of rolling anything back.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use domain::models::lead::NewLead;
use domain::models::review::{
    AcceptOutcome, Guarded, RejectFailure, RejectOutcome, ReviewDecision, ReviewError, UndoOutcome,
};
use domain::services::{
    decode_export, rewrite_export, surviving_after, DecodedExport, RejectWrite, ReviewGuard,
    ReviewStore,
};
use persistence::files::{ExportFileStore, FileStoreError};
use tracing::{info, warn};

use crate::middleware::metrics::{record_leads_reviewed, record_review_busy};

/// Service reconciling operator review decisions between the lead store
/// and the export file.
pub struct ReconciliationService {
    store: Arc<dyn ReviewStore>,
    files: ExportFileStore,
    guard: Arc<ReviewGuard>,
}

impl ReconciliationService {
    /// Create a new reconciliation service.
    pub fn new(store: Arc<dyn ReviewStore>, files: ExportFileStore) -> Self {
        Self {
            store,
            files,
            guard: Arc::new(ReviewGuard::new()),
        }
    }

    /// Accept a selection of decoded rows from one export.
    ///
    /// All selected rows are inserted into the store as a single atomic
    /// batch, then removed from the export file. When the file empties, the
    /// file and its job record are retired together.
    pub async fn accept(
        &self,
        operator_id: i64,
        log_id: &str,
        temp_ids: &[u32],
        campaign_id: Option<&str>,
        default_campaign: Option<&str>,
    ) -> Result<Guarded<AcceptOutcome>, ReviewError> {
        let _permit = match self.guard.try_begin(ReviewGuard::review_key(log_id)) {
            Some(permit) => permit,
            None => {
                record_review_busy("accept");
                info!(operator_id, log_id, "accept refused, review already in flight");
                return Ok(Guarded::Busy);
            }
        };

        let (location, export) = self.load_export(operator_id, log_id).await?;
        let selected = export
            .select(temp_ids)
            .map_err(|missing| ReviewError::StaleSelection { temp_ids: missing })?;

        // The campaign must resolve before anything is written.
        let campaign = campaign_id
            .or(default_campaign)
            .ok_or(ReviewError::NoCampaignSelected)?;

        let now = Utc::now();
        let batch: Vec<NewLead> = selected
            .iter()
            .map(|record| record.to_accepted(operator_id, campaign, now))
            .collect();
        let accepted = self.store.insert_accepted(&batch).await?;

        let removed: BTreeSet<u32> = selected.iter().map(|record| record.temp_id).collect();
        let (remaining, job_deleted, file_warning) = self
            .mirror_removals(operator_id, log_id, &location, &export, &removed)
            .await;

        record_leads_reviewed("accepted", accepted);
        info!(
            operator_id,
            log_id,
            accepted,
            remaining,
            job_deleted,
            "accept pass completed"
        );
        Ok(Guarded::Done(AcceptOutcome {
            accepted,
            remaining,
            job_deleted,
            file_warning,
        }))
    }

    /// Reject a selection of decoded rows from one export.
    ///
    /// Reject writes are best-effort per row: a row whose store write fails
    /// is reported in the outcome and stays in the file for a later retry.
    pub async fn reject(
        &self,
        operator_id: i64,
        log_id: &str,
        temp_ids: &[u32],
    ) -> Result<Guarded<RejectOutcome>, ReviewError> {
        let _permit = match self.guard.try_begin(ReviewGuard::review_key(log_id)) {
            Some(permit) => permit,
            None => {
                record_review_busy("reject");
                info!(operator_id, log_id, "reject refused, review already in flight");
                return Ok(Guarded::Busy);
            }
        };

        let (location, export) = self.load_export(operator_id, log_id).await?;
        let selected = export
            .select(temp_ids)
            .map_err(|missing| ReviewError::StaleSelection { temp_ids: missing })?;

        let now = Utc::now();
        let mut updated = 0u64;
        let mut inserted = 0u64;
        let mut failed = Vec::new();
        let mut removed = BTreeSet::new();

        for record in &selected {
            let lead = record.to_rejected(operator_id, now);
            match self.store.reject_one(&lead).await {
                Ok(RejectWrite::Updated) => {
                    updated += 1;
                    removed.insert(record.temp_id);
                }
                Ok(RejectWrite::Inserted) => {
                    inserted += 1;
                    removed.insert(record.temp_id);
                }
                Err(err) => {
                    warn!(
                        operator_id,
                        log_id,
                        temp_id = record.temp_id,
                        error = %err,
                        "reject write failed, row stays in the export"
                    );
                    failed.push(RejectFailure {
                        temp_id: record.temp_id,
                        email: record.email.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let processed = selected.len() as u64;
        let (remaining, job_deleted, file_warning) = if removed.is_empty() {
            // No row left the file, so the file needs no rewrite.
            (export.records.len() as u64, false, None)
        } else {
            self.mirror_removals(operator_id, log_id, &location, &export, &removed)
                .await
        };

        record_leads_reviewed("rejected", updated + inserted);
        info!(
            operator_id,
            log_id,
            processed,
            updated,
            inserted,
            failed = failed.len(),
            remaining,
            job_deleted,
            "reject pass completed"
        );
        Ok(Guarded::Done(RejectOutcome {
            processed,
            updated,
            inserted,
            failed,
            remaining,
            job_deleted,
            file_warning,
        }))
    }

    /// Flip an already-reviewed lead to the other verdict.
    pub async fn undo(
        &self,
        operator_id: i64,
        lead_id: i64,
        target: ReviewDecision,
    ) -> Result<Guarded<UndoOutcome>, ReviewError> {
        let _permit = match self.guard.try_begin(ReviewGuard::undo_key(lead_id)) {
            Some(permit) => permit,
            None => {
                record_review_busy("undo");
                info!(operator_id, lead_id, "undo refused, undo already in flight");
                return Ok(Guarded::Busy);
            }
        };

        let changed = self.store.undo_review(operator_id, lead_id, target).await?;
        info!(operator_id, lead_id, target = %target, changed, "undo completed");
        Ok(Guarded::Done(UndoOutcome { changed }))
    }

    /// Look up the operator's job and decode its stored file.
    async fn load_export(
        &self,
        operator_id: i64,
        log_id: &str,
    ) -> Result<(String, DecodedExport), ReviewError> {
        let job = self
            .store
            .find_job(operator_id, log_id)
            .await?
            .ok_or_else(|| ReviewError::JobNotFound {
                log_id: log_id.to_string(),
            })?;
        let location = job.file_location.ok_or_else(|| ReviewError::FileMissing {
            log_id: log_id.to_string(),
        })?;

        let text = match self.files.read(&location).await {
            Ok(text) => text,
            Err(FileStoreError::NotFound) => {
                return Err(ReviewError::FileMissing {
                    log_id: log_id.to_string(),
                })
            }
            Err(err) => return Err(ReviewError::FileRead(err.to_string())),
        };
        Ok((location, decode_export(&text)))
    }

    /// Mirror store removals into the export file, best effort.
    ///
    /// Returns the surviving row count, whether the job record was removed,
    /// and a warning when the file side could not keep up with the store.
    async fn mirror_removals(
        &self,
        operator_id: i64,
        log_id: &str,
        location: &str,
        export: &DecodedExport,
        removed: &BTreeSet<u32>,
    ) -> (u64, bool, Option<String>) {
        let surviving = surviving_after(export, removed);
        let remaining = surviving.len() as u64;

        match rewrite_export(export, &surviving) {
            Some(text) => match self.files.write(location, text.as_bytes()).await {
                Ok(_) => (remaining, false, None),
                Err(err) => {
                    warn!(
                        operator_id,
                        log_id,
                        error = %err,
                        "export file rewrite failed after store commit"
                    );
                    (
                        remaining,
                        false,
                        Some(format!("Export file could not be rewritten: {}", err)),
                    )
                }
            },
            None => {
                // The queue emptied: retire the file and its job record.
                let mut warning = None;
                if let Err(err) = self.files.delete(location).await {
                    warn!(
                        operator_id,
                        log_id,
                        error = %err,
                        "emptied export file could not be deleted"
                    );
                    warning = Some(format!("Export file could not be deleted: {}", err));
                }
                let job_deleted = match self.store.delete_job(operator_id, log_id).await {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(
                            operator_id,
                            log_id,
                            error = %err,
                            "reconciled job record could not be deleted"
                        );
                        if warning.is_none() {
                            warning = Some(format!("Export job could not be removed: {}", err));
                        }
                        false
                    }
                };
                (0, job_deleted, warning)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::models::export_job::{ExportJob, ExportJobStatus};
    use domain::models::lead::LeadStatus;
    use domain::services::MockReviewStore;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    const OPERATOR: i64 = 7;
    const LOG_ID: &str = "apollo-17";

    fn job_for(user_id: i64, log_id: &str) -> ExportJob {
        ExportJob {
            log_id: log_id.to_string(),
            user_id,
            file_name: format!("{}.csv", log_id),
            file_location: Some(ExportFileStore::location_for(log_id)),
            status: ExportJobStatus::Completed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Seeds a job and its file, returning the service plus a file store
    /// handle for assertions.
    async fn service_with_export(
        store: Arc<MockReviewStore>,
        dir: &TempDir,
        text: &str,
    ) -> (ReconciliationService, ExportFileStore) {
        let files = ExportFileStore::new(dir.path());
        files
            .write(&ExportFileStore::location_for(LOG_ID), text.as_bytes())
            .await
            .unwrap();
        store.seed_job(job_for(OPERATOR, LOG_ID));
        let service = ReconciliationService::new(store, files.clone());
        (service, files)
    }

    const THREE_ROWS: &str = "name,email\nAda,ada@x.com\nBob,bob@x.com\nCleo,cleo@x.com\n";

    #[tokio::test]
    async fn test_accept_writes_batch_and_rewrites_file() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::new());
        let (service, files) = service_with_export(store.clone(), &dir, THREE_ROWS).await;

        let outcome = service
            .accept(OPERATOR, LOG_ID, &[1, 3], Some("camp-1"), None)
            .await
            .unwrap()
            .into_done()
            .unwrap();

        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.remaining, 1);
        assert!(!outcome.job_deleted);
        assert_eq!(outcome.file_warning, None);

        let leads = store.accepted_leads();
        assert_eq!(leads.len(), 2);
        assert!(leads
            .iter()
            .all(|lead| lead.status == LeadStatus::Accepted
                && lead.campaign_id.as_deref() == Some("camp-1")
                && lead.accepted_at.is_some()));

        let rewritten = files
            .read(&ExportFileStore::location_for(LOG_ID))
            .await
            .unwrap();
        assert_eq!(rewritten, "name,email\nBob,bob@x.com\n");
    }

    #[tokio::test]
    async fn test_accepting_every_row_retires_file_and_job() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::new());
        let (service, files) = service_with_export(store.clone(), &dir, THREE_ROWS).await;

        let outcome = service
            .accept(OPERATOR, LOG_ID, &[1, 2, 3], Some("camp-1"), None)
            .await
            .unwrap()
            .into_done()
            .unwrap();

        assert_eq!(outcome.accepted, 3);
        assert_eq!(outcome.remaining, 0);
        assert!(outcome.job_deleted);
        assert!(matches!(
            files.read(&ExportFileStore::location_for(LOG_ID)).await,
            Err(FileStoreError::NotFound)
        ));
        assert_eq!(store.deleted_jobs(), vec![(OPERATOR, LOG_ID.to_string())]);
    }

    #[tokio::test]
    async fn test_accept_falls_back_to_default_campaign() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::new());
        let (service, _files) = service_with_export(store.clone(), &dir, THREE_ROWS).await;

        service
            .accept(OPERATOR, LOG_ID, &[1], None, Some("ops-default"))
            .await
            .unwrap()
            .into_done()
            .unwrap();

        let leads = store.accepted_leads();
        assert_eq!(leads[0].campaign_id.as_deref(), Some("ops-default"));
    }

    #[tokio::test]
    async fn test_accept_without_campaign_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::new());
        let (service, files) = service_with_export(store.clone(), &dir, THREE_ROWS).await;

        let err = service
            .accept(OPERATOR, LOG_ID, &[1], None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ReviewError::NoCampaignSelected));
        assert_eq!(store.accepted_batch_count(), 0);
        // The file is untouched by the refused call.
        let text = files
            .read(&ExportFileStore::location_for(LOG_ID))
            .await
            .unwrap();
        assert_eq!(text, THREE_ROWS);
    }

    #[tokio::test]
    async fn test_accept_with_stale_ids_reports_the_missing_ones() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::new());
        let (service, _files) = service_with_export(store.clone(), &dir, THREE_ROWS).await;

        let err = service
            .accept(OPERATOR, LOG_ID, &[1, 9, 12], Some("camp-1"), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReviewError::StaleSelection { temp_ids } if temp_ids == vec![9, 12]
        ));
        assert_eq!(store.accepted_batch_count(), 0);
    }

    #[tokio::test]
    async fn test_accept_duplicate_email_aborts_the_batch() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::new());
        store.seed_lead(OPERATOR, "bob@x.com", LeadStatus::New);
        let (service, files) = service_with_export(store.clone(), &dir, THREE_ROWS).await;

        let err = service
            .accept(OPERATOR, LOG_ID, &[1, 2], Some("camp-1"), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReviewError::DuplicateIdentity { email } if email == "bob@x.com"
        ));
        assert_eq!(store.accepted_batch_count(), 0);
        // Nothing was removed from the file either.
        let text = files
            .read(&ExportFileStore::location_for(LOG_ID))
            .await
            .unwrap();
        assert_eq!(text, THREE_ROWS);
    }

    #[tokio::test]
    async fn test_accept_refuses_unknown_or_foreign_jobs() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::new());
        let (service, _files) = service_with_export(store.clone(), &dir, THREE_ROWS).await;

        let err = service
            .accept(OPERATOR, "no-such-job", &[1], Some("camp-1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::JobNotFound { log_id } if log_id == "no-such-job"));

        // Another operator cannot reach this job.
        let err = service
            .accept(99, LOG_ID, &[1], Some("camp-1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::JobNotFound { .. }));
    }

    #[tokio::test]
    async fn test_accept_requires_a_stored_file() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::new());
        let files = ExportFileStore::new(dir.path());

        // A pending job has no file location yet.
        let mut pending = job_for(OPERATOR, "pending-job");
        pending.file_location = None;
        pending.status = ExportJobStatus::Pending;
        store.seed_job(pending);

        // This job points at a file that is gone from disk.
        store.seed_job(job_for(OPERATOR, "gone-file"));

        let service = ReconciliationService::new(store, files);

        let err = service
            .accept(OPERATOR, "pending-job", &[1], Some("camp-1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::FileMissing { log_id } if log_id == "pending-job"));

        let err = service
            .accept(OPERATOR, "gone-file", &[1], Some("camp-1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::FileMissing { log_id } if log_id == "gone-file"));
    }

    #[tokio::test]
    async fn test_reject_updates_existing_and_inserts_new() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::new());
        let existing = store.seed_lead(OPERATOR, "ada@x.com", LeadStatus::New);
        let (service, files) = service_with_export(store.clone(), &dir, THREE_ROWS).await;

        let outcome = service
            .reject(OPERATOR, LOG_ID, &[1, 2])
            .await
            .unwrap()
            .into_done()
            .unwrap();

        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.inserted, 1);
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.remaining, 1);
        assert!(!outcome.job_deleted);

        assert_eq!(
            store.lead_state(existing),
            Some((LeadStatus::Rejected, true))
        );
        let rewritten = files
            .read(&ExportFileStore::location_for(LOG_ID))
            .await
            .unwrap();
        assert_eq!(rewritten, "name,email\nCleo,cleo@x.com\n");
    }

    #[tokio::test]
    async fn test_reject_keeps_failed_rows_in_the_file() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::failing_rejects(&["bob@x.com"]));
        let (service, files) = service_with_export(store.clone(), &dir, THREE_ROWS).await;

        let outcome = service
            .reject(OPERATOR, LOG_ID, &[1, 2, 3])
            .await
            .unwrap()
            .into_done()
            .unwrap();

        assert_eq!(outcome.processed, 3);
        assert_eq!(outcome.updated + outcome.inserted, 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].temp_id, 2);
        assert_eq!(outcome.failed[0].email.as_deref(), Some("bob@x.com"));
        assert_eq!(outcome.remaining, 1);
        assert!(!outcome.job_deleted);

        // The failed row must still be reviewable on the next pass.
        let rewritten = files
            .read(&ExportFileStore::location_for(LOG_ID))
            .await
            .unwrap();
        assert_eq!(rewritten, "name,email\nBob,bob@x.com\n");
    }

    #[tokio::test]
    async fn test_reject_with_only_failures_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::failing_rejects(&["ada@x.com"]));
        let text = "name,email\nAda,ada@x.com\n";
        let (service, files) = service_with_export(store.clone(), &dir, text).await;

        let outcome = service
            .reject(OPERATOR, LOG_ID, &[1])
            .await
            .unwrap()
            .into_done()
            .unwrap();

        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.remaining, 1);
        let unchanged = files
            .read(&ExportFileStore::location_for(LOG_ID))
            .await
            .unwrap();
        assert_eq!(unchanged, text);
    }

    #[tokio::test]
    async fn test_rejecting_every_row_retires_file_and_job() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::new());
        let text = "name,email\nAda,ada@x.com\n";
        let (service, files) = service_with_export(store.clone(), &dir, text).await;

        let outcome = service
            .reject(OPERATOR, LOG_ID, &[1])
            .await
            .unwrap()
            .into_done()
            .unwrap();

        assert_eq!(outcome.remaining, 0);
        assert!(outcome.job_deleted);
        assert!(matches!(
            files.read(&ExportFileStore::location_for(LOG_ID)).await,
            Err(FileStoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_accepts_collapse_to_one_batch() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::with_write_delay(Duration::from_millis(50)));
        let (service, _files) = service_with_export(store.clone(), &dir, THREE_ROWS).await;

        let (first, second) = tokio::join!(
            service.accept(OPERATOR, LOG_ID, &[1], Some("camp-1"), None),
            service.accept(OPERATOR, LOG_ID, &[1], Some("camp-1"), None),
        );

        let first = first.unwrap();
        let second = second.unwrap();
        // Exactly one call ran; the other was turned away at the guard.
        assert_eq!(first.is_busy() as u8 + second.is_busy() as u8, 1);
        assert_eq!(store.accepted_batch_count(), 1);
    }

    #[tokio::test]
    async fn test_guard_key_frees_after_a_failed_pass() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::failing_accepts());
        let (service, _files) = service_with_export(store.clone(), &dir, THREE_ROWS).await;

        let err = service
            .accept(OPERATOR, LOG_ID, &[1], Some("camp-1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::StoreWrite(_)));

        // The failed pass must not leave the export locked.
        let retry = service.reject(OPERATOR, LOG_ID, &[1]).await.unwrap();
        assert!(!retry.is_busy());
    }

    #[tokio::test]
    async fn test_undo_flips_verdict_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::new());
        let lead_id = store.seed_lead(OPERATOR, "ada@x.com", LeadStatus::Rejected);
        let files = ExportFileStore::new(dir.path());
        let service = ReconciliationService::new(store.clone(), files);

        let outcome = service
            .undo(OPERATOR, lead_id, ReviewDecision::Accepted)
            .await
            .unwrap()
            .into_done()
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(store.lead_state(lead_id), Some((LeadStatus::Accepted, false)));

        let outcome = service
            .undo(OPERATOR, lead_id, ReviewDecision::Accepted)
            .await
            .unwrap()
            .into_done()
            .unwrap();
        assert!(!outcome.changed);
    }

    #[tokio::test]
    async fn test_undo_reports_busy_while_lead_is_held() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MockReviewStore::new());
        let lead_id = store.seed_lead(OPERATOR, "ada@x.com", LeadStatus::Accepted);
        let files = ExportFileStore::new(dir.path());
        let service = ReconciliationService::new(store, files);

        let permit = service.guard.try_begin(ReviewGuard::undo_key(lead_id));
        assert!(permit.is_some());

        let held = service
            .undo(OPERATOR, lead_id, ReviewDecision::Rejected)
            .await
            .unwrap();
        assert!(held.is_busy());

        drop(permit);
        let free = service
            .undo(OPERATOR, lead_id, ReviewDecision::Rejected)
            .await
            .unwrap();
        assert!(!free.is_busy());
    }
}
