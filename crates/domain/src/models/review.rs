//! Review request, outcome, and error models.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use super::lead::{Lead, LeadStatus};

/// An operator's verdict on a decoded export row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Accepted,
    Rejected,
}

impl ReviewDecision {
    /// The stored-lead status this decision writes.
    pub fn as_status(&self) -> LeadStatus {
        match self {
            ReviewDecision::Accepted => LeadStatus::Accepted,
            ReviewDecision::Rejected => LeadStatus::Rejected,
        }
    }

    pub fn opposite(&self) -> ReviewDecision {
        match self {
            ReviewDecision::Accepted => ReviewDecision::Rejected,
            ReviewDecision::Rejected => ReviewDecision::Accepted,
        }
    }
}

impl std::fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewDecision::Accepted => write!(f, "accepted"),
            ReviewDecision::Rejected => write!(f, "rejected"),
        }
    }
}

/// Request to accept a selection of decoded rows.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AcceptReviewsRequest {
    #[validate(length(min = 1, message = "tempIds must not be empty"))]
    pub temp_ids: Vec<u32>,

    /// Campaign to attach the accepted leads to. Falls back to the
    /// operator's default campaign when unset.
    #[validate(length(min = 1, max = 128, message = "campaignId must be 1-128 characters"))]
    pub campaign_id: Option<String>,
}

/// Request to reject a selection of decoded rows.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RejectReviewsRequest {
    #[validate(length(min = 1, message = "tempIds must not be empty"))]
    pub temp_ids: Vec<u32>,
}

/// Request to flip an already-reviewed lead to the other verdict.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoReviewRequest {
    pub target_status: ReviewDecision,
}

/// Status filter for the review ledger query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerFilter {
    #[default]
    All,
    Accepted,
    Rejected,
}

impl LedgerFilter {
    /// The status this filter narrows to, or `None` for all reviewed rows.
    pub fn status(&self) -> Option<LeadStatus> {
        match self {
            LedgerFilter::All => None,
            LedgerFilter::Accepted => Some(LeadStatus::Accepted),
            LedgerFilter::Rejected => Some(LeadStatus::Rejected),
        }
    }
}

/// Query parameters for the recent-reviews ledger.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecentReviewsQuery {
    #[serde(default)]
    pub filter: LedgerFilter,

    #[serde(default = "default_ledger_limit")]
    #[validate(range(min = 1, max = 200, message = "limit must be between 1 and 200"))]
    pub limit: i64,

    /// Opaque cursor from a previous page's `nextCursor`.
    pub cursor: Option<String>,
}

fn default_ledger_limit() -> i64 {
    50
}

/// One page of the recent-reviews ledger, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentReviewsResponse {
    pub reviews: Vec<Lead>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Result of an accept call that ran to completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptOutcome {
    /// Leads inserted into the store.
    pub accepted: u64,
    /// Rows still awaiting review in the rewritten file.
    pub remaining: u64,
    /// True when the export emptied and its job record was removed.
    pub job_deleted: bool,
    /// Set when the store commit succeeded but the file rewrite did not;
    /// the file will be regenerated on the next pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_warning: Option<String>,
}

/// One decoded row the reject pass could not write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectFailure {
    pub temp_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub error: String,
}

/// Result of a reject call that ran to completion.
///
/// Reject is best-effort per row: `failed` lists the rows that could not be
/// written, and those rows stay in the file for a later retry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectOutcome {
    pub processed: u64,
    pub updated: u64,
    pub inserted: u64,
    pub failed: Vec<RejectFailure>,
    pub remaining: u64,
    pub job_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_warning: Option<String>,
}

/// Result of an undo call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoOutcome {
    /// False when the lead was already in the requested state.
    pub changed: bool,
}

/// Outcome of a guarded engine call.
///
/// `Busy` means an operation for the same export (or lead) was still in
/// flight and nothing was attempted; callers surface it as a flag rather
/// than an error so duplicate clicks stay quiet.
#[derive(Debug, Clone, PartialEq)]
pub enum Guarded<T> {
    Busy,
    Done(T),
}

impl<T> Guarded<T> {
    pub fn is_busy(&self) -> bool {
        matches!(self, Guarded::Busy)
    }

    pub fn into_done(self) -> Option<T> {
        match self {
            Guarded::Busy => None,
            Guarded::Done(value) => Some(value),
        }
    }
}

/// Wire response for accept calls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptReviewsResponse {
    pub busy: bool,
    #[serde(flatten)]
    pub outcome: Option<AcceptOutcome>,
}

impl From<Guarded<AcceptOutcome>> for AcceptReviewsResponse {
    fn from(guarded: Guarded<AcceptOutcome>) -> Self {
        match guarded {
            Guarded::Busy => Self { busy: true, outcome: None },
            Guarded::Done(outcome) => Self { busy: false, outcome: Some(outcome) },
        }
    }
}

/// Wire response for reject calls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectReviewsResponse {
    pub busy: bool,
    #[serde(flatten)]
    pub outcome: Option<RejectOutcome>,
}

impl From<Guarded<RejectOutcome>> for RejectReviewsResponse {
    fn from(guarded: Guarded<RejectOutcome>) -> Self {
        match guarded {
            Guarded::Busy => Self { busy: true, outcome: None },
            Guarded::Done(outcome) => Self { busy: false, outcome: Some(outcome) },
        }
    }
}

/// Wire response for undo calls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoReviewResponse {
    pub busy: bool,
    #[serde(flatten)]
    pub outcome: Option<UndoOutcome>,
}

impl From<Guarded<UndoOutcome>> for UndoReviewResponse {
    fn from(guarded: Guarded<UndoOutcome>) -> Self {
        match guarded {
            Guarded::Busy => Self { busy: true, outcome: None },
            Guarded::Done(outcome) => Self { busy: false, outcome: Some(outcome) },
        }
    }
}

/// Errors surfaced by the reconciliation engine.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("No campaign selected and the operator has no default campaign")]
    NoCampaignSelected,

    #[error("Selection no longer matches the export file")]
    StaleSelection { temp_ids: Vec<u32> },

    #[error("Export job {log_id} not found")]
    JobNotFound { log_id: String },

    #[error("Export job {log_id} has no stored file")]
    FileMissing { log_id: String },

    #[error("A lead with email {email} already exists for this operator")]
    DuplicateIdentity { email: String },

    #[error("Store write failed: {0}")]
    StoreWrite(String),

    #[error("Export file could not be read: {0}")]
    FileRead(String),
}
