//! Lead domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Workflow status of a stored lead.
///
/// The review flow only ever writes `Accepted` and `Rejected`; the
/// remaining variants are set by downstream outreach tooling and are
/// carried here so listings can render them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    PendingReview,
    Accepted,
    Rejected,
    Contacted,
    Replied,
    Qualified,
    NotInterested,
    SentForContact,
}

impl LeadStatus {
    /// Database representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::PendingReview => "pending_review",
            LeadStatus::Accepted => "accepted",
            LeadStatus::Rejected => "rejected",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Replied => "replied",
            LeadStatus::Qualified => "qualified",
            LeadStatus::NotInterested => "not_interested",
            LeadStatus::SentForContact => "sent_for_contact",
        }
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(LeadStatus::New),
            "pending_review" => Ok(LeadStatus::PendingReview),
            "accepted" => Ok(LeadStatus::Accepted),
            "rejected" => Ok(LeadStatus::Rejected),
            "contacted" => Ok(LeadStatus::Contacted),
            "replied" => Ok(LeadStatus::Replied),
            "qualified" => Ok(LeadStatus::Qualified),
            "not_interested" => Ok(LeadStatus::NotInterested),
            "sent_for_contact" => Ok(LeadStatus::SentForContact),
            _ => Err(format!("Unknown lead status: {}", s)),
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored lead as it exists in the relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: i64,
    pub user_id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    pub job_title: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub country_name: Option<String>,
    pub state_name: Option<String>,
    pub status: LeadStatus,
    pub campaign_id: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A lead about to be written to the store.
///
/// Produced from a decoded export row by the review flow; `reviewed_at`
/// and `accepted_at` carry the decision timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLead {
    pub user_id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    pub job_title: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub country_name: Option<String>,
    pub state_name: Option<String>,
    pub status: LeadStatus,
    pub campaign_id: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
}
