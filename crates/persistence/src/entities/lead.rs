//! Lead entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Lead, LeadStatus};
use sqlx::FromRow;

/// Database row mapping for the leads table.
#[derive(Debug, Clone, FromRow)]
pub struct LeadEntity {
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
    pub status: String,
    pub campaign_id: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LeadEntity> for Lead {
    fn from(entity: LeadEntity) -> Self {
        let status = entity
            .status
            .parse::<LeadStatus>()
            .unwrap_or(LeadStatus::New);
        Self {
            id: entity.id,
            user_id: entity.user_id,
            name: entity.name,
            email: entity.email,
            company_name: entity.company_name,
            company_website: entity.company_website,
            job_title: entity.job_title,
            phone: entity.phone,
            linkedin_url: entity.linkedin_url,
            country_name: entity.country_name,
            state_name: entity.state_name,
            status,
            campaign_id: entity.campaign_id,
            reviewed_at: entity.reviewed_at,
            accepted_at: entity.accepted_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
