//! Domain models for Prospect Desk.

pub mod export_job;
pub mod lead;
pub mod review;

pub use export_job::ExportJob;
pub use lead::{Lead, LeadStatus, NewLead};
pub use review::ReviewDecision;
