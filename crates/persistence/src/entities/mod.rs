//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod export_job;
pub mod lead;

pub use export_job::ExportJobEntity;
pub use lead::LeadEntity;
