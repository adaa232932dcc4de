//! Repository implementations for database operations.

pub mod export_job;
pub mod lead;
pub mod review_store;

pub use export_job::ExportJobRepository;
pub use lead::{LeadRepository, LedgerPage, LedgerQuery};
pub use review_store::PgReviewStore;
