//! Domain services for Prospect Desk.
//!
//! Services contain business logic that operates on domain models.

pub mod decoder;
pub mod export_file;
pub mod review_guard;
pub mod review_store;

pub use decoder::{decode_export, DecodedExport, DecodedLead};
pub use export_file::{rewrite_export, surviving_after};
pub use review_guard::{ReviewGuard, ReviewPermit};
pub use review_store::{MockReviewStore, RejectWrite, ReviewStore, StoreError};
