//! Domain layer for Prospect Desk.
//!
//! This crate contains:
//! - Domain models (Lead, ExportJob, review requests and outcomes)
//! - Business logic services (export decoding, file rewriting, the
//!   review concurrency guard and the store seam)
//!
//! It has no dependency on the persistence or API layers.

pub mod models;
pub mod services;
