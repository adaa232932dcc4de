//! HTTP route handlers.

pub mod export_jobs;
pub mod health;
pub mod reviews;
