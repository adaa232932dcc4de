//! Persistence layer for Prospect Desk.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations
//! - The filesystem-backed export file store

pub mod db;
pub mod entities;
pub mod files;
pub mod metrics;
pub mod repositories;
