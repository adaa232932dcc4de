//! Shared utilities and common types for Prospect Desk backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Content hashing for stored export files
//! - Field normalization for decoding and identity lookups
//! - Cursor-based pagination for the review ledger

pub mod hash;
pub mod normalize;
pub mod pagination;
