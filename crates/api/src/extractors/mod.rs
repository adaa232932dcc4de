//! Custom Axum extractors.
//!
//! Extractors for parsing and validating request data.

pub mod operator;

pub use operator::{OperatorContext, DEFAULT_CAMPAIGN_HEADER, OPERATOR_ID_HEADER};
