//! Field normalization shared by the export decoder and identity lookups.
//!
//! Emails are the per-operator identity key, so every email that enters the
//! system goes through [`normalize_email`] first; comparing a normalized
//! email against a raw one is a bug.

/// Normalizes an email for identity comparison: trimmed and lowercased.
///
/// Returns `None` when the input is empty or whitespace-only.
pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes a header cell for synonym matching: trimmed and lowercased.
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Cleans a decoded field value: trims whitespace, `None` when empty.
pub fn clean_field(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
