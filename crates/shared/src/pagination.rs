//! Cursor-based pagination for the review ledger.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Error type for cursor operations.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Invalid cursor format")]
    InvalidFormat,
    #[error("Invalid cursor encoding")]
    InvalidEncoding,
    #[error("Invalid timestamp in cursor")]
    InvalidTimestamp,
    #[error("Invalid lead ID in cursor")]
    InvalidId,
}

/// Composite pagination cursor over the review ledger.
///
/// The wire format is base64(RFC3339_timestamp:lead_id). The lead id
/// component breaks ties between leads reviewed in the same microsecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewCursor {
    pub reviewed_at: DateTime<Utc>,
    pub lead_id: i64,
}

impl ReviewCursor {
    pub fn new(reviewed_at: DateTime<Utc>, lead_id: i64) -> Self {
        Self {
            reviewed_at,
            lead_id,
        }
    }

    /// Encodes the cursor into its opaque wire form.
    pub fn encode(&self) -> String {
        let raw = format!(
            "{}:{}",
            self.reviewed_at
                .to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            self.lead_id
        );
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    /// Decodes an opaque cursor back into its components.
    pub fn decode(cursor: &str) -> Result<Self, CursorError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|_| CursorError::InvalidEncoding)?;

        let s = String::from_utf8(decoded).map_err(|_| CursorError::InvalidFormat)?;

        // Split on the last colon; the timestamp itself contains colons.
        let colon_pos = s.rfind(':').ok_or(CursorError::InvalidFormat)?;
        let timestamp_str = &s[..colon_pos];
        let id_str = &s[colon_pos + 1..];

        let lead_id: i64 = id_str.parse().map_err(|_| CursorError::InvalidId)?;

        let reviewed_at = DateTime::parse_from_rfc3339(timestamp_str)
            .map_err(|_| CursorError::InvalidTimestamp)?
            .with_timezone(&Utc);

        Ok(Self {
            reviewed_at,
            lead_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_cursor_roundtrip() {
        let cursor = ReviewCursor::new(Utc.with_ymd_and_hms(2025, 3, 14, 10, 30, 0).unwrap(), 42);

        let encoded = cursor.encode();
        let decoded = ReviewCursor::decode(&encoded).unwrap();

        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_cursor_roundtrip_with_microseconds() {
        let reviewed_at = Utc
            .with_ymd_and_hms(2025, 6, 15, 14, 30, 45)
            .unwrap()
            .with_nanosecond(123_456_000)
            .unwrap();
        let cursor = ReviewCursor::new(reviewed_at, 999_999);

        let decoded = ReviewCursor::decode(&cursor.encode()).unwrap();

        // Microsecond precision survives the roundtrip
        assert_eq!(
            decoded.reviewed_at.timestamp_micros(),
            reviewed_at.timestamp_micros()
        );
        assert_eq!(decoded.lead_id, 999_999);
    }

    #[test]
    fn test_decode_invalid_base64() {
        let result = ReviewCursor::decode("not-valid-base64!!!");
        assert!(matches!(result, Err(CursorError::InvalidEncoding)));
    }

    #[test]
    fn test_decode_missing_colon() {
        let invalid = URL_SAFE_NO_PAD.encode(b"no-colon-here");
        let result = ReviewCursor::decode(&invalid);
        assert!(matches!(result, Err(CursorError::InvalidFormat)));
    }

    #[test]
    fn test_decode_invalid_id() {
        let invalid = URL_SAFE_NO_PAD.encode(b"2025-03-14T10:30:00Z:not-a-number");
        let result = ReviewCursor::decode(&invalid);
        assert!(matches!(result, Err(CursorError::InvalidId)));
    }

    #[test]
    fn test_decode_invalid_timestamp() {
        let invalid = URL_SAFE_NO_PAD.encode(b"not-a-timestamp:42");
        let result = ReviewCursor::decode(&invalid);
        assert!(matches!(result, Err(CursorError::InvalidTimestamp)));
    }
}
