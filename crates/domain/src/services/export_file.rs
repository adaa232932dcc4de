//! Export file rewriting.
//!
//! After a review pass the export file must contain exactly the rows that
//! survived, expressed as their original unparsed lines so columns the
//! decoder does not model survive byte-for-byte. The store is written
//! first and is authoritative; the rewritten file is an advisory mirror.

use std::collections::BTreeSet;

use super::decoder::{DecodedExport, DecodedLead};

/// Plans the post-review file content: the original header plus each
/// surviving record's original line, in file order.
///
/// Returns `None` when nothing survives — the caller deletes the file and
/// its job record instead of writing a header-only husk that would decode
/// to an empty queue anyway.
pub fn rewrite_export(decoded: &DecodedExport, surviving: &[&DecodedLead]) -> Option<String> {
    if surviving.is_empty() {
        return None;
    }

    let capacity = decoded.header_line.len()
        + surviving.iter().map(|r| r.raw_line.len() + 1).sum::<usize>()
        + 1;
    let mut out = String::with_capacity(capacity);
    out.push_str(&decoded.header_line);
    for record in surviving {
        out.push('\n');
        out.push_str(&record.raw_line);
    }
    if decoded.ends_with_newline {
        out.push('\n');
    }
    Some(out)
}

/// The records of `decoded` that are not in `removed`, in file order.
pub fn surviving_after<'a>(
    decoded: &'a DecodedExport,
    removed: &BTreeSet<u32>,
) -> Vec<&'a DecodedLead> {
    decoded
        .records
        .iter()
        .filter(|record| !removed.contains(&record.temp_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::decoder::decode_export;

    #[test]
    fn test_rewrite_with_all_records_reproduces_file_byte_for_byte() {
        let text = "name,email,notes\n\"Doe, Jane\",jane@x.com,\"likes \"\"quotes\"\"\"\nBob,bob@x.com,plain\n";
        let decoded = decode_export(text);

        let all: Vec<&DecodedLead> = decoded.records.iter().collect();
        assert_eq!(rewrite_export(&decoded, &all).as_deref(), Some(text));
    }

    #[test]
    fn test_rewrite_preserves_crlf_and_unmodeled_columns() {
        let text = "name,email,internal_score\r\nJane,jane@x.com,0.93\r\nBob,bob@x.com,0.41\r\n";
        let decoded = decode_export(text);

        let all: Vec<&DecodedLead> = decoded.records.iter().collect();
        assert_eq!(rewrite_export(&decoded, &all).as_deref(), Some(text));
    }

    #[test]
    fn test_rewrite_without_trailing_newline() {
        let text = "name,email\nJane,jane@x.com\nBob,bob@x.com";
        let decoded = decode_export(text);

        let all: Vec<&DecodedLead> = decoded.records.iter().collect();
        assert_eq!(rewrite_export(&decoded, &all).as_deref(), Some(text));
    }

    #[test]
    fn test_rewrite_drops_removed_rows() {
        let text = "name,email\nA,a@x.com\nB,b@x.com\nC,c@x.com\n";
        let decoded = decode_export(text);

        let removed = BTreeSet::from([2]);
        let surviving = surviving_after(&decoded, &removed);
        assert_eq!(
            rewrite_export(&decoded, &surviving).as_deref(),
            Some("name,email\nA,a@x.com\nC,c@x.com\n")
        );
    }

    #[test]
    fn test_rewrite_returns_none_when_nothing_survives() {
        let text = "name,email\nA,a@x.com\n";
        let decoded = decode_export(text);

        let removed = BTreeSet::from([1]);
        let surviving = surviving_after(&decoded, &removed);
        assert_eq!(rewrite_export(&decoded, &surviving), None);
    }

    #[test]
    fn test_surviving_after_keeps_file_order() {
        let text = "name,email\nA,a@x.com\nB,b@x.com\nC,c@x.com\nD,d@x.com\n";
        let decoded = decode_export(text);

        let removed = BTreeSet::from([1, 3]);
        let surviving = surviving_after(&decoded, &removed);
        let ids: Vec<u32> = surviving.iter().map(|r| r.temp_id).collect();
        assert_eq!(ids, vec![2, 4]);
    }
}
