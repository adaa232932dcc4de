//! Export file decoder.
//!
//! Turns raw CSV export text into an ordered arena of typed lead records.
//! Every decoded record carries a `temp_id` equal to its line position in
//! the file (header = line 0), which is the only handle linking a record
//! back to its original line when the file is rewritten. The arena is
//! rebuilt from scratch after every rewrite so ids never go stale.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use shared::normalize::{clean_field, normalize_email, normalize_header};
use tracing::{debug, warn};

use crate::models::lead::{LeadStatus, NewLead};

/// Accepted header spellings per canonical attribute. Earlier entries win
/// when a header matches several.
const NAME_HEADERS: &[&str] = &["name", "full_name", "contact_name"];
const EMAIL_HEADERS: &[&str] = &["email", "email_address", "work_email"];
const COMPANY_NAME_HEADERS: &[&str] = &["company_name", "company", "organization"];
const COMPANY_WEBSITE_HEADERS: &[&str] = &["company_website", "website", "company_url", "domain"];
const JOB_TITLE_HEADERS: &[&str] = &["job_title", "title", "position"];
const PHONE_HEADERS: &[&str] = &["phone", "phone_number", "mobile"];
const LINKEDIN_HEADERS: &[&str] = &["linkedin_url", "linkedin", "linkedin_profile"];
const COUNTRY_HEADERS: &[&str] = &["country_name", "country"];
const STATE_HEADERS: &[&str] = &["state_name", "state", "region"];

/// How many fields a data row may fall short of the header before it is
/// dropped as ragged.
const MAX_MISSING_FIELDS: usize = 5;

/// One decoded export row.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLead {
    /// Line position in the source file; header is line 0.
    pub temp_id: u32,
    /// The original unparsed line, kept verbatim for file rewriting.
    pub raw_line: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    pub job_title: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub country_name: Option<String>,
    pub state_name: Option<String>,
}

impl DecodedLead {
    /// Builds the stored-lead row an accept writes for this record.
    pub fn to_accepted(&self, user_id: i64, campaign_id: &str, now: DateTime<Utc>) -> NewLead {
        NewLead {
            user_id,
            name: self.name.clone(),
            email: self.email.clone(),
            company_name: self.company_name.clone(),
            company_website: self.company_website.clone(),
            job_title: self.job_title.clone(),
            phone: self.phone.clone(),
            linkedin_url: self.linkedin_url.clone(),
            country_name: self.country_name.clone(),
            state_name: self.state_name.clone(),
            status: LeadStatus::Accepted,
            campaign_id: Some(campaign_id.to_string()),
            reviewed_at: Some(now),
            accepted_at: Some(now),
        }
    }

    /// Builds the stored-lead row a reject writes for this record.
    pub fn to_rejected(&self, user_id: i64, now: DateTime<Utc>) -> NewLead {
        NewLead {
            user_id,
            name: self.name.clone(),
            email: self.email.clone(),
            company_name: self.company_name.clone(),
            company_website: self.company_website.clone(),
            job_title: self.job_title.clone(),
            phone: self.phone.clone(),
            linkedin_url: self.linkedin_url.clone(),
            country_name: self.country_name.clone(),
            state_name: self.state_name.clone(),
            status: LeadStatus::Rejected,
            campaign_id: None,
            reviewed_at: Some(now),
            accepted_at: None,
        }
    }
}

/// The decoded arena for one version of an export file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedExport {
    /// The header line, verbatim.
    pub header_line: String,
    /// Decoded records in file order; `temp_id`s are strictly increasing.
    pub records: Vec<DecodedLead>,
    /// Lines after the header, including skipped ones.
    pub data_rows: u32,
    /// Rows dropped during decoding (blank, ragged, or unidentifiable).
    pub skipped_rows: u32,
    /// Whether the source text ended with a newline.
    pub ends_with_newline: bool,
}

impl DecodedExport {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolves a selection of `temp_id`s against this arena, deduplicated
    /// and in file order. Returns the ids that no longer exist on failure,
    /// which callers surface as a stale selection.
    pub fn select(&self, temp_ids: &[u32]) -> Result<Vec<&DecodedLead>, Vec<u32>> {
        let wanted: BTreeSet<u32> = temp_ids.iter().copied().collect();
        let missing: Vec<u32> = wanted
            .iter()
            .copied()
            .filter(|id| !self.records.iter().any(|r| r.temp_id == *id))
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }
        Ok(self
            .records
            .iter()
            .filter(|r| wanted.contains(&r.temp_id))
            .collect())
    }
}

/// Decodes raw export text into an ordered record arena.
///
/// A file with fewer than two non-empty lines decodes to an empty arena
/// rather than an error: an empty review queue is a valid terminal state.
pub fn decode_export(text: &str) -> DecodedExport {
    let ends_with_newline = text.ends_with('\n');
    let mut lines: Vec<&str> = text.split('\n').collect();
    if ends_with_newline {
        lines.pop();
    }

    let non_empty = lines.iter().filter(|line| !line.trim().is_empty()).count();
    if non_empty < 2 {
        return DecodedExport::default();
    }

    let header_fields = parse_fields(strip_cr(lines[0]));
    let columns = ColumnMap::resolve(&header_fields);
    let header_width = header_fields.len();

    let mut records = Vec::new();
    let mut data_rows = 0u32;
    let mut skipped_rows = 0u32;

    for (index, line) in lines.iter().enumerate().skip(1) {
        let temp_id = index as u32;
        data_rows += 1;

        let content = strip_cr(line);
        if content.trim().is_empty() {
            skipped_rows += 1;
            debug!(temp_id, "skipping blank export row");
            continue;
        }

        let fields = parse_fields(content);
        if fields.len() + MAX_MISSING_FIELDS < header_width {
            skipped_rows += 1;
            warn!(
                temp_id,
                field_count = fields.len(),
                header_width,
                "skipping ragged export row"
            );
            continue;
        }

        let record = columns.build_record(temp_id, line, &fields);
        if record.name.is_none() && record.email.is_none() {
            skipped_rows += 1;
            warn!(temp_id, "skipping export row with no name or email");
            continue;
        }

        records.push(record);
    }

    DecodedExport {
        header_line: lines[0].to_string(),
        records,
        data_rows,
        skipped_rows,
        ends_with_newline,
    }
}

/// Column positions resolved from the header, one per canonical attribute.
#[derive(Debug, Default)]
struct ColumnMap {
    name: Option<usize>,
    email: Option<usize>,
    company_name: Option<usize>,
    company_website: Option<usize>,
    job_title: Option<usize>,
    phone: Option<usize>,
    linkedin_url: Option<usize>,
    country_name: Option<usize>,
    state_name: Option<usize>,
}

impl ColumnMap {
    fn resolve(header_fields: &[String]) -> Self {
        let normalized: Vec<String> = header_fields
            .iter()
            .map(|field| normalize_header(field))
            .collect();
        let find = |synonyms: &[&str]| {
            synonyms
                .iter()
                .find_map(|synonym| normalized.iter().position(|header| header == synonym))
        };
        Self {
            name: find(NAME_HEADERS),
            email: find(EMAIL_HEADERS),
            company_name: find(COMPANY_NAME_HEADERS),
            company_website: find(COMPANY_WEBSITE_HEADERS),
            job_title: find(JOB_TITLE_HEADERS),
            phone: find(PHONE_HEADERS),
            linkedin_url: find(LINKEDIN_HEADERS),
            country_name: find(COUNTRY_HEADERS),
            state_name: find(STATE_HEADERS),
        }
    }

    fn build_record(&self, temp_id: u32, raw_line: &str, fields: &[String]) -> DecodedLead {
        let pick = |column: Option<usize>| column.and_then(|i| fields.get(i)).and_then(|v| clean_field(v));
        DecodedLead {
            temp_id,
            raw_line: raw_line.to_string(),
            name: pick(self.name),
            email: self
                .email
                .and_then(|i| fields.get(i))
                .and_then(|v| normalize_email(v)),
            company_name: pick(self.company_name),
            company_website: pick(self.company_website),
            job_title: pick(self.job_title),
            phone: pick(self.phone),
            linkedin_url: pick(self.linkedin_url),
            country_name: pick(self.country_name),
            state_name: pick(self.state_name),
        }
    }
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

/// Splits one CSV line into fields. Double-quoted fields may contain commas
/// and doubled quotes; quotes are stripped after unescaping. A line the CSV
/// reader cannot parse yields no fields, which the caller drops as ragged.
fn parse_fields(line: &str) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => record.iter().map(str::to_string).collect(),
        Ok(false) => Vec::new(),
        Err(err) => {
            debug!(error = %err, "export row failed CSV parsing");
            Vec::new()
        }
    }
}
