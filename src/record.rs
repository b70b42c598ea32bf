//! Authorization records and the deletion marker

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single granted access token as stored in the database
///
/// Only the fields the sweep needs are typed. Everything else in the document
/// (`type`, `accessToken`, `clientId`, ...) is kept verbatim in `extra` so the
/// record written back for deletion differs from the listed one only in `_deleted`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    /// Document id
    #[serde(rename = "_id")]
    pub id: String,

    /// Document revision, required by the store to delete the document
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    /// Expiration instant as stored (ISO-8601)
    #[serde(
        rename = "timestampExpires",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp_expires: Option<String>,

    /// Deletion marker; serialized only once set
    #[serde(rename = "_deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,

    /// Remaining document fields, uninterpreted
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AuthorizationRecord {
    /// Parse the stored expiration timestamp
    ///
    /// Accepts an RFC 3339 instant, a date-time without an offset, or a bare date
    /// (midnight). The last two are read as UTC. Returns `None` when the field is
    /// missing or in none of these forms.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp_expires.as_deref().and_then(parse_timestamp)
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Flag every record for deletion
///
/// No filtering happens here; the input is assumed to already be the deletion
/// set. Returns the same records in the same order with only `_deleted` changed.
pub fn mark_for_deletion(mut records: Vec<AuthorizationRecord>) -> Vec<AuthorizationRecord> {
    for record in &mut records {
        record.deleted = true;
    }
    records
}

/// The records selected for deletion, all flagged, plus how many were scanned
///
/// Only constructible through [`DeletionBatch::new`], which applies the marker,
/// so a batch is never partially flagged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeletionBatch {
    records: Vec<AuthorizationRecord>,
    total_scanned: usize,
}

impl DeletionBatch {
    /// Mark `selected` for deletion and record the number of listed records
    pub fn new(selected: Vec<AuthorizationRecord>, total_scanned: usize) -> Self {
        Self {
            records: mark_for_deletion(selected),
            total_scanned,
        }
    }

    /// Records to submit, each with `_deleted` set
    pub fn records(&self) -> &[AuthorizationRecord] {
        &self.records
    }

    /// Number of records listed by the store
    pub fn total_scanned(&self) -> usize {
        self.total_scanned
    }

    /// Number of records selected for deletion
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was selected
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
