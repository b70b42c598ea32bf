//! Expiration filter for the authorization listing
//!
//! Decodes the view response and selects the records to delete: those whose
//! expiration instant is strictly before `now`, or every record when the
//! `delete_all` override is set.

use crate::error::{Error, Result};
use crate::record::AuthorizationRecord;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

/// Context prefix for failures of the listing stage
pub const LISTING_CONTEXT: &str = "Error retrieving access tokens from database: ";

/// Result of filtering one listing
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterOutcome {
    /// Records selected for deletion, in listing order
    pub selected: Vec<AuthorizationRecord>,
    /// Number of records in the listing
    pub total_scanned: usize,
}

#[derive(Debug, Deserialize)]
struct ViewListing {
    rows: Option<Vec<ViewRow>>,
}

#[derive(Debug, Deserialize)]
struct ViewRow {
    value: RowValue,
}

#[derive(Debug, Deserialize)]
struct RowValue {
    authorization: AuthorizationRecord,
}

/// Decode a view listing and select the records to delete
///
/// A listing with no `rows` (or an empty one) yields an empty selection. A record
/// expiring at exactly `now` is not selected.
///
/// # Errors
/// Returns [`Error::Decode`] if the listing is malformed, and
/// [`Error::InvalidExpiration`] if `delete_all` is off and a record's
/// `timestampExpires` is missing or not an ISO-8601 date or date-time.
pub fn filter_expired(
    listing: &[u8],
    now: DateTime<Utc>,
    delete_all: bool,
) -> Result<FilterOutcome> {
    if delete_all {
        info!("Deleting all access tokens...");
    } else {
        info!("Filtering for expired access tokens...");
    }

    let listing: ViewListing = serde_json::from_slice(listing).map_err(|source| Error::Decode {
        context: LISTING_CONTEXT.to_string(),
        source,
    })?;

    let mut outcome = FilterOutcome::default();
    for row in listing.rows.unwrap_or_default() {
        let record = row.value.authorization;
        outcome.total_scanned += 1;

        if delete_all || is_expired(&record, now)? {
            debug!(id = %record.id, "selected access token for deletion");
            outcome.selected.push(record);
        }
    }

    debug!(
        selected = outcome.selected.len(),
        scanned = outcome.total_scanned,
        "filtered access tokens"
    );
    Ok(outcome)
}

fn is_expired(record: &AuthorizationRecord, now: DateTime<Utc>) -> Result<bool> {
    let expires = record.expires_at().ok_or_else(|| Error::InvalidExpiration {
        context: LISTING_CONTEXT.to_string(),
        id: record.id.clone(),
        value: record.timestamp_expires.clone(),
    })?;
    Ok(now > expires)
}
