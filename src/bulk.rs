//! Bulk write of deletion-marked records

use crate::config::StoreEndpoints;
use crate::error::{Error, Result};
use crate::record::{AuthorizationRecord, DeletionBatch};
use crate::response::StoreClient;
use crate::transport::{StoreRequest, Transport};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Context prefix for failures of the write stage
pub const WRITE_CONTEXT: &str = "Error deleting access tokens from database: ";

/// Request envelope for the bulk documents endpoint
#[derive(Debug, Serialize)]
struct BulkDocs<'a> {
    docs: &'a [AuthorizationRecord],
}

/// Per-document entry in the bulk documents response
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct BulkDocResult {
    /// Document id
    pub id: String,
    /// New revision, on success
    #[serde(default)]
    pub rev: Option<String>,
    /// Error kind (e.g. "conflict"), on failure
    #[serde(default)]
    pub error: Option<String>,
    /// Error description, on failure
    #[serde(default)]
    pub reason: Option<String>,
}

/// What a bulk write accomplished
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Number of records submitted for deletion
    pub deleted: usize,
    /// Number of records the listing returned
    pub scanned: usize,
    /// Documents the store refused individually (e.g. revision conflicts)
    pub rejected: Vec<BulkDocResult>,
}

/// Serialize a batch as `{"docs": [...]}`
///
/// # Errors
/// Returns [`Error::Serialization`] if a record cannot be serialized.
pub fn encode_batch(batch: &DeletionBatch) -> Result<Vec<u8>> {
    serde_json::to_vec(&BulkDocs {
        docs: batch.records(),
    })
    .map_err(|source| Error::Serialization {
        context: WRITE_CONTEXT.to_string(),
        source,
    })
}

/// Submit every record in `batch` in a single bulk write
///
/// The request body's exact byte length is declared alongside it. The store's
/// per-document results are decoded; documents it refused are reported in
/// [`WriteOutcome::rejected`] but do not fail the write.
///
/// # Errors
/// Returns the write stage's [`Error::Transport`], [`Error::HttpStatus`] or
/// [`Error::Decode`].
pub async fn write_batch<T: Transport>(
    client: &StoreClient<T>,
    endpoints: &StoreEndpoints,
    batch: &DeletionBatch,
) -> Result<WriteOutcome> {
    let body = encode_batch(batch)?;
    let request = StoreRequest::post_json(endpoints.bulk_docs.clone(), body);

    let results = client
        .execute(request, WRITE_CONTEXT, decode_bulk_response)
        .await?;

    let rejected: Vec<BulkDocResult> = results
        .into_iter()
        .filter(|r| r.error.is_some())
        .collect();
    for doc in &rejected {
        warn!(
            id = %doc.id,
            error = doc.error.as_deref().unwrap_or_default(),
            reason = doc.reason.as_deref().unwrap_or_default(),
            "store refused to delete access token"
        );
    }

    info!(
        deleted = batch.len(),
        scanned = batch.total_scanned(),
        "Deleted {} of {} access tokens.",
        batch.len(),
        batch.total_scanned()
    );

    Ok(WriteOutcome {
        deleted: batch.len(),
        scanned: batch.total_scanned(),
        rejected,
    })
}

fn decode_bulk_response(body: &[u8]) -> Result<Vec<BulkDocResult>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(body).map_err(|source| Error::Decode {
        context: WRITE_CONTEXT.to_string(),
        source,
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str) -> AuthorizationRecord {
        serde_json::from_value(json!({
            "_id": id,
            "_rev": "1-abc",
            "accessToken": "tok",
            "timestampExpires": "2019-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn empty_batch_encodes_to_empty_envelope() {
        let body = encode_batch(&DeletionBatch::default()).unwrap();
        assert_eq!(body, br#"{"docs":[]}"#);
    }

    #[test]
    fn envelope_wraps_marked_records() {
        let batch = DeletionBatch::new(vec![record("a"), record("b")], 4);
        let encoded = encode_batch(&batch).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&encoded).unwrap();

        let docs = body["docs"].as_array().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["_id"], json!("a"));
        assert_eq!(docs[1]["_id"], json!("b"));
        assert!(docs.iter().all(|d| d["_deleted"] == json!(true)));
        assert_eq!(docs[0]["accessToken"], json!("tok"));
    }

    #[test]
    fn bulk_response_separates_refusals() {
        let results = decode_bulk_response(
            br#"[{"ok":true,"id":"a","rev":"2-x"},{"id":"b","error":"conflict","reason":"Document update conflict."}]"#,
        )
        .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rev.as_deref(), Some("2-x"));
        assert!(results[0].error.is_none());
        assert_eq!(results[1].error.as_deref(), Some("conflict"));
    }

    #[test]
    fn empty_bulk_response_is_accepted() {
        assert!(decode_bulk_response(b"").unwrap().is_empty());
        assert!(decode_bulk_response(b" \n").unwrap().is_empty());
    }

    #[test]
    fn malformed_bulk_response_is_a_write_stage_decode_error() {
        let err = decode_bulk_response(br#"{"ok": true}"#).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(err.to_string().starts_with(WRITE_CONTEXT));
    }
}
