//! Error types for token-sweep
//!
//! Every failure a sweep can hit maps onto one of a few variants:
//! - [`Error::Transport`] - the request never produced a status (DNS, refused, reset, body read)
//! - [`Error::HttpStatus`] - the store answered with a status of 400 or above
//! - [`Error::Decode`] - a listing or write-response body could not be decoded
//! - [`Error::InvalidExpiration`] - a record's expiration timestamp could not be read
//! - [`Error::Config`] - the run could not be configured
//! - [`Error::HttpClient`] - the HTTP client could not be built
//!
//! Stage failures carry the stage's context prefix so the rendered message alone
//! tells the operator which step of the sweep failed.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for token-sweep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for token-sweep
#[derive(Debug, Error)]
pub enum Error {
    /// Connection-level failure; no status code was received
    #[error("{context}{source}")]
    Transport {
        /// Stage context prefix (e.g. "Error retrieving access tokens from database: ")
        context: String,
        /// Underlying transport failure
        #[source]
        source: TransportError,
    },

    /// The store answered with a status of 400 or above
    ///
    /// Renders as `<context><code> - <status text>`, with `, <reason>` appended when
    /// the store supplied a reason on a 404.
    #[error("{context}{} - {status_text}{}", .status.as_u16(), reason_suffix(.reason))]
    HttpStatus {
        /// Stage context prefix
        context: String,
        /// HTTP status returned by the store
        status: StatusCode,
        /// Canonical reason phrase for the status, or the code if it has none
        status_text: String,
        /// Machine-readable reason from the body (only on 404)
        reason: Option<String>,
    },

    /// A response body was not in the expected shape
    #[error("{context}malformed response body: {source}")]
    Decode {
        /// Stage context prefix
        context: String,
        /// JSON decoding failure
        #[source]
        source: serde_json::Error,
    },

    /// A request body could not be serialized
    #[error("{context}failed to serialize request body: {source}")]
    Serialization {
        /// Stage context prefix
        context: String,
        /// JSON encoding failure
        #[source]
        source: serde_json::Error,
    },

    /// An access token's expiration timestamp is missing or unparsable
    #[error(
        "{context}access token {id} has an invalid expiration timestamp: {}",
        .value.as_deref().unwrap_or("<missing>")
    )]
    InvalidExpiration {
        /// Stage context prefix
        context: String,
        /// Document id of the offending record
        id: String,
        /// The raw timestamp value, if one was present
        value: Option<String>,
    },

    /// The HTTP client could not be built from the configured settings
    #[error("failed to create HTTP client: {source}")]
    HttpClient {
        /// Underlying client construction failure
        #[source]
        source: TransportError,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "store_url")
        key: Option<String>,
    },
}

impl Error {
    /// HTTP status carried by the error, if the store produced one
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Stage context prefix, if the error came from a pipeline stage
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Transport { context, .. }
            | Error::HttpStatus { context, .. }
            | Error::Decode { context, .. }
            | Error::Serialization { context, .. }
            | Error::InvalidExpiration { context, .. } => Some(context),
            Error::HttpClient { .. } | Error::Config { .. } => None,
        }
    }

    pub(crate) fn config(message: impl Into<String>, key: &str) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(", {r}"))
        .unwrap_or_default()
}

/// Failures raised by a [`Transport`](crate::transport::Transport) before any status is seen
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP client failed to connect, send, or read the body
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    /// The declared content length does not match the body about to be sent
    #[error("declared content length {declared} does not match body length {actual}")]
    ContentLengthMismatch {
        /// Length the caller declared
        declared: u64,
        /// Length of the serialized body
        actual: u64,
    },
}
