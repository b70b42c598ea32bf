//! Outbound HTTP requests against the document store
//!
//! The [`Transport`] trait is the only place that touches the network. Stages above
//! it build a [`StoreRequest`] and get back a [`RawResponse`] with no interpretation
//! of the status code.

use crate::config::Credentials;
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

const APPLICATION_JSON: &str = "application/json";

/// A single request to the store
#[derive(Clone, Debug)]
pub struct StoreRequest {
    /// HTTP method (GET for reads, POST for writes)
    pub method: Method,
    /// Fully resolved endpoint
    pub url: Url,
    /// Serialized JSON body, for writes
    pub body: Option<Vec<u8>>,
    /// Declared byte length of `body`; must match exactly
    pub content_length: Option<u64>,
}

impl StoreRequest {
    /// A read request
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            body: None,
            content_length: None,
        }
    }

    /// A JSON write request with its content length computed from `body`
    pub fn post_json(url: Url, body: Vec<u8>) -> Self {
        let content_length = Some(body.len() as u64);
        Self {
            method: Method::POST,
            url,
            body: Some(body),
            content_length,
        }
    }

    /// Check that the declared length matches the body about to be sent
    pub fn check_content_length(&self) -> Result<(), TransportError> {
        let actual = self.body.as_ref().map_or(0, |b| b.len() as u64);
        match self.content_length {
            Some(declared) if declared != actual => {
                Err(TransportError::ContentLengthMismatch { declared, actual })
            }
            None if actual > 0 => Err(TransportError::ContentLengthMismatch {
                declared: 0,
                actual,
            }),
            _ => Ok(()),
        }
    }
}

/// Status and body of a completed request
#[derive(Clone, Debug)]
pub struct RawResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Canonical reason phrase for `status`, or the numeric code if it has none
    ///
    /// This is not the server's own status line: the HTTP client does not expose
    /// it, so a CouchDB `404 Object Not Found` is reported as `Not Found`.
    pub status_text: String,
    /// Raw response body
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Build a response, filling in the status text from `status`
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        let status_text = match status.canonical_reason() {
            Some(reason) => reason.to_string(),
            None => status.as_u16().to_string(),
        };
        Self {
            status,
            status_text,
            body: body.into(),
        }
    }
}

/// Issues one request and returns the raw response
///
/// Implementations must not retry and must not interpret the status code.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and wait for the full response body
    ///
    /// # Errors
    /// Returns [`TransportError`] on connection-level failures (DNS, refused,
    /// reset, timeout, body read) or when the content-length precondition fails.
    async fn send(&self, request: StoreRequest) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] backed by a `reqwest` client
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl HttpTransport {
    /// Create a transport with the given per-request timeout and user agent
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created
    pub fn new(
        timeout: Duration,
        user_agent: &str,
        credentials: Option<Credentials>,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            credentials,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: StoreRequest) -> Result<RawResponse, TransportError> {
        request.check_content_length()?;

        debug!(method = %request.method, url = %request.url, "sending store request");

        let mut builder = self
            .client
            .request(request.method, request.url)
            .header(ACCEPT, APPLICATION_JSON);

        if let Some(credentials) = &self.credentials {
            builder = builder.basic_auth(&credentials.username, credentials.password.as_ref());
        }

        if let (Some(body), Some(length)) = (request.body, request.content_length) {
            builder = builder
                .header(CONTENT_TYPE, APPLICATION_JSON)
                .header(CONTENT_LENGTH, length)
                .body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!(status = status.as_u16(), bytes = body.len(), "store responded");

        Ok(RawResponse::new(status, body.to_vec()))
    }
}
