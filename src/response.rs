//! Uniform success/failure handling for store responses
//!
//! Every stage goes through [`StoreClient::execute`]: a status of 400 or above is an
//! error tagged with the stage's context prefix, anything else is handed to the
//! stage's decoder.

use crate::error::{Error, Result};
use crate::transport::{RawResponse, StoreRequest, Transport};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

/// Body the store returns alongside a 404
#[derive(Debug, Deserialize)]
struct NotFoundBody {
    reason: String,
}

/// Classify a response and decode it on success
///
/// # Errors
/// Returns [`Error::HttpStatus`] for statuses of 400 and above, with the store's
/// `reason` attached on a 404. Errors from `decode` are returned unchanged.
pub fn interpret<T, F>(response: RawResponse, context: &str, decode: F) -> Result<T>
where
    F: FnOnce(&[u8]) -> Result<T>,
{
    if response.status.as_u16() < 400 {
        return decode(&response.body);
    }

    let reason = if response.status == StatusCode::NOT_FOUND {
        match serde_json::from_slice::<NotFoundBody>(&response.body) {
            Ok(body) => Some(body.reason),
            Err(e) => {
                debug!(error = %e, "404 response carried no reason");
                None
            }
        }
    } else {
        None
    };

    Err(Error::HttpStatus {
        context: context.to_string(),
        status: response.status,
        status_text: response.status_text,
        reason,
    })
}

/// A [`Transport`] paired with the response interpretation policy
pub struct StoreClient<T> {
    transport: T,
}

impl<T: Transport> StoreClient<T> {
    /// Wrap a transport
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `request`, then [`interpret`] the response with `decode`
    ///
    /// # Errors
    /// Returns [`Error::Transport`] if no response was received, otherwise whatever
    /// [`interpret`] returns. Both carry `context` as their prefix.
    pub async fn execute<R, F>(&self, request: StoreRequest, context: &str, decode: F) -> Result<R>
    where
        F: FnOnce(&[u8]) -> Result<R>,
    {
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(source) => {
                warn!(error = %source, "{context}request failed");
                return Err(Error::Transport {
                    context: context.to_string(),
                    source,
                });
            }
        };
        interpret(response, context, decode)
    }
}
