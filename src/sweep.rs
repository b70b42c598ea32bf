//! Sweep pipeline: list authorizations, then bulk-delete the expired ones
//!
//! A run moves through two stages in strict order:
//! 1. Listing - fetch the authorization view and select records to delete
//! 2. Writing - mark the selection and submit it as one bulk write
//!
//! The first failing stage ends the run; its error is returned unchanged and the
//! next stage never starts.

use crate::bulk::{BulkDocResult, write_batch};
use crate::config::{StoreEndpoints, SweepConfig};
use crate::error::{Error, Result};
use crate::filter::{LISTING_CONTEXT, filter_expired};
use crate::record::DeletionBatch;
use crate::response::StoreClient;
use crate::transport::{HttpTransport, StoreRequest, Transport};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Mutable context threaded through both stages of one run
///
/// Owned by a single run and never shared between runs.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Resolved store endpoints
    pub endpoints: StoreEndpoints,
    /// Select every record regardless of expiration
    pub delete_all: bool,
    /// Skip the write when nothing was selected
    pub skip_empty_batch: bool,
    /// Records selected by the listing stage, marked for deletion
    pub batch: DeletionBatch,
}

impl RunOptions {
    /// Start a run against `endpoints` with the flags from `config`
    pub fn new(endpoints: StoreEndpoints, config: &SweepConfig) -> Self {
        Self {
            endpoints,
            delete_all: config.delete_all,
            skip_empty_batch: config.skip_empty_batch,
            batch: DeletionBatch::default(),
        }
    }

    /// Build the context for one run from a config
    ///
    /// Credentials in the store URL are not part of the run context; they belong
    /// to the [`Transport`] that issues the requests.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the store URL is invalid.
    pub fn from_config(config: &SweepConfig) -> Result<Self> {
        let (endpoints, _) = config.endpoints()?;
        Ok(Self::new(endpoints, config))
    }
}

/// Where a run currently is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepState {
    /// Fetching and filtering the authorization listing
    Listing,
    /// Submitting the bulk delete
    Writing,
    /// Both stages completed
    Done,
    /// A stage failed; no further stage ran
    Failed,
}

impl std::fmt::Display for SweepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SweepState::Listing => "listing",
            SweepState::Writing => "writing",
            SweepState::Done => "done",
            SweepState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of a successful run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records submitted for deletion
    pub deleted: usize,
    /// Records returned by the listing
    pub scanned: usize,
    /// Records the store refused individually during the write
    pub rejected: Vec<BulkDocResult>,
    /// The write was skipped because nothing was selected
    pub write_skipped: bool,
}

/// Runs the two-stage sweep against one store
pub struct Sweeper<T> {
    client: StoreClient<T>,
    state: SweepState,
}

impl<T: Transport> Sweeper<T> {
    /// Create a sweeper issuing requests through `transport`
    pub fn new(transport: T) -> Self {
        Self {
            client: StoreClient::new(transport),
            state: SweepState::Listing,
        }
    }

    /// State reached by the most recent run
    pub fn state(&self) -> SweepState {
        self.state
    }

    /// Run a sweep using the current wall-clock time
    ///
    /// # Errors
    /// Returns the error of the first stage that failed.
    pub async fn run(&mut self, options: &mut RunOptions) -> Result<SweepReport> {
        self.run_at(options, Utc::now()).await
    }

    /// Run a sweep treating `now` as the current time
    ///
    /// # Errors
    /// Returns the error of the first stage that failed.
    pub async fn run_at(
        &mut self,
        options: &mut RunOptions,
        now: DateTime<Utc>,
    ) -> Result<SweepReport> {
        self.transition(SweepState::Listing);
        if let Err(e) = self.list(options, now).await {
            return Err(self.fail(e));
        }

        self.transition(SweepState::Writing);
        let report = match self.write(options).await {
            Ok(report) => report,
            Err(e) => return Err(self.fail(e)),
        };

        self.transition(SweepState::Done);
        info!("Done.");
        Ok(report)
    }

    async fn list(&self, options: &mut RunOptions, now: DateTime<Utc>) -> Result<()> {
        let delete_all = options.delete_all;
        let request = StoreRequest::get(options.endpoints.view.clone());

        let outcome = self
            .client
            .execute(request, LISTING_CONTEXT, |body| {
                filter_expired(body, now, delete_all)
            })
            .await?;

        options.batch = DeletionBatch::new(outcome.selected, outcome.total_scanned);
        Ok(())
    }

    async fn write(&self, options: &RunOptions) -> Result<SweepReport> {
        let batch = &options.batch;

        if batch.is_empty() && options.skip_empty_batch {
            info!(
                scanned = batch.total_scanned(),
                "No expired access tokens; skipping bulk write"
            );
            return Ok(SweepReport {
                deleted: 0,
                scanned: batch.total_scanned(),
                rejected: Vec::new(),
                write_skipped: true,
            });
        }

        let outcome = write_batch(&self.client, &options.endpoints, batch).await?;
        Ok(SweepReport {
            deleted: outcome.deleted,
            scanned: outcome.scanned,
            rejected: outcome.rejected,
            write_skipped: false,
        })
    }

    fn transition(&mut self, next: SweepState) {
        debug!(from = %self.state, to = %next, "sweep state transition");
        self.state = next;
    }

    fn fail(&mut self, error: Error) -> Error {
        warn!(stage = %self.state, error = %error, "sweep failed");
        self.transition(SweepState::Failed);
        error
    }
}

/// Run one sweep over HTTP as described by `config`
///
/// # Errors
/// Returns [`Error::Config`] if the store URL is unusable, [`Error::HttpClient`] if
/// the HTTP client cannot be built, otherwise the error of the first stage that
/// failed.
pub async fn sweep(config: &SweepConfig) -> Result<SweepReport> {
    let (endpoints, credentials) = config.endpoints()?;
    info!(store = %endpoints.redacted(), "sweeping access tokens");

    let transport = HttpTransport::new(config.request_timeout, &config.user_agent, credentials)
        .map_err(|source| Error::HttpClient { source })?;

    let mut options = RunOptions::new(endpoints, config);
    Sweeper::new(transport).run(&mut options).await
}
