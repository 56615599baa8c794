//! Batch download orchestration and pacing
//!
//! This module provides the download engine: the batch-chaining state
//! machine, provider error classification, pacing with escalating cooldown,
//! and the executor that wires them to a provider session.
//!
//! # Overview
//!
//! A run proceeds in four phases:
//!
//! 1. **Session**: connect and wait for the market-data connection, moving to
//!    the next client id while the current one is taken
//! 2. **Calendar**: fetch contract details and build the [`crate::SessionCalendar`]
//! 3. **Resolution**: turn the end-of-range mode into the first cursor
//! 4. **Batches**: chain requests through [`orchestrator::BatchOrchestrator`]
//!    until the batch target is reached, the provider runs out of data, or a
//!    fatal condition aborts the run
//!
//! # Quick Start
//!
//! ```no_run
//! use tws_history_downloader::downloader::{DownloadConfig, HistoryDownloader};
//! use tws_history_downloader::provider::replay::{ReplayClient, ReplayScript};
//! use tws_history_downloader::session::endpoint::EndMode;
//! use tws_history_downloader::Contract;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DownloadConfig::new(Contract::stock("AAPL", "SMART", "USD"))
//!     .with_end_mode("end".parse::<EndMode>()?)
//!     .with_total_batches(10)
//!     .with_output("./aapl_1min.csv");
//!
//! let (client, events) = ReplayClient::new(ReplayScript::load("session.json")?);
//! let summary = HistoryDownloader::new(client, events, config).run().await?;
//! println!("{:?} after {} batches", summary.completion, summary.batches);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Transient pacing violations are retried inside the run and only show up
//! in the logs. Everything else ends the run:
//! - "no more data" conditions finish gracefully and keep all rows
//! - fatal provider conditions return [`DownloadError::Aborted`] and keep
//!   only rows of completed batches
//! - configuration problems are reported before any provider activity

pub mod classifier;
pub mod config;
pub mod executor;
pub mod orchestrator;
pub mod pacing;

pub use classifier::{AbortReason, ErrorAction, ErrorClassifier, NoDataReason};
pub use config::DownloadConfig;
pub use executor::{DownloadSummary, HistoryDownloader};
pub use orchestrator::{BatchOrchestrator, BatchPlan, BatchState, Completion, Step};
pub use pacing::{PacingController, PacingDecision};

use crate::output::OutputError;
use crate::provider::ProviderError;
use crate::session::endpoint::EndpointError;
use crate::session::SessionError;

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Invalid configuration, detected before connecting
    #[error("configuration error: {0}")]
    Configuration(String),

    /// End of range could not be resolved
    #[error("end of range error: {0}")]
    Endpoint(#[from] EndpointError),

    /// Contract schedule could not be used
    #[error("session calendar error: {0}")]
    Session(#[from] SessionError),

    /// Provider client failure
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Output failure
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Fatal provider condition; committed rows were kept
    #[error("download aborted: {0}")]
    Aborted(AbortReason),
}

impl DownloadError {
    /// Whether the error is a configuration problem rather than a runtime failure
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DownloadError::Configuration(_)
                | DownloadError::Endpoint(EndpointError::MalformedDate(_))
                | DownloadError::Endpoint(EndpointError::MalformedDateTime(_))
        )
    }
}

/// Result type for download operations
pub type DownloadResult<T> = Result<T, DownloadError>;
