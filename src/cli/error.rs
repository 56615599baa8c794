//! CLI error types and conversions

use crate::downloader::DownloadError;
use crate::provider::ProviderError;

/// Exit status of a successful run
pub const EXIT_OK: i32 = 0;
/// Exit status of an unclassified failure
pub const EXIT_FAILURE: i32 = 1;
/// Exit status of a configuration error, reported before any provider activity
pub const EXIT_CONFIGURATION: i32 = 2;
/// Exit status of a fatal provider condition
pub const EXIT_ABORTED: i32 = 3;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Download error
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),

    /// Provider client could not be set up
    #[error("provider error: {0}")]
    ProviderError(#[from] ProviderError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

impl CliError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument(_) | CliError::ConfigurationError(_) => EXIT_CONFIGURATION,
            CliError::ProviderError(ProviderError::TranscriptError(_)) => EXIT_CONFIGURATION,
            CliError::DownloadError(e) if e.is_configuration() => EXIT_CONFIGURATION,
            CliError::DownloadError(DownloadError::Aborted(_))
            | CliError::DownloadError(DownloadError::Session(_)) => EXIT_ABORTED,
            _ => EXIT_FAILURE,
        }
    }
}
