//! Provider error classification
//!
//! Maps every `(code, message)` pair the provider reports onto the action
//! the downloader takes. Matching is case-insensitive on message substrings,
//! since the provider's wording varies between versions.

use crate::provider::codes;
use std::fmt;

/// Why the run stopped before reaching the batch target without failing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDataReason {
    /// Provider rejected the duration/bar-size step
    InvalidStep,
    /// Provider returned no data for the range
    NoData,
    /// Requested range predates the provider's history
    BeyondHistory,
    /// A batch completed without any rows
    EmptyBatch,
    /// A batch did not move the cursor back in time
    CursorStalled,
}

impl fmt::Display for NoDataReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NoDataReason::InvalidStep => "invalid step",
            NoDataReason::NoData => "no data",
            NoDataReason::BeyondHistory => "range predates available history",
            NoDataReason::EmptyBatch => "empty batch",
            NoDataReason::CursorStalled => "cursor did not move back",
        };
        f.write_str(text)
    }
}

/// Why a run was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Provider connection dropped
    ConnectionLost,
    /// Provider has no definition for the instrument
    InstrumentNotFound,
    /// Contract details did not arrive in time
    ContractDetailsTimeout,
    /// An awaited batch or session response did not arrive in time
    ResponseTimeout,
    /// Pacing violations exceeded the configured ceiling
    PacingExhausted,
    /// Cancellation was requested
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AbortReason::ConnectionLost => "connection to the provider was lost",
            AbortReason::InstrumentNotFound => "no security definition found for the instrument",
            AbortReason::ContractDetailsTimeout => "timed out waiting for contract details",
            AbortReason::ResponseTimeout => "timed out waiting for a provider response",
            AbortReason::PacingExhausted => "too many pacing violations",
            AbortReason::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// What to do about a provider message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Client id is taken, reconnect with the next one
    Reconnect,
    /// Market-data connection confirmed
    SessionReady,
    /// Retry the current batch after a cooldown
    PacingRetry,
    /// Finish gracefully, committing buffered rows
    NoMoreData(NoDataReason),
    /// Stop now, keeping only committed rows
    Abort(AbortReason),
    /// Informational
    LogOnly,
}

/// Classifier for provider error callbacks
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify one provider message
    pub fn classify(code: i32, message: &str) -> ErrorAction {
        let message = message.to_lowercase();
        match code {
            codes::CLIENT_ID_IN_USE => ErrorAction::Reconnect,
            codes::MARKET_DATA_CONNECTION_OK => ErrorAction::SessionReady,
            codes::HISTORICAL_DATA_ERROR if message.contains("pacing violation") => {
                ErrorAction::PacingRetry
            }
            codes::HISTORICAL_DATA_ERROR if message.contains("invalid step") => {
                ErrorAction::NoMoreData(NoDataReason::InvalidStep)
            }
            codes::HISTORICAL_DATA_ERROR if message.contains("no data") => {
                ErrorAction::NoMoreData(NoDataReason::NoData)
            }
            codes::ERROR_VALIDATING_REQUEST if message.contains("earlier than") => {
                ErrorAction::NoMoreData(NoDataReason::BeyondHistory)
            }
            codes::CONNECTION_LOST => ErrorAction::Abort(AbortReason::ConnectionLost),
            codes::NO_SECURITY_DEFINITION => ErrorAction::Abort(AbortReason::InstrumentNotFound),
            _ => ErrorAction::LogOnly,
        }
    }
}
