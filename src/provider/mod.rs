//! Provider client contract and callback payloads
//!
//! The downloader never speaks the provider's wire protocol itself. It drives
//! a [`ProviderClient`] for outbound calls and consumes [`ProviderEvent`]s,
//! which the client delivers in order on a single channel.

use crate::{BarSize, Contract, DataType};
use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub mod codes;
pub mod parser;
pub mod replay;

/// Format of the `endDateTime` argument of a historical request
pub const REQUEST_DATE_FORMAT: &str = "%Y%m%d %H:%M:%S";

/// Marker carried in the date field of the batch-complete sentinel
pub const SENTINEL_MARKER: &str = "finished";

/// Provider errors
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Connecting to the provider failed
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// Sending a request failed
    #[error("request error: {0}")]
    RequestError(String),

    /// A delivered payload could not be parsed
    #[error("parse error: {0}")]
    ParseError(String),

    /// Replay transcript could not be used
    #[error("transcript error: {0}")]
    TranscriptError(String),

    /// Event channel closed before the run finished
    #[error("provider event channel closed")]
    ChannelClosed,
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Schedule information returned for a contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDetails {
    /// Provider zone code (e.g. "EST")
    pub time_zone_id: String,
    /// Liquid (regular trading) hours schedule
    pub liquid_hours: String,
    /// Full trading session schedule
    pub trading_hours: String,
}

/// One historical bar as delivered, or the batch-complete sentinel
///
/// The date is a string in the local timezone (`%Y%m%d %H:%M:%S`, or
/// `%Y%m%d` for daily bars). The sentinel carries a status string starting
/// with `finished` in place of the date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarData {
    /// Bar date, or the sentinel status
    pub date: String,
    /// Open
    pub open: f64,
    /// High
    pub high: f64,
    /// Low
    pub low: f64,
    /// Close
    pub close: f64,
    /// Volume
    pub volume: i64,
    /// Number of trades
    pub bar_count: i32,
    /// Weighted average price
    pub wap: f64,
    /// Gap flag
    pub has_gaps: bool,
}

impl BarData {
    /// Sentinel marking the end of a batch
    pub fn sentinel(status: impl Into<String>) -> Self {
        let status = status.into();
        let date = if status.contains(SENTINEL_MARKER) {
            status
        } else {
            format!("{SENTINEL_MARKER}-{status}")
        };
        Self {
            date,
            ..Self::default()
        }
    }

    /// Whether this is the batch-complete sentinel rather than a bar
    pub fn is_sentinel(&self) -> bool {
        self.date.contains(SENTINEL_MARKER)
    }
}

/// Callback delivered by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProviderEvent {
    /// Error or informational message (`request_id` is -1 when not tied to a request)
    Error {
        /// Request the message refers to
        request_id: i64,
        /// Provider message code
        code: i32,
        /// Message text
        message: String,
    },
    /// Contract details answer
    ContractDetails {
        /// Originating request
        request_id: i64,
        /// Schedules and zone code
        details: ContractDetails,
    },
    /// Historical bar or batch sentinel
    HistoricalData {
        /// Originating request
        request_id: i64,
        /// Bar payload
        bar: BarData,
    },
}

/// One historical-data batch request
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalDataRequest {
    /// Instrument
    pub contract: Contract,
    /// Batch end (cursor) in the local timezone
    pub end: DateTime<Tz>,
    /// Span to cover, e.g. "2 D"
    pub duration: &'static str,
    /// Bar size
    pub bar_size: BarSize,
    /// Series
    pub data_type: DataType,
    /// Regular trading hours only
    pub rth_only: bool,
    /// Provider date format selector (1 = formatted strings)
    pub date_format: i32,
}

impl HistoricalDataRequest {
    /// `endDateTime` argument as sent to the provider
    pub fn end_date_time(&self) -> String {
        self.end.format(REQUEST_DATE_FORMAT).to_string()
    }
}

/// Outbound half of a provider session
///
/// Implementations deliver every callback on the event channel handed to
/// the downloader, in arrival order.
#[async_trait]
pub trait ProviderClient: Send {
    /// Open a session
    async fn connect(&mut self, host: &str, port: u16, client_id: i32) -> ProviderResult<()>;

    /// Ask for the contract's schedule
    async fn request_contract_details(
        &mut self,
        request_id: i64,
        contract: &Contract,
    ) -> ProviderResult<()>;

    /// Ask for one batch of historical data
    async fn request_historical_data(
        &mut self,
        request_id: i64,
        request: &HistoricalDataRequest,
    ) -> ProviderResult<()>;

    /// Close the session
    async fn disconnect(&mut self) -> ProviderResult<()>;
}
