//! Transcript-driven provider client
//!
//! [`ReplayClient`] answers every outbound call with the next scripted group
//! of events from a [`ReplayScript`]. It is used to replay a recorded
//! provider session offline, and it records each call it receives in a
//! [`Journal`] so a run's request sequence can be inspected afterwards.
//!
//! Transcript format (JSON):
//!
//! ```json
//! {
//!   "connect": [[{"event": "error", "request_id": -1, "code": 2104, "message": "Market data farm connection is OK"}]],
//!   "contract_details": [[{"event": "contract_details", "request_id": 0,
//!                          "details": {"time_zone_id": "EST",
//!                                      "liquid_hours": "20140221:0930-1600;20140224:0930-1600",
//!                                      "trading_hours": "20140221:0400-2000;20140224:0400-2000"}}]],
//!   "historical": [[{"event": "historical_data", "request_id": 0, "bar": {"date": "finished"}}]]
//! }
//! ```

use crate::provider::{
    HistoricalDataRequest, ProviderClient, ProviderError, ProviderEvent, ProviderResult,
};
use crate::Contract;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// Scripted responses, one group of events per outbound call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    /// Responses to successive `connect` calls
    #[serde(default)]
    pub connect: Vec<Vec<ProviderEvent>>,
    /// Responses to successive contract-details requests
    #[serde(default)]
    pub contract_details: Vec<Vec<ProviderEvent>>,
    /// Responses to successive historical-data requests
    #[serde(default)]
    pub historical: Vec<Vec<ProviderEvent>>,
}

impl ReplayScript {
    /// Load a transcript from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> ProviderResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            ProviderError::TranscriptError(format!("Failed to open {}: {e}", path.display()))
        })?;
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| {
            ProviderError::TranscriptError(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Append the response to the next `connect`
    pub fn on_connect(mut self, events: Vec<ProviderEvent>) -> Self {
        self.connect.push(events);
        self
    }

    /// Append the response to the next contract-details request
    pub fn on_contract_details(mut self, events: Vec<ProviderEvent>) -> Self {
        self.contract_details.push(events);
        self
    }

    /// Append the response to the next historical-data request
    pub fn on_historical(mut self, events: Vec<ProviderEvent>) -> Self {
        self.historical.push(events);
        self
    }
}

/// Outbound call received by a [`ReplayClient`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    /// `connect`
    Connect {
        /// Host
        host: String,
        /// Port
        port: u16,
        /// Client id
        client_id: i32,
    },
    /// Contract-details request
    ContractDetails {
        /// Request id
        request_id: i64,
        /// Contract
        contract: Contract,
    },
    /// Historical-data request
    HistoricalData {
        /// Request id
        request_id: i64,
        /// Request parameters
        request: HistoricalDataRequest,
    },
    /// `disconnect`
    Disconnect,
}

/// Shared log of recorded calls
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<RecordedCall>>>);

impl Journal {
    fn record(&self, call: RecordedCall) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call);
        }
    }

    /// Snapshot of all recorded calls
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.0.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Historical requests only, in order
    pub fn historical_requests(&self) -> Vec<HistoricalDataRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::HistoricalData { request, .. } => Some(request),
                _ => None,
            })
            .collect()
    }
}

/// Provider client replaying a [`ReplayScript`]
pub struct ReplayClient {
    connect: VecDeque<Vec<ProviderEvent>>,
    contract_details: VecDeque<Vec<ProviderEvent>>,
    historical: VecDeque<Vec<ProviderEvent>>,
    events: UnboundedSender<ProviderEvent>,
    journal: Journal,
}

impl ReplayClient {
    /// Create the client and the event channel it delivers on
    pub fn new(script: ReplayScript) -> (Self, UnboundedReceiver<ProviderEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let client = Self {
            connect: script.connect.into(),
            contract_details: script.contract_details.into(),
            historical: script.historical.into(),
            events,
            journal: Journal::default(),
        };
        (client, receiver)
    }

    /// Handle to the call journal
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    fn emit(
        &self,
        group: Option<Vec<ProviderEvent>>,
        call: &'static str,
    ) -> ProviderResult<()> {
        let group = group.ok_or_else(|| {
            ProviderError::TranscriptError(format!("No scripted response left for {call}"))
        })?;
        debug!(call, events = group.len(), "Replaying scripted response");
        for event in group {
            self.events
                .send(event)
                .map_err(|_| ProviderError::ChannelClosed)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderClient for ReplayClient {
    async fn connect(&mut self, host: &str, port: u16, client_id: i32) -> ProviderResult<()> {
        self.journal.record(RecordedCall::Connect {
            host: host.to_string(),
            port,
            client_id,
        });
        let group = self.connect.pop_front();
        self.emit(group, "connect")
    }

    async fn request_contract_details(
        &mut self,
        request_id: i64,
        contract: &Contract,
    ) -> ProviderResult<()> {
        self.journal.record(RecordedCall::ContractDetails {
            request_id,
            contract: contract.clone(),
        });
        let group = self.contract_details.pop_front();
        self.emit(group, "contract details request")
    }

    async fn request_historical_data(
        &mut self,
        request_id: i64,
        request: &HistoricalDataRequest,
    ) -> ProviderResult<()> {
        self.journal.record(RecordedCall::HistoricalData {
            request_id,
            request: request.clone(),
        });
        let group = self.historical.pop_front();
        self.emit(group, "historical data request")
    }

    async fn disconnect(&mut self) -> ProviderResult<()> {
        self.journal.record(RecordedCall::Disconnect);
        Ok(())
    }
}
