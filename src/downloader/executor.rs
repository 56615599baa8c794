//! Download executor
//!
//! Runs one download end to end against a [`ProviderClient`]: session
//! setup, contract details, end-of-range resolution, and the batch chain.
//! Output committed before a failure is always finalized.

use crate::downloader::classifier::{AbortReason, ErrorAction, ErrorClassifier};
use crate::downloader::config::{
    remaining_hint, CONTRACT_DETAILS_REQUEST_ID, HISTORICAL_REQUEST_ID,
};
use crate::downloader::orchestrator::{BatchOrchestrator, BatchPlan, Completion, Step};
use crate::downloader::pacing::PacingController;
use crate::downloader::{DownloadConfig, DownloadError, DownloadResult};
use crate::metrics::{self, RunMetrics};
use crate::output::csv::CsvRowWriter;
use crate::output::{FinishedOutput, OutputWriter, RowWriter};
use crate::provider::parser::RowParser;
use crate::provider::{ContractDetails, ProviderClient, ProviderError, ProviderEvent};
use crate::session::endpoint;
use crate::session::SessionCalendar;
use crate::shutdown::{self, SharedShutdown};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use indicatif::ProgressBar;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Result of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSummary {
    /// Batches received
    pub batches: u32,
    /// Rows committed
    pub rows: u64,
    /// Overlapping rows dropped
    pub duplicates: u64,
    /// Pacing violations recovered from
    pub pacing_violations: u32,
    /// Why the chain ended
    pub completion: Completion,
    /// What was left on disk
    pub output: FinishedOutput,
}

/// Runs a download against a provider client
pub struct HistoryDownloader<C: ProviderClient> {
    client: C,
    events: UnboundedReceiver<ProviderEvent>,
    config: DownloadConfig,
    shutdown: Option<SharedShutdown>,
    progress: Option<ProgressBar>,
    now: Option<DateTime<Tz>>,
}

impl<C: ProviderClient> HistoryDownloader<C> {
    /// Create a downloader; `events` is the channel `client` delivers on
    pub fn new(client: C, events: UnboundedReceiver<ProviderEvent>, config: DownloadConfig) -> Self {
        Self {
            client,
            events,
            config,
            shutdown: shutdown::get_global_shutdown(),
            progress: None,
            now: None,
        }
    }

    /// Attach a shared shutdown handle for cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Report batch progress on `progress`
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Resolve `now` against a fixed instant instead of the wall clock
    pub fn with_now(mut self, now: DateTime<Tz>) -> Self {
        self.now = Some(now);
        self
    }

    /// Run the download
    ///
    /// # Errors
    /// Configuration problems are reported before connecting. Fatal provider
    /// conditions return [`DownloadError::Aborted`] after rows of completed
    /// batches have been written out.
    pub async fn run(mut self) -> DownloadResult<DownloadSummary> {
        let span = tracing::info_span!(
            "download",
            contract = %self.config.contract.label(),
            bar_size = %self.config.bar_size,
            data_type = %self.config.data_type,
            batches = self.config.total_batches
        );

        async move {
            self.config.validate()?;

            let run_metrics = RunMetrics::start(&self.config.contract.symbol);
            let result = self.execute().await;

            info!("Disconnecting...");
            if let Err(e) = self.client.disconnect().await {
                warn!(error = %e, "Failed to disconnect cleanly");
            }

            match &result {
                Ok(summary) => {
                    if let Some(pb) = &self.progress {
                        pb.finish_with_message(format!("{} rows", summary.rows));
                    }
                    run_metrics.record_success(summary.rows);
                }
                Err(e) => {
                    if let Some(pb) = &self.progress {
                        pb.abandon_with_message(e.to_string());
                    }
                    run_metrics.record_failure(&e.to_string());
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(&mut self) -> DownloadResult<DownloadSummary> {
        let client_id = self.open_session().await?;
        debug!(client_id, "Session ready");

        let details = self.await_contract_details().await?;
        let calendar = SessionCalendar::from_details(&details)?;

        let local_tz = self.config.local_tz;
        let now = self
            .now
            .unwrap_or_else(|| Utc::now().with_timezone(&local_tz));
        let cursor = endpoint::resolve(&self.config.end_mode, self.config.rth_only, &calendar, now)?;

        let path = self.config.output_path();
        let writer = CsvRowWriter::new(&path, self.config.data_type, self.config.bar_size)?;

        let plan = BatchPlan {
            contract: self.config.contract.clone(),
            bar_size: self.config.bar_size,
            data_type: self.config.data_type,
            rth_only: self.config.rth_only,
            total_batches: self.config.total_batches,
        };
        let parser = RowParser::new(self.config.bar_size, local_tz, calendar.timezone);
        let pacing =
            PacingController::new(self.config.pacing).with_max_retries(self.config.max_pacing_retries);
        let mut orchestrator = BatchOrchestrator::new(plan, parser, local_tz, writer, pacing);

        if let Some(pb) = &self.progress {
            pb.set_length(u64::from(self.config.total_batches));
        }

        let mut message = format!(
            "Receiving {} batches of historical data...",
            self.config.total_batches
        );
        if self.config.total_batches > 1 && self.config.pacing {
            message.push_str(&format!(
                " {} seconds remaining",
                remaining_hint(self.config.total_batches, 0).as_secs()
            ));
        }
        info!("{message}");

        let outcome = self.drive(&mut orchestrator, cursor).await;

        let batches = orchestrator.batches_received();
        let duplicates = orchestrator.duplicates();
        let pacing_violations = orchestrator.pacing().violations();
        let writer = orchestrator.into_writer();
        let rows = writer.rows_written();
        let finished = writer.finish();

        match (outcome, finished) {
            (Ok(completion), Ok(output)) => {
                info!(
                    batches,
                    rows,
                    duplicates,
                    pacing_violations,
                    completion = ?completion,
                    "Download finished"
                );
                Ok(DownloadSummary {
                    batches,
                    rows,
                    duplicates,
                    pacing_violations,
                    completion,
                    output,
                })
            }
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(output)) => {
                match output {
                    FinishedOutput::Written { path, rows } => warn!(
                        rows,
                        path = %path.display(),
                        "Download stopped early, committed rows were kept"
                    ),
                    FinishedOutput::Removed => warn!("Download stopped early, no rows were committed"),
                }
                Err(e)
            }
            (Err(e), Err(finish_error)) => {
                error!(error = %finish_error, "Failed to finalize output");
                Err(e)
            }
        }
    }

    /// Connect and wait for the market-data connection, moving on to the
    /// next client id while the current one is taken. Returns the id in use.
    async fn open_session(&mut self) -> DownloadResult<i32> {
        let mut client_id = self.config.client_id;
        info!(
            "Connecting to {}:{} with client id {}",
            self.config.host, self.config.port, client_id
        );
        self.client
            .connect(&self.config.host, self.config.port, client_id)
            .await?;

        loop {
            let event = self
                .next_event(self.config.response_timeout, AbortReason::ResponseTimeout)
                .await?;
            let ProviderEvent::Error {
                request_id,
                code,
                message,
            } = event
            else {
                debug!("Ignoring event before the session is ready");
                continue;
            };

            match ErrorClassifier::classify(code, &message) {
                ErrorAction::Reconnect => {
                    info!("Client ID {} in use, reconnecting ...", client_id);
                    client_id += 1;
                    self.client
                        .connect(&self.config.host, self.config.port, client_id)
                        .await?;
                }
                ErrorAction::SessionReady => {
                    info!("IB[{code}]: {message}");
                    info!("API functional, getting started...");
                    return Ok(client_id);
                }
                ErrorAction::Abort(reason) => {
                    error!(code, %message, "Fatal provider error while connecting");
                    return Err(DownloadError::Aborted(reason));
                }
                _ => log_provider_message(request_id, code, &message),
            }
        }
    }

    async fn await_contract_details(&mut self) -> DownloadResult<ContractDetails> {
        info!("Requesting contract details...");
        self.client
            .request_contract_details(CONTRACT_DETAILS_REQUEST_ID, &self.config.contract)
            .await?;

        let deadline = Instant::now() + self.config.contract_details_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = match self
                .next_event(Some(remaining), AbortReason::ContractDetailsTimeout)
                .await
            {
                Err(DownloadError::Aborted(AbortReason::ContractDetailsTimeout)) => {
                    error!(
                        "Contract details not received in {} seconds",
                        self.config.contract_details_timeout.as_secs()
                    );
                    return Err(DownloadError::Aborted(AbortReason::ContractDetailsTimeout));
                }
                other => other?,
            };

            match event {
                ProviderEvent::ContractDetails { details, .. } => {
                    info!("Contract details received.");
                    return Ok(details);
                }
                ProviderEvent::Error {
                    request_id,
                    code,
                    message,
                } => match ErrorClassifier::classify(code, &message) {
                    ErrorAction::Abort(reason) => {
                        error!(code, %message, "Fatal provider error while fetching contract details");
                        return Err(DownloadError::Aborted(reason));
                    }
                    _ => log_provider_message(request_id, code, &message),
                },
                ProviderEvent::HistoricalData { .. } => {
                    debug!("Ignoring historical data before the first batch");
                }
            }
        }
    }

    async fn drive<W: RowWriter>(
        &mut self,
        orchestrator: &mut BatchOrchestrator<W>,
        cursor: DateTime<Tz>,
    ) -> DownloadResult<Completion> {
        let symbol = self.config.contract.symbol.clone();
        let mut step = orchestrator.start(cursor);

        loop {
            step = match step {
                Step::Request { request, delay } => {
                    if !delay.is_zero() {
                        if let Err(e) = self.sleep(delay).await {
                            orchestrator.abort(AbortReason::Cancelled);
                            return Err(e);
                        }
                    }
                    metrics::record_request(&symbol);
                    self.client
                        .request_historical_data(HISTORICAL_REQUEST_ID, &request)
                        .await?;
                    Step::Continue
                }
                Step::Continue => {
                    let event = match self
                        .next_event(self.config.response_timeout, AbortReason::ResponseTimeout)
                        .await
                    {
                        Ok(event) => event,
                        Err(DownloadError::Aborted(reason)) => {
                            warn!(%reason, "Stopping the batch chain");
                            orchestrator.abort(reason);
                            return Err(DownloadError::Aborted(reason));
                        }
                        Err(e) => return Err(e),
                    };
                    let next = orchestrator.handle(&event)?;
                    if let Some(pb) = &self.progress {
                        pb.set_position(u64::from(orchestrator.batches_received()));
                    }
                    next
                }
                Step::Finished(completion) => return Ok(completion),
                Step::Aborted(reason) => return Err(DownloadError::Aborted(reason)),
            };
        }
    }

    /// Sleep that wakes early on shutdown
    async fn sleep(&self, delay: Duration) -> DownloadResult<()> {
        match &self.shutdown {
            Some(shutdown) => {
                if shutdown.is_shutdown_requested() {
                    return Err(DownloadError::Aborted(AbortReason::Cancelled));
                }
                tokio::select! {
                    _ = tokio::time::sleep(delay) => Ok(()),
                    _ = shutdown.wait_for_shutdown() => Err(DownloadError::Aborted(AbortReason::Cancelled)),
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    /// Next provider event, bounded by `deadline` and by shutdown
    async fn next_event(
        &mut self,
        deadline: Option<Duration>,
        on_timeout: AbortReason,
    ) -> DownloadResult<ProviderEvent> {
        let events = &mut self.events;
        let receive = async move {
            match deadline {
                Some(limit) => tokio::time::timeout(limit, events.recv())
                    .await
                    .map_err(|_| DownloadError::Aborted(on_timeout)),
                None => Ok(events.recv().await),
            }
        };

        let received = match &self.shutdown {
            Some(shutdown) => {
                if shutdown.is_shutdown_requested() {
                    return Err(DownloadError::Aborted(AbortReason::Cancelled));
                }
                tokio::select! {
                    biased;
                    _ = shutdown.wait_for_shutdown() => {
                        return Err(DownloadError::Aborted(AbortReason::Cancelled));
                    }
                    received = receive => received?,
                }
            }
            None => receive.await?,
        };

        received.ok_or(DownloadError::Provider(ProviderError::ChannelClosed))
    }
}

fn log_provider_message(request_id: i64, code: i32, message: &str) {
    if request_id > -1 {
        info!("IB[{code}]: {message} (ID: {request_id})");
    } else {
        info!("IB[{code}]: {message}");
    }
}
