//! Batch-chaining state machine
//!
//! The provider serves a bounded span per request, so a download is a chain
//! of requests walking back in time from the resolved end of range. The
//! orchestrator owns that chain: it buffers the rows of the batch in flight,
//! commits them when the batch sentinel arrives, and decides what to request
//! next. It performs no I/O with the provider itself; every decision comes
//! back to the caller as a [`Step`].
//!
//! Each batch arrives oldest-first. On commit the buffer is reversed and
//! appended, so the output grows newest-first; adjacent batches share one
//! bar at their boundary, which is dropped against the last committed row.

use crate::downloader::classifier::{AbortReason, ErrorAction, ErrorClassifier, NoDataReason};
use crate::downloader::config::{remaining_hint, DATE_FORMAT_STRING};
use crate::downloader::pacing::{PacingController, PacingDecision};
use crate::downloader::DownloadResult;
use crate::metrics;
use crate::output::RowWriter;
use crate::provider::parser::RowParser;
use crate::provider::{BarData, HistoricalDataRequest, ProviderEvent};
use crate::{BarSize, Contract, DataType, Row};
use chrono::DateTime;
use chrono_tz::Tz;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fixed parameters shared by every batch request of a run
#[derive(Debug, Clone)]
pub struct BatchPlan {
    /// Instrument
    pub contract: Contract,
    /// Bar size
    pub bar_size: BarSize,
    /// Series
    pub data_type: DataType,
    /// Regular trading hours only
    pub rth_only: bool,
    /// Number of batches to chain
    pub total_batches: u32,
}

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// No request issued yet
    Idle,
    /// A batch request is in flight
    AwaitingBatch,
    /// The in-flight batch is a retry after a pacing violation
    Retrying,
    /// Finished gracefully
    Done,
    /// Stopped on a fatal condition
    Aborted,
}

/// How a graceful run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// All requested batches arrived
    TargetReached,
    /// The provider has nothing more to give
    NoMoreData(NoDataReason),
}

/// What the caller must do next
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Wait `delay`, then send `request`
    Request {
        /// Request to send
        request: HistoricalDataRequest,
        /// Wait before sending
        delay: Duration,
    },
    /// Keep delivering events
    Continue,
    /// The run finished gracefully
    Finished(Completion),
    /// The run must stop
    Aborted(AbortReason),
}

/// Drives the batch chain and owns the committed output
pub struct BatchOrchestrator<W: RowWriter> {
    plan: BatchPlan,
    parser: RowParser,
    local_tz: Tz,
    writer: W,
    pacing: PacingController,
    state: BatchState,
    cursor: Option<DateTime<Tz>>,
    buffer: Vec<Row>,
    batch_oldest: Option<DateTime<Tz>>,
    batches_received: u32,
    duplicates: u64,
}

impl<W: RowWriter> BatchOrchestrator<W> {
    /// Create an orchestrator writing committed rows to `writer`
    pub fn new(
        plan: BatchPlan,
        parser: RowParser,
        local_tz: Tz,
        writer: W,
        pacing: PacingController,
    ) -> Self {
        Self {
            plan,
            parser,
            local_tz,
            writer,
            pacing,
            state: BatchState::Idle,
            cursor: None,
            buffer: Vec::new(),
            batch_oldest: None,
            batches_received: 0,
            duplicates: 0,
        }
    }

    /// Issue the first batch ending at `cursor`
    pub fn start(&mut self, cursor: DateTime<Tz>) -> Step {
        self.cursor = Some(cursor.with_timezone(&self.local_tz));
        self.state = BatchState::AwaitingBatch;
        self.request_step(Duration::ZERO)
    }

    /// Feed one provider event
    ///
    /// # Errors
    /// Fails when a delivered bar cannot be parsed or the writer fails.
    pub fn handle(&mut self, event: &ProviderEvent) -> DownloadResult<Step> {
        match event {
            ProviderEvent::HistoricalData { bar, .. } => {
                if !self.in_flight() {
                    debug!(date = %bar.date, "Ignoring historical data outside a batch");
                    return Ok(Step::Continue);
                }
                if bar.is_sentinel() {
                    self.on_sentinel(bar)
                } else {
                    self.on_row(bar)?;
                    Ok(Step::Continue)
                }
            }
            ProviderEvent::Error {
                request_id,
                code,
                message,
            } => self.on_error(*request_id, *code, message),
            ProviderEvent::ContractDetails { .. } => Ok(Step::Continue),
        }
    }

    fn in_flight(&self) -> bool {
        matches!(self.state, BatchState::AwaitingBatch | BatchState::Retrying)
    }

    fn on_row(&mut self, bar: &BarData) -> DownloadResult<()> {
        let row = self.parser.parse(bar)?;
        if self.batch_oldest.map_or(true, |oldest| row.timestamp < oldest) {
            self.batch_oldest = Some(row.timestamp);
        }
        self.buffer.push(row);
        Ok(())
    }

    fn on_sentinel(&mut self, bar: &BarData) -> DownloadResult<Step> {
        self.batches_received += 1;

        let mut message = format!(
            "Batch {} finished ({} lines). (msg: {})",
            self.batches_received,
            self.buffer.len(),
            bar.date
        );
        if self.plan.total_batches > 1
            && self.pacing.is_active()
            && self.batches_received != self.plan.total_batches
        {
            let hint = remaining_hint(self.plan.total_batches, self.batches_received);
            message.push_str(&format!(" {} seconds remaining", hint.as_secs()));
        }
        info!("{message}");

        if self.buffer.is_empty() {
            return Ok(self.finish(Completion::NoMoreData(NoDataReason::EmptyBatch)));
        }

        let committed = self.commit()?;
        metrics::record_batch_completed(&self.plan.contract.symbol, committed);

        if self.batches_received >= self.plan.total_batches {
            return Ok(self.finish(Completion::TargetReached));
        }

        let next = match (self.batch_oldest.take(), self.cursor) {
            (Some(oldest), Some(cursor)) if oldest < cursor => oldest.with_timezone(&self.local_tz),
            _ => {
                warn!("Batch did not move the cursor back in time, stopping");
                return Ok(self.finish(Completion::NoMoreData(NoDataReason::CursorStalled)));
            }
        };

        self.cursor = Some(next);
        self.state = BatchState::AwaitingBatch;
        Ok(self.request_step(self.pacing.inter_batch_delay()))
    }

    /// Commit the buffered batch, dropping the boundary bar shared with the
    /// previous batch. Returns the number of rows written.
    fn commit(&mut self) -> DownloadResult<usize> {
        let mut rows = std::mem::take(&mut self.buffer);
        rows.reverse();

        if let (Some(first), Some(last)) = (rows.first(), self.writer.last_row()) {
            if first == last {
                debug!(timestamp = %first.timestamp, "Dropping overlapping row");
                rows.remove(0);
                self.duplicates += 1;
            }
        }

        self.writer.write_rows(&rows)?;
        Ok(rows.len())
    }

    fn on_error(&mut self, request_id: i64, code: i32, message: &str) -> DownloadResult<Step> {
        let action = ErrorClassifier::classify(code, message);
        match action {
            ErrorAction::PacingRetry if self.in_flight() => {
                info!("{message}");
                match self.pacing.on_violation() {
                    PacingDecision::Retry { wait } => {
                        metrics::record_pacing_violation(wait, self.pacing.violations());
                        // Rows of the failed attempt are re-delivered by the retry
                        self.buffer.clear();
                        self.batch_oldest = None;
                        self.state = BatchState::Retrying;
                        Ok(self.request_step(wait))
                    }
                    PacingDecision::Exhausted { .. } => Ok(self.abort(AbortReason::PacingExhausted)),
                }
            }
            ErrorAction::NoMoreData(reason) if self.in_flight() => {
                match reason {
                    NoDataReason::BeyondHistory => {
                        if let Some(cursor) = self.cursor {
                            info!(
                                "Provider cannot serve data from period ending {}, it's too far back in the history.",
                                cursor
                                    .with_timezone(&self.parser.contract_tz())
                                    .format(self.plan.bar_size.row_date_format())
                            );
                        }
                    }
                    _ => info!("IB[{code}]: {message}"),
                }
                if !self.buffer.is_empty() {
                    self.commit()?;
                }
                Ok(self.finish(Completion::NoMoreData(reason)))
            }
            ErrorAction::Abort(reason) => {
                warn!(code, %message, "Fatal provider error, aborting");
                Ok(self.abort(reason))
            }
            _ => {
                if request_id > -1 {
                    info!("IB[{code}]: {message} (ID: {request_id})");
                } else {
                    info!("IB[{code}]: {message}");
                }
                Ok(Step::Continue)
            }
        }
    }

    fn request_step(&self, delay: Duration) -> Step {
        let Some(end) = self.cursor else {
            return Step::Continue;
        };
        info!(
            "Requesting historical data batch ending {}",
            end.with_timezone(&self.parser.contract_tz())
                .format(self.plan.bar_size.row_date_format())
        );
        Step::Request {
            request: HistoricalDataRequest {
                contract: self.plan.contract.clone(),
                end,
                duration: self.plan.bar_size.max_duration(),
                bar_size: self.plan.bar_size,
                data_type: self.plan.data_type,
                rth_only: self.plan.rth_only,
                date_format: DATE_FORMAT_STRING,
            },
            delay,
        }
    }

    fn finish(&mut self, completion: Completion) -> Step {
        self.state = BatchState::Done;
        debug!(?completion, "Batch chain finished");
        Step::Finished(completion)
    }

    /// Stop immediately, discarding the in-flight buffer
    pub fn abort(&mut self, reason: AbortReason) -> Step {
        if !self.buffer.is_empty() {
            warn!(
                discarded = self.buffer.len(),
                "Discarding rows of the incomplete batch"
            );
        }
        self.buffer.clear();
        self.batch_oldest = None;
        self.state = BatchState::Aborted;
        Step::Aborted(reason)
    }

    /// Current state
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// End time of the batch in flight (or last requested)
    pub fn cursor(&self) -> Option<DateTime<Tz>> {
        self.cursor
    }

    /// Sentinels received so far
    pub fn batches_received(&self) -> u32 {
        self.batches_received
    }

    /// Overlapping rows dropped so far
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Rows buffered for the batch in flight
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pacing state
    pub fn pacing(&self) -> &PacingController {
        &self.pacing
    }

    /// Committed output
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Release the writer for finalization
    pub fn into_writer(self) -> W {
        self.writer
    }
}
