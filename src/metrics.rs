//! Download metrics
//!
//! Counters and histograms for batch requests, pacing violations and run
//! outcomes, exported through an optional Prometheus scrape endpoint.
//!
//! ## Architecture
//!
//! - Uses the `metrics` crate facade; recording is a no-op until an exporter is installed
//! - [`init_metrics`] installs the Prometheus exporter once per process

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

static METRICS_ADDR: OnceCell<SocketAddr> = OnceCell::new();

/// Metrics initialization errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Exporter could not be installed
    #[error("failed to install Prometheus exporter: {0}")]
    Install(String),
}

/// Install the Prometheus exporter on `addr`
///
/// Idempotent: later calls are ignored once an exporter is installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    if let Some(existing) = METRICS_ADDR.get() {
        debug!(addr = %existing, "Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    describe_counter!(
        "historical_requests_total",
        Unit::Count,
        "Historical-data batch requests sent to the provider"
    );
    describe_counter!(
        "pacing_violations_total",
        Unit::Count,
        "Pacing violations reported by the provider"
    );
    describe_histogram!(
        "pacing_cooldown_seconds",
        Unit::Seconds,
        "Cooldown waited after each pacing violation"
    );
    describe_counter!(
        "batches_completed_total",
        Unit::Count,
        "Batches committed to the output"
    );
    describe_counter!(
        "rows_committed_total",
        Unit::Count,
        "Rows committed to the output"
    );
    describe_counter!(
        "downloads_completed_total",
        Unit::Count,
        "Downloads that finished gracefully"
    );
    describe_counter!(
        "downloads_failed_total",
        Unit::Count,
        "Downloads that were aborted or failed"
    );

    let _ = METRICS_ADDR.set(addr);
    Ok(())
}

/// Whether an exporter has been installed
pub fn is_initialized() -> bool {
    METRICS_ADDR.get().is_some()
}

/// Record one historical-data request
pub fn record_request(symbol: &str) {
    counter!("historical_requests_total", "symbol" => symbol.to_string()).increment(1);
}

/// Record a pacing violation and the cooldown it triggered
pub fn record_pacing_violation(cooldown: Duration, violations: u32) {
    counter!("pacing_violations_total").increment(1);
    histogram!("pacing_cooldown_seconds").record(cooldown.as_secs_f64());
    debug!(
        violations,
        cooldown_secs = cooldown.as_secs(),
        "Pacing violation recorded"
    );
}

/// Record a committed batch
pub fn record_batch_completed(symbol: &str, rows: usize) {
    counter!("batches_completed_total", "symbol" => symbol.to_string()).increment(1);
    counter!("rows_committed_total", "symbol" => symbol.to_string()).increment(rows as u64);
}

/// Outcome tracking for one run
pub struct RunMetrics {
    symbol: String,
    start_time: Instant,
}

impl RunMetrics {
    /// Start tracking a run
    pub fn start(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        info!(symbol = %symbol, "Download started");
        Self {
            symbol,
            start_time: Instant::now(),
        }
    }

    /// Record a graceful finish
    pub fn record_success(&self, rows: u64) {
        counter!("downloads_completed_total", "symbol" => self.symbol.clone()).increment(1);
        info!(
            symbol = %self.symbol,
            rows,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Download completed successfully"
        );
    }

    /// Record an abort or failure
    pub fn record_failure(&self, error: &str) {
        counter!("downloads_failed_total", "symbol" => self.symbol.clone()).increment(1);
        error!(
            symbol = %self.symbol,
            error = %error,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Download failed"
        );
    }
}
