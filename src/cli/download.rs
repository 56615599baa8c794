//! Download command implementation

use crate::downloader::config::{
    default_local_tz, DEFAULT_CLIENT_ID, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_RESPONSE_TIMEOUT,
};
use crate::downloader::{DownloadConfig, DownloadSummary, HistoryDownloader};
use crate::provider::replay::{ReplayClient, ReplayScript};
use crate::session::endpoint::EndMode;
use crate::shutdown::SharedShutdown;
use crate::{BarSize, Contract, DataType, OptionRight};
use chrono_tz::Tz;
use clap::{Args, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::CliError;

/// Downloads historical data from TWS
#[derive(Parser, Debug)]
#[command(name = "tws-history-downloader")]
#[command(author, version, about = "Downloads historical data from TWS", long_about = None)]
pub struct Cli {
    /// Ending date in the contract's timezone: YYYYMMDD, "YYYYMMDD HH:MM:SS", end or now
    #[arg(short = 'e', long = "end", default_value = "now")]
    pub end: String,

    /// How many batch requests to send
    #[arg(short = 'n', long = "batches", default_value_t = 1)]
    pub batches: u32,

    /// Output filename
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Bar size, for example "1 min"
    #[arg(short = 'p', long = "bar-size", default_value = "1 min")]
    pub bar_size: String,

    /// What kind of data to fetch
    #[arg(short = 't', long = "data-type", default_value = "TRADES")]
    pub data_type: String,

    /// Fetch regular trading hours only
    #[arg(long = "rth")]
    pub rth: bool,

    /// Pace requests 10 seconds apart from each other
    #[arg(long = "pacing")]
    pub pacing: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Contract arguments
    #[command(flatten)]
    pub contract: ContractArgs,

    /// Provider host
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Provider port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Client id; the next free id is used when it is taken
    #[arg(long = "client-id", default_value_t = DEFAULT_CLIENT_ID)]
    pub client_id: i32,

    /// Local timezone the provider uses (IANA name, defaults to $TZ or UTC)
    #[arg(long = "local-tz")]
    pub local_tz: Option<String>,

    /// Give up after this many pacing violations (unbounded by default)
    #[arg(long = "max-pacing-retries")]
    pub max_pacing_retries: Option<u32>,

    /// Seconds to wait for each provider response; 0 waits forever
    #[arg(long = "response-timeout-secs", default_value_t = DEFAULT_RESPONSE_TIMEOUT.as_secs())]
    pub response_timeout_secs: u64,

    /// Replay a recorded provider session from a JSON transcript
    #[arg(long = "replay")]
    pub replay: Option<PathBuf>,

    /// Serve Prometheus metrics on this address
    #[arg(long = "metrics-addr")]
    pub metrics_addr: Option<SocketAddr>,
}

/// Contract arguments
#[derive(Args, Debug, Clone)]
#[command(next_help_heading = "Contract")]
pub struct ContractArgs {
    /// Symbol of the contract
    #[arg(long = "symbol")]
    pub symbol: String,

    /// Exchange of the contract
    #[arg(long = "exchange", default_value = "SMART")]
    pub exchange: String,

    /// Security type of the contract
    #[arg(long = "sec-type", default_value = "STK")]
    pub sec_type: String,

    /// Currency of the contract
    #[arg(long = "currency", default_value = "USD")]
    pub currency: String,

    /// Id of the contract
    #[arg(long = "con-id")]
    pub con_id: Option<i64>,

    /// Expiry (YYYYMM[DD]) of the contract
    #[arg(long = "expiry")]
    pub expiry: Option<String>,

    /// Primary exchange of the contract
    #[arg(long = "primary-exchange")]
    pub primary_exchange: Option<String>,

    /// Strike price of the option contract
    #[arg(long = "strike")]
    pub strike: Option<String>,

    /// Right of the option contract (C/P)
    #[arg(long = "right")]
    pub right: Option<String>,

    /// Multiplier of the contract
    #[arg(long = "multiplier")]
    pub multiplier: Option<String>,
}

impl ContractArgs {
    /// Build the contract
    pub fn to_contract(&self) -> Result<Contract, CliError> {
        let strike = self
            .strike
            .as_deref()
            .map(|s| {
                Decimal::from_str(s)
                    .map_err(|e| CliError::InvalidArgument(format!("Invalid strike '{s}': {e}")))
            })
            .transpose()?;
        let right = self
            .right
            .as_deref()
            .map(|r| OptionRight::from_str(r).map_err(CliError::InvalidArgument))
            .transpose()?;

        Ok(Contract {
            symbol: self.symbol.clone(),
            exchange: self.exchange.clone(),
            primary_exchange: self.primary_exchange.clone(),
            sec_type: self.sec_type.clone(),
            currency: self.currency.clone(),
            con_id: self.con_id,
            expiry: self.expiry.clone(),
            strike,
            right,
            multiplier: self.multiplier.clone(),
        })
    }
}

impl Cli {
    /// Build and validate the run configuration without touching the provider
    pub fn to_config(&self) -> Result<DownloadConfig, CliError> {
        let end_mode = EndMode::from_str(&self.end)
            .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
        let bar_size = BarSize::from_str(&self.bar_size).map_err(CliError::InvalidArgument)?;
        let data_type = DataType::from_str(&self.data_type).map_err(CliError::InvalidArgument)?;
        let local_tz = match self.local_tz.as_deref() {
            Some(name) => Tz::from_str(name).map_err(|_| {
                CliError::InvalidArgument(format!("Unknown local timezone '{name}'"))
            })?,
            None => default_local_tz(),
        };
        let response_timeout =
            (self.response_timeout_secs > 0).then(|| Duration::from_secs(self.response_timeout_secs));

        let mut config = DownloadConfig::new(self.contract.to_contract()?)
            .with_end_mode(end_mode)
            .with_total_batches(self.batches)
            .with_bar_size(bar_size)
            .with_data_type(data_type)
            .with_rth_only(self.rth)
            .with_pacing(self.pacing)
            .with_connection(self.host.clone(), self.port, self.client_id)
            .with_local_tz(local_tz)
            .with_max_pacing_retries(self.max_pacing_retries)
            .with_response_timeout(response_timeout);
        if let Some(output) = &self.output {
            config = config.with_output(output.clone());
        }

        config.validate()?;
        Ok(config)
    }

    /// Run the download
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<DownloadSummary, CliError> {
        let config = self.to_config()?;
        info!(
            "Starting to download {}, series: {}, bartype: '{}'",
            config.contract.label(),
            config.data_type,
            config.bar_size
        );

        let transcript = self.replay.as_ref().ok_or_else(|| {
            CliError::ConfigurationError(
                "no provider transport is available; pass --replay <transcript.json>".to_string(),
            )
        })?;
        let (client, events) = ReplayClient::new(ReplayScript::load(transcript)?);

        let progress = create_progress_bar(&config);
        let summary = HistoryDownloader::new(client, events, config)
            .with_shutdown(shutdown)
            .with_progress(progress)
            .run()
            .await?;

        info!(
            batches = summary.batches,
            rows = summary.rows,
            "Download complete"
        );
        Ok(summary)
    }
}

/// Progress bar counting received batches
fn create_progress_bar(config: &DownloadConfig) -> ProgressBar {
    let pb = ProgressBar::new(u64::from(config.total_batches));
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches {msg}")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(format!(
        "Downloading {} {}",
        config.contract.label(),
        config.bar_size
    ));
    pb
}
