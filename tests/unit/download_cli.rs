//! Command-line parsing into a run configuration

use clap::Parser;
use std::path::PathBuf;
use tws_history_downloader::cli::{Cli, CliError};
use tws_history_downloader::output::path::default_file_name;
use tws_history_downloader::{BarSize, DataType};

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["tws-history-downloader"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

#[test]
fn test_default_output_name_follows_contract() {
    let cli = parse(&[
        "--symbol", "ES", "--exchange", "GLOBEX", "--sec-type", "FUT", "--expiry", "201403",
        "-p", "15 mins", "-t", "MIDPOINT", "--local-tz", "UTC",
    ]);
    let config = cli.to_config().unwrap();
    assert_eq!(config.bar_size, BarSize::FifteenMins);
    assert_eq!(config.data_type, DataType::Midpoint);
    assert_eq!(
        config.output_path(),
        PathBuf::from("ES-GLOBEX_201403_15mins_MIDPOINT.csv")
    );
    assert_eq!(
        default_file_name(&config.contract, config.bar_size, config.data_type),
        "ES-GLOBEX_201403_15mins_MIDPOINT.csv"
    );
}

#[test]
fn test_primary_exchange_names_the_file() {
    let cli = parse(&["--symbol", "MSFT", "--primary-exchange", "NASDAQ", "--local-tz", "UTC"]);
    let config = cli.to_config().unwrap();
    assert_eq!(config.contract.label(), "MSFT-NASDAQ");
}

#[test]
fn test_connection_and_pacing_arguments() {
    let cli = parse(&[
        "--symbol", "AAPL", "--host", "10.0.0.2", "--port", "4002", "--client-id", "9",
        "--max-pacing-retries", "4", "--response-timeout-secs", "30", "--local-tz", "UTC",
    ]);
    let config = cli.to_config().unwrap();
    assert_eq!(config.host, "10.0.0.2");
    assert_eq!(config.port, 4002);
    assert_eq!(config.client_id, 9);
    assert_eq!(config.max_pacing_retries, Some(4));
    assert_eq!(config.response_timeout, Some(std::time::Duration::from_secs(30)));
}

#[test]
fn test_symbol_is_required() {
    assert!(Cli::try_parse_from(["tws-history-downloader"]).is_err());
}

#[test]
fn test_bad_option_right_is_rejected() {
    let cli = parse(&["--symbol", "SPY", "--right", "X", "--local-tz", "UTC"]);
    let err = cli.to_config().unwrap_err();
    assert!(matches!(err, CliError::InvalidArgument(_)));
    assert_eq!(err.exit_code(), 2);
}
