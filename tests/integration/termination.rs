//! Graceful and fatal endings of a run

use crate::common::*;

use std::time::Duration;
use tws_history_downloader::downloader::{
    AbortReason, Completion, DownloadError, HistoryDownloader, NoDataReason,
};
use tws_history_downloader::output::FinishedOutput;
use tws_history_downloader::provider::replay::{ReplayClient, ReplayScript};
use tws_history_downloader::provider::ProviderEvent;
use tws_history_downloader::session::SessionError;

fn script() -> ReplayScript {
    ReplayScript::default()
        .on_connect(ready())
        .on_contract_details(contract_details("EST"))
}

#[tokio::test(start_paused = true)]
async fn test_empty_single_batch_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let (client, events) = ReplayClient::new(script().on_historical(vec![sentinel()]));

    let summary = HistoryDownloader::new(client, events, config(dir.path(), 1))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.rows, 0);
    assert_eq!(summary.output, FinishedOutput::Removed);
    assert_eq!(
        summary.completion,
        Completion::NoMoreData(NoDataReason::EmptyBatch)
    );
    assert!(!output_file(dir.path()).exists());
}

#[tokio::test(start_paused = true)]
async fn test_no_data_finishes_gracefully_with_earlier_batches() {
    let dir = tempfile::tempdir().unwrap();
    let script = script()
        .on_historical(batch(&[58, 59]))
        .on_historical(historical_error(
            162,
            "Historical Market Data Service error message:HMDS query returned no data: AAPL@SMART Trades",
        ));
    let (client, events) = ReplayClient::new(script);

    let summary = HistoryDownloader::new(client, events, config(dir.path(), 5))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.completion, Completion::NoMoreData(NoDataReason::NoData));
    assert_eq!(summary.batches, 1);
    assert_eq!(
        dates(&output_file(dir.path())),
        vec!["20140221 15:58:00", "20140221 15:59:00"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_range_beyond_history_finishes_gracefully() {
    let dir = tempfile::tempdir().unwrap();
    let script = script()
        .on_historical(batch(&[59]))
        .on_historical(historical_error(
            321,
            "Error validating request:-'yd' : cause - Historical data queries on this contract requesting any data earlier than one year back from now (20130224 16:00:00) is rejected.",
        ));
    let (client, events) = ReplayClient::new(script);

    let summary = HistoryDownloader::new(client, events, config(dir.path(), 5))
        .run()
        .await
        .unwrap();

    assert_eq!(
        summary.completion,
        Completion::NoMoreData(NoDataReason::BeyondHistory)
    );
    assert_eq!(summary.rows, 1);
}

#[tokio::test(start_paused = true)]
async fn test_connection_lost_keeps_committed_batches_only() {
    let dir = tempfile::tempdir().unwrap();
    let script = script().on_historical(batch(&[58, 59])).on_historical(vec![
        bar("20140221 15:57:00", 57),
        ProviderEvent::Error {
            request_id: -1,
            code: 1100,
            message: "Connectivity between IB and TWS has been lost.".to_string(),
        },
    ]);
    let (client, events) = ReplayClient::new(script);

    let result = HistoryDownloader::new(client, events, config(dir.path(), 5))
        .run()
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::Aborted(AbortReason::ConnectionLost))
    ));
    assert_eq!(
        dates(&output_file(dir.path())),
        vec!["20140221 15:58:00", "20140221 15:59:00"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_connection_lost_before_any_commit_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let script = script().on_historical(vec![
        bar("20140221 15:59:00", 59),
        ProviderEvent::Error {
            request_id: -1,
            code: 1100,
            message: "Connectivity between IB and TWS has been lost.".to_string(),
        },
    ]);
    let (client, events) = ReplayClient::new(script);

    let result = HistoryDownloader::new(client, events, config(dir.path(), 2))
        .run()
        .await;

    assert!(matches!(result, Err(DownloadError::Aborted(_))));
    assert!(!output_file(dir.path()).exists());
}

#[tokio::test(start_paused = true)]
async fn test_silent_provider_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let script = script().on_historical(batch(&[59])).on_historical(vec![]);
    let (client, events) = ReplayClient::new(script);

    let config = config(dir.path(), 2).with_response_timeout(Some(Duration::from_secs(60)));
    let result = HistoryDownloader::new(client, events, config).run().await;

    assert!(matches!(
        result,
        Err(DownloadError::Aborted(AbortReason::ResponseTimeout))
    ));
    assert_eq!(dates(&output_file(dir.path())), vec!["20140221 15:59:00"]);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_contract_timezone_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let script = ReplayScript::default()
        .on_connect(ready())
        .on_contract_details(contract_details("CTT"));
    let (client, events) = ReplayClient::new(script);
    let journal = client.journal();

    let result = HistoryDownloader::new(client, events, config(dir.path(), 1))
        .run()
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::Session(SessionError::UnknownTimezone(_)))
    ));
    assert!(journal.historical_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_configuration_never_connects() {
    let dir = tempfile::tempdir().unwrap();
    let (client, events) = ReplayClient::new(script());
    let journal = client.journal();

    let result = HistoryDownloader::new(client, events, config(dir.path(), 0))
        .run()
        .await;

    assert!(matches!(result, Err(DownloadError::Configuration(_))));
    assert!(journal.calls().is_empty());
}
