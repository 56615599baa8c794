//! Pacing violations and request spacing

use crate::common::*;

use std::time::Duration;
use tokio::time::Instant;
use tws_history_downloader::downloader::{AbortReason, DownloadError, HistoryDownloader};
use tws_history_downloader::provider::replay::{ReplayClient, ReplayScript};

#[tokio::test(start_paused = true)]
async fn test_violation_retries_same_cursor_then_paces() {
    let dir = tempfile::tempdir().unwrap();
    let script = ReplayScript::default()
        .on_connect(ready())
        .on_contract_details(contract_details("EST"))
        .on_historical(batch(&[57, 58, 59]))
        .on_historical(pacing_violation())
        .on_historical(batch(&[55, 56, 57]))
        .on_historical(batch(&[53, 54, 55]));
    let (client, events) = ReplayClient::new(script);
    let journal = client.journal();

    let started = Instant::now();
    let summary = HistoryDownloader::new(client, events, config(dir.path(), 3))
        .run()
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.pacing_violations, 1);
    assert_eq!(summary.rows, 7);

    let ends: Vec<String> = journal
        .historical_requests()
        .iter()
        .map(|r| r.end_date_time())
        .collect();
    assert_eq!(
        ends,
        vec![
            "20140221 16:00:00",
            "20140221 15:57:00",
            "20140221 15:57:00",
            "20140221 15:55:00"
        ]
    );

    // 15 s cooldown before the retry, then the 10 s interval before the last batch
    assert!(elapsed >= Duration::from_secs(25), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(30), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_escalates_across_violations() {
    let dir = tempfile::tempdir().unwrap();
    let script = ReplayScript::default()
        .on_connect(ready())
        .on_contract_details(contract_details("EST"))
        .on_historical(pacing_violation())
        .on_historical(pacing_violation())
        .on_historical(pacing_violation())
        .on_historical(batch(&[58, 59]));
    let (client, events) = ReplayClient::new(script);
    let journal = client.journal();

    let started = Instant::now();
    let summary = HistoryDownloader::new(client, events, config(dir.path(), 1))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.pacing_violations, 3);
    assert_eq!(summary.rows, 2);
    // 15 + 30 + 45
    assert!(started.elapsed() >= Duration::from_secs(90));
    assert!(journal
        .historical_requests()
        .iter()
        .all(|r| r.end_date_time() == "20140221 16:00:00"));
}

#[tokio::test(start_paused = true)]
async fn test_pacing_flag_spaces_every_batch() {
    let dir = tempfile::tempdir().unwrap();
    let script = ReplayScript::default()
        .on_connect(ready())
        .on_contract_details(contract_details("EST"))
        .on_historical(batch(&[57, 58, 59]))
        .on_historical(batch(&[55, 56, 57]))
        .on_historical(batch(&[53, 54, 55]));
    let (client, events) = ReplayClient::new(script);

    let started = Instant::now();
    let summary = HistoryDownloader::new(client, events, config(dir.path(), 3).with_pacing(true))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.pacing_violations, 0);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(20), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(25), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_retry_ceiling_aborts_and_keeps_committed_rows() {
    let dir = tempfile::tempdir().unwrap();
    let script = ReplayScript::default()
        .on_connect(ready())
        .on_contract_details(contract_details("EST"))
        .on_historical(batch(&[58, 59]))
        .on_historical(pacing_violation())
        .on_historical(pacing_violation());
    let (client, events) = ReplayClient::new(script);

    let config = config(dir.path(), 3).with_max_pacing_retries(Some(1));
    let result = HistoryDownloader::new(client, events, config).run().await;

    assert!(matches!(
        result,
        Err(DownloadError::Aborted(AbortReason::PacingExhausted))
    ));
    assert_eq!(
        dates(&output_file(dir.path())),
        vec!["20140221 15:58:00", "20140221 15:59:00"]
    );
}
