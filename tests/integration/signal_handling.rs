use std::time::Duration;

use crate::common::*;

use tws_history_downloader::downloader::{AbortReason, DownloadError, HistoryDownloader};
use tws_history_downloader::provider::replay::{ReplayClient, ReplayScript};
use tws_history_downloader::shutdown::ShutdownCoordinator;

#[tokio::test]
async fn shutdown_notifies_waiters() {
    let shutdown = ShutdownCoordinator::shared();
    let waiter = {
        let handle = shutdown.clone();
        tokio::spawn(async move {
            handle.wait_for_shutdown().await;
            true
        })
    };

    // Give the task time to start waiting
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.request_shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok());
}

/// Shutdown requested before anyone waits must not be missed
#[tokio::test]
async fn shutdown_requested_before_wait_returns() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let handle = shutdown.clone();
    let waiter = tokio::spawn(async move {
        handle.wait_for_shutdown().await;
        true
    });

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok(), "wait_for_shutdown() blocked after shutdown was requested");
}

#[tokio::test(start_paused = true)]
async fn cancel_during_pacing_sleep_keeps_committed_rows() {
    let dir = tempfile::tempdir().unwrap();
    let script = ReplayScript::default()
        .on_connect(ready())
        .on_contract_details(contract_details("EST"))
        .on_historical(batch(&[58, 59]))
        .on_historical(batch(&[56, 57, 58]));
    let (client, events) = ReplayClient::new(script);
    let journal = client.journal();

    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            // Lands inside the 10 s gap after the first batch
            tokio::time::sleep(Duration::from_secs(5)).await;
            shutdown.request_shutdown();
        }
    });

    let result = HistoryDownloader::new(client, events, config(dir.path(), 2).with_pacing(true))
        .with_shutdown(shutdown)
        .run()
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::Aborted(AbortReason::Cancelled))
    ));
    assert_eq!(journal.historical_requests().len(), 1);
    assert_eq!(
        dates(&output_file(dir.path())),
        vec!["20140221 15:58:00", "20140221 15:59:00"]
    );
}

#[tokio::test(start_paused = true)]
async fn cancel_while_waiting_for_a_batch() {
    let dir = tempfile::tempdir().unwrap();
    let script = ReplayScript::default()
        .on_connect(ready())
        .on_contract_details(contract_details("EST"))
        .on_historical(vec![bar("20140221 15:59:00", 59)]);
    let (client, events) = ReplayClient::new(script);

    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            shutdown.request_shutdown();
        }
    });

    let result = HistoryDownloader::new(client, events, config(dir.path(), 1))
        .with_shutdown(shutdown)
        .run()
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::Aborted(AbortReason::Cancelled))
    ));
    assert!(!output_file(dir.path()).exists());
}
