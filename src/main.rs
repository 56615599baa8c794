//! Main entry point for the tws-history-downloader CLI

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use tws_history_downloader::cli::Cli;
use tws_history_downloader::metrics;
use tws_history_downloader::shutdown::{self, ShutdownCoordinator};

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing(verbose: bool) {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let default_directive = if verbose {
        "tws_history_downloader=debug"
    } else {
        "tws_history_downloader=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = metrics::init_metrics(addr) {
            warn!(error = %e, "Metrics disabled");
        }
    }

    // Install global shutdown coordinator and Ctrl+C handler
    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl+C received - keeping committed batches and stopping...");
                shutdown.request_shutdown();
            }
        }
    });

    if let Err(e) = cli.execute(shutdown).await {
        let code = e.exit_code();
        error!("Command failed: {:#}", anyhow::Error::new(e));
        std::process::exit(code);
    }
}
