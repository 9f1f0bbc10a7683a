// Round Watcher - live round-result signal relay
// Connects to the round stream, derives BIG/SMALL + EVEN/ODD signals and
// pushes them downstream exactly once per issue.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use round_watcher::backfill;
use round_watcher::config::Config;
use round_watcher::heartbeat::spawn_heartbeat;
use round_watcher::pipeline::SignalPipeline;
use round_watcher::stream::StreamSession;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    info!("🚀 Round Watcher starting...");

    // A broken configuration is the only fatal error; everything after
    // startup retries or logs instead of exiting.
    let config = Config::load_or_default()?;
    config.print_startup_info();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let pipeline = Arc::new(SignalPipeline::from_config(&config, http.clone()));
    let session = StreamSession::new(&config.source).context("Invalid stream endpoint")?;

    let heartbeat = config
        .heartbeat
        .url
        .as_ref()
        .map(|url| spawn_heartbeat(http.clone(), url.clone(), config.heartbeat.interval_secs));

    // Seed state from history before going live; the de-dup guard keeps the
    // live stream from re-delivering anything produced here.
    if let Some(url) = &config.backfill.url {
        match backfill::run_backfill(&http, url, &pipeline).await {
            Ok(produced) => info!("📚 Backfill complete: {} signal(s) produced", produced),
            Err(e) => warn!("📚 Backfill failed: {:#}", e),
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stream_task = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { session.run(pipeline, shutdown_rx).await })
    };

    wait_for_shutdown().await;
    info!("🛑 Shutdown signal received, stopping...");

    let _ = shutdown_tx.send(true);
    if let Some(handle) = heartbeat {
        handle.abort();
    }
    // Lets an in-flight delivery finish before the process exits.
    let _ = stream_task.await;

    let stats = pipeline.dedup_stats();
    info!(
        "👋 Round Watcher stopped | {} checked, {} signals, {} duplicates dropped",
        stats.checked, stats.unique, stats.duplicates
    );
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("⚠️  Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}
