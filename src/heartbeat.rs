//! 💓 Liveness heartbeat task.
//!
//! Periodically POSTs an online marker to a status endpoint. Failures are
//! logged and never reach the pipeline; the interval is jittered so a fleet
//! of watchers does not stampede the status host.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Spawn the heartbeat loop in the background. Abort the handle to stop it.
pub fn spawn_heartbeat(client: Client, url: String, interval_secs: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("💓 Heartbeat task started ({}s interval)", interval_secs);
        let mut rng = StdRng::from_entropy();

        loop {
            // Jitter: interval ±2s, floor 1s.
            let jitter_ms = rng.gen_range(-2000i64..=2000);
            let wait_ms = ((interval_secs * 1000) as i64 + jitter_ms).max(1_000) as u64;
            sleep(Duration::from_millis(wait_ms)).await;

            let body = json!({
                "status": "online",
                "ts": chrono::Utc::now().timestamp(),
            });

            match client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("💓 Heartbeat ok");
                }
                Ok(response) => {
                    warn!("💓 Heartbeat rejected: {}", response.status());
                }
                Err(e) => {
                    warn!("💓 Heartbeat failed: {}", e);
                }
            }
        }
    })
}
