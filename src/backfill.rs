//! 📚 Startup history backfill.
//!
//! One fetch against a history endpoint on startup, so the watcher starts
//! with the most recent rounds instead of waiting for the next draw. Every
//! row runs through the normal pipeline; the de-dup guard keeps replayed
//! rounds from producing twice once the live stream catches up.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::parser::LIST_FIELDS;
use crate::pipeline::{Outcome, SignalPipeline};

/// Fetch the history endpoint and feed each round through the pipeline in
/// chronological order (history rows arrive oldest-first). Returns how many
/// signals were produced.
pub async fn run_backfill(client: &Client, url: &str, pipeline: &SignalPipeline) -> Result<usize> {
    // Cache-buster so intermediaries do not serve a stale round list.
    let separator = if url.contains('?') { '&' } else { '?' };
    let full_url = format!("{}{}ts={}", url, separator, chrono::Utc::now().timestamp_millis());

    let response = client
        .get(&full_url)
        .send()
        .await
        .context("Failed to reach history endpoint")?;

    if !response.status().is_success() {
        bail!("History endpoint returned {}", response.status());
    }

    let body: Value = response
        .json()
        .await
        .context("Failed to parse history response")?;

    let rows = extract_rows(&body);
    debug!("📚 History returned {} row(s)", rows.len());

    let mut produced = 0;
    for row in rows {
        if matches!(pipeline.handle_raw(row).await, Outcome::Produced(_)) {
            produced += 1;
        }
    }

    Ok(produced)
}

/// A history body is either a bare array of rounds, an object wrapping one
/// under a known list key, or a single round payload.
fn extract_rows(body: &Value) -> Vec<&Value> {
    match body {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            for key in LIST_FIELDS {
                if let Some(Value::Array(items)) = map.get(*key) {
                    return items.iter().collect();
                }
            }
            vec![body]
        }
        _ => vec![body],
    }
}
