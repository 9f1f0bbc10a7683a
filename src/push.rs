//! 📤 Downstream web push delivery.
//!
//! Sends each signal to the configured endpoint with a bounded retry loop.
//! The API key travels both as an `X-Api-Key` header and as an `api_key`
//! body field; the remaining body fields are a fixed downstream contract
//! and must not change names across versions.

use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::Signal;

const INITIAL_RETRY_DELAY_MS: u64 = 500;
const MAX_RETRY_DELAY_MS: u64 = 8_000;

/// Delivery gave up after exhausting its retries. Never fatal to the
/// pipeline; the next signal still attempts delivery.
#[derive(Debug, Error)]
pub enum DeliveryFailure {
    #[error("push endpoint returned {status} (attempt {attempts})")]
    Status { status: reqwest::StatusCode, attempts: u32 },
    #[error("push request failed (attempt {attempts}): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
}

/// Holds the push target for the process lifetime; never mutated after
/// startup. Retry counters are local to each `push` call.
pub struct WebPushClient {
    client: Client,
    url: String,
    api_key: String,
    max_attempts: u32,
}

impl WebPushClient {
    pub fn new(client: Client, url: String, api_key: String, max_attempts: u32) -> Self {
        Self {
            client,
            url,
            api_key,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Deliver one signal, retrying transient failures with capped
    /// exponential backoff. Non-2xx statuses count as transient.
    pub async fn push(&self, signal: &Signal) -> Result<(), DeliveryFailure> {
        let body = self.push_body(signal);
        let mut attempt = 0;
        let mut delay_ms = INITIAL_RETRY_DELAY_MS;

        loop {
            attempt += 1;
            let failure = match self
                .client
                .post(&self.url)
                .header("X-Api-Key", &self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    debug!("📤 Pushed signal for issue {} ({})", signal.issue, response.status());
                    return Ok(());
                }
                Ok(response) => DeliveryFailure::Status {
                    status: response.status(),
                    attempts: attempt,
                },
                Err(e) => DeliveryFailure::Transport {
                    attempts: attempt,
                    source: e,
                },
            };

            if attempt >= self.max_attempts {
                return Err(failure);
            }

            warn!(
                "🔁 Push attempt {}/{} failed ({}), retrying in {}ms",
                attempt, self.max_attempts, failure, delay_ms
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            delay_ms = (delay_ms * 2).min(MAX_RETRY_DELAY_MS);
        }
    }

    /// Stable body layout: issue, number, sizeClass, parity, confidence,
    /// producedAt, plus the api_key credential.
    fn push_body(&self, signal: &Signal) -> Value {
        json!({
            "issue": signal.issue,
            "number": signal.number,
            "sizeClass": signal.size_class.as_str(),
            "parity": signal.parity.as_str(),
            "confidence": signal.confidence,
            "producedAt": signal.produced_at.to_rfc3339(),
            "api_key": self.api_key,
        })
    }
}
