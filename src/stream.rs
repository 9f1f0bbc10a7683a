//! 🌊 Live round stream session.
//!
//! Owns the WebSocket connection lifecycle: connect via base URL + path
//! (session-bound URLs with a sid expire, so the URL is always rebuilt),
//! send the optional subscribe frame once, then feed every inbound message
//! to the pipeline in arrival order. On disconnect or idle timeout the
//! session reconnects forever with capped exponential backoff; any received
//! message resets the backoff to its base.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SourceConfig;
use crate::pipeline::SignalPipeline;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid stream URL: {0}")]
    BadUrl(String),
    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("stream disconnected: {0}")]
    Disconnected(String),
    #[error("no inbound message within {0:?}")]
    IdleTimeout(Duration),
}

/// Why one connection attempt ended.
enum SessionEnd {
    Stopped,
}

pub struct StreamSession {
    cfg: SourceConfig,
    ws_url: Url,
}

impl StreamSession {
    /// Resolves the stream URL up front so a bad endpoint surfaces at
    /// startup instead of inside the reconnect loop.
    pub fn new(cfg: &SourceConfig) -> Result<Self, ConnectionError> {
        let ws_url = ws_url(cfg)?;
        Ok(Self {
            cfg: cfg.clone(),
            ws_url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.ws_url
    }

    /// Run until the shutdown flag flips. Reconnect attempts are unbounded;
    /// per-event failures never escape the pipeline.
    pub async fn run(&self, pipeline: Arc<SignalPipeline>, mut shutdown: watch::Receiver<bool>) {
        let base = Duration::from_millis(self.cfg.reconnect_base_ms.max(1));
        let cap = Duration::from_millis(self.cfg.reconnect_cap_ms.max(self.cfg.reconnect_base_ms.max(1)));
        let mut backoff = base;

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.connect_and_stream(&pipeline, &mut shutdown, base, &mut backoff).await {
                Ok(SessionEnd::Stopped) => break,
                Err(e) => warn!("🔌 Stream error: {}", e),
            }

            if *shutdown.borrow() {
                break;
            }

            info!("⏳ Reconnecting in {:?}...", backoff);
            tokio::select! {
                _ = sleep(backoff) => {}
                _ = shutdown.changed() => break,
            }
            backoff = next_backoff(backoff, cap);
        }

        info!("🛑 Stream session stopped");
    }

    async fn connect_and_stream(
        &self,
        pipeline: &Arc<SignalPipeline>,
        shutdown: &mut watch::Receiver<bool>,
        base: Duration,
        backoff: &mut Duration,
    ) -> Result<SessionEnd, ConnectionError> {
        info!("🔌 Connecting to {}", self.ws_url);
        let (ws, _) = connect_async(self.ws_url.as_str()).await?;
        info!("✅ Stream connected");
        let (mut write, mut read) = ws.split();

        // Fire-and-forget subscribe; no acknowledgment expected.
        if let Some(event) = &self.cfg.subscribe_event {
            let payload = self
                .cfg
                .subscribe_payload
                .clone()
                .unwrap_or_else(|| json!({}));
            let frame = json!({"event": event, "payload": payload});
            match write.send(Message::Text(frame.to_string())).await {
                Ok(()) => info!("📨 Subscribe sent: {}", event),
                Err(e) => warn!("⚠️  Subscribe send failed: {}", e),
            }
        }

        let idle = Duration::from_secs(self.cfg.idle_timeout_secs.max(1));

        loop {
            let next = tokio::select! {
                _ = shutdown.changed() => return Ok(SessionEnd::Stopped),
                next = timeout(idle, read.next()) => next,
            };

            let msg = match next {
                Err(_) => return Err(ConnectionError::IdleTimeout(idle)),
                Ok(None) => return Err(ConnectionError::Disconnected("stream ended".to_string())),
                Ok(Some(Err(e))) => return Err(ConnectionError::Ws(e)),
                Ok(Some(Ok(msg))) => msg,
            };

            // Anything received means the link is alive.
            *backoff = base;

            match msg {
                Message::Text(text) => {
                    let preview: String = text.chars().take(200).collect();
                    debug!("📩 WS message: {}", preview);
                    // Non-JSON text still goes through the interpreter,
                    // which owns rejection.
                    let value = match serde_json::from_str::<Value>(&text) {
                        Ok(v) => v,
                        Err(_) => Value::String(text),
                    };
                    pipeline.handle_raw(&value).await;
                }
                Message::Ping(data) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Message::Close(frame) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .unwrap_or_else(|| "no reason".to_string());
                    return Err(ConnectionError::Disconnected(reason));
                }
                other => debug!("📦 Ignoring non-text frame: {:?}", other),
            }
        }
    }
}

/// Delay doubles per failed attempt up to the cap.
fn next_backoff(current: Duration, cap: Duration) -> Duration {
    (current * 2).min(cap)
}

/// Build the WebSocket URL from base + path. Accepts http(s) bases and maps
/// them onto ws(s); `path` may carry its own query string.
fn ws_url(cfg: &SourceConfig) -> Result<Url, ConnectionError> {
    let mut url = Url::parse(&cfg.base_url)
        .map_err(|e| ConnectionError::BadUrl(format!("{}: {}", cfg.base_url, e)))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ConnectionError::BadUrl(format!(
                "unsupported scheme '{}' in {}",
                other, cfg.base_url
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ConnectionError::BadUrl(cfg.base_url.clone()))?;

    if !cfg.path.is_empty() {
        let (path, query) = match cfg.path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (cfg.path.as_str(), None),
        };
        url.set_path(path);
        if query.is_some() {
            url.set_query(query);
        }
    }

    Ok(url)
}
