//! 📱 Telegram notification mirror.
//!
//! Best-effort side channel: a failed notification is logged by the caller
//! and never blocks or fails the primary web push.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde_json::json;

use crate::types::Signal;

/// Display labels for notification messages.
#[derive(Debug, Clone)]
pub struct SignalLabels {
    pub symbol: String,
    pub timeframe: String,
    pub game: String,
}

impl Default for SignalLabels {
    fn default() -> Self {
        Self {
            symbol: "WinGo".to_string(),
            timeframe: "30s".to_string(),
            game: "WinGo_30S".to_string(),
        }
    }
}

pub struct TelegramClient {
    client: Client,
    bot_token: String,
    chat_id: String,
    labels: SignalLabels,
}

impl TelegramClient {
    pub fn new(client: Client, bot_token: String, chat_id: String, labels: SignalLabels) -> Self {
        Self {
            client,
            bot_token,
            chat_id,
            labels,
        }
    }

    pub async fn send_signal(&self, signal: &Signal) -> Result<()> {
        self.send_message(&format_signal(&self.labels, signal)).await
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        let payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML"
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("Failed to reach Telegram API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Telegram API error {}: {}", status, error_text);
        }

        Ok(())
    }
}

fn format_signal(labels: &SignalLabels, signal: &Signal) -> String {
    format!(
        "🎯 <b>{}</b> [{}] — <b>{} / {}</b> ({:.0}%)\n\
         Game: {}\n\
         Issue: {}\n\
         Number: <b>{}</b>",
        labels.symbol,
        labels.timeframe,
        signal.size_class.as_str(),
        signal.parity.as_str(),
        signal.confidence * 100.0,
        labels.game,
        signal.issue,
        signal.number,
    )
}
