//! ⚙️ Configuration: TOML file with environment overrides.
//!
//! Resolution order: `CONFIG_PATH` if set, else `config.toml`, else
//! `config.example.toml` for first runs. A handful of deployment-critical
//! settings can be overridden from the environment (usually via `.env`).
//! Validation runs once at startup; a bad configuration is fatal and exits
//! non-zero before anything connects.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::env;
use std::fs;
use tracing::info;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub backfill: BackfillConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub parser: ParserConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub base_url: String,
    #[serde(default = "default_source_path")]
    pub path: String,
    #[serde(default)]
    pub subscribe_event: Option<String>,
    #[serde(default)]
    pub subscribe_payload: Option<JsonValue>,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_reconnect_cap_ms")]
    pub reconnect_cap_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_push_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_game")]
    pub game: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeartbeatConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_heartbeat_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackfillConfig {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalConfig {
    #[serde(default = "default_big_threshold")]
    pub big_threshold: u8,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DedupConfig {
    #[serde(default = "default_dedup_capacity")]
    pub capacity: usize,
    #[serde(default = "default_dedup_ttl_secs")]
    pub ttl_secs: u64,
}

/// Candidate-table overrides for the payload interpreter. Empty lists keep
/// the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub issue_fields: Vec<String>,
    #[serde(default)]
    pub number_fields: Vec<String>,
}

fn default_source_path() -> String {
    "/socket.io".to_string()
}
fn default_idle_timeout_secs() -> u64 {
    90
}
fn default_reconnect_base_ms() -> u64 {
    1_000
}
fn default_reconnect_cap_ms() -> u64 {
    60_000
}
fn default_true() -> bool {
    true
}
fn default_push_attempts() -> u32 {
    3
}
fn default_symbol() -> String {
    "WinGo".to_string()
}
fn default_timeframe() -> String {
    "30s".to_string()
}
fn default_game() -> String {
    "WinGo_30S".to_string()
}
fn default_heartbeat_secs() -> u64 {
    60
}
fn default_big_threshold() -> u8 {
    crate::signal::DEFAULT_BIG_THRESHOLD
}
fn default_dedup_capacity() -> usize {
    200
}
fn default_dedup_ttl_secs() -> u64 {
    3_600
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: String::new(),
            api_key: String::new(),
            max_attempts: default_push_attempts(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            chat_id: String::new(),
            symbol: default_symbol(),
            timeframe: default_timeframe(),
            game: default_game(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            url: None,
            interval_secs: default_heartbeat_secs(),
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            big_threshold: default_big_threshold(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            capacity: default_dedup_capacity(),
            ttl_secs: default_dedup_ttl_secs(),
        }
    }
}

impl Config {
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse configuration")
    }

    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {}", path))
    }

    /// CONFIG_PATH, then config.toml, then the example file for first runs.
    /// Environment overrides and validation apply in all cases.
    pub fn load_or_default() -> Result<Self> {
        let mut config = match env::var("CONFIG_PATH") {
            Ok(path) => Self::load(&path)?,
            Err(_) => Self::load("config.toml")
                .or_else(|_| Self::load("config.example.toml"))
                .context("Failed to load configuration")?,
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = env::var("WEB_PUSH_URL") {
            self.push.url = v;
        }
        if let Ok(v) = env::var("WEB_API_KEY") {
            self.push.api_key = v;
        }
        if let Ok(v) = env::var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = v;
        }
        if let Ok(v) = env::var("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = v;
        }
        if let Ok(v) = env::var("BIG_THRESHOLD") {
            self.signal.big_threshold = v
                .parse()
                .context("BIG_THRESHOLD must be an integer in 1..=9")?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.source.base_url.is_empty() {
            bail!("source.base_url must be set");
        }
        if self.push.enabled && (self.push.url.is_empty() || self.push.api_key.is_empty()) {
            bail!("push.url and push.api_key must be set when push is enabled");
        }
        if self.telegram.enabled
            && (self.telegram.bot_token.is_empty() || self.telegram.chat_id.is_empty())
        {
            bail!("telegram.bot_token and telegram.chat_id must be set when telegram is enabled");
        }
        if !(1..=9).contains(&self.signal.big_threshold) {
            bail!(
                "signal.big_threshold must be in 1..=9, got {}",
                self.signal.big_threshold
            );
        }
        if self.dedup.capacity == 0 {
            bail!("dedup.capacity must be at least 1");
        }
        Ok(())
    }

    pub fn print_startup_info(&self) {
        info!("⚙️  Stream: {}{}", self.source.base_url, self.source.path);
        info!(
            "⚙️  Push: {}",
            if self.push.enabled { self.push.url.as_str() } else { "DISABLED" }
        );
        info!(
            "⚙️  Telegram: {}",
            if self.telegram.enabled { "enabled" } else { "disabled" }
        );
        if let Some(url) = &self.heartbeat.url {
            info!("⚙️  Heartbeat: {} every {}s", url, self.heartbeat.interval_secs);
        }
        if let Some(url) = &self.backfill.url {
            info!("⚙️  Backfill: {}", url);
        }
        info!(
            "⚙️  Signal: big_threshold={} | Dedup: capacity={} ttl={}s",
            self.signal.big_threshold, self.dedup.capacity, self.dedup.ttl_secs
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> &'static str {
        r#"
            [source]
            base_url = "https://hgzy.app"

            [push]
            url = "https://example.com/push.php"
            api_key = "k"
        "#
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let config = Config::parse(minimal()).unwrap();
        assert_eq!(config.source.path, "/socket.io");
        assert_eq!(config.source.idle_timeout_secs, 90);
        assert_eq!(config.source.reconnect_base_ms, 1_000);
        assert_eq!(config.source.reconnect_cap_ms, 60_000);
        assert_eq!(config.signal.big_threshold, 5);
        assert_eq!(config.dedup.capacity, 200);
        assert!(config.push.enabled);
        assert!(!config.telegram.enabled);
        assert!(config.backfill.url.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn subscribe_payload_accepts_arbitrary_tables() {
        let config = Config::parse(
            r#"
                [source]
                base_url = "https://hgzy.app"
                subscribe_event = "subscribe"
                subscribe_payload = { channel = "wingo_30s", speed = 30 }

                [push]
                enabled = false
            "#,
        )
        .unwrap();
        let payload = config.source.subscribe_payload.unwrap();
        assert_eq!(payload["channel"], "wingo_30s");
        assert_eq!(payload["speed"], 30);
    }

    #[test]
    fn enabled_push_requires_url_and_key() {
        let config = Config::parse(
            r#"
                [source]
                base_url = "https://hgzy.app"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn threshold_must_split_both_classes() {
        let mut config = Config::parse(minimal()).unwrap();
        config.signal.big_threshold = 0;
        assert!(config.validate().is_err());
        config.signal.big_threshold = 10;
        assert!(config.validate().is_err());
        config.signal.big_threshold = 9;
        config.validate().unwrap();
    }

    #[test]
    fn parser_overrides_parse() {
        let config = Config::parse(
            r#"
                [source]
                base_url = "https://hgzy.app"

                [push]
                enabled = false

                [parser]
                issue_fields = ["roundId"]
                number_fields = ["winningNumber"]
            "#,
        )
        .unwrap();
        assert_eq!(config.parser.issue_fields, vec!["roundId"]);
        assert_eq!(config.parser.number_fields, vec!["winningNumber"]);
    }
}
