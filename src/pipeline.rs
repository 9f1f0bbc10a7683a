//! 🧠 End-to-end signal pipeline: parse → de-dup → derive → deliver.
//!
//! One owned object with an explicit lifetime instead of ambient module
//! state, so several instances (or tests) can run in isolation. Every
//! per-event failure is contained here: a bad or undeliverable payload is
//! logged and the next event proceeds untouched.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::deduplicator::{DedupStats, IssueDeduplicator};
use crate::parser::{ParseFailure, PayloadInterpreter};
use crate::push::WebPushClient;
use crate::signal::SignalDeriver;
use crate::telegram::TelegramClient;
use crate::types::Signal;

/// What happened to one raw message.
#[derive(Debug)]
pub enum Outcome {
    /// A signal was produced (and handed to delivery, when configured).
    Produced(Signal),
    /// The issue was already processed within the retention window.
    Duplicate,
    /// The payload carried no usable round result.
    Rejected(ParseFailure),
}

pub struct SignalPipeline {
    interpreter: PayloadInterpreter,
    deriver: SignalDeriver,
    dedup: IssueDeduplicator,
    web_push: Option<WebPushClient>,
    telegram: Option<Arc<TelegramClient>>,
}

impl SignalPipeline {
    pub fn new(
        interpreter: PayloadInterpreter,
        deriver: SignalDeriver,
        dedup: IssueDeduplicator,
        web_push: Option<WebPushClient>,
        telegram: Option<Arc<TelegramClient>>,
    ) -> Self {
        Self {
            interpreter,
            deriver,
            dedup,
            web_push,
            telegram,
        }
    }

    /// Assemble the pipeline from validated configuration, sharing one HTTP
    /// client across the delivery paths.
    pub fn from_config(config: &crate::config::Config, http: reqwest::Client) -> Self {
        let interpreter = PayloadInterpreter::with_fields(
            &config.parser.issue_fields,
            &config.parser.number_fields,
        );
        let deriver = SignalDeriver::new(config.signal.big_threshold);
        let dedup = IssueDeduplicator::new(
            config.dedup.capacity,
            std::time::Duration::from_secs(config.dedup.ttl_secs),
        );

        let web_push = config.push.enabled.then(|| {
            WebPushClient::new(
                http.clone(),
                config.push.url.clone(),
                config.push.api_key.clone(),
                config.push.max_attempts,
            )
        });

        let telegram = config.telegram.enabled.then(|| {
            Arc::new(TelegramClient::new(
                http,
                config.telegram.bot_token.clone(),
                config.telegram.chat_id.clone(),
                crate::telegram::SignalLabels {
                    symbol: config.telegram.symbol.clone(),
                    timeframe: config.telegram.timeframe.clone(),
                    game: config.telegram.game.clone(),
                },
            ))
        });

        Self::new(interpreter, deriver, dedup, web_push, telegram)
    }

    /// Run one raw message through the full pipeline. Signals come out in
    /// the order messages go in; the primary push is awaited in-line while
    /// the Telegram mirror runs as its own task.
    pub async fn handle_raw(&self, raw: &Value) -> Outcome {
        let round = match self.interpreter.parse(raw) {
            Ok(round) => round,
            Err(reason) => {
                warn!("🗑️  Discarded payload ({})", reason);
                return Outcome::Rejected(reason);
            }
        };

        if !self.dedup.should_process(&round.issue) {
            debug!("⏭️  Duplicate issue {} dropped", round.issue);
            return Outcome::Duplicate;
        }

        let signal = self.deriver.derive(&round);
        info!(
            "🎯 SIGNAL | issue={} | {} / {} ({:.0}%) | num={}",
            signal.issue,
            signal.size_class.as_str(),
            signal.parity.as_str(),
            signal.confidence * 100.0,
            signal.number
        );

        if let Some(push) = &self.web_push {
            if let Err(e) = push.push(&signal).await {
                warn!("❌ Web push failed for issue {}: {}", signal.issue, e);
            }
        }

        if let Some(telegram) = &self.telegram {
            let telegram = telegram.clone();
            let mirrored = signal.clone();
            tokio::spawn(async move {
                if let Err(e) = telegram.send_signal(&mirrored).await {
                    warn!("📱 Telegram notify failed for issue {}: {:#}", mirrored.issue, e);
                }
            });
        }

        Outcome::Produced(signal)
    }

    pub fn dedup_stats(&self) -> DedupStats {
        self.dedup.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Parity, SizeClass};
    use serde_json::json;
    use std::time::Duration;

    fn bare_pipeline() -> SignalPipeline {
        SignalPipeline::new(
            PayloadInterpreter::new(),
            SignalDeriver::new(5),
            IssueDeduplicator::new(100, Duration::from_secs(60)),
            None,
            None,
        )
    }

    #[tokio::test]
    async fn message_flows_end_to_end_and_duplicate_is_dropped() {
        let pipeline = bare_pipeline();
        let payload = json!({"issueNumber": "20240101001", "result": 7});

        match pipeline.handle_raw(&payload).await {
            Outcome::Produced(signal) => {
                assert_eq!(signal.issue, "20240101001");
                assert_eq!(signal.number, 7);
                assert_eq!(signal.size_class, SizeClass::Big);
                assert_eq!(signal.parity, Parity::Odd);
            }
            other => panic!("expected a signal, got {:?}", other),
        }

        // The identical message again must stop at the de-dup guard.
        assert!(matches!(
            pipeline.handle_raw(&payload).await,
            Outcome::Duplicate
        ));

        let stats = pipeline.dedup_stats();
        assert_eq!(stats.unique, 1);
        assert_eq!(stats.duplicates, 1);
    }

    #[tokio::test]
    async fn rejected_payload_does_not_poison_the_stream() {
        let pipeline = bare_pipeline();

        assert!(matches!(
            pipeline.handle_raw(&json!({"noise": true})).await,
            Outcome::Rejected(ParseFailure::MissingNumber)
        ));

        // The next well-formed message still goes through.
        assert!(matches!(
            pipeline.handle_raw(&json!({"issue": "2", "number": 4})).await,
            Outcome::Produced(_)
        ));
    }
}
