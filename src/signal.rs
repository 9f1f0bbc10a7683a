//! 🎯 Signal derivation: BIG/SMALL + EVEN/ODD from a round number.
//!
//! Pure, deterministic policy. Confidence is the distance of the number from
//! the class boundary, normalized into [0.5, 1.0]: boundary numbers score
//! 0.5, the far end of the wider class scores 1.0. A fixed formula, not a
//! model; it must stay stable because downstream consumers chart it.

use chrono::Utc;

use crate::types::{Parity, RoundResult, Signal, SizeClass};

pub const DEFAULT_BIG_THRESHOLD: u8 = 5;

/// Maps round numbers to signals. `big_threshold` must be in 1..=9 so both
/// classes are non-empty; configuration validates this at startup.
#[derive(Debug, Clone, Copy)]
pub struct SignalDeriver {
    big_threshold: u8,
}

impl SignalDeriver {
    pub fn new(big_threshold: u8) -> Self {
        Self { big_threshold }
    }

    pub fn derive(&self, round: &RoundResult) -> Signal {
        let size_class = if round.number >= self.big_threshold {
            SizeClass::Big
        } else {
            SizeClass::Small
        };
        let parity = if round.number % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        };

        Signal {
            issue: round.issue.clone(),
            number: round.number,
            size_class,
            parity,
            confidence: self.confidence(round.number),
            produced_at: Utc::now(),
        }
    }

    /// Distance from the class boundary, normalized by the wider class span.
    fn confidence(&self, number: u8) -> f64 {
        let t = self.big_threshold;
        let distance = if number >= t { number - t } else { t - 1 - number };
        let max_distance = (t - 1).max(9 - t) as f64;
        (0.5 + 0.5 * distance as f64 / max_distance).clamp(0.0, 1.0)
    }
}

impl Default for SignalDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_BIG_THRESHOLD)
    }
}
