use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical result of one round, extracted from a raw upstream payload.
#[derive(Debug, Clone)]
pub struct RoundResult {
    /// Unique round identifier, never empty.
    pub issue: String,
    /// Winning number, already normalized into 0..=9.
    pub number: u8,
    /// The payload the result was extracted from, kept for logging.
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SizeClass {
    Big,
    Small,
}

impl SizeClass {
    pub fn as_str(&self) -> &str {
        match self {
            SizeClass::Big => "BIG",
            SizeClass::Small => "SMALL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub fn as_str(&self) -> &str {
        match self {
            Parity::Even => "EVEN",
            Parity::Odd => "ODD",
        }
    }
}

/// Derived trading signal for one round. Immutable once created; the
/// serialized field names are a fixed downstream contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub issue: String,
    pub number: u8,
    pub size_class: SizeClass,
    pub parity: Parity,
    /// Bounded score in [0, 1].
    pub confidence: f64,
    pub produced_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_serializes_with_stable_field_names() {
        let signal = Signal {
            issue: "20240101001".to_string(),
            number: 7,
            size_class: SizeClass::Big,
            parity: Parity::Odd,
            confidence: 0.75,
            produced_at: Utc::now(),
        };

        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["issue"], "20240101001");
        assert_eq!(value["number"], 7);
        assert_eq!(value["sizeClass"], "BIG");
        assert_eq!(value["parity"], "ODD");
        assert_eq!(value["confidence"], 0.75);
        assert!(value["producedAt"].is_string());
    }
}
