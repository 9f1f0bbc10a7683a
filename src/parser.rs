//! 🔍 Tolerant interpreter for upstream round payloads.
//!
//! The push source has no stable schema: the round number and issue id move
//! between field names, nesting levels and encodings from one deployment to
//! the next. Extraction therefore runs over prioritized candidate tables
//! (overridable from configuration) instead of hard-coded branching; the
//! first candidate that yields a syntactically valid value wins.
//!
//! Normalization rule for the numeric result: a value is reduced to its last
//! decimal digit. Integers via `n % 10` (non-negative only), strings via
//! their trailing digit run. Multi-digit game codes like `57` map to `7`.

use serde_json::Value;
use thiserror::Error;

use crate::types::RoundResult;

/// Why a payload could not be interpreted as a round result.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("no recognizable issue identifier")]
    MissingIssue,
    #[error("no recognizable result number")]
    MissingNumber,
    #[error("result number not reducible to 0..=9")]
    OutOfRange,
}

/// Issue-identifier field paths probed in priority order.
pub const DEFAULT_ISSUE_FIELDS: &[&str] = &[
    "issue",
    "issueNumber",
    "expect",
    "period",
    "data.issue",
    "lottery.issue",
];

/// Numeric-result field paths probed in priority order.
pub const DEFAULT_NUMBER_FIELDS: &[&str] = &[
    "number",
    "result",
    "openCode",
    "lucky",
    "lottery.number",
    "data.number",
    "data.result",
];

/// Wrapper keys whose array value may hold the newest round as its last element.
pub const LIST_FIELDS: &[&str] = &["list", "rows", "data", "resultList"];

/// Nested unwrap limit for JSON-in-string and array payloads.
const MAX_DEPTH: usize = 4;

/// Outcome of probing one number candidate.
enum NumberProbe {
    Valid(u8),
    /// Candidate present and numeric-looking, but not reducible to 0..=9.
    Invalid,
    Absent,
}

/// Stateless payload interpreter. Pure: identical input, identical output.
#[derive(Debug, Clone)]
pub struct PayloadInterpreter {
    issue_fields: Vec<String>,
    number_fields: Vec<String>,
}

impl Default for PayloadInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadInterpreter {
    pub fn new() -> Self {
        Self {
            issue_fields: DEFAULT_ISSUE_FIELDS.iter().map(|s| s.to_string()).collect(),
            number_fields: DEFAULT_NUMBER_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Override the candidate tables. Empty lists keep the defaults.
    pub fn with_fields(issue_fields: &[String], number_fields: &[String]) -> Self {
        let mut interpreter = Self::new();
        if !issue_fields.is_empty() {
            interpreter.issue_fields = issue_fields.to_vec();
        }
        if !number_fields.is_empty() {
            interpreter.number_fields = number_fields.to_vec();
        }
        interpreter
    }

    /// Extract a canonical round result from a raw upstream message.
    pub fn parse(&self, raw: &Value) -> Result<RoundResult, ParseFailure> {
        let (issue, number) = self.scan(raw, 0)?;
        Ok(RoundResult {
            issue,
            number,
            raw: raw.clone(),
        })
    }

    fn scan(&self, value: &Value, depth: usize) -> Result<(String, u8), ParseFailure> {
        if depth > MAX_DEPTH {
            return Err(ParseFailure::MissingNumber);
        }

        match value {
            // JSON sometimes arrives double-encoded; unwrap and rescan.
            Value::String(text) => {
                let trimmed = text.trim();
                let looks_like_json = (trimmed.starts_with('{') && trimmed.ends_with('}'))
                    || (trimmed.starts_with('[') && trimmed.ends_with(']'));
                if looks_like_json {
                    if let Ok(inner) = serde_json::from_str::<Value>(trimmed) {
                        return self.scan(&inner, depth + 1);
                    }
                }
                Err(ParseFailure::MissingNumber)
            }
            // The newest round sits at the end of result arrays.
            Value::Array(items) => match items.last() {
                Some(last) => self.scan(last, depth + 1),
                None => Err(ParseFailure::MissingNumber),
            },
            Value::Object(_) => self.scan_object(value, depth),
            _ => Err(ParseFailure::MissingNumber),
        }
    }

    fn scan_object(&self, value: &Value, depth: usize) -> Result<(String, u8), ParseFailure> {
        let mut saw_invalid = false;
        let mut number = None;

        for path in &self.number_fields {
            match probe_number(lookup(value, path)) {
                NumberProbe::Valid(n) => {
                    number = Some(n);
                    break;
                }
                NumberProbe::Invalid => saw_invalid = true,
                NumberProbe::Absent => {}
            }
        }

        let number = match number {
            Some(n) => n,
            None => {
                // No direct hit; the round may live inside a wrapped list.
                for key in LIST_FIELDS {
                    if let Some(Value::Array(items)) = value.get(*key) {
                        if !items.is_empty() {
                            if let Ok(found) = self.scan(&value[*key], depth + 1) {
                                return Ok(found);
                            }
                        }
                    }
                }
                return Err(if saw_invalid {
                    ParseFailure::OutOfRange
                } else {
                    ParseFailure::MissingNumber
                });
            }
        };

        for path in &self.issue_fields {
            if let Some(issue) = probe_issue(lookup(value, path)) {
                return Ok((issue, number));
            }
        }

        Err(ParseFailure::MissingIssue)
    }
}

/// Dotted-path lookup, e.g. `data.number` resolves `value["data"]["number"]`.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for key in path.split('.') {
        current = current.as_object()?.get(key)?;
    }
    Some(current)
}

fn probe_number(candidate: Option<&Value>) -> NumberProbe {
    let Some(candidate) = candidate else {
        return NumberProbe::Absent;
    };

    match candidate {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                NumberProbe::Valid((u % 10) as u8)
            } else {
                // Negative or fractional: recognizably numeric, not a round number.
                NumberProbe::Invalid
            }
        }
        Value::String(s) => {
            let trimmed = s.trim_end();
            let trailing_digits = trimmed
                .chars()
                .rev()
                .take_while(|c| c.is_ascii_digit())
                .count();
            if trailing_digits == 0 {
                return NumberProbe::Absent;
            }
            let last = trimmed.chars().last().and_then(|c| c.to_digit(10));
            match last {
                Some(d) => NumberProbe::Valid(d as u8),
                None => NumberProbe::Absent,
            }
        }
        _ => NumberProbe::Absent,
    }
}

fn probe_issue(candidate: Option<&Value>) -> Option<String> {
    match candidate? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_round_payload() {
        let interpreter = PayloadInterpreter::new();
        let round = interpreter
            .parse(&json!({"issueNumber": "20240101001", "result": 7}))
            .unwrap();
        assert_eq!(round.issue, "20240101001");
        assert_eq!(round.number, 7);
    }

    #[test]
    fn first_valid_candidate_wins() {
        let interpreter = PayloadInterpreter::new();
        // `number` outranks `result`.
        let round = interpreter
            .parse(&json!({"issue": "1", "number": 3, "result": 9}))
            .unwrap();
        assert_eq!(round.number, 3);
    }

    #[test]
    fn multi_digit_number_reduces_to_last_digit() {
        let interpreter = PayloadInterpreter::new();
        let round = interpreter.parse(&json!({"issue": "1", "number": 57})).unwrap();
        assert_eq!(round.number, 7);
    }

    #[test]
    fn string_number_uses_trailing_digit() {
        let interpreter = PayloadInterpreter::new();
        let round = interpreter
            .parse(&json!({"issue": "1", "openCode": "3,5,8"}))
            .unwrap();
        assert_eq!(round.number, 8);
    }

    #[test]
    fn nested_fields_resolve() {
        let interpreter = PayloadInterpreter::new();
        let round = interpreter
            .parse(&json!({"expect": "42", "lottery": {"number": 4}}))
            .unwrap();
        assert_eq!(round.issue, "42");
        assert_eq!(round.number, 4);
    }

    #[test]
    fn wrapped_list_resolves_to_last_element() {
        let interpreter = PayloadInterpreter::new();
        let payload = json!({
            "list": [
                {"issue": "old", "number": 1},
                {"issue": "new", "number": 9}
            ]
        });
        let round = interpreter.parse(&payload).unwrap();
        assert_eq!(round.issue, "new");
        assert_eq!(round.number, 9);
    }

    #[test]
    fn json_encoded_string_is_unwrapped() {
        let interpreter = PayloadInterpreter::new();
        let payload = Value::String(r#"{"issue":"7","result":2}"#.to_string());
        let round = interpreter.parse(&payload).unwrap();
        assert_eq!(round.issue, "7");
        assert_eq!(round.number, 2);
    }

    #[test]
    fn missing_number_is_reported() {
        let interpreter = PayloadInterpreter::new();
        let err = interpreter
            .parse(&json!({"issue": "1", "note": "no digits here"}))
            .unwrap_err();
        assert_eq!(err, ParseFailure::MissingNumber);
    }

    #[test]
    fn missing_number_beats_missing_issue() {
        let interpreter = PayloadInterpreter::new();
        let err = interpreter.parse(&json!({"unrelated": true})).unwrap_err();
        assert_eq!(err, ParseFailure::MissingNumber);
    }

    #[test]
    fn negative_number_is_out_of_range() {
        let interpreter = PayloadInterpreter::new();
        let err = interpreter
            .parse(&json!({"issue": "1", "number": -3}))
            .unwrap_err();
        assert_eq!(err, ParseFailure::OutOfRange);
    }

    #[test]
    fn missing_issue_is_reported() {
        let interpreter = PayloadInterpreter::new();
        let err = interpreter.parse(&json!({"result": 5})).unwrap_err();
        assert_eq!(err, ParseFailure::MissingIssue);

        let err = interpreter
            .parse(&json!({"issue": "   ", "result": 5}))
            .unwrap_err();
        assert_eq!(err, ParseFailure::MissingIssue);
    }

    #[test]
    fn numeric_issue_is_stringified() {
        let interpreter = PayloadInterpreter::new();
        let round = interpreter
            .parse(&json!({"period": 20240101001u64, "number": 0}))
            .unwrap();
        assert_eq!(round.issue, "20240101001");
    }

    #[test]
    fn custom_candidate_tables_apply() {
        let interpreter = PayloadInterpreter::with_fields(
            &["roundId".to_string()],
            &["winningNumber".to_string()],
        );
        let round = interpreter
            .parse(&json!({"roundId": "r-9", "winningNumber": 6}))
            .unwrap();
        assert_eq!(round.issue, "r-9");
        assert_eq!(round.number, 6);

        // The overridden table no longer probes the defaults.
        let err = interpreter
            .parse(&json!({"issue": "1", "number": 5}))
            .unwrap_err();
        assert_eq!(err, ParseFailure::MissingNumber);
    }

    #[test]
    fn identical_input_yields_identical_output() {
        let interpreter = PayloadInterpreter::new();
        let payload = json!({"issue": "55", "result": "19"});
        let a = interpreter.parse(&payload).unwrap();
        let b = interpreter.parse(&payload).unwrap();
        assert_eq!(a.issue, b.issue);
        assert_eq!(a.number, b.number);
        assert_eq!(a.number, 9);
    }
}
