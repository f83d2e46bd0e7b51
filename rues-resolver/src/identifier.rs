//! Tax identifier (NIT) normalization
//!
//! Registry sources are keyed by the NIT without its verification digit.
//! Callers may submit `900.123.456-7`, `9001234567` or `900123456`; all of
//! them are reduced to digits first.
//!
//! The check-digit rule is positional: whenever nine or more digits remain the
//! last one is dropped. An identifier submitted *without* its check digit and
//! with nine digits therefore loses a real digit. The rule is kept as is.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Digit count from which the trailing digit is treated as a check digit
const CHECK_DIGIT_THRESHOLD: usize = 9;

/// Digits-only lookup key derived from a raw tax identifier
///
/// May be empty, which callers must treat as "no identifier".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BaseIdentifier(String);

impl BaseIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BaseIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keep ASCII digits only
pub fn only_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Reduce a raw identifier to the base identifier used for lookups
pub fn normalize(raw: &str) -> BaseIdentifier {
    let mut digits = only_digits(raw);
    if digits.len() >= CHECK_DIGIT_THRESHOLD {
        digits.pop();
    }
    BaseIdentifier(digits)
}

/// Pick the raw tax identifier out of a webhook payload
///
/// `nit` wins when it is a non-blank string. Otherwise `vat` is used when it is
/// a non-blank string or a number; Odoo sends `false` for empty fields.
pub fn extract_raw_identifier(nit: Option<&Value>, vat: Option<&Value>) -> Option<String> {
    if let Some(Value::String(s)) = nit {
        if !s.trim().is_empty() {
            return Some(s.trim().to_string());
        }
    }

    match vat? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => n
            .as_i64()
            .map(|i| i.to_string())
            .or_else(|| n.as_u64().map(|u| u.to_string()))
            .or_else(|| n.as_f64().map(|f| format!("{}", f.trunc() as i64))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_identifiers_are_kept_whole() {
        assert_eq!(normalize("12345678").as_str(), "12345678");
        assert_eq!(normalize("1.234-5").as_str(), "12345");
        assert_eq!(normalize(" 8 ").as_str(), "8");
    }

    #[test]
    fn check_digit_is_stripped_from_nine_or_more_digits() {
        assert_eq!(normalize("900123456-7").as_str(), "900123456");
        assert_eq!(normalize("900.123.456-7").as_str(), "900123456");
        assert_eq!(normalize("123456789").as_str(), "12345678");
    }

    #[test]
    fn no_digits_yields_empty_identifier() {
        assert!(normalize("").is_empty());
        assert!(normalize("N/A - - ").is_empty());
    }

    #[test]
    fn normalize_is_not_idempotent_for_long_identifiers() {
        // A nine-digit base loses another digit when normalized again.
        let once = normalize("900123456-7");
        let twice = normalize(once.as_str());
        assert_eq!(once.as_str(), "900123456");
        assert_eq!(twice.as_str(), "90012345");
    }

    #[test]
    fn nine_digits_without_check_digit_lose_a_real_digit() {
        // Known edge case: the rule cannot tell a bare nine-digit NIT from
        // an eight-digit NIT plus check digit.
        assert_eq!(normalize("900123456").as_str(), "90012345");
    }

    #[test]
    fn non_ascii_digits_are_ignored() {
        assert_eq!(normalize("٩٠٠1234").as_str(), "1234");
    }

    #[test]
    fn nit_field_wins_over_vat() {
        let nit = json!(" 900123456-7 ");
        let vat = json!("CO800000000");
        assert_eq!(
            extract_raw_identifier(Some(&nit), Some(&vat)).as_deref(),
            Some("900123456-7")
        );
    }

    #[test]
    fn vat_is_used_when_nit_is_blank_or_missing() {
        let blank = json!("   ");
        let vat = json!("900123456-7");
        assert_eq!(
            extract_raw_identifier(Some(&blank), Some(&vat)).as_deref(),
            Some("900123456-7")
        );
        assert_eq!(
            extract_raw_identifier(None, Some(&json!(9001234567_i64))).as_deref(),
            Some("9001234567")
        );
    }

    #[test]
    fn false_and_null_vat_mean_absent() {
        assert_eq!(extract_raw_identifier(None, Some(&json!(false))), None);
        assert_eq!(extract_raw_identifier(None, Some(&Value::Null)), None);
        assert_eq!(extract_raw_identifier(None, None), None);
    }
}
