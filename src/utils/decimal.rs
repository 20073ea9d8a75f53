//! Decimal arithmetic utilities for rate formatting and API parsing.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::str::FromStr;

/// Convert a fractional rate to percent (0.0003 -> 0.03).
pub fn to_percent(rate: Decimal) -> Decimal {
    rate * dec!(100)
}

/// Format a rate as a percentage with a fixed number of decimals (no sign prefix).
pub fn format_percent(rate: Decimal, decimals: u32) -> String {
    let pct = normalize_zero(to_percent(rate).round_dp(decimals));
    format!("{:.*}", decimals as usize, pct)
}

/// Format a rate as a signed percentage, e.g. `+0.0300` or `-0.0200`.
pub fn format_signed_percent(rate: Decimal, decimals: u32) -> String {
    let pct = normalize_zero(to_percent(rate).round_dp(decimals));
    let sign = if pct.is_sign_negative() { "" } else { "+" };
    format!("{}{:.*}", sign, decimals as usize, pct)
}

/// Rounding can leave a negative zero behind.
fn normalize_zero(value: Decimal) -> Decimal {
    if value.is_zero() {
        Decimal::ZERO
    } else {
        value
    }
}

/// Parse a decimal from a JSON value that may be a string, a number, or null.
pub fn parse_lenient(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .ok(),
        serde_json::Value::Number(n) => {
            let s = n.to_string();
            Decimal::from_str(&s)
                .or_else(|_| Decimal::from_scientific(&s))
                .ok()
        }
        _ => None,
    }
}

/// Serde helper: optional decimal that tolerates strings, numbers, nulls,
/// empty strings and garbage (all non-decimals become `None`).
pub fn deserialize_decimal_lenient<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_lenient))
}

/// Serde helper: optional integer (e.g. unix millis) with the same tolerance
/// as [`deserialize_decimal_lenient`]. Fractions are truncated.
pub fn deserialize_i64_lenient<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(parse_lenient)
        .and_then(|d| d.trunc().to_i64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_percent() {
        assert_eq!(format_signed_percent(dec!(0.0003), 4), "+0.0300");
        assert_eq!(format_signed_percent(dec!(-0.0002), 4), "-0.0200");
        assert_eq!(format_signed_percent(Decimal::ZERO, 4), "+0.0000");
        // Rounds to zero without a dangling minus sign
        assert_eq!(format_signed_percent(dec!(-0.0000001), 4), "+0.0000");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(dec!(0.002), 2), "0.20");
        assert_eq!(format_percent(dec!(0.0005), 4), "0.0500");
    }

    #[test]
    fn test_parse_lenient() {
        assert_eq!(parse_lenient(&serde_json::json!("0.0001")), Some(dec!(0.0001)));
        assert_eq!(parse_lenient(&serde_json::json!(0.5)), Some(dec!(0.5)));
        assert_eq!(parse_lenient(&serde_json::json!("1e-5")), Some(dec!(0.00001)));
        assert_eq!(parse_lenient(&serde_json::json!("")), None);
        assert_eq!(parse_lenient(&serde_json::json!("n/a")), None);
        assert_eq!(parse_lenient(&serde_json::Value::Null), None);
    }

    #[test]
    fn test_i64_lenient() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(default, deserialize_with = "deserialize_i64_lenient")]
            at: Option<i64>,
        }

        let parse = |json: &str| serde_json::from_str::<Wrapper>(json).unwrap().at;
        assert_eq!(parse(r#"{"at": 1760000000000}"#), Some(1_760_000_000_000));
        assert_eq!(parse(r#"{"at": "1760000000000"}"#), Some(1_760_000_000_000));
        assert_eq!(parse(r#"{"at": 1760000000000.7}"#), Some(1_760_000_000_000));
        assert_eq!(parse(r#"{"at": "soon"}"#), None);
        assert_eq!(parse(r#"{"at": null}"#), None);
        assert_eq!(parse(r#"{}"#), None);
    }
}
