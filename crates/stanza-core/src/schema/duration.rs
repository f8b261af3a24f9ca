//! Duration coercion
//!
//! Accepted raw forms:
//!
//! - unit-suffixed strings: `"500ms"`, `"1.5s"`, `"2 min"`, `"100us"`, `"1h"`, `"1d"`
//! - colon strings: `"HH:MM"` or `"HH:MM:SS"`
//! - mappings: `{ "seconds": 1, "milliseconds": 500 }`
//! - the bare number `0`
//!
//! Arithmetic is exact: decimal fractions are parsed digit by digit into
//! microseconds, never through floating point.

use std::time::Duration;

use serde_json::Value as JsonValue;

const US: u128 = 1;
const MS: u128 = 1_000;
const SEC: u128 = 1_000_000;
const MIN: u128 = 60 * SEC;
const HOUR: u128 = 60 * MIN;
const DAY: u128 = 24 * HOUR;

/// Smallest unit a duration field may express
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    Microseconds,
    Milliseconds,
    Seconds,
}

impl Precision {
    fn micros(self) -> u128 {
        match self {
            Precision::Microseconds => US,
            Precision::Milliseconds => MS,
            Precision::Seconds => SEC,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Precision::Microseconds => "microseconds",
            Precision::Milliseconds => "milliseconds",
            Precision::Seconds => "seconds",
        }
    }
}

/// Constraint on a duration field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DurationRule {
    pub precision: Precision,
    /// Reject a zero duration
    pub positive: bool,
}

impl DurationRule {
    pub const fn milliseconds() -> Self {
        Self {
            precision: Precision::Milliseconds,
            positive: false,
        }
    }

    pub const fn positive(mut self) -> Self {
        self.positive = true;
        self
    }

    /// Parse `raw` and enforce precision and sign.
    pub fn coerce(&self, raw: &JsonValue) -> Result<Duration, String> {
        let micros = parse_micros(raw)?;
        if micros % self.precision.micros() != 0 {
            return Err(format!(
                "maximum precision is {}",
                self.precision.name()
            ));
        }
        if self.positive && micros == 0 {
            return Err("time period must be positive".to_string());
        }
        let secs = u64::try_from(micros / SEC).map_err(|_| "time period too large".to_string())?;
        let sub_micros = (micros % SEC) as u32;
        Ok(Duration::new(secs, sub_micros * 1_000))
    }
}

fn parse_micros(raw: &JsonValue) -> Result<u128, String> {
    match raw {
        JsonValue::Number(n) => {
            if n.as_f64() == Some(0.0) {
                Ok(0)
            } else {
                Err(format!(
                    "don't know what '{n}' means as it has no time unit, did you mean '{n}s'?"
                ))
            }
        }
        JsonValue::String(s) if s.contains(':') => parse_colon(s),
        JsonValue::String(s) => parse_with_unit(s),
        JsonValue::Object(map) => {
            let mut total = 0u128;
            for (key, value) in map {
                let unit = match key.as_str() {
                    "days" => DAY,
                    "hours" => HOUR,
                    "minutes" => MIN,
                    "seconds" => SEC,
                    "milliseconds" => MS,
                    "microseconds" => US,
                    other => return Err(format!("unknown time period key '{other}'")),
                };
                let text = match value {
                    JsonValue::Number(n) => n.to_string(),
                    JsonValue::String(s) => s.clone(),
                    _ => return Err(format!("'{key}' must be a number")),
                };
                total = add(total, scale_decimal(&text, unit)?)?;
            }
            Ok(total)
        }
        _ => Err("expected a time period".to_string()),
    }
}

fn parse_colon(s: &str) -> Result<u128, String> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    let field = |p: &str| -> Result<u128, String> {
        p.trim()
            .parse::<u128>()
            .map_err(|_| format!("invalid time period '{s}', expected HH:MM or HH:MM:SS"))
    };
    let (h, m, sec) = match parts.as_slice() {
        [h, m] => (*h, *m, "0"),
        [h, m, sec] => (*h, *m, *sec),
        _ => return Err(format!("invalid time period '{s}', expected HH:MM or HH:MM:SS")),
    };
    let total = add(mul(field(h)?, HOUR)?, mul(field(m)?, MIN)?)?;
    add(total, mul(field(sec)?, SEC)?)
}

fn parse_with_unit(s: &str) -> Result<u128, String> {
    let trimmed = s.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let unit = unit.trim();

    if number.is_empty() {
        return Err(format!("expected a time period, got '{s}'"));
    }
    if number.starts_with('-') {
        return Err("time period must not be negative".to_string());
    }

    let scale = match unit {
        "" => {
            return if scale_decimal(number, US)? == 0 {
                Ok(0)
            } else {
                Err(format!(
                    "don't know what '{number}' means as it has no time unit, did you mean '{number}s'?"
                ))
            };
        }
        "us" | "µs" | "microseconds" => US,
        "ms" | "milliseconds" => MS,
        "s" | "sec" | "seconds" => SEC,
        "min" | "minutes" => MIN,
        "h" | "hours" => HOUR,
        "d" | "days" => DAY,
        other => return Err(format!("unknown time unit '{other}'")),
    };
    scale_decimal(number, scale)
}

/// Multiply a non-negative decimal string by `unit` microseconds, exactly.
fn scale_decimal(text: &str, unit: u128) -> Result<u128, String> {
    let text = text.trim().trim_start_matches('+');
    if text.starts_with('-') {
        return Err("time period must not be negative".to_string());
    }
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text, ""));
    let invalid = || format!("invalid number '{text}'");

    let int: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| invalid())?
    };
    if !frac_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let mut total = mul(int, unit)?;
    if !frac_part.is_empty() {
        let frac: u128 = frac_part.parse().map_err(|_| invalid())?;
        let denom = 10u128
            .checked_pow(frac_part.len() as u32)
            .ok_or_else(invalid)?;
        let scaled = mul(frac, unit)?;
        if scaled % denom != 0 {
            return Err("maximum precision is microseconds".to_string());
        }
        total = add(total, scaled / denom)?;
    }
    Ok(total)
}

fn mul(a: u128, b: u128) -> Result<u128, String> {
    a.checked_mul(b).ok_or_else(too_large)
}

fn add(a: u128, b: u128) -> Result<u128, String> {
    a.checked_add(b).ok_or_else(too_large)
}

fn too_large() -> String {
    "time period too large".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ms(raw: JsonValue) -> Result<Duration, String> {
        DurationRule::milliseconds().coerce(&raw)
    }

    #[test]
    fn test_unit_suffixes() {
        assert_eq!(ms(json!("20ms")), Ok(Duration::from_millis(20)));
        assert_eq!(ms(json!("1.5s")), Ok(Duration::from_millis(1500)));
        assert_eq!(ms(json!("2 min")), Ok(Duration::from_secs(120)));
        assert_eq!(ms(json!("1h")), Ok(Duration::from_secs(3600)));
        assert_eq!(ms(json!("0")), Ok(Duration::ZERO));
        assert_eq!(ms(json!(0)), Ok(Duration::ZERO));
    }

    #[test]
    fn test_colon_and_mapping_forms() {
        assert_eq!(ms(json!("01:30")), Ok(Duration::from_secs(5400)));
        assert_eq!(ms(json!("00:00:05")), Ok(Duration::from_secs(5)));
        assert_eq!(
            ms(json!({"seconds": 1, "milliseconds": 500})),
            Ok(Duration::from_millis(1500))
        );
        assert!(ms(json!({"fortnights": 1})).is_err());
    }

    #[test]
    fn test_rejects_unitless_and_negative() {
        let err = ms(json!(20)).unwrap_err();
        assert!(err.contains("did you mean '20s'"), "{err}");
        assert!(ms(json!("15")).is_err());
        assert!(ms(json!("-5ms")).is_err());
        assert!(ms(json!("5 parsecs")).is_err());
    }

    #[test]
    fn test_precision_and_sign() {
        assert_eq!(
            ms(json!("1500us")),
            Err("maximum precision is milliseconds".to_string())
        );
        assert_eq!(ms(json!("2000us")), Ok(Duration::from_millis(2)));

        let positive = DurationRule::milliseconds().positive();
        assert!(positive.coerce(&json!("0s")).is_err());
        assert_eq!(positive.coerce(&json!("60s")), Ok(Duration::from_secs(60)));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let too_large = Err("time period too large".to_string());
        assert_eq!(ms(json!("99999999999999999999999999999999999:00")), too_large);
        assert_eq!(ms(json!("1.99999999999999999999999999999999999999s")), too_large);
        assert_eq!(
            ms(json!({"days": "3000000000000000000000000000", "hours": "90000000000000000000000000000"})),
            too_large
        );
        assert_eq!(ms(json!("400000000000000000000000000000000d")), too_large);
    }
}
