use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

/// Accuracy readings are percentages; anything outside `[0, 100]` or not a
/// number is discarded.
pub fn valid_accuracy(value: f64) -> Option<f64> {
    (value.is_finite() && (0.0..=100.0).contains(&value)).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_outside_percentage_range_is_dropped() {
        assert_eq!(valid_accuracy(87.5), Some(87.5));
        assert_eq!(valid_accuracy(0.0), Some(0.0));
        assert_eq!(valid_accuracy(100.5), None);
        assert_eq!(valid_accuracy(-1.0), None);
        assert_eq!(valid_accuracy(f64::NAN), None);
    }

    #[test]
    fn negative_counters_are_rejected() {
        assert_eq!(to_u64(4, "attempts").unwrap(), 4);
        assert!(to_u64(-1, "attempts").is_err());
    }
}
