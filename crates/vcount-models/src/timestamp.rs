//! Video-relative timestamp parsing.
//!
//! The backend reports reading times as `MM:SS` or `HH:MM:SS`, optionally
//! with fractional seconds. Views sort on the parsed value.

use thiserror::Error;

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Timestamp cannot be negative")]
    Negative,

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid timestamp format '{0}'. Use HH:MM:SS, MM:SS or SS")]
    InvalidFormat(String),
}

/// Parse a timestamp string to total seconds.
///
/// # Examples
/// ```
/// use vcount_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30:00").unwrap(), 5400.0);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
/// assert_eq!(parse_timestamp("90").unwrap(), 90.0);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    let names: &[&'static str] = match parts.len() {
        1 => &["seconds"],
        2 => &["minutes", "seconds"],
        3 => &["hours", "minutes", "seconds"],
        _ => return Err(TimestampError::InvalidFormat(ts.to_string())),
    };

    let mut total = 0.0;
    for (part, name) in parts.iter().zip(names) {
        let value: f64 = part
            .parse()
            .map_err(|_| TimestampError::InvalidValue(name, part.to_string()))?;
        if value < 0.0 {
            return Err(TimestampError::Negative);
        }
        total = total * 60.0 + value;
    }
    Ok(total)
}

/// Seconds for sorting; unparseable timestamps sort first.
pub fn sort_seconds(ts: &str) -> f64 {
    parse_timestamp(ts).unwrap_or(f64::NEG_INFINITY)
}

/// Format seconds as `HH:MM:SS`, dropping sub-second precision.
pub fn format_seconds(total_secs: f64) -> String {
    let total = total_secs.max(0.0).floor() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
