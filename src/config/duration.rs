//! ISO-8601 durations (`PT2S`, `PT0.25S`, `P1DT2H30M`).
//!
//! Configuration values use the same duration syntax as the settings the
//! breaker was first deployed with. Calendar units (years, months, weeks) are
//! rejected since they have no fixed length.

use std::time::Duration;
use thiserror::Error;

const NANOS_PER_SECOND: i128 = 1_000_000_000;
const NANOS_PER_MINUTE: i128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i128 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: i128 = 24 * NANOS_PER_HOUR;

/// A value that is not a supported ISO-8601 duration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid ISO-8601 duration '{input}': {reason}")]
pub struct DurationError {
    pub input: String,
    pub reason: &'static str,
}

impl DurationError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// Parse a signed ISO-8601 duration.
pub fn parse_iso8601(input: &str) -> Result<chrono::Duration, DurationError> {
    let trimmed = input.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let rest = rest
        .strip_prefix('P')
        .ok_or_else(|| DurationError::new(input, "must start with 'P'"))?;

    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => {
            if time.is_empty() {
                return Err(DurationError::new(input, "empty time section after 'T'"));
            }
            (date, Some(time))
        }
        None => (rest, None),
    };

    let mut total: i128 = 0;
    let mut components = 0;
    let mut number = String::new();

    for c in date_part.chars() {
        match c {
            '0'..='9' => number.push(c),
            'D' => {
                let nanos = scaled(input, parse_whole(input, &number)?, NANOS_PER_DAY)?;
                total = accumulate(input, total, nanos)?;
                number.clear();
                components += 1;
            }
            'Y' | 'M' | 'W' => {
                return Err(DurationError::new(input, "calendar units are not supported"))
            }
            _ => return Err(DurationError::new(input, "unexpected character")),
        }
    }
    if !number.is_empty() {
        return Err(DurationError::new(input, "number without unit"));
    }

    if let Some(time) = time_part {
        // H, M, S must appear in that order, each at most once
        let mut last_rank = 0;
        for c in time.chars() {
            let (rank, nanos) = match c {
                '0'..='9' | '.' => {
                    number.push(c);
                    continue;
                }
                'H' => (1, scaled(input, parse_whole(input, &number)?, NANOS_PER_HOUR)?),
                'M' => (2, scaled(input, parse_whole(input, &number)?, NANOS_PER_MINUTE)?),
                'S' => (3, parse_seconds(input, &number)?),
                _ => return Err(DurationError::new(input, "unexpected character")),
            };
            if rank <= last_rank {
                return Err(DurationError::new(input, "units out of order"));
            }
            last_rank = rank;
            total = accumulate(input, total, nanos)?;
            number.clear();
            components += 1;
        }
        if !number.is_empty() {
            return Err(DurationError::new(input, "number without unit"));
        }
    }

    if components == 0 {
        return Err(DurationError::new(input, "no duration components"));
    }

    let signed = if negative { -total } else { total };
    let nanos = i64::try_from(signed).map_err(|_| DurationError::new(input, "out of range"))?;
    Ok(chrono::Duration::nanoseconds(nanos))
}

/// Parse a duration that must be strictly positive.
pub fn parse_positive(input: &str) -> Result<Duration, DurationError> {
    let parsed = parse_iso8601(input)?;
    match parsed.to_std() {
        Ok(d) if !d.is_zero() => Ok(d),
        _ => Err(DurationError::new(input, "must be positive")),
    }
}

/// Format a duration as ISO-8601, e.g. `PT1M30S` or `PT0.25S`.
pub fn format_iso8601(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let nanos = duration.subsec_nanos();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{}H", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if seconds > 0 || nanos > 0 || out.len() == 2 {
        out.push_str(&seconds.to_string());
        if nanos > 0 {
            let frac = format!("{:09}", nanos);
            out.push('.');
            out.push_str(frac.trim_end_matches('0'));
        }
        out.push('S');
    }
    out
}

fn parse_whole(input: &str, digits: &str) -> Result<i128, DurationError> {
    if digits.is_empty() || digits.contains('.') {
        return Err(DurationError::new(input, "fractions are only allowed on seconds"));
    }
    digits
        .parse::<i128>()
        .map_err(|_| DurationError::new(input, "invalid number"))
}

fn parse_seconds(input: &str, digits: &str) -> Result<i128, DurationError> {
    let (whole, frac) = match digits.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (digits, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(DurationError::new(input, "invalid number"));
    }
    if frac.len() > 9 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(DurationError::new(input, "invalid fractional seconds"));
    }

    let whole_nanos = if whole.is_empty() {
        0
    } else {
        scaled(input, parse_whole(input, whole)?, NANOS_PER_SECOND)?
    };
    let frac_nanos = if frac.is_empty() {
        0
    } else {
        format!("{:0<9}", frac)
            .parse::<i128>()
            .map_err(|_| DurationError::new(input, "invalid fractional seconds"))?
    };
    accumulate(input, whole_nanos, frac_nanos)
}

fn scaled(input: &str, value: i128, unit: i128) -> Result<i128, DurationError> {
    value
        .checked_mul(unit)
        .ok_or_else(|| DurationError::new(input, "out of range"))
}

fn accumulate(input: &str, total: i128, nanos: i128) -> Result<i128, DurationError> {
    total
        .checked_add(nanos)
        .ok_or_else(|| DurationError::new(input, "out of range"))
}

/// Serde adapter storing a `std::time::Duration` as an ISO-8601 string.
pub mod serde_iso8601 {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_iso8601(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let parsed = super::parse_iso8601(&raw).map_err(serde::de::Error::custom)?;
        parsed
            .to_std()
            .map_err(|_| serde::de::Error::custom(format!("negative duration '{}'", raw)))
    }
}
