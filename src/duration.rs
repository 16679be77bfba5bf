//! Extended duration strings.
//!
//! Grammar: one or more `<number><unit>` segments, e.g. `10m`, `1.5h`,
//! `1d12h`, `2w`. The number is a non-negative decimal literal and the
//! unit is one of `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`, `d`, `w`. A bare
//! `0` is accepted as the zero duration.

use std::time::Duration;

const NANOS_PER_SECOND: u128 = 1_000_000_000;
const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;
const SECONDS_PER_WEEK: u64 = 7 * SECONDS_PER_DAY;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationParseError {
    #[error("duration string is empty")]
    Empty,

    #[error("expected a number at position {position} in '{input}'")]
    MissingNumber { input: String, position: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("missing unit after '{number}' in '{input}'")]
    MissingUnit { input: String, number: String },

    #[error("unknown unit '{0}' (expected one of ns, us, ms, s, m, h, d, w)")]
    UnknownUnit(String),

    #[error("duration '{0}' is too large")]
    Overflow(String),
}

/// Size of one unit in nanoseconds.
fn unit_nanos(unit: &str) -> Option<u128> {
    let nanos = match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => NANOS_PER_SECOND,
        "m" => u128::from(SECONDS_PER_MINUTE) * NANOS_PER_SECOND,
        "h" => u128::from(SECONDS_PER_HOUR) * NANOS_PER_SECOND,
        "d" => u128::from(SECONDS_PER_DAY) * NANOS_PER_SECOND,
        "w" => u128::from(SECONDS_PER_WEEK) * NANOS_PER_SECOND,
        _ => return None,
    };
    Some(nanos)
}

/// Parse an extended duration string into a typed [`Duration`].
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let chars: Vec<(usize, char)> = s.char_indices().collect();
    let mut total_nanos: u128 = 0;
    let mut i = 0;

    while i < chars.len() {
        let number_start = i;
        while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
            i += 1;
        }
        if i == number_start {
            return Err(DurationParseError::MissingNumber {
                input: s.to_string(),
                position: chars[number_start].0,
            });
        }

        let unit_start = i;
        while i < chars.len() && !(chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
            i += 1;
        }

        let byte_at = |idx: usize| chars.get(idx).map(|(b, _)| *b).unwrap_or(s.len());
        let number = &s[byte_at(number_start)..byte_at(unit_start)];
        let unit = &s[byte_at(unit_start)..byte_at(i)];

        if unit.is_empty() {
            return Err(DurationParseError::MissingUnit {
                input: s.to_string(),
                number: number.to_string(),
            });
        }

        let per_unit =
            unit_nanos(unit).ok_or_else(|| DurationParseError::UnknownUnit(unit.to_string()))?;
        let segment = segment_nanos(number, per_unit, s)?;

        total_nanos = total_nanos
            .checked_add(segment)
            .ok_or_else(|| DurationParseError::Overflow(s.to_string()))?;
    }

    let secs = u64::try_from(total_nanos / NANOS_PER_SECOND)
        .map_err(|_| DurationParseError::Overflow(s.to_string()))?;
    // Remainder of a division by 1e9 always fits in u32.
    let nanos = (total_nanos % NANOS_PER_SECOND) as u32;
    Ok(Duration::new(secs, nanos))
}

/// Nanoseconds for one `<number><unit>` segment.
fn segment_nanos(number: &str, per_unit: u128, input: &str) -> Result<u128, DurationParseError> {
    let invalid = || DurationParseError::InvalidNumber(number.to_string());

    let (whole, fraction) = match number.split_once('.') {
        Some((w, f)) => (w, f),
        None => (number, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if fraction.contains('.') {
        return Err(invalid());
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };

    let mut nanos = whole
        .checked_mul(per_unit)
        .ok_or_else(|| DurationParseError::Overflow(input.to_string()))?;

    if !fraction.is_empty() {
        // Scale the fractional digits exactly; anything past nanosecond
        // precision is truncated.
        let mut scale: u128 = 1;
        let mut digits: u128 = 0;
        for c in fraction.chars().take(18) {
            let d = c.to_digit(10).ok_or_else(invalid)?;
            digits = digits * 10 + u128::from(d);
            scale *= 10;
        }
        nanos = nanos
            .checked_add(digits * per_unit / scale)
            .ok_or_else(|| DurationParseError::Overflow(input.to_string()))?;
    }

    Ok(nanos)
}

/// Render a duration in the same grammar, largest units first.
///
/// `90 minutes` becomes `1h30m`, `8 days` becomes `1w1d`. Sub-second
/// remainders are only shown when the duration is shorter than a second.
pub fn format_duration(duration: &Duration) -> String {
    let mut secs = duration.as_secs();
    if secs == 0 {
        let nanos = duration.subsec_nanos();
        return match nanos {
            0 => "0s".to_string(),
            n if n % 1_000_000 == 0 => format!("{}ms", n / 1_000_000),
            n => format!("{n}ns"),
        };
    }

    let mut out = String::new();
    for (unit, size) in [
        ("w", SECONDS_PER_WEEK),
        ("d", SECONDS_PER_DAY),
        ("h", SECONDS_PER_HOUR),
        ("m", SECONDS_PER_MINUTE),
        ("s", 1),
    ] {
        let count = secs / size;
        if count > 0 {
            out.push_str(&format!("{count}{unit}"));
            secs %= size;
        }
    }
    out
}

/// Serde adapter storing a [`Duration`] as an extended duration string.
pub mod as_string {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
