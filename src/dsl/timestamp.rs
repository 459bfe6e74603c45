//! Timestamp literals: `SS[.fff]`, `MM:SS[.fff]` or `HH:MM:SS[.fff]` to milliseconds and back.

use thiserror::Error;

/// Signed milliseconds. Literals are never negative, but arithmetic can be.
pub type Millis = i64;

pub const MILLIS_PER_SEC: Millis = 1000;
pub const MILLIS_PER_MIN: Millis = 60 * MILLIS_PER_SEC;
pub const MILLIS_PER_HOUR: Millis = 60 * MILLIS_PER_MIN;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("expected 1 to 3 components separated by `:`, but got {0}")]
    ComponentCount(usize),
    #[error("`{0}` is not a valid timestamp component")]
    InvalidComponent(String),
    #[error("timestamp is too large")]
    Overflow,
}

/// Parse a timestamp literal into milliseconds.
///
/// Components are read right-to-left as seconds, minutes, hours. Only the
/// seconds component may carry a fractional part, which is rounded to the
/// nearest millisecond.
pub fn parse_timestamp(text: &str) -> Result<Millis, TimestampError> {
    let comps: Vec<&str> = text.split(':').collect();
    if comps.is_empty() || comps.len() > 3 {
        return Err(TimestampError::ComponentCount(comps.len()));
    }

    let (last, rest) = comps.split_last().ok_or(TimestampError::ComponentCount(0))?;
    let mut millis = parse_seconds(last)?;

    let units = [MILLIS_PER_MIN, MILLIS_PER_HOUR];
    for (comp, unit) in rest.iter().rev().zip(units) {
        let value = parse_integer(comp)?;
        millis = value
            .checked_mul(unit)
            .and_then(|v| v.checked_add(millis))
            .ok_or(TimestampError::Overflow)?;
    }

    Ok(millis)
}

fn parse_integer(comp: &str) -> Result<Millis, TimestampError> {
    if comp.is_empty() || !comp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimestampError::InvalidComponent(comp.to_string()));
    }
    comp.parse::<Millis>().map_err(|_| TimestampError::Overflow)
}

fn parse_seconds(comp: &str) -> Result<Millis, TimestampError> {
    let (whole, frac) = match comp.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (comp, None),
    };

    let secs = parse_integer(whole).map_err(|e| match e {
        TimestampError::InvalidComponent(_) => TimestampError::InvalidComponent(comp.to_string()),
        other => other,
    })?;
    let mut millis = secs
        .checked_mul(MILLIS_PER_SEC)
        .ok_or(TimestampError::Overflow)?;

    if let Some(frac) = frac {
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TimestampError::InvalidComponent(comp.to_string()));
        }
        let digits: Vec<Millis> = frac.bytes().map(|b| (b - b'0') as Millis).collect();
        let mut frac_millis = 0;
        for i in 0..3 {
            frac_millis = frac_millis * 10 + digits.get(i).copied().unwrap_or(0);
        }
        if digits.get(3).is_some_and(|&d| d >= 5) {
            frac_millis += 1;
        }
        millis = millis
            .checked_add(frac_millis)
            .ok_or(TimestampError::Overflow)?;
    }

    Ok(millis)
}

/// Format milliseconds as `HH:MM:SS.mmm`, with a leading `-` for negative values.
pub fn format_timestamp(millis: Millis) -> String {
    let sign = if millis < 0 { "-" } else { "" };
    let m = millis.unsigned_abs();
    let hh = m / MILLIS_PER_HOUR as u64;
    let mm = m / MILLIS_PER_MIN as u64 % 60;
    let ss = m / MILLIS_PER_SEC as u64 % 60;
    let ms = m % MILLIS_PER_SEC as u64;
    format!("{sign}{hh:02}:{mm:02}:{ss:02}.{ms:03}")
}

/// Format milliseconds as `HH:MM:SS` (floored), the form YouTube expects in chapter lists.
pub fn format_timestamp_secs(millis: Millis) -> String {
    let sign = if millis < 0 { "-" } else { "" };
    let secs = millis.unsigned_abs() / MILLIS_PER_SEC as u64;
    format!(
        "{sign}{:02}:{:02}:{:02}",
        secs / 3600,
        secs / 60 % 60,
        secs % 60
    )
}

/// Format milliseconds as fractional seconds for command-line tools, e.g. `12.345`.
pub fn millis_to_secs_arg(millis: Millis) -> String {
    let sign = if millis < 0 { "-" } else { "" };
    let m = millis.unsigned_abs();
    format!("{sign}{}.{:03}", m / 1000, m % 1000)
}
