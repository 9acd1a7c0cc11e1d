//! Human-readable byte sizes (`5MB`, `1.5 GB`) in binary multiples.

use thiserror::Error;

const UNITS: [(&str, u64); 4] = [
    ("B", 1),
    ("KB", 1024),
    ("MB", 1024 * 1024),
    ("GB", 1024 * 1024 * 1024),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SizeError {
    /// Not of the form `<number>[.<number>] <unit>` with unit B/KB/MB/GB.
    #[error("invalid size: {0:?} (expected e.g. 5MB, 512 KB, 1.5GB)")]
    InvalidFormat(String),
}

/// Parses a size such as `5MB`, `512 kb` or `1.5 GB` into bytes (1 KB = 1024 B).
///
/// Fractional results are truncated toward zero.
pub fn parse_size(s: &str) -> Result<u64, SizeError> {
    let invalid = || SizeError::InvalidFormat(s.to_string());

    let int_end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    if int_end == 0 {
        return Err(invalid());
    }
    let mut number_end = int_end;
    let rest = &s[int_end..];
    if let Some(frac) = rest.strip_prefix('.') {
        let frac_len = frac
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(frac.len());
        if frac_len == 0 {
            return Err(invalid());
        }
        number_end += 1 + frac_len;
    }

    let value: f64 = s[..number_end].parse().map_err(|_| invalid())?;
    let unit = s[number_end..].trim_start();
    let multiplier = UNITS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(unit))
        .map(|(_, m)| *m)
        .ok_or_else(invalid)?;

    Ok((value * multiplier as f64) as u64)
}

/// Formats bytes with one fractional digit, e.g. `5242880` → `"5.0 MB"`. Stops at GB.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit].0)
}
