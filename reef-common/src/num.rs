//! # Decimal Helpers
//!
//! Strict byte-level decimal parsing and formatting. Command arguments arrive
//! as raw bulk strings, and Redis treats anything that is not a clean decimal
//! integer as an error, so these parsers reject empty input, stray bytes, and
//! overflow instead of saturating.

/// Parses an unsigned decimal integer. Returns `None` on empty input,
/// non-digit bytes, or overflow.
pub fn parse_u64(data: &[u8]) -> Option<u64> {
    if data.is_empty() {
        return None;
    }
    let mut value: u64 = 0;
    for &b in data {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value
            .checked_mul(10)?
            .checked_add(u64::from(b - b'0'))?;
    }
    Some(value)
}

/// Parses a signed decimal integer with an optional leading `-`.
pub fn parse_i64(data: &[u8]) -> Option<i64> {
    let (negative, digits) = match data.split_first() {
        Some((&b'-', rest)) => (true, rest),
        _ => (false, data),
    };
    if digits.is_empty() {
        return None;
    }
    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return None;
        }
        let digit = i64::from(b - b'0');
        value = value.checked_mul(10)?;
        value = if negative {
            value.checked_sub(digit)?
        } else {
            value.checked_add(digit)?
        };
    }
    Some(value)
}

/// Formats an unsigned integer as decimal bytes, for score and count replies.
pub fn format_u64(value: u64) -> Vec<u8> {
    value.to_string().into_bytes()
}
