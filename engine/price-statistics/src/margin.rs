//! Margin parameter parsing

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a caller-supplied margin, falling back to `fallback` when it is not a number.
///
/// Accepts the longest numeric prefix of the trimmed input, so `"0.45c"` is `0.45`
/// and `"1e-2"` is `0.01`. Anything without a numeric prefix yields `fallback`.
pub fn parse_margin(raw: Option<&str>, fallback: Decimal) -> Decimal {
    raw.and_then(numeric_prefix).and_then(parse_decimal).unwrap_or(fallback)
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let mut normalized = String::with_capacity(text.len() + 2);
    if negative {
        normalized.push('-');
    }
    if unsigned.starts_with('.') {
        normalized.push('0');
    }
    normalized.push_str(&unsigned.to_ascii_lowercase());

    let (mantissa, exponent) = match normalized.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().ok()?),
        None => (normalized.as_str(), 0),
    };
    if exponent.abs() > MAX_EXPONENT {
        return None;
    }

    let mut value = Decimal::from_str(mantissa.trim_end_matches('.')).ok()?;
    for _ in 0..exponent.abs() {
        value = if exponent > 0 {
            value.checked_mul(Decimal::TEN)?
        } else {
            value.checked_div(Decimal::TEN)?
        };
    }
    Some(value.normalize())
}

/// Decimal carries at most 28 fractional digits; larger exponents cannot be represented
const MAX_EXPONENT: i32 = 28;

/// Longest prefix of `raw` (after leading whitespace) shaped like `[+-]digits[.digits][e[+-]digits]`
fn numeric_prefix(raw: &str) -> Option<&str> {
    let text = raw.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        // a bare trailing dot belongs to the number only when digits preceded it
        if frac_end > frac_start || digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    Some(text[..end].trim_end_matches('.'))
}
