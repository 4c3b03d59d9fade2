//! Conversion between human-readable decimal strings and fixed-point amounts.

use crate::types::{Amount, U256, USDC_DECIMALS};
use alloy::primitives::utils::{format_units, parse_units};

/// Errors produced while converting amounts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitsError {
    #[error("amount is empty")]
    Empty,

    #[error("amount must not be negative: {0}")]
    Negative(String),

    #[error("amount {text} has more than {decimals} fractional digits")]
    TooPrecise { text: String, decimals: u8 },

    #[error("invalid amount {0:?}")]
    Invalid(String),

    #[error("amount {0} overflows when buffered")]
    Overflow(Amount),
}

/// Parse a decimal string such as `"1.5"` into the smallest unit of a token
/// with `decimals` decimals.
pub fn parse_amount(text: &str, decimals: u8) -> Result<Amount, UnitsError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(UnitsError::Empty);
    }
    if text.starts_with('-') {
        return Err(UnitsError::Negative(text.to_string()));
    }
    if let Some((_, fraction)) = text.split_once('.') {
        if fraction.len() > decimals as usize {
            return Err(UnitsError::TooPrecise {
                text: text.to_string(),
                decimals,
            });
        }
    }

    parse_units(text, decimals)
        .map(|parsed| parsed.get_absolute())
        .map_err(|_| UnitsError::Invalid(text.to_string()))
}

/// Format a fixed-point amount as a decimal string, trimming trailing zeros.
pub fn format_amount(amount: Amount, decimals: u8) -> String {
    let formatted = format_units(amount, decimals).unwrap_or_else(|_| amount.to_string());
    if !formatted.contains('.') {
        return formatted;
    }
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

/// Lossy conversion to `f64` for USD valuation and display.
pub fn amount_as_f64(amount: Amount, decimals: u8) -> f64 {
    format_units(amount, decimals)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Parse user input as a float, returning `None` for empty or malformed text.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// True when the input parses as a number strictly greater than zero.
pub fn is_positive_amount(text: &str) -> bool {
    parse_decimal(text).is_some_and(|v| v > 0.0)
}

/// Inflate `value` by `percent`: `value * (100 + percent) / 100`, truncating.
pub fn apply_buffer(value: Amount, percent: u32) -> Result<Amount, UnitsError> {
    value
        .checked_mul(U256::from(100u64 + percent as u64))
        .map(|scaled| scaled / U256::from(100u64))
        .ok_or(UnitsError::Overflow(value))
}

/// Deflate `value` by `percent`: `value * (100 - percent) / 100`, truncating.
/// Percentages of 100 or more yield zero.
pub fn apply_discount(value: Amount, percent: u32) -> Amount {
    let keep = U256::from(100u64.saturating_sub(percent as u64));
    let hundred = U256::from(100u64);
    // Split as 100q + r so the product never exceeds `value`.
    (value / hundred) * keep + (value % hundred) * keep / hundred
}

/// Parse a USDC amount. Malformed or negative input yields zero.
pub fn parse_usdc(text: &str) -> Amount {
    match parse_decimal(text) {
        Some(v) if v >= 0.0 => {
            // Truncate to six decimals before the fixed-point conversion.
            let scaled = (v * 10f64.powi(USDC_DECIMALS as i32)).floor();
            U256::from(scaled as u128)
        }
        _ => U256::ZERO,
    }
}

/// Format a USDC amount for display: six digits below one cent, two otherwise.
pub fn format_usdc(amount: Amount) -> String {
    let value = amount_as_f64(amount, USDC_DECIMALS);
    if value < 0.01 {
        format!("{value:.6}")
    } else {
        format!("{value:.2}")
    }
}
