//! Native-asset amounts.
//!
//! Amounts travel as wei (`U256`) everywhere inside the engine and are only
//! turned into decimal strings at the edges: user input on the way in,
//! display on the way out.

use alloy_primitives::utils::{parse_units, ParseUnits};
use alloy_primitives::U256;

/// Decimals of the native asset on both chains.
pub const NATIVE_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    Empty,
    Negative(String),
    Zero,
    TooManyDecimals { input: String, max: u8 },
    Invalid { input: String, reason: String },
}

impl core::fmt::Display for AmountError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AmountError::Empty => write!(f, "Amount is empty"),
            AmountError::Negative(input) => write!(f, "Amount must be positive: {}", input),
            AmountError::Zero => write!(f, "Amount must be greater than zero"),
            AmountError::TooManyDecimals { input, max } => {
                write!(f, "Amount {} has more than {} decimals", input, max)
            }
            AmountError::Invalid { input, reason } => {
                write!(f, "Invalid amount '{}': {}", input, reason)
            }
        }
    }
}

impl std::error::Error for AmountError {}

/// Parse a strictly positive decimal ether amount ("1.5") into wei.
pub fn parse_ether_amount(input: &str) -> Result<U256, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }
    if trimmed.starts_with('-') {
        return Err(AmountError::Negative(trimmed.to_string()));
    }
    if let Some((_, fraction)) = trimmed.split_once('.') {
        if fraction.len() > NATIVE_DECIMALS as usize {
            return Err(AmountError::TooManyDecimals {
                input: trimmed.to_string(),
                max: NATIVE_DECIMALS,
            });
        }
    }

    let wei = match parse_units(trimmed, NATIVE_DECIMALS) {
        Ok(ParseUnits::U256(value)) => value,
        Ok(ParseUnits::I256(_)) => return Err(AmountError::Negative(trimmed.to_string())),
        Err(e) => {
            return Err(AmountError::Invalid {
                input: trimmed.to_string(),
                reason: e.to_string(),
            })
        }
    };

    if wei.is_zero() {
        return Err(AmountError::Zero);
    }
    Ok(wei)
}

/// Render wei as ether rounded half-up to `places` fractional digits.
pub fn format_ether_fixed(wei: U256, places: u8) -> String {
    let places = places.min(NATIVE_DECIMALS);
    let ten = U256::from(10u64);
    let step = ten.pow(U256::from(NATIVE_DECIMALS - places));
    let scale = ten.pow(U256::from(places));

    let rounded = wei.saturating_add(step / U256::from(2u64)) / step;
    let whole = rounded / scale;
    if places == 0 {
        return whole.to_string();
    }
    let fraction = (rounded % scale).to_string();
    format!("{}.{:0>width$}", whole, fraction, width = places as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(s: &str) -> U256 {
        U256::from_str_radix(s, 10).unwrap()
    }

    #[test]
    fn test_parse_fractional_amount() {
        assert_eq!(parse_ether_amount("1.5").unwrap(), wei("1500000000000000000"));
        assert_eq!(parse_ether_amount("0.1").unwrap(), wei("100000000000000000"));
        assert_eq!(parse_ether_amount(" 2 ").unwrap(), wei("2000000000000000000"));
        assert_eq!(parse_ether_amount("0.000000000000000001").unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_parse_rejects_non_positive() {
        assert_eq!(parse_ether_amount("0"), Err(AmountError::Zero));
        assert_eq!(parse_ether_amount("0.000"), Err(AmountError::Zero));
        assert!(matches!(parse_ether_amount("-1"), Err(AmountError::Negative(_))));
        assert_eq!(parse_ether_amount(""), Err(AmountError::Empty));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_ether_amount("abc"), Err(AmountError::Invalid { .. })));
        assert!(matches!(
            parse_ether_amount("1.0000000000000000001"),
            Err(AmountError::TooManyDecimals { .. })
        ));
    }

    #[test]
    fn test_format_rounds_to_places() {
        assert_eq!(format_ether_fixed(wei("1500000000000000000"), 4), "1.5000");
        assert_eq!(format_ether_fixed(wei("123456789000000000"), 4), "0.1235");
        assert_eq!(format_ether_fixed(wei("999990000000000000"), 4), "1.0000");
        assert_eq!(format_ether_fixed(U256::ZERO, 4), "0.0000");
        assert_eq!(format_ether_fixed(wei("2400000000000000000"), 0), "2");
    }
}
