use alloy::primitives::{
    U256,
    utils::{
        self,
        Unit,
    },
};
use thiserror::Error;

pub const ETHER_DECIMALS: usize = 18;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is required")]
    Empty,
    #[error("'{0}' is not a decimal number")]
    Malformed(String),
    #[error("at most {ETHER_DECIMALS} decimal places are supported")]
    TooManyDecimals,
    #[error("value does not fit into uint256")]
    Overflow,
    #[error("value must be greater than zero")]
    Zero,
}

/// Parses a decimal ether string such as `"1.25"` into wei.
///
/// `utils::parse_ether` accepts signs and silently truncates excess decimals,
/// so both are refused here first.
pub fn parse_ether(input: &str) -> Result<U256, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction)
    {
        return Err(AmountError::Malformed(trimmed.to_string()));
    }
    if fraction.len() > ETHER_DECIMALS {
        return Err(AmountError::TooManyDecimals);
    }
    utils::parse_ether(trimmed).map_err(|_| AmountError::Overflow)
}

/// Same as [`parse_ether`] but rejects zero.
pub fn parse_positive_ether(input: &str) -> Result<U256, AmountError> {
    let wei = parse_ether(input)?;
    if wei.is_zero() {
        return Err(AmountError::Zero);
    }
    Ok(wei)
}

pub fn parse_packet_count(input: &str) -> Result<U256, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AmountError::Malformed(trimmed.to_string()));
    }
    let count = U256::from_str_radix(trimmed, 10).map_err(|_| AmountError::Overflow)?;
    if count.is_zero() {
        return Err(AmountError::Zero);
    }
    Ok(count)
}

/// Formats wei as ether with trailing zeros removed, e.g. `1500000000000000000`
/// becomes `"1.5"`.
pub fn format_ether(wei: U256) -> String {
    let full = utils::format_ether(wei);
    full.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Formats wei as ether rounded half-up to a fixed number of decimal places.
pub fn format_ether_fixed(wei: U256, places: usize) -> String {
    let places = places.min(ETHER_DECIMALS);
    let dropped = (ETHER_DECIMALS - places) as u8;
    let half = Unit::new(dropped).map_or(U256::ZERO, |unit| unit.wei() / U256::from(2u64));
    let full = utils::format_ether(wei.saturating_add(half));
    let Some((whole, fraction)) = full.split_once('.') else {
        return full;
    };
    if places == 0 {
        return whole.to_string();
    }
    format!("{whole}.{}", &fraction[..places])
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_ether__converts_whole_and_fractional_parts() {
        assert_eq!(parse_ether("1").unwrap(), Unit::ETHER.wei());
        assert_eq!(
            parse_ether("1.5").unwrap(),
            U256::from(1_500_000_000_000_000_000u128)
        );
        assert_eq!(parse_ether(".25").unwrap(), U256::from(250_000_000_000_000_000u128));
        assert_eq!(parse_ether("2.").unwrap(), U256::from(2_000_000_000_000_000_000u128));
        assert_eq!(parse_ether("0.000000000000000001").unwrap(), U256::from(1u64));
    }

    #[test]
    fn parse_ether__rejects_bad_input() {
        assert_eq!(parse_ether(""), Err(AmountError::Empty));
        assert_eq!(parse_ether("   "), Err(AmountError::Empty));
        assert_eq!(parse_ether("."), Err(AmountError::Malformed(".".into())));
        assert_eq!(parse_ether("-1"), Err(AmountError::Malformed("-1".into())));
        assert_eq!(parse_ether("1e3"), Err(AmountError::Malformed("1e3".into())));
        assert_eq!(parse_ether("1.2.3"), Err(AmountError::Malformed("1.2.3".into())));
        assert_eq!(
            parse_ether("0.0000000000000000001"),
            Err(AmountError::TooManyDecimals)
        );
    }

    #[test]
    fn parse_ether__refuses_what_the_alloy_parser_would_truncate() {
        // given nineteen decimals, which alloy alone would cut to eighteen
        let input = "1.0000000000000000019";

        // then
        assert_eq!(parse_ether(input), Err(AmountError::TooManyDecimals));
        assert_eq!(
            utils::parse_ether(input).unwrap(),
            U256::from(1_000_000_000_000_000_001u128)
        );
    }

    #[test]
    fn parse_ether__reports_overflow() {
        let huge = "1".repeat(80);
        assert_eq!(parse_ether(&huge), Err(AmountError::Overflow));
    }

    #[test]
    fn parse_positive_ether__rejects_zero() {
        assert_eq!(parse_positive_ether("0.0"), Err(AmountError::Zero));
    }

    #[test]
    fn parse_packet_count__accepts_only_positive_integers() {
        assert_eq!(parse_packet_count("10").unwrap(), U256::from(10u64));
        assert_eq!(parse_packet_count(" 3 ").unwrap(), U256::from(3u64));
        assert_eq!(parse_packet_count("0"), Err(AmountError::Zero));
        assert_eq!(parse_packet_count(""), Err(AmountError::Empty));
        assert_eq!(parse_packet_count("1.5"), Err(AmountError::Malformed("1.5".into())));
        assert_eq!(parse_packet_count("-2"), Err(AmountError::Malformed("-2".into())));
    }

    #[test]
    fn format_ether__trims_trailing_zeros() {
        assert_eq!(format_ether(U256::ZERO), "0");
        assert_eq!(format_ether(Unit::ETHER.wei()), "1");
        assert_eq!(format_ether(U256::from(10u64) * Unit::ETHER.wei()), "10");
        assert_eq!(format_ether(U256::from(1_500_000_000_000_000_000u128)), "1.5");
        assert_eq!(format_ether(U256::from(1u64)), "0.000000000000000001");
    }

    #[test]
    fn format_ether_fixed__rounds_half_up() {
        assert_eq!(format_ether_fixed(U256::ZERO, 4), "0.0000");
        assert_eq!(
            format_ether_fixed(U256::from(1_234_550_000_000_000_000u128), 4),
            "1.2346"
        );
        assert_eq!(
            format_ether_fixed(U256::from(1_234_449_999_999_999_999u128), 4),
            "1.2344"
        );
        assert_eq!(
            format_ether_fixed(U256::from(9_999_990_000_000_000_000u128), 4),
            "10.0000"
        );
        assert_eq!(format_ether_fixed(U256::from(1_600_000_000_000_000_000u128), 0), "2");
        assert_eq!(format_ether_fixed(U256::from(1u64), 18), "0.000000000000000001");
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn parse_then_format__displays_the_entered_value(
            whole in 0u64..1_000_000_000,
            fraction in proptest::collection::vec(0u8..10, 0..=ETHER_DECIMALS),
        ) {
            let fraction: String = fraction.iter().map(|d| char::from(b'0' + d)).collect();
            let trimmed = fraction.trim_end_matches('0');
            let input = if fraction.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{fraction}")
            };
            let expected = if trimmed.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{trimmed}")
            };

            let wei = parse_ether(&input).unwrap();

            prop_assert_eq!(format_ether(wei), expected);
        }
    }
}
