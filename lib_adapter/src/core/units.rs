//! # Base-Unit Formatting
//!
//! Upstream balances arrive as integer base-unit (wei) amounts. Display
//! values divide by 10^18 and render a fixed number of fractional digits.
//! Everything stays in arbitrary-precision integers until the final string;
//! floating point would silently lose precision on large balances.

use num_bigint::BigUint;

/// Decimals of the base unit: 1 ether = 10^18 wei.
pub const WEI_DECIMALS: u32 = 18;

/// Fractional digits rendered by default.
pub const DEFAULT_DISPLAY_DIGITS: u32 = 2;

/// Renders a wei amount as a fixed-point decimal string with `digits`
/// fractional digits, rounding half up.
pub fn format_wei(amount: &BigUint, digits: u32) -> String {
    let denom = BigUint::from(10u32).pow(WEI_DECIMALS);
    let scale = BigUint::from(10u32).pow(digits);

    // Round at the requested precision: (amount * 10^digits / 10^18), half up.
    let scaled = amount * &scale;
    let mut rounded = &scaled / &denom;
    if (&scaled % &denom) * 2u32 >= denom {
        rounded += 1u32;
    }

    if digits == 0 {
        return rounded.to_string();
    }

    let int_part = (&rounded / &scale).to_string();
    let frac_part = (&rounded % &scale).to_string();
    let padding = digits as usize - frac_part.len();
    format!("{}.{}{}", int_part, "0".repeat(padding), frac_part)
}

/// [`format_wei`] with the default two fractional digits.
pub fn format_amount(amount: &BigUint) -> String {
    format_wei(amount, DEFAULT_DISPLAY_DIGITS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(v: u128) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn formats_the_known_fixture_balances() {
        // 0xcad022c33a96152a and 0x0ad8655682813b7b from the provider fixtures.
        let first = wei(14_614_219_012_714_140_970);
        let second = wei(781_485_957_579_881_339);
        assert_eq!(format_amount(&first), "14.61");
        assert_eq!(format_amount(&second), "0.78");
        // The sum lands at 15.3957..., which rounds up to 15.40.
        assert_eq!(format_amount(&(first + second)), "15.40");
    }

    #[test]
    fn pads_fractional_zeros() {
        assert_eq!(format_amount(&wei(1_000_000_000_000_000_000)), "1.00");
        assert_eq!(format_amount(&wei(1_004_000_000_000_000_000)), "1.00");
        assert_eq!(format_amount(&wei(1_005_000_000_000_000_000)), "1.01");
        assert_eq!(format_amount(&wei(0)), "0.00");
    }

    #[test]
    fn handles_amounts_beyond_u64() {
        // 340 282 366 920 938 463 463.37 ether, comfortably past u64 wei.
        let huge = wei(u128::MAX);
        assert_eq!(format_amount(&huge), "340282366920938463463.37");
    }

    #[test]
    fn respects_the_digit_parameter() {
        let amount = wei(1_234_567_890_000_000_000);
        assert_eq!(format_wei(&amount, 0), "1");
        assert_eq!(format_wei(&amount, 4), "1.2346");
        assert_eq!(format_wei(&amount, 18), "1.234567890000000000");
    }
}
