//! Monetary arithmetic helpers.
//!
//! All invoice math runs on [`Decimal`] and is rounded to 2 decimal places
//! at every arithmetic boundary, not just at display time, so repeated
//! add/subtract/multiply steps cannot accumulate drift. Comparisons go
//! through the tolerant helpers below: rounding can leave residues under one
//! cent, and two amounts closer than that are the same amount.

use rust_decimal::prelude::*;

/// Monetary values carry 2 decimal places.
pub const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01).
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Round to 2 decimal places, half away from zero.
#[inline]
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Compare two monetary values for equality within [`MONEY_TOLERANCE`].
pub fn money_eq(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < MONEY_TOLERANCE
}

/// `a >= b` with [`MONEY_TOLERANCE`] slack on the low side.
pub fn money_ge(a: Decimal, b: Decimal) -> bool {
    a >= b - MONEY_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn round2_half_rounds_away_from_zero() {
        assert_eq!(round2(dec("25.005")), dec("25.01"));
        assert_eq!(round2(dec("-25.005")), dec("-25.01"));
        assert_eq!(round2(dec("12.501")), dec("12.50"));
        assert_eq!(round2(dec("9.0008")), dec("9.00"));
    }

    #[test]
    fn round2_leaves_two_place_values_alone() {
        assert_eq!(round2(dec("100.00")), dec("100.00"));
        assert_eq!(round2(dec("0")), dec("0"));
    }

    #[test]
    fn money_eq_tolerates_sub_cent_residue() {
        assert!(money_eq(dec("10.00"), dec("10.009")));
        assert!(money_eq(dec("10.009"), dec("10.00")));
        assert!(!money_eq(dec("10.00"), dec("10.01")));
    }

    #[test]
    fn money_ge_allows_sub_cent_shortfall() {
        assert!(money_ge(dec("99.995"), dec("100.00")));
        assert!(!money_ge(dec("99.98"), dec("100.00")));
    }
}
