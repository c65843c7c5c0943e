//! Monetary rounding and comparison helpers.
//!
//! Amounts are exact decimals, never floats. Money carries two decimal
//! places; status comparisons tolerate one cent of rounding drift, capacity
//! and balance invariants do not.

use rust_decimal::{Decimal, RoundingStrategy};

/// Money is kept at two decimal places.
pub const DECIMAL_PLACES: u32 = 2;

/// One cent: the tolerance used when deciding whether a total is settled.
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Round an amount to money precision, midpoint away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// True when `paid` settles `total` within [`MONEY_TOLERANCE`].
pub fn covers(paid: Decimal, total: Decimal) -> bool {
    paid + MONEY_TOLERANCE >= total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn rounds_midpoint_away_from_zero() {
        assert_eq!(round_money(dec("2.345")), dec("2.35"));
        assert_eq!(round_money(dec("2.344")), dec("2.34"));
        assert_eq!(round_money(dec("-2.345")), dec("-2.35"));
    }

    #[test]
    fn covers_allows_one_cent_of_drift() {
        assert!(covers(dec("100.00"), dec("100.00")));
        assert!(covers(dec("99.99"), dec("100.00")));
        assert!(!covers(dec("99.98"), dec("100.00")));
    }
}
