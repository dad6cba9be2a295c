//! Profit split arithmetic.

use serde::{Deserialize, Serialize};

/// Result of splitting a captured amount against the auction start price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Captured amount over the start price; floors at zero.
    pub profit:       u64,
    /// Platform share of the profit.
    pub platform_fee: u64,
    /// Owner share of the profit.
    pub payout:       u64,
}

/// Splits a captured amount into profit, platform fee, and owner payout.
///
/// Deterministic in its inputs; no I/O, no side effects.
#[must_use]
pub fn split(captured_amount: u64, start_price: u64, fee_rate_bps: u16) -> Settlement {
    let profit = captured_amount.saturating_sub(start_price);
    let platform_fee = profit.saturating_mul(u64::from(fee_rate_bps)) / 10_000;
    let payout = profit.saturating_sub(platform_fee);
    Settlement { profit, platform_fee, payout }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUARTER: u16 = 2_500;

    #[test]
    fn test_split_above_start_price() {
        let s = split(1_500, 1_000, QUARTER);
        assert_eq!(s, Settlement { profit: 500, platform_fee: 125, payout: 375 });
    }

    #[test]
    fn test_profit_floors_at_zero() {
        let s = split(900, 1_000, QUARTER);
        assert_eq!(s, Settlement { profit: 0, platform_fee: 0, payout: 0 });
    }

    #[test]
    fn test_capture_at_start_price_yields_no_profit() {
        let s = split(1_000, 1_000, QUARTER);
        assert_eq!(s, Settlement { profit: 0, platform_fee: 0, payout: 0 });
    }

    #[test]
    fn test_fee_rounds_down() {
        // 25% of 3 is 0.75, platform keeps 0 and the owner keeps all 3.
        let s = split(1_003, 1_000, QUARTER);
        assert_eq!(s, Settlement { profit: 3, platform_fee: 0, payout: 3 });
    }
}
