//! Configuration types for the auction settlement engine.

use serde::{Deserialize, Serialize};

/// One tier of the minimum-increment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidStep {
    /// Upper price bound (exclusive) this step applies below. `None` marks
    /// the open-ended top tier.
    pub below: Option<u64>,
    /// Increment added to the current price (AED).
    pub step:  u64,
}

/// Engine configuration injected by the surrounding platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionConfig {
    /// Platform fee rate, in basis points of profit.
    pub fee_rate_bps:         u16,
    /// Minimum total a payout request must reach (AED).
    pub min_payout_amount:    u64,
    /// Trailing window before `end_time` that triggers an extension (seconds).
    pub snipe_window_secs:    i64,
    /// Extension applied when a bid lands inside the window (seconds).
    pub snipe_extension_secs: i64,
    /// Maximum number of anti-sniping extensions per auction. `None` leaves
    /// the extension count unbounded.
    pub max_extensions:       Option<u32>,
    /// Tiered minimum-increment table, ordered by ascending bound.
    pub bid_steps:            Vec<BidStep>,
}

impl AuctionConfig {
    /// Increment required over the given current price.
    pub fn bid_step_for(&self, current_price: u64) -> u64 {
        self.bid_steps
            .iter()
            .find(|tier| tier.below.map_or(true, |bound| current_price < bound))
            .map(|tier| tier.step)
            .unwrap_or(1)
    }
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            fee_rate_bps:         2_500,
            min_payout_amount:    50,
            snipe_window_secs:    60,
            snipe_extension_secs: 60,
            max_extensions:       Some(20),
            bid_steps:            vec![
                BidStep { below: Some(1_000), step: 5 },
                BidStep { below: Some(2_500), step: 10 },
                BidStep { below: Some(5_000), step: 25 },
                BidStep { below: Some(10_000), step: 50 },
                BidStep { below: None, step: 100 },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_tiers() {
        let config = AuctionConfig::default();
        assert_eq!(config.bid_step_for(0), 5);
        assert_eq!(config.bid_step_for(999), 5);
        assert_eq!(config.bid_step_for(1_000), 10);
        assert_eq!(config.bid_step_for(2_499), 10);
        assert_eq!(config.bid_step_for(2_500), 25);
        assert_eq!(config.bid_step_for(5_000), 50);
        assert_eq!(config.bid_step_for(10_000), 100);
        assert_eq!(config.bid_step_for(1_000_000), 100);
    }

    #[test]
    fn test_empty_table_falls_back_to_unit_step() {
        let config = AuctionConfig { bid_steps: Vec::new(), ..AuctionConfig::default() };
        assert_eq!(config.bid_step_for(500), 1);
    }
}
