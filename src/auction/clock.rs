//! Anti-sniping end-time extension.

use chrono::{DateTime, Duration, Utc};

use crate::{auction::Auction, types::AuctionConfig};

/// Decides, for each accepted bid, whether the auction's end time must be
/// pushed out.
#[derive(Debug, Clone)]
pub struct AntiSnipingClock {
    window:         Duration,
    extension:      Duration,
    max_extensions: Option<u32>,
}

impl AntiSnipingClock {
    pub fn from_config(config: &AuctionConfig) -> Self {
        Self {
            window:         Duration::seconds(config.snipe_window_secs),
            extension:      Duration::seconds(config.snipe_extension_secs),
            max_extensions: config.max_extensions,
        }
    }

    /// Returns the pushed-out end time when a bid accepted at `bid_at`
    /// lands with less than the trailing window remaining and the
    /// extension budget is not exhausted.
    #[must_use]
    pub fn extension_for(&self, auction: &Auction, bid_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if let Some(cap) = self.max_extensions {
            if auction.extension_count >= cap {
                return None;
            }
        }
        let remaining = auction.end_time - bid_at;
        if remaining < self.window {
            Some(auction.end_time + self.extension)
        } else {
            None
        }
    }
}
