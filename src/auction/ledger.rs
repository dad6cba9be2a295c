//! Bid ledger: validated, ordered record of bids for an auction.
//!
//! All price mutation goes through [`BidLedger::place_bid`], which resolves
//! concurrent placements with a compare-and-set on the auction's version.
//! Two simultaneous bids can never both be accepted below the true current
//! price: the loser's write comes back stale, the ledger re-reads, and the
//! re-validation usually turns the retry into `BidTooLow`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    auction::{clock::AntiSnipingClock, AuctionId, AuthorizationStatus, Bid, BidStatus, BidderInfo},
    errors::{AuctionError, AuctionResult},
    gateway::AuthorizationId,
    store::AuctionStore,
    types::AuctionConfig,
};

/// Bounded number of re-validation rounds before a placement reports a
/// conflict instead of retrying further.
const MAX_PLACE_ATTEMPTS: usize = 4;

/// Result of an accepted bid placement.
#[derive(Debug, Clone)]
pub struct BidReceipt {
    /// The recorded bid, now the auction's top bid.
    pub bid:           Bid,
    /// Whether the placement triggered an anti-sniping extension.
    pub time_extended: bool,
    /// Effective end time after any extension.
    pub end_time:      DateTime<Utc>,
    /// Auction price after the placement.
    pub current_price: u64,
}

/// One row of the auction leaderboard.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based rank.
    pub rank:        u32,
    /// Bidder display name.
    pub bidder_name: String,
    /// Bid amount (AED).
    pub amount:      u64,
    /// Placement timestamp.
    pub placed_at:   DateTime<Utc>,
}

/// Orders bids for capture and display: amount descending, earlier
/// placement wins ties.
pub fn rank_bids(bids: &mut [Bid]) {
    bids.sort_by(|a, b| b.amount.cmp(&a.amount).then(a.placed_at.cmp(&b.placed_at)));
}

/// Validated, ordered record of bids.
pub struct BidLedger {
    store:  Arc<dyn AuctionStore>,
    clock:  AntiSnipingClock,
    config: AuctionConfig,
}

impl BidLedger {
    pub fn new(store: Arc<dyn AuctionStore>, config: AuctionConfig) -> Self {
        let clock = AntiSnipingClock::from_config(&config);
        Self { store, clock, config }
    }

    /// Minimum acceptable next bid for an auction.
    pub fn minimum_next_bid(&self, auction_id: &AuctionId) -> AuctionResult<u64> {
        let auction = self
            .store
            .auction(auction_id)?
            .ok_or_else(|| AuctionError::AuctionNotFound(auction_id.to_string()))?;
        Ok(auction.minimum_next_bid(&self.config))
    }

    /// Places a bid backed by an already-opened authorization hold.
    ///
    /// Rejections carry no side effects; the caller owns releasing the
    /// hold of a rejected bid.
    pub fn place_bid(
        &self, auction_id: &AuctionId, bidder: BidderInfo, amount: u64,
        authorization_id: AuthorizationId, now: DateTime<Utc>,
    ) -> AuctionResult<BidReceipt> {
        for _ in 0..MAX_PLACE_ATTEMPTS {
            let auction = self
                .store
                .auction(auction_id)?
                .ok_or_else(|| AuctionError::AuctionNotFound(auction_id.to_string()))?;

            if !auction.status.accepts_bids() {
                return Err(AuctionError::AuctionNotActive);
            }
            if auction.has_expired(now) {
                return Err(AuctionError::AuctionExpired);
            }
            let minimum = auction.minimum_next_bid(&self.config);
            if amount < minimum {
                return Err(AuctionError::BidTooLow { minimum });
            }

            let extended_end = self.clock.extension_for(&auction, now);
            let mut updated = auction.clone();
            if let Some(end_time) = extended_end {
                updated.end_time = end_time;
                updated.extension_count += 1;
            }
            updated.current_price = amount;
            updated.bid_count += 1;
            updated.updated_at = now;

            let bid =
                Bid::place(auction_id.clone(), bidder.clone(), amount, authorization_id.clone(), now);
            if !self
                .store
                .record_accepted_bid(&updated, auction.version, bid.clone())?
                .is_applied()
            {
                tracing::debug!(auction = %auction.id, "price snapshot went stale, revalidating");
                continue;
            }

            tracing::info!(
                auction = %auction.id,
                bid = %bid.id,
                amount,
                extended = extended_end.is_some(),
                "bid accepted"
            );
            return Ok(BidReceipt {
                bid,
                time_extended: extended_end.is_some(),
                end_time: updated.end_time,
                current_price: amount,
            });
        }
        Err(AuctionError::PriceConflict)
    }

    /// Bids eligible for capture, ranked by amount descending with earlier
    /// placement winning ties. Only bids whose authorization is still held
    /// participate.
    pub fn ranked_bids(&self, auction_id: &AuctionId) -> AuctionResult<Vec<Bid>> {
        let mut bids = self.store.bids_for_auction(auction_id)?;
        bids.retain(|b| b.authorization_status == AuthorizationStatus::Held);
        rank_bids(&mut bids);
        Ok(bids)
    }

    /// Top of the leaderboard for display.
    pub fn leaderboard(
        &self, auction_id: &AuctionId, limit: usize,
    ) -> AuctionResult<Vec<LeaderboardEntry>> {
        let mut bids = self.store.bids_for_auction(auction_id)?;
        bids.retain(|b| {
            !matches!(b.status, BidStatus::Cancelled | BidStatus::Failed)
        });
        rank_bids(&mut bids);
        Ok(bids
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, bid)| LeaderboardEntry {
                rank:        i as u32 + 1,
                bidder_name: bid.bidder.name,
                amount:      bid.amount,
                placed_at:   bid.placed_at,
            })
            .collect())
    }

}
