//! Durable-store collaborator interface and in-memory implementation.
//!
//! The store is the sole shared mutable resource. Auction rows carry a
//! version counter and every auction write is a conditional update: it
//! applies only when the stored version still matches the version the
//! caller read, so concurrent writers resolve through compare-and-set
//! instead of locks held across I/O.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};

use crate::{
    auction::{Auction, AuctionId, AuctionStatus, Bid, BidId, BidStatus, VideoConfirmation},
    errors::{StoreError, StoreResult},
    settlement::payout::{PayoutClaim, PayoutId, PayoutRecord},
};

/// Outcome of a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The write was applied and the stored version advanced.
    Applied,
    /// The stored version no longer matched; nothing was written.
    Stale,
}

impl UpdateOutcome {
    #[must_use]
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Durable store contract used by every engine component.
pub trait AuctionStore: Send + Sync {
    // Auctions
    fn insert_auction(&self, auction: Auction) -> StoreResult<()>;
    fn auction(&self, id: &AuctionId) -> StoreResult<Option<Auction>>;
    /// Conditional write: applied only when the stored version equals
    /// `expected_version`; the stored version then advances by one.
    fn update_auction(&self, auction: &Auction, expected_version: u64) -> StoreResult<UpdateOutcome>;
    /// Bid-acceptance transaction: the conditional auction update, the
    /// demotion of the previous winning bid, and the insert of the new
    /// winning bid, applied together or not at all.
    fn record_accepted_bid(
        &self, auction: &Auction, expected_version: u64, bid: Bid,
    ) -> StoreResult<UpdateOutcome>;
    /// Active auctions whose end time has passed.
    fn due_for_closing(&self, now: DateTime<Utc>) -> StoreResult<Vec<Auction>>;
    /// Pending auctions whose start time has arrived.
    fn due_for_activation(&self, now: DateTime<Utc>) -> StoreResult<Vec<Auction>>;

    // Bids
    fn insert_bid(&self, bid: Bid) -> StoreResult<()>;
    fn bid(&self, id: &BidId) -> StoreResult<Option<Bid>>;
    fn update_bid(&self, bid: &Bid) -> StoreResult<()>;
    fn bids_for_auction(&self, auction_id: &AuctionId) -> StoreResult<Vec<Bid>>;

    // Payout records and per-auction claims
    fn insert_payout(&self, record: PayoutRecord) -> StoreResult<()>;
    fn payout(&self, id: &PayoutId) -> StoreResult<Option<PayoutRecord>>;
    fn update_payout(&self, record: &PayoutRecord) -> StoreResult<()>;
    fn insert_payout_claim(&self, claim: PayoutClaim) -> StoreResult<()>;
    fn payout_claim(&self, auction_id: &AuctionId) -> StoreResult<Option<PayoutClaim>>;

    // Video confirmations
    fn video_confirmation(&self, auction_id: &AuctionId) -> StoreResult<Option<VideoConfirmation>>;
    fn upsert_video_confirmation(&self, confirmation: VideoConfirmation) -> StoreResult<()>;
}

/// In-memory store.
///
/// Backs the same trait a relational store implements in production; the
/// version check runs under the map lock, which is what makes
/// [`AuctionStore::update_auction`] an atomic compare-and-set here.
#[derive(Default)]
pub struct MemoryStore {
    auctions:        Arc<Mutex<HashMap<AuctionId, Auction>>>,
    bids:            Arc<Mutex<HashMap<BidId, Bid>>>,
    bids_by_auction: Arc<Mutex<HashMap<AuctionId, Vec<BidId>>>>,
    payouts:         Arc<Mutex<HashMap<PayoutId, PayoutRecord>>>,
    payout_claims:   Arc<Mutex<HashMap<AuctionId, PayoutClaim>>>,
    videos:          Arc<Mutex<HashMap<AuctionId, VideoConfirmation>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuctionStore for MemoryStore {
    fn insert_auction(&self, auction: Auction) -> StoreResult<()> {
        let mut auctions = self.auctions.lock().map_err(|_| StoreError::LockPoisoned)?;
        if auctions.contains_key(&auction.id) {
            return Err(StoreError::DuplicateRecord(auction.id.to_string()));
        }
        auctions.insert(auction.id.clone(), auction);
        Ok(())
    }

    fn auction(&self, id: &AuctionId) -> StoreResult<Option<Auction>> {
        let auctions = self.auctions.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(auctions.get(id).cloned())
    }

    fn update_auction(&self, auction: &Auction, expected_version: u64) -> StoreResult<UpdateOutcome> {
        let mut auctions = self.auctions.lock().map_err(|_| StoreError::LockPoisoned)?;
        let current = auctions
            .get(&auction.id)
            .ok_or_else(|| StoreError::RecordNotFound(auction.id.to_string()))?;
        if current.version != expected_version {
            return Ok(UpdateOutcome::Stale);
        }
        let mut stored = auction.clone();
        stored.version = expected_version + 1;
        auctions.insert(stored.id.clone(), stored);
        Ok(UpdateOutcome::Applied)
    }

    fn record_accepted_bid(
        &self, auction: &Auction, expected_version: u64, bid: Bid,
    ) -> StoreResult<UpdateOutcome> {
        let mut auctions = self.auctions.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut bids = self.bids.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut by_auction = self.bids_by_auction.lock().map_err(|_| StoreError::LockPoisoned)?;

        let current = auctions
            .get(&auction.id)
            .ok_or_else(|| StoreError::RecordNotFound(auction.id.to_string()))?;
        if current.version != expected_version {
            return Ok(UpdateOutcome::Stale);
        }
        if bids.contains_key(&bid.id) {
            return Err(StoreError::DuplicateRecord(bid.id.to_string()));
        }

        let mut stored = auction.clone();
        stored.version = expected_version + 1;
        auctions.insert(stored.id.clone(), stored);

        for prev_id in by_auction.get(&auction.id).cloned().unwrap_or_default() {
            if let Some(prev) = bids.get_mut(&prev_id) {
                if prev.status == BidStatus::Winning {
                    prev.status = BidStatus::Outbid;
                }
            }
        }

        by_auction.entry(bid.auction_id.clone()).or_default().push(bid.id.clone());
        bids.insert(bid.id.clone(), bid);
        Ok(UpdateOutcome::Applied)
    }

    fn due_for_closing(&self, now: DateTime<Utc>) -> StoreResult<Vec<Auction>> {
        let auctions = self.auctions.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut due: Vec<Auction> =
            auctions.values().filter(|a| a.is_due_for_closing(now)).cloned().collect();
        due.sort_by_key(|a| a.end_time);
        Ok(due)
    }

    fn due_for_activation(&self, now: DateTime<Utc>) -> StoreResult<Vec<Auction>> {
        let auctions = self.auctions.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut due: Vec<Auction> = auctions
            .values()
            .filter(|a| a.status == AuctionStatus::Pending && a.start_time <= now)
            .cloned()
            .collect();
        due.sort_by_key(|a| a.start_time);
        Ok(due)
    }

    fn insert_bid(&self, bid: Bid) -> StoreResult<()> {
        let mut bids = self.bids.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut by_auction = self.bids_by_auction.lock().map_err(|_| StoreError::LockPoisoned)?;
        if bids.contains_key(&bid.id) {
            return Err(StoreError::DuplicateRecord(bid.id.to_string()));
        }
        by_auction.entry(bid.auction_id.clone()).or_default().push(bid.id.clone());
        bids.insert(bid.id.clone(), bid);
        Ok(())
    }

    fn bid(&self, id: &BidId) -> StoreResult<Option<Bid>> {
        let bids = self.bids.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(bids.get(id).cloned())
    }

    fn update_bid(&self, bid: &Bid) -> StoreResult<()> {
        let mut bids = self.bids.lock().map_err(|_| StoreError::LockPoisoned)?;
        if !bids.contains_key(&bid.id) {
            return Err(StoreError::RecordNotFound(bid.id.to_string()));
        }
        bids.insert(bid.id.clone(), bid.clone());
        Ok(())
    }

    fn bids_for_auction(&self, auction_id: &AuctionId) -> StoreResult<Vec<Bid>> {
        let bids = self.bids.lock().map_err(|_| StoreError::LockPoisoned)?;
        let by_auction = self.bids_by_auction.lock().map_err(|_| StoreError::LockPoisoned)?;
        let ids = by_auction.get(auction_id).cloned().unwrap_or_default();
        Ok(ids.iter().filter_map(|id| bids.get(id).cloned()).collect())
    }

    fn insert_payout(&self, record: PayoutRecord) -> StoreResult<()> {
        let mut payouts = self.payouts.lock().map_err(|_| StoreError::LockPoisoned)?;
        if payouts.contains_key(&record.id) {
            return Err(StoreError::DuplicateRecord(record.id.to_string()));
        }
        payouts.insert(record.id.clone(), record);
        Ok(())
    }

    fn payout(&self, id: &PayoutId) -> StoreResult<Option<PayoutRecord>> {
        let payouts = self.payouts.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(payouts.get(id).cloned())
    }

    fn update_payout(&self, record: &PayoutRecord) -> StoreResult<()> {
        let mut payouts = self.payouts.lock().map_err(|_| StoreError::LockPoisoned)?;
        if !payouts.contains_key(&record.id) {
            return Err(StoreError::RecordNotFound(record.id.to_string()));
        }
        payouts.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn insert_payout_claim(&self, claim: PayoutClaim) -> StoreResult<()> {
        let mut claims = self.payout_claims.lock().map_err(|_| StoreError::LockPoisoned)?;
        if claims.contains_key(&claim.auction_id) {
            return Err(StoreError::DuplicateRecord(claim.auction_id.to_string()));
        }
        claims.insert(claim.auction_id.clone(), claim);
        Ok(())
    }

    fn payout_claim(&self, auction_id: &AuctionId) -> StoreResult<Option<PayoutClaim>> {
        let claims = self.payout_claims.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(claims.get(auction_id).cloned())
    }

    fn video_confirmation(&self, auction_id: &AuctionId) -> StoreResult<Option<VideoConfirmation>> {
        let videos = self.videos.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(videos.get(auction_id).cloned())
    }

    fn upsert_video_confirmation(&self, confirmation: VideoConfirmation) -> StoreResult<()> {
        let mut videos = self.videos.lock().map_err(|_| StoreError::LockPoisoned)?;
        videos.insert(confirmation.auction_id.clone(), confirmation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::auction::OwnerId;

    fn sample_auction() -> Auction {
        let now = Utc::now();
        Auction::new(
            OwnerId::new("owner-1"),
            "Signed print",
            100,
            now - Duration::minutes(5),
            now + Duration::hours(1),
            now,
        )
    }

    #[test]
    fn test_conditional_update_applies_on_matching_version() {
        let store = MemoryStore::new();
        let auction = sample_auction();
        store.insert_auction(auction.clone()).expect("insert");

        let mut updated = auction.clone();
        updated.current_price = 150;
        assert_eq!(store.update_auction(&updated, 0).expect("update"), UpdateOutcome::Applied);

        let stored = store.auction(&auction.id).expect("get").expect("present");
        assert_eq!(stored.current_price, 150);
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn test_conditional_update_rejects_stale_version() {
        let store = MemoryStore::new();
        let auction = sample_auction();
        store.insert_auction(auction.clone()).expect("insert");

        let mut first = auction.clone();
        first.current_price = 150;
        assert!(store.update_auction(&first, 0).expect("first").is_applied());

        // Second writer still holds version 0.
        let mut second = auction.clone();
        second.current_price = 140;
        assert_eq!(store.update_auction(&second, 0).expect("second"), UpdateOutcome::Stale);

        let stored = store.auction(&auction.id).expect("get").expect("present");
        assert_eq!(stored.current_price, 150);
    }

    #[test]
    fn test_duplicate_auction_insert_rejected() {
        let store = MemoryStore::new();
        let auction = sample_auction();
        store.insert_auction(auction.clone()).expect("insert");
        assert!(matches!(
            store.insert_auction(auction),
            Err(StoreError::DuplicateRecord(_))
        ));
    }

    #[test]
    fn test_due_for_closing_only_returns_expired_active_auctions() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let expired = sample_auction();
        let mut expired = expired;
        expired.end_time = now - Duration::seconds(1);
        store.insert_auction(expired.clone()).expect("insert expired");

        let open = sample_auction();
        store.insert_auction(open).expect("insert open");

        let due = store.due_for_closing(now).expect("due");
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, expired.id);
    }
}
