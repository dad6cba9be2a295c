//! Request-facing facade wiring the engine components together.
//!
//! Bid placement and payout requests run as independent request handlers;
//! the closing sweep is fired by an external scheduler authenticated with a
//! shared secret. All of them read and write the same durable store, which
//! is the sole source of truth.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    auction::{
        ledger::{BidLedger, LeaderboardEntry},
        Auction, AuctionId, AuctionStatus, BidId, BidderInfo, OwnerId, VideoConfirmation,
    },
    errors::{AuctionError, AuctionResult, PayoutResult},
    gateway::{CustomerRef, PaymentGateway},
    settlement::{
        closing::{ClosingOrchestrator, RepairReport, SettlementNotifier, SweepSummary},
        payout::{PayoutId, PayoutLedger, PayoutRecord},
    },
    store::AuctionStore,
    types::AuctionConfig,
};

/// Bid placement request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBidRequest {
    /// Target auction.
    pub auction_id:     AuctionId,
    /// Registered user id, absent for guests.
    pub bidder_user_id: Option<String>,
    /// Bidder display name.
    pub bidder_name:    String,
    /// Bidder email.
    pub bidder_email:   String,
    /// Offered amount (AED).
    pub bid_amount:     u64,
}

/// Accepted-bid response body.
#[derive(Debug, Clone, Serialize)]
pub struct BidAccepted {
    /// Recorded bid id.
    pub bid_id:        BidId,
    /// Target auction.
    pub auction_id:    AuctionId,
    /// Accepted amount, now the auction's current price.
    pub amount:        u64,
    /// Whether the placement pushed the end time out.
    pub time_extended: bool,
    /// Effective end time after any extension.
    pub end_time:      DateTime<Utc>,
}

/// Main auction settlement service.
pub struct AuctionService {
    store:        Arc<dyn AuctionStore>,
    gateway:      Arc<dyn PaymentGateway>,
    ledger:       BidLedger,
    orchestrator: ClosingOrchestrator,
    payouts:      PayoutLedger,
    sweep_secret: String,
}

impl AuctionService {
    /// Wires the service over the platform's store, gateway, and notifier.
    pub fn new(
        store: Arc<dyn AuctionStore>, gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn SettlementNotifier>, config: AuctionConfig,
        sweep_secret: impl Into<String>,
    ) -> Self {
        let ledger = BidLedger::new(store.clone(), config.clone());
        let orchestrator =
            ClosingOrchestrator::new(store.clone(), gateway.clone(), notifier, config.clone());
        let payouts = PayoutLedger::new(store.clone(), config);
        Self { store, gateway, ledger, orchestrator, payouts, sweep_secret: sweep_secret.into() }
    }

    /// Creates an auction. Opens immediately when `start_time` has already
    /// passed.
    pub fn create_auction(
        &self, owner_id: OwnerId, title: impl Into<String>, start_price: u64,
        start_time: DateTime<Utc>, end_time: DateTime<Utc>, now: DateTime<Utc>,
    ) -> AuctionResult<Auction> {
        if end_time <= start_time {
            return Err(AuctionError::InvalidAuction(
                "end time must be after start time".to_string(),
            ));
        }
        if start_price == 0 {
            return Err(AuctionError::InvalidAuction("start price must be positive".to_string()));
        }
        let auction = Auction::new(owner_id, title, start_price, start_time, end_time, now);
        self.store.insert_auction(auction.clone())?;
        tracing::info!(auction = %auction.id, status = %auction.status, "auction created");
        Ok(auction)
    }

    /// Cancels an auction that has no bids yet. Owner only.
    pub fn cancel_auction(
        &self, owner_id: &OwnerId, auction_id: &AuctionId, now: DateTime<Utc>,
    ) -> AuctionResult<Auction> {
        let auction = self
            .store
            .auction(auction_id)?
            .ok_or_else(|| AuctionError::AuctionNotFound(auction_id.to_string()))?;
        if auction.owner_id != *owner_id {
            return Err(AuctionError::Unauthorized);
        }
        if auction.bid_count > 0 {
            return Err(AuctionError::AuctionHasBids);
        }
        let mut cancelled = auction.clone();
        cancelled.transition_to(AuctionStatus::Cancelled, now)?;
        if !self.store.update_auction(&cancelled, auction.version)?.is_applied() {
            return Err(AuctionError::PriceConflict);
        }
        tracing::info!(auction = %auction_id, "auction cancelled");
        Ok(cancelled)
    }

    /// Opens pending auctions whose start time has arrived. Returns how
    /// many were activated.
    pub fn activate_due_auctions(&self, now: DateTime<Utc>) -> AuctionResult<usize> {
        let mut activated = 0;
        for auction in self.store.due_for_activation(now)? {
            let mut open = auction.clone();
            open.transition_to(AuctionStatus::Active, now)?;
            if self.store.update_auction(&open, auction.version)?.is_applied() {
                activated += 1;
            }
        }
        Ok(activated)
    }

    /// Bid placement endpoint. Opens the authorization hold first; a
    /// rejected bid cancels its hold so nothing stays reserved.
    pub fn place_bid(&self, request: PlaceBidRequest, now: DateTime<Utc>) -> AuctionResult<BidAccepted> {
        let customer =
            CustomerRef { email: request.bidder_email.clone(), name: request.bidder_name.clone() };
        let authorization = self.gateway.authorize(request.bid_amount, &customer)?;

        let bidder = match request.bidder_user_id {
            Some(user_id) => {
                BidderInfo::registered(user_id, request.bidder_name, request.bidder_email)
            },
            None => BidderInfo::guest(request.bidder_name, request.bidder_email),
        };

        match self.ledger.place_bid(
            &request.auction_id,
            bidder,
            request.bid_amount,
            authorization.clone(),
            now,
        ) {
            Ok(receipt) => Ok(BidAccepted {
                bid_id:        receipt.bid.id,
                auction_id:    receipt.bid.auction_id,
                amount:        receipt.current_price,
                time_extended: receipt.time_extended,
                end_time:      receipt.end_time,
            }),
            Err(err) => {
                if let Err(cancel_err) = self.gateway.cancel(&authorization) {
                    tracing::warn!(
                        authorization = %authorization,
                        error = %cancel_err,
                        "failed to release hold for rejected bid"
                    );
                }
                Err(err)
            },
        }
    }

    /// Periodic-trigger endpoint. Authenticated by the shared secret; safe
    /// to call repeatedly and concurrently.
    pub fn run_closing_sweep(&self, secret: &str, now: DateTime<Utc>) -> AuctionResult<SweepSummary> {
        if secret != self.sweep_secret {
            return Err(AuctionError::Unauthorized);
        }
        Ok(self.orchestrator.run_sweep(now))
    }

    /// Idempotent repair endpoint for a completed auction with missing
    /// downstream effects.
    pub fn repair_settlement(
        &self, auction_id: &AuctionId, now: DateTime<Utc>,
    ) -> AuctionResult<RepairReport> {
        self.orchestrator.repair_settlement(auction_id, now)
    }

    /// Video upload marker.
    pub fn record_video_upload(
        &self, auction_id: &AuctionId, now: DateTime<Utc>,
    ) -> PayoutResult<VideoConfirmation> {
        self.payouts.record_video_upload(auction_id, now)
    }

    /// Video confirmation endpoint. Idempotent.
    pub fn confirm_video_watched(
        &self, auction_id: &AuctionId, now: DateTime<Utc>,
    ) -> PayoutResult<VideoConfirmation> {
        self.payouts.confirm_video_watched(auction_id, now)
    }

    /// Payout request endpoint.
    pub fn request_payout(
        &self, owner_id: &OwnerId, auction_ids: &[AuctionId], now: DateTime<Utc>,
    ) -> PayoutResult<PayoutRecord> {
        self.payouts.request_payout(owner_id, auction_ids, now)
    }

    /// Transfer-collaborator callback.
    pub fn record_transfer_result(
        &self, payout_id: &PayoutId, success: bool, now: DateTime<Utc>,
    ) -> PayoutResult<PayoutRecord> {
        self.payouts.record_transfer_result(payout_id, success, now)
    }

    /// Reads an auction.
    pub fn auction(&self, auction_id: &AuctionId) -> AuctionResult<Auction> {
        self.store
            .auction(auction_id)?
            .ok_or_else(|| AuctionError::AuctionNotFound(auction_id.to_string()))
    }

    /// Minimum acceptable next bid for an auction.
    pub fn minimum_next_bid(&self, auction_id: &AuctionId) -> AuctionResult<u64> {
        self.ledger.minimum_next_bid(auction_id)
    }

    /// Auction leaderboard for display.
    pub fn leaderboard(
        &self, auction_id: &AuctionId, limit: usize,
    ) -> AuctionResult<Vec<LeaderboardEntry>> {
        self.ledger.leaderboard(auction_id, limit)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::{
        gateway::testing::{GatewayCall, ScriptedGateway},
        settlement::closing::NoopNotifier,
        store::MemoryStore,
    };

    const SECRET: &str = "sweep-secret";

    fn service() -> (AuctionService, Arc<ScriptedGateway>) {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(ScriptedGateway::new());
        let service = AuctionService::new(
            store,
            gateway.clone(),
            Arc::new(NoopNotifier),
            AuctionConfig::default(),
            SECRET,
        );
        (service, gateway)
    }

    fn bid_request(auction_id: &AuctionId, amount: u64) -> PlaceBidRequest {
        PlaceBidRequest {
            auction_id:     auction_id.clone(),
            bidder_user_id: None,
            bidder_name:    "Fatima".to_string(),
            bidder_email:   "fatima@example.com".to_string(),
            bid_amount:     amount,
        }
    }

    #[test]
    fn test_rejected_bid_releases_its_hold() {
        let (service, gateway) = service();
        let now = Utc::now();
        let auction = service
            .create_auction(
                OwnerId::new("owner-1"),
                "Lot",
                100,
                now - Duration::minutes(1),
                now + Duration::hours(1),
                now,
            )
            .expect("create");

        let err = service.place_bid(bid_request(&auction.id, 10), now).expect_err("too low");
        assert_eq!(err, AuctionError::BidTooLow { minimum: 100 });

        let cancelled = gateway.cancelled();
        assert_eq!(cancelled.len(), 1, "the rejected bid's hold must be released");
    }

    #[test]
    fn test_accepted_bid_keeps_its_hold() {
        let (service, gateway) = service();
        let now = Utc::now();
        let auction = service
            .create_auction(
                OwnerId::new("owner-1"),
                "Lot",
                100,
                now - Duration::minutes(1),
                now + Duration::hours(1),
                now,
            )
            .expect("create");

        service.place_bid(bid_request(&auction.id, 100), now).expect("accepted");
        assert!(gateway.cancelled().is_empty());
        assert!(matches!(gateway.calls()[0], GatewayCall::Authorize { amount: 100, .. }));
    }

    #[test]
    fn test_sweep_requires_shared_secret() {
        let (service, _gateway) = service();
        let err = service.run_closing_sweep("wrong", Utc::now()).expect_err("unauthorized");
        assert_eq!(err, AuctionError::Unauthorized);
        service.run_closing_sweep(SECRET, Utc::now()).expect("authorized");
    }

    #[test]
    fn test_cancel_auction_requires_owner_and_no_bids() {
        let (service, _gateway) = service();
        let now = Utc::now();
        let owner = OwnerId::new("owner-1");
        let auction = service
            .create_auction(
                owner.clone(),
                "Lot",
                100,
                now - Duration::minutes(1),
                now + Duration::hours(1),
                now,
            )
            .expect("create");

        let err = service
            .cancel_auction(&OwnerId::new("intruder"), &auction.id, now)
            .expect_err("not the owner");
        assert_eq!(err, AuctionError::Unauthorized);

        service.place_bid(bid_request(&auction.id, 100), now).expect("bid");
        let err = service.cancel_auction(&owner, &auction.id, now).expect_err("has bids");
        assert_eq!(err, AuctionError::AuctionHasBids);
    }

    #[test]
    fn test_pending_auction_activates_when_due() {
        let (service, _gateway) = service();
        let now = Utc::now();
        let auction = service
            .create_auction(
                OwnerId::new("owner-1"),
                "Lot",
                100,
                now + Duration::minutes(5),
                now + Duration::hours(1),
                now,
            )
            .expect("create");
        assert_eq!(auction.status, AuctionStatus::Pending);

        let later = now + Duration::minutes(6);
        assert_eq!(service.activate_due_auctions(later).expect("activate"), 1);
        assert_eq!(service.auction(&auction.id).expect("get").status, AuctionStatus::Active);
    }
}
