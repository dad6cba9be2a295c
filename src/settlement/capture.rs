//! Payment capture with runner-up fallback.
//!
//! The coordinator walks the ranked bid list and stops at the first
//! successful capture. Declines and gateway errors are treated the same
//! way: the bid is marked failed and the next-ranked bidder is tried.
//! Every hold that does not end up captured is explicitly released, so
//! bidders are never charged speculatively.

use std::sync::Arc;

use crate::{
    auction::{Auction, AuctionId, AuthorizationStatus, Bid, BidId, BidStatus},
    errors::AuctionResult,
    gateway::{CaptureOutcome, PaymentGateway},
    store::AuctionStore,
};

/// Which bid, if any, was actually captured. Fallback means this is not
/// necessarily the top-ranked bid; downstream winner determination must use
/// the captured one.
#[derive(Debug, Clone)]
pub enum CaptureResult {
    /// A capture succeeded for this bid.
    Captured(Bid),
    /// The ranked list was exhausted without a successful capture.
    NoWinner,
}

/// Hold releases performed after the capture walk.
#[derive(Debug, Clone, Default)]
pub struct ReleaseReport {
    /// Number of holds released.
    pub released: usize,
    /// Releases that failed at the gateway; the holds stay held for the
    /// repair path.
    pub errors:   Vec<String>,
}

/// Outcome of a full capture pass over one auction.
#[derive(Debug, Clone)]
pub struct CaptureReport {
    /// Capture outcome.
    pub result:  CaptureResult,
    /// Hold releases performed alongside.
    pub release: ReleaseReport,
}

/// Settles payment for a closing auction against the ranked bid list.
pub struct CaptureCoordinator {
    store:   Arc<dyn AuctionStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl CaptureCoordinator {
    pub fn new(store: Arc<dyn AuctionStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// Tries to capture the top-ranked held authorization, falling back
    /// down the list on decline or gateway error, then releases every
    /// remaining unused hold.
    pub fn attempt_fallback_capture(
        &self, auction: &Auction, ranked: &[Bid],
    ) -> AuctionResult<CaptureReport> {
        let mut captured: Option<Bid> = None;

        for bid in ranked {
            if bid.authorization_status != AuthorizationStatus::Held {
                continue;
            }
            match self.gateway.capture(&bid.authorization_id) {
                Ok(CaptureOutcome::Captured) => {
                    let mut won = bid.clone();
                    won.advance_authorization(AuthorizationStatus::Captured)?;
                    won.status = BidStatus::Captured;
                    self.store.update_bid(&won)?;
                    tracing::info!(
                        auction = %auction.id,
                        bid = %won.id,
                        amount = won.amount,
                        "capture succeeded"
                    );
                    captured = Some(won);
                    break;
                },
                Ok(CaptureOutcome::Declined) => {
                    self.mark_capture_failed(bid)?;
                    tracing::warn!(
                        auction = %auction.id,
                        bid = %bid.id,
                        "capture declined, falling back to next bidder"
                    );
                },
                Err(err) => {
                    self.mark_capture_failed(bid)?;
                    tracing::warn!(
                        auction = %auction.id,
                        bid = %bid.id,
                        error = %err,
                        "capture errored, falling back to next bidder"
                    );
                },
            }
        }

        let keep = captured.as_ref().map(|bid| bid.id.clone());
        let release = self.release_unused_holds(&auction.id, keep.as_ref())?;

        let result = match captured {
            Some(bid) => CaptureResult::Captured(bid),
            None => CaptureResult::NoWinner,
        };
        Ok(CaptureReport { result, release })
    }

    /// Releases every hold for the auction still in `Held`, except the one
    /// backing `keep`. Safe to re-invoke: already-released holds are
    /// skipped.
    pub fn release_unused_holds(
        &self, auction_id: &AuctionId, keep: Option<&BidId>,
    ) -> AuctionResult<ReleaseReport> {
        let mut report = ReleaseReport::default();
        for bid in self.store.bids_for_auction(auction_id)? {
            if bid.authorization_status != AuthorizationStatus::Held || Some(&bid.id) == keep {
                continue;
            }
            match self.gateway.cancel(&bid.authorization_id) {
                Ok(()) => {
                    let mut released = bid;
                    released.advance_authorization(AuthorizationStatus::Released)?;
                    self.store.update_bid(&released)?;
                    report.released += 1;
                },
                Err(err) => {
                    // The hold stays held; the repair pass retries it.
                    tracing::warn!(
                        auction = %auction_id,
                        bid = %bid.id,
                        error = %err,
                        "failed to release authorization hold"
                    );
                    report.errors.push(format!("release {}: {}", bid.id, err));
                },
            }
        }
        Ok(report)
    }

    fn mark_capture_failed(&self, bid: &Bid) -> AuctionResult<()> {
        let mut failed = bid.clone();
        failed.advance_authorization(AuthorizationStatus::Failed)?;
        failed.status = BidStatus::Failed;
        self.store.update_bid(&failed)?;
        Ok(())
    }
}
