//! Closing sweep: drives ended auctions through capture, settlement, and
//! payout registration, exactly once per auction.
//!
//! The sweep is fired by an external scheduler with at-least-once
//! semantics, so every state-changing write here is conditioned on the
//! auction's pre-close state. Two overlapping sweeps each either perform
//! the full side-effect sequence or observe the other's completion and
//! no-op.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::{
    auction::{ledger, Auction, AuctionId, AuctionStatus, Bid},
    errors::{AuctionError, AuctionResult},
    gateway::PaymentGateway,
    settlement::{
        calculator::{self, Settlement},
        capture::{CaptureCoordinator, CaptureResult},
        payout::PayoutLedger,
    },
    store::AuctionStore,
    types::AuctionConfig,
};

/// Downstream notification failure. Logged and reported, never allowed to
/// roll back a completed settlement.
#[derive(Debug, Clone, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Seam for the platform's notification dispatch.
pub trait SettlementNotifier: Send + Sync {
    /// Announces a completed settlement to the parties involved.
    fn auction_completed(&self, auction: &Auction, winning_bid: &Bid) -> Result<(), NotifyError>;
}

/// Notifier for platforms that wire notifications elsewhere, and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl SettlementNotifier for NoopNotifier {
    fn auction_completed(&self, _auction: &Auction, _winning_bid: &Bid) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Summary returned to the periodic trigger.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepSummary {
    /// Auctions transitioned to a terminal state this run.
    pub closed_count:    usize,
    /// Auctions examined this run.
    pub total_processed: usize,
    /// Recovered failures: release errors, payout-registration and
    /// notification failures, per-auction closing errors.
    pub errors:          Vec<String>,
}

/// Terminal outcome of closing one auction.
#[derive(Debug, Clone)]
pub enum ClosedOutcome {
    /// A bid was captured and the auction settled.
    Completed {
        /// The captured bid, which fallback may have made a runner-up.
        bid:        Bid,
        /// The computed profit split.
        settlement: Settlement,
    },
    /// Every capture failed; the auction ended without a winner.
    NoWinner,
    /// Another invocation already closed this auction.
    AlreadyClosed,
    /// The auction is not yet due.
    NotDue,
}

/// One auction's closing result plus recovered warnings.
#[derive(Debug, Clone)]
pub struct Closing {
    /// Terminal outcome.
    pub outcome:  ClosedOutcome,
    /// Failures absorbed along the way.
    pub warnings: Vec<String>,
}

/// Report of an idempotent settlement repair.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    /// Whether a missing payout claim was registered.
    pub payout_registered: bool,
    /// Lingering holds released.
    pub holds_released:    usize,
    /// Failures absorbed along the way.
    pub warnings:          Vec<String>,
}

/// Drives ended auctions to their terminal state.
pub struct ClosingOrchestrator {
    store:    Arc<dyn AuctionStore>,
    capture:  CaptureCoordinator,
    payouts:  PayoutLedger,
    notifier: Arc<dyn SettlementNotifier>,
    config:   AuctionConfig,
}

impl ClosingOrchestrator {
    pub fn new(
        store: Arc<dyn AuctionStore>, gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn SettlementNotifier>, config: AuctionConfig,
    ) -> Self {
        let capture = CaptureCoordinator::new(store.clone(), gateway);
        let payouts = PayoutLedger::new(store.clone(), config.clone());
        Self { store, capture, payouts, notifier, config }
    }

    /// Scans every due auction and closes it. Safe to invoke repeatedly
    /// and concurrently.
    pub fn run_sweep(&self, now: DateTime<Utc>) -> SweepSummary {
        let mut summary = SweepSummary::default();
        let due = match self.store.due_for_closing(now) {
            Ok(due) => due,
            Err(err) => {
                tracing::error!(error = %err, "closing sweep failed to scan for due auctions");
                summary.errors.push(format!("scan: {}", err));
                return summary;
            },
        };

        for auction in due {
            summary.total_processed += 1;
            match self.close_auction(&auction.id, now) {
                Ok(closing) => {
                    summary.errors.extend(closing.warnings);
                    if matches!(
                        closing.outcome,
                        ClosedOutcome::Completed { .. } | ClosedOutcome::NoWinner
                    ) {
                        summary.closed_count += 1;
                    }
                },
                Err(err) => {
                    tracing::error!(auction = %auction.id, error = %err, "failed to close auction");
                    summary.errors.push(format!("{}: {}", auction.id, err));
                },
            }
        }

        tracing::info!(
            closed = summary.closed_count,
            processed = summary.total_processed,
            errors = summary.errors.len(),
            "closing sweep finished"
        );
        summary
    }

    /// Closes a single auction: capture with fallback, settlement split,
    /// one conditional terminal update, payout registration, notification.
    pub fn close_auction(&self, auction_id: &AuctionId, now: DateTime<Utc>) -> AuctionResult<Closing> {
        let auction = self
            .store
            .auction(auction_id)?
            .ok_or_else(|| AuctionError::AuctionNotFound(auction_id.to_string()))?;

        // Duplicate trigger firings land here.
        if auction.status.is_terminal() {
            return Ok(Closing { outcome: ClosedOutcome::AlreadyClosed, warnings: Vec::new() });
        }
        if auction.status != AuctionStatus::Active || !auction.has_expired(now) {
            return Ok(Closing { outcome: ClosedOutcome::NotDue, warnings: Vec::new() });
        }

        let mut ranked = self.store.bids_for_auction(&auction.id)?;
        ranked.retain(|bid| {
            bid.authorization_status == crate::auction::AuthorizationStatus::Held
        });
        ledger::rank_bids(&mut ranked);

        let report = self.capture.attempt_fallback_capture(&auction, &ranked)?;
        let mut warnings = report.release.errors;

        match report.result {
            CaptureResult::Captured(bid) => {
                let settlement =
                    calculator::split(bid.amount, auction.start_price, self.config.fee_rate_bps);
                let completed = match self.finalize(auction, |snapshot| {
                    let mut completed = snapshot.clone();
                    completed.record_completion(&bid, &settlement, now)?;
                    Ok(completed)
                })? {
                    Some(completed) => completed,
                    None => {
                        // Someone else finished the close; their side effects stand.
                        tracing::info!(auction = %auction_id, "close raced a concurrent sweep, no-op");
                        return Ok(Closing { outcome: ClosedOutcome::AlreadyClosed, warnings });
                    },
                };

                if let Err(err) = self.payouts.create_pending_payout(
                    &completed.owner_id,
                    &completed.id,
                    settlement.payout,
                    now,
                ) {
                    tracing::warn!(auction = %completed.id, error = %err, "payout registration failed");
                    warnings.push(format!("payout {}: {}", completed.id, err));
                }

                if let Err(err) = self.notifier.auction_completed(&completed, &bid) {
                    // The financial outcome is authoritative; report only.
                    tracing::warn!(auction = %completed.id, error = %err, "completion notification failed");
                    warnings.push(format!("notify {}: {}", completed.id, err));
                }

                tracing::info!(
                    auction = %completed.id,
                    winner_bid = %bid.id,
                    amount = bid.amount,
                    payout = settlement.payout,
                    "auction settled"
                );
                Ok(Closing { outcome: ClosedOutcome::Completed { bid, settlement }, warnings })
            },
            CaptureResult::NoWinner => {
                let ended = self.finalize(auction, |snapshot| {
                    let mut ended = snapshot.clone();
                    ended.transition_to(AuctionStatus::Ended, now)?;
                    Ok(ended)
                })?;
                if ended.is_none() {
                    tracing::info!(auction = %auction_id, "close raced a concurrent sweep, no-op");
                    return Ok(Closing { outcome: ClosedOutcome::AlreadyClosed, warnings });
                }
                tracing::info!(auction = %auction_id, "auction ended without a winner");
                Ok(Closing { outcome: ClosedOutcome::NoWinner, warnings })
            },
        }
    }

    /// Applies the terminal update, conditioned on the auction's pre-close
    /// version. A stale write caused by a racing bid placement is retried
    /// against the fresh row; a stale write caused by another sweep's
    /// completed close returns `None` and the caller no-ops.
    fn finalize(
        &self, mut snapshot: Auction,
        build: impl Fn(&Auction) -> AuctionResult<Auction>,
    ) -> AuctionResult<Option<Auction>> {
        loop {
            let terminal = build(&snapshot)?;
            if self.store.update_auction(&terminal, snapshot.version)?.is_applied() {
                return Ok(Some(terminal));
            }
            let fresh = self
                .store
                .auction(&snapshot.id)?
                .ok_or_else(|| AuctionError::AuctionNotFound(snapshot.id.to_string()))?;
            if fresh.status.is_terminal() {
                return Ok(None);
            }
            snapshot = fresh;
        }
    }

    /// Idempotent repair for an auction already completed but missing its
    /// payout registration, or with lingering holds. Performs only the
    /// missing steps: never re-captures and never recomputes the stored
    /// settlement fields.
    pub fn repair_settlement(
        &self, auction_id: &AuctionId, now: DateTime<Utc>,
    ) -> AuctionResult<RepairReport> {
        let auction = self
            .store
            .auction(auction_id)?
            .ok_or_else(|| AuctionError::AuctionNotFound(auction_id.to_string()))?;
        if auction.status != AuctionStatus::Completed {
            return Err(AuctionError::AuctionNotSettled(auction_id.to_string()));
        }

        let mut report = RepairReport::default();

        match auction.model_payout_amount {
            Some(amount) => {
                match self.payouts.create_pending_payout(&auction.owner_id, &auction.id, amount, now)
                {
                    Ok(registered) => report.payout_registered = registered,
                    Err(err) => report.warnings.push(format!("payout {}: {}", auction.id, err)),
                }
            },
            None => {
                report.warnings.push(format!("{}: completed without payout amount", auction.id));
            },
        }

        let release =
            self.capture.release_unused_holds(&auction.id, auction.winner_bid_id.as_ref())?;
        report.holds_released = release.released;
        report.warnings.extend(release.errors);

        if report.payout_registered {
            if let Some(bid_id) = &auction.winner_bid_id {
                if let Some(bid) = self.store.bid(bid_id)? {
                    if let Err(err) = self.notifier.auction_completed(&auction, &bid) {
                        report.warnings.push(format!("notify {}: {}", auction.id, err));
                    }
                }
            }
        }

        tracing::info!(
            auction = %auction_id,
            payout_registered = report.payout_registered,
            holds_released = report.holds_released,
            "settlement repair finished"
        );
        Ok(report)
    }
}
