//! Payout ledger: per-auction pending claims, payout requests, and the
//! video-confirmation gate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    auction::{AuctionId, AuctionStatus, OwnerId, PayoutStatus, VideoConfirmation},
    errors::{IneligibilityReason, PayoutError, PayoutResult},
    store::AuctionStore,
    types::AuctionConfig,
};

/// Unique payout record identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayoutId(String);

impl PayoutId {
    pub fn new() -> Self {
        Self(format!("payout-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PayoutId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PayoutId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-auction payout claim registered at completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutClaim {
    /// Settled auction the claim belongs to
    pub auction_id: AuctionId,
    /// Beneficiary
    pub owner_id:   OwnerId,
    /// Owner share of the settled profit (AED)
    pub amount:     u64,
    /// Registration timestamp
    pub created_at: DateTime<Utc>,
}

/// A payout request covering one or more settled auctions.
///
/// Mutated only through [`PayoutLedger::record_transfer_result`] once
/// created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRecord {
    /// Unique payout ID
    pub id:           PayoutId,
    /// Beneficiary
    pub owner_id:     OwnerId,
    /// Total requested amount (AED)
    pub amount:       u64,
    /// Settled auctions covered by this request
    pub auction_ids:  Vec<AuctionId>,
    /// Transfer progress
    pub status:       PayoutStatus,
    /// Request timestamp
    pub requested_at: DateTime<Utc>,
    /// Transfer completion timestamp
    pub completed_at: Option<DateTime<Utc>>,
}

/// Tracks payout claims and requests, enforcing the minimum threshold and
/// the video-confirmation gate.
pub struct PayoutLedger {
    store:  Arc<dyn AuctionStore>,
    config: AuctionConfig,
}

impl PayoutLedger {
    pub fn new(store: Arc<dyn AuctionStore>, config: AuctionConfig) -> Self {
        Self { store, config }
    }

    /// Registers the pending claim for a freshly settled auction. Returns
    /// `false` when the claim already exists, which is what makes the
    /// repair path safe to re-invoke.
    pub fn create_pending_payout(
        &self, owner_id: &OwnerId, auction_id: &AuctionId, amount: u64, now: DateTime<Utc>,
    ) -> PayoutResult<bool> {
        if self.store.payout_claim(auction_id)?.is_some() {
            return Ok(false);
        }
        self.store.insert_payout_claim(PayoutClaim {
            auction_id: auction_id.clone(),
            owner_id:   owner_id.clone(),
            amount,
            created_at: now,
        })?;
        tracing::info!(auction = %auction_id, owner = %owner_id, amount, "pending payout registered");
        Ok(true)
    }

    /// The pending claim for an auction, if registered.
    pub fn claim_for(&self, auction_id: &AuctionId) -> PayoutResult<Option<PayoutClaim>> {
        Ok(self.store.payout_claim(auction_id)?)
    }

    /// Creates a payout request over the selected auctions.
    ///
    /// Validation carries no side effects; only after every selected
    /// auction qualifies are the payout statuses flipped. A failure while
    /// recording the request compensates the flips back to pending.
    pub fn request_payout(
        &self, owner_id: &OwnerId, auction_ids: &[AuctionId], now: DateTime<Utc>,
    ) -> PayoutResult<PayoutRecord> {
        if auction_ids.is_empty() {
            return Err(PayoutError::EmptySelection);
        }

        let mut selected = Vec::with_capacity(auction_ids.len());
        for auction_id in auction_ids {
            let auction = self
                .store
                .auction(auction_id)?
                .ok_or_else(|| PayoutError::NotEligible {
                    auction_id: auction_id.to_string(),
                    reason:     IneligibilityReason::NotFound,
                })?;
            if auction.owner_id != *owner_id {
                return Err(PayoutError::NotEligible {
                    auction_id: auction_id.to_string(),
                    reason:     IneligibilityReason::NotOwned,
                });
            }
            if auction.status != AuctionStatus::Completed {
                return Err(PayoutError::NotEligible {
                    auction_id: auction_id.to_string(),
                    reason:     IneligibilityReason::NotCompleted,
                });
            }
            if auction.payout_status != PayoutStatus::Pending {
                return Err(PayoutError::NotEligible {
                    auction_id: auction_id.to_string(),
                    reason:     IneligibilityReason::PayoutNotPending,
                });
            }
            if self.video_blocks_payout(auction_id)? {
                return Err(PayoutError::VideoNotWatched(auction_id.to_string()));
            }
            selected.push(auction);
        }

        let total: u64 =
            selected.iter().map(|a| a.model_payout_amount.unwrap_or_default()).sum();
        if total < self.config.min_payout_amount {
            return Err(PayoutError::BelowMinimum {
                total,
                minimum: self.config.min_payout_amount,
            });
        }

        let mut flipped: Vec<AuctionId> = Vec::with_capacity(selected.len());
        for auction in &selected {
            let mut updated = auction.clone();
            updated.payout_status = PayoutStatus::Processing;
            updated.updated_at = now;
            let applied = self
                .store
                .update_auction(&updated, auction.version)
                .map(|outcome| outcome.is_applied());
            match applied {
                Ok(true) => flipped.push(auction.id.clone()),
                Ok(false) => {
                    // A concurrent request already claimed it.
                    self.compensate_flips(&flipped, now);
                    return Err(PayoutError::NotEligible {
                        auction_id: auction.id.to_string(),
                        reason:     IneligibilityReason::PayoutNotPending,
                    });
                },
                Err(err) => {
                    self.compensate_flips(&flipped, now);
                    return Err(err.into());
                },
            }
        }

        let record = PayoutRecord {
            id:           PayoutId::new(),
            owner_id:     owner_id.clone(),
            amount:       total,
            auction_ids:  flipped.clone(),
            status:       PayoutStatus::Pending,
            requested_at: now,
            completed_at: None,
        };
        if let Err(err) = self.store.insert_payout(record.clone()) {
            self.compensate_flips(&flipped, now);
            return Err(err.into());
        }

        tracing::info!(
            payout = %record.id,
            owner = %owner_id,
            amount = total,
            auctions = record.auction_ids.len(),
            "payout requested"
        );
        Ok(record)
    }

    /// Records the transfer collaborator's outcome. Idempotent once the
    /// record reaches a terminal status.
    pub fn record_transfer_result(
        &self, payout_id: &PayoutId, success: bool, now: DateTime<Utc>,
    ) -> PayoutResult<PayoutRecord> {
        let mut record = self
            .store
            .payout(payout_id)?
            .ok_or_else(|| PayoutError::PayoutNotFound(payout_id.to_string()))?;
        if matches!(record.status, PayoutStatus::Transferred | PayoutStatus::Failed) {
            return Ok(record);
        }

        let status = if success { PayoutStatus::Transferred } else { PayoutStatus::Failed };
        record.status = status;
        record.completed_at = Some(now);
        self.store.update_payout(&record)?;

        for auction_id in &record.auction_ids {
            self.set_payout_status(auction_id, status, now);
        }

        tracing::info!(payout = %record.id, status = status.display_name(), "transfer result recorded");
        Ok(record)
    }

    /// Records the winner's confirmation-video upload.
    pub fn record_video_upload(
        &self, auction_id: &AuctionId, now: DateTime<Utc>,
    ) -> PayoutResult<VideoConfirmation> {
        let mut confirmation = self
            .store
            .video_confirmation(auction_id)?
            .unwrap_or_else(|| VideoConfirmation::new(auction_id.clone()));
        confirmation.mark_uploaded(now);
        self.store.upsert_video_confirmation(confirmation.clone())?;
        Ok(confirmation)
    }

    /// Marks the confirmation video as watched. Idempotent: repeated calls
    /// return the already-recorded timestamps.
    pub fn confirm_video_watched(
        &self, auction_id: &AuctionId, now: DateTime<Utc>,
    ) -> PayoutResult<VideoConfirmation> {
        let mut confirmation = self
            .store
            .video_confirmation(auction_id)?
            .unwrap_or_else(|| VideoConfirmation::new(auction_id.clone()));
        if confirmation.watched_at.is_none() {
            confirmation.mark_watched(now);
            self.store.upsert_video_confirmation(confirmation.clone())?;
        }
        Ok(confirmation)
    }

    fn video_blocks_payout(&self, auction_id: &AuctionId) -> PayoutResult<bool> {
        Ok(self
            .store
            .video_confirmation(auction_id)?
            .map(|confirmation| confirmation.blocks_payout())
            .unwrap_or(false))
    }

    /// Compensating update: puts flipped auctions back to pending after a
    /// failed request.
    fn compensate_flips(&self, auction_ids: &[AuctionId], now: DateTime<Utc>) {
        for auction_id in auction_ids {
            self.set_payout_status(auction_id, PayoutStatus::Pending, now);
        }
    }

    fn set_payout_status(&self, auction_id: &AuctionId, status: PayoutStatus, now: DateTime<Utc>) {
        let outcome = self.store.auction(auction_id).and_then(|auction| match auction {
            Some(auction) => {
                let mut updated = auction.clone();
                updated.payout_status = status;
                updated.updated_at = now;
                self.store.update_auction(&updated, auction.version).map(Some)
            },
            None => Ok(None),
        });
        match outcome {
            Ok(Some(outcome)) if outcome.is_applied() => {},
            other => {
                tracing::warn!(
                    auction = %auction_id,
                    status = status.display_name(),
                    outcome = ?other,
                    "payout status update did not apply"
                );
            },
        }
    }
}
