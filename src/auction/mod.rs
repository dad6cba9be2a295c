//! # Auction Domain Types
//!
//! Core models for timed auctions: the auction record, bids with their
//! payment-authorization state, and the video confirmation that gates
//! payout release.

pub mod clock;
pub mod ledger;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{AuctionError, AuctionResult},
    gateway::AuthorizationId,
    settlement::calculator::Settlement,
    types::AuctionConfig,
};

/// Unique auction identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AuctionId(String);

impl AuctionId {
    pub fn new() -> Self {
        Self(format!("auction-{}", uuid::Uuid::new_v4()))
    }

    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AuctionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique bid identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BidId(String);

impl BidId {
    pub fn new() -> Self {
        Self(format!("bid-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BidId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BidId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Auction owner (creator) identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Auction lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuctionStatus {
    /// Created, not yet open for bids.
    Pending,
    /// Open for bids.
    Active,
    /// Past end time, closed without a winner.
    Ended,
    /// Closed with a captured winning bid and settled amounts.
    Completed,
    /// Cancelled by the owner before any bids.
    Cancelled,
}

impl AuctionStatus {
    /// Whether bids may be placed.
    #[must_use]
    pub fn accepts_bids(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether the auction reached a terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Completed | Self::Cancelled)
    }

    /// Legal transition table.
    #[must_use]
    pub fn can_transition_to(self, next: AuctionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active)
                | (Self::Pending, Self::Cancelled)
                | (Self::Active, Self::Ended)
                | (Self::Active, Self::Completed)
                | (Self::Active, Self::Cancelled)
        )
    }

    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Ended => "Ended",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Per-auction payout progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// Earned, not yet requested.
    #[default]
    Pending,
    /// Included in a payout request awaiting transfer.
    Processing,
    /// Funds transferred to the owner.
    Transferred,
    /// Transfer failed.
    Failed,
}

impl PayoutStatus {
    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Transferred => "Transferred",
            Self::Failed => "Failed",
        }
    }
}

/// Bidder identity. Registered users carry a user id; guests bid with name
/// and email only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidderInfo {
    /// Registered user id, if any.
    pub user_id: Option<String>,
    /// Display name.
    pub name:    String,
    /// Contact email.
    pub email:   String,
}

impl BidderInfo {
    pub fn registered(user_id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()), name: name.into(), email: email.into() }
    }

    pub fn guest(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { user_id: None, name: name.into(), email: email.into() }
    }

    #[must_use]
    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }
}

/// State of the gateway-side authorization hold backing a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    /// Funds reserved, nothing transferred.
    Held,
    /// Hold converted into a funds transfer.
    Captured,
    /// Hold cancelled, funds released back to the bidder.
    Released,
    /// Capture attempt failed or was declined.
    Failed,
}

impl AuthorizationStatus {
    /// Authorization holds only move forward from `Held`.
    #[must_use]
    pub fn can_advance_to(self, next: AuthorizationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Held, Self::Captured) | (Self::Held, Self::Released) | (Self::Held, Self::Failed)
        )
    }

    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Held => "Held",
            Self::Captured => "Captured",
            Self::Released => "Released",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Bid status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidStatus {
    /// Recorded, not yet ranked.
    Pending,
    /// Current top bid.
    Winning,
    /// Surpassed by a higher bid.
    Outbid,
    /// Settled as the auction's winning bid.
    Captured,
    /// Withdrawn before close.
    Cancelled,
    /// Capture declined or errored at close.
    Failed,
}

/// A bid placed on an auction, backed by a payment-authorization hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    /// Unique bid ID
    pub id:                   BidId,
    /// Auction this bid belongs to
    pub auction_id:           AuctionId,
    /// Who placed the bid
    pub bidder:               BidderInfo,
    /// Bid amount (AED)
    pub amount:               u64,
    /// Gateway hold backing the bid
    pub authorization_id:     AuthorizationId,
    /// State of the hold
    pub authorization_status: AuthorizationStatus,
    /// Bid status
    pub status:               BidStatus,
    /// Placement timestamp
    pub placed_at:            DateTime<Utc>,
}

impl Bid {
    /// Creates a freshly accepted top bid backed by a held authorization.
    pub fn place(
        auction_id: AuctionId, bidder: BidderInfo, amount: u64, authorization_id: AuthorizationId,
        placed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BidId::new(),
            auction_id,
            bidder,
            amount,
            authorization_id,
            authorization_status: AuthorizationStatus::Held,
            status: BidStatus::Winning,
            placed_at,
        }
    }

    /// Advances the authorization hold, enforcing forward-only transitions.
    pub fn advance_authorization(&mut self, next: AuthorizationStatus) -> AuctionResult<()> {
        if !self.authorization_status.can_advance_to(next) {
            return Err(AuctionError::InvalidAuthorizationTransition {
                from: self.authorization_status,
                to:   next,
            });
        }
        self.authorization_status = next;
        Ok(())
    }
}

/// A timed auction.
///
/// `version` backs every conditional write: a mutation is applied only when
/// the stored version still matches the version the caller read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    /// Unique auction ID
    pub id:                  AuctionId,
    /// Auction creator, payout beneficiary
    pub owner_id:            OwnerId,
    /// Listing title
    pub title:               String,
    /// Opening price (AED)
    pub start_price:         u64,
    /// Highest accepted bid so far; never decreases
    pub current_price:       u64,
    /// Number of accepted bids
    pub bid_count:           u32,
    /// When bidding opens
    pub start_time:          DateTime<Utc>,
    /// When bidding closes; pushed out by anti-sniping extensions
    pub end_time:            DateTime<Utc>,
    /// Lifecycle status
    pub status:              AuctionStatus,
    /// Winning bid, set once at completion
    pub winner_bid_id:       Option<BidId>,
    /// Winner display name, set once at completion
    pub winner_name:         Option<String>,
    /// Winner email, set once at completion
    pub winner_email:        Option<String>,
    /// Profit over start price, set once at completion
    pub profit_amount:       Option<u64>,
    /// Platform share of the profit, set once at completion
    pub platform_fee_amount: Option<u64>,
    /// Owner share of the profit, set once at completion
    pub model_payout_amount: Option<u64>,
    /// Payout progress after completion
    pub payout_status:       PayoutStatus,
    /// Anti-sniping extensions applied so far
    pub extension_count:     u32,
    /// Optimistic-concurrency counter
    pub version:             u64,
    /// Created timestamp
    pub created_at:          DateTime<Utc>,
    /// Last updated timestamp
    pub updated_at:          DateTime<Utc>,
}

impl Auction {
    /// Creates an auction. It opens immediately when `start_time` has
    /// already passed, otherwise it waits in `Pending`.
    pub fn new(
        owner_id: OwnerId, title: impl Into<String>, start_price: u64,
        start_time: DateTime<Utc>, end_time: DateTime<Utc>, now: DateTime<Utc>,
    ) -> Self {
        let status =
            if start_time <= now { AuctionStatus::Active } else { AuctionStatus::Pending };
        Self {
            id: AuctionId::new(),
            owner_id,
            title: title.into(),
            start_price,
            current_price: start_price,
            bid_count: 0,
            start_time,
            end_time,
            status,
            winner_bid_id: None,
            winner_name: None,
            winner_email: None,
            profit_amount: None,
            platform_fee_amount: None,
            model_payout_amount: None,
            payout_status: PayoutStatus::Pending,
            extension_count: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the end time has passed.
    #[must_use]
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    /// Whether the closing sweep should pick this auction up.
    #[must_use]
    pub fn is_due_for_closing(&self, now: DateTime<Utc>) -> bool {
        self.status == AuctionStatus::Active && self.has_expired(now)
    }

    /// Minimum acceptable next bid: the start price for the first bid,
    /// otherwise the current price plus the tiered increment.
    #[must_use]
    pub fn minimum_next_bid(&self, config: &AuctionConfig) -> u64 {
        if self.bid_count == 0 {
            self.start_price
        } else {
            self.current_price.saturating_add(config.bid_step_for(self.current_price))
        }
    }

    /// Moves the auction to `next`, rejecting transitions outside the table.
    pub fn transition_to(&mut self, next: AuctionStatus, now: DateTime<Utc>) -> AuctionResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AuctionError::InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Completes the auction with the captured bid and its settlement.
    /// Winner and settlement fields are written exactly once.
    pub fn record_completion(
        &mut self, winning_bid: &Bid, settlement: &Settlement, now: DateTime<Utc>,
    ) -> AuctionResult<()> {
        if self.winner_bid_id.is_some() {
            return Err(AuctionError::AlreadySettled(self.id.to_string()));
        }
        self.transition_to(AuctionStatus::Completed, now)?;
        self.winner_bid_id = Some(winning_bid.id.clone());
        self.winner_name = Some(winning_bid.bidder.name.clone());
        self.winner_email = Some(winning_bid.bidder.email.clone());
        self.profit_amount = Some(settlement.profit);
        self.platform_fee_amount = Some(settlement.platform_fee);
        self.model_payout_amount = Some(settlement.payout);
        self.payout_status = PayoutStatus::Pending;
        Ok(())
    }
}

/// Video confirmation gating payout release.
///
/// An uploaded video must be watched before payout; an auction with no
/// upload at all is never blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConfirmation {
    /// Auction the video belongs to
    pub auction_id:         AuctionId,
    /// When the video was uploaded
    pub uploaded_at:        Option<DateTime<Utc>>,
    /// When the buyer confirmed watching it
    pub watched_at:         Option<DateTime<Utc>>,
    /// When the watch confirmation unlocked payout
    pub payout_unlocked_at: Option<DateTime<Utc>>,
}

impl VideoConfirmation {
    pub fn new(auction_id: AuctionId) -> Self {
        Self { auction_id, uploaded_at: None, watched_at: None, payout_unlocked_at: None }
    }

    /// Whether this confirmation currently blocks payout.
    #[must_use]
    pub fn blocks_payout(&self) -> bool {
        self.uploaded_at.is_some() && self.watched_at.is_none()
    }

    /// Records the upload. First call wins.
    pub fn mark_uploaded(&mut self, now: DateTime<Utc>) {
        if self.uploaded_at.is_none() {
            self.uploaded_at = Some(now);
        }
    }

    /// Records the watch confirmation. Idempotent: repeated calls keep the
    /// first recorded timestamps. `payout_unlocked_at` is only stamped when
    /// an upload exists.
    pub fn mark_watched(&mut self, now: DateTime<Utc>) {
        if self.watched_at.is_some() {
            return;
        }
        self.watched_at = Some(now);
        if self.uploaded_at.is_some() {
            self.payout_unlocked_at = Some(now);
        }
    }
}
