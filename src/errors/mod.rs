//! Error types for the auction settlement plugin.

use thiserror::Error;

use crate::auction::{AuctionStatus, AuthorizationStatus};

/// Auction lifecycle and bidding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    /// Bid amount is below the minimum acceptable next bid.
    #[error("bid too low: next acceptable bid is {minimum}")]
    BidTooLow {
        /// Minimum acceptable bid amount (AED).
        minimum: u64,
    },
    /// Auction is not accepting bids.
    #[error("auction is not active")]
    AuctionNotActive,
    /// Auction end time has passed, even if its status has not flipped yet.
    #[error("auction has expired")]
    AuctionExpired,
    /// Auction not found.
    #[error("auction not found: {0}")]
    AuctionNotFound(String),
    /// Illegal auction status transition.
    #[error("illegal auction transition: {from} -> {to}")]
    InvalidTransition {
        /// Status the auction is in.
        from: AuctionStatus,
        /// Status the transition asked for.
        to:   AuctionStatus,
    },
    /// Authorization holds only move forward (held -> captured|released|failed).
    #[error("illegal authorization transition: {from} -> {to}")]
    InvalidAuthorizationTransition {
        /// Status the authorization is in.
        from: AuthorizationStatus,
        /// Status the transition asked for.
        to:   AuthorizationStatus,
    },
    /// Concurrent bidders kept invalidating the price snapshot.
    #[error("concurrent price update conflict")]
    PriceConflict,
    /// Winner and settlement fields are set exactly once.
    #[error("auction already settled: {0}")]
    AlreadySettled(String),
    /// Repair was asked for an auction that never completed.
    #[error("auction has no completed settlement to repair: {0}")]
    AuctionNotSettled(String),
    /// Auction with held bids can no longer be cancelled.
    #[error("auction has bids and cannot be cancelled")]
    AuctionHasBids,
    /// Invalid auction parameters.
    #[error("invalid auction: {0}")]
    InvalidAuction(String),
    /// Caller is not allowed to perform the operation.
    #[error("unauthorized")]
    Unauthorized,
    /// Durable store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Payment gateway error.
    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Why an auction cannot be part of a payout request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibilityReason {
    /// No such auction.
    NotFound,
    /// Auction has not completed.
    NotCompleted,
    /// Auction payout is not pending (already requested or settled).
    PayoutNotPending,
    /// Auction belongs to a different owner.
    NotOwned,
}

impl std::fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "auction not found"),
            Self::NotCompleted => write!(f, "auction not completed"),
            Self::PayoutNotPending => write!(f, "payout not pending"),
            Self::NotOwned => write!(f, "not owned by requester"),
        }
    }
}

/// Payout request and transfer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayoutError {
    /// Requested total is below the configured minimum.
    #[error("requested total {total} is below the minimum payout of {minimum}")]
    BelowMinimum {
        /// Sum of the selected auctions' payout amounts (AED).
        total:   u64,
        /// Configured minimum payout amount (AED).
        minimum: u64,
    },
    /// An uploaded confirmation video has not been watched yet.
    #[error("confirmation video for auction {0} has not been watched")]
    VideoNotWatched(String),
    /// A selected auction does not qualify for payout.
    #[error("auction {auction_id} is not eligible for payout: {reason}")]
    NotEligible {
        /// The offending auction.
        auction_id: String,
        /// The specific unmet condition.
        reason:     IneligibilityReason,
    },
    /// No auctions were selected.
    #[error("no auctions selected for payout")]
    EmptySelection,
    /// Payout record not found.
    #[error("payout record not found: {0}")]
    PayoutNotFound(String),
    /// Durable store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Durable store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store lock acquisition failed.
    #[error("failed to acquire store lock")]
    LockPoisoned,
    /// Insert collided with an existing record.
    #[error("duplicate record: {0}")]
    DuplicateRecord(String),
    /// Update targeted a record that does not exist.
    #[error("record not found: {0}")]
    RecordNotFound(String),
}

/// Payment gateway transport errors. A decline is a capture outcome, not an
/// error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Gateway could not be reached or returned an unexpected response.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    /// The gateway does not know the authorization handle.
    #[error("unknown authorization: {0}")]
    UnknownAuthorization(String),
}

/// Result type for auction operations.
pub type AuctionResult<T> = Result<T, AuctionError>;

/// Result type for payout operations.
pub type PayoutResult<T> = Result<T, PayoutError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
