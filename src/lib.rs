//! # Souq Auction Plugin
//!
//! Implements the timed-auction settlement engine for the marketplace
//! platform: bid validation and ordering, anti-sniping end-time extension,
//! payment capture with runner-up fallback, profit-based fee splitting, and
//! payout release gated on post-auction video confirmation.

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(missing_docs)]

pub mod auction;
pub mod errors;
pub mod gateway;
pub mod service;
pub mod settlement;
pub mod store;
pub mod types;

// Re-exports for public API
pub use service::AuctionService;
pub use types::AuctionConfig;
