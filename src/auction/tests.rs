//! # Bidding Tests
//!
//! Covers bid validation, price monotonicity, the tiered increment table,
//! the anti-sniping extension, and concurrent placement behavior.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    auction::{
        ledger::BidLedger, Auction, AuctionId, AuctionStatus, BidStatus, BidderInfo, OwnerId,
    },
    errors::AuctionError,
    gateway::AuthorizationId,
    store::{AuctionStore, MemoryStore},
    types::AuctionConfig,
};

fn open_auction(store: &MemoryStore, start_price: u64, now: DateTime<Utc>) -> Auction {
    let auction = Auction::new(
        OwnerId::new("owner-1"),
        "Signed print",
        start_price,
        now - Duration::minutes(30),
        now + Duration::hours(1),
        now,
    );
    store.insert_auction(auction.clone()).expect("insert auction");
    auction
}

fn ledger(store: Arc<MemoryStore>) -> BidLedger {
    BidLedger::new(store, AuctionConfig::default())
}

fn bidder(name: &str) -> BidderInfo {
    BidderInfo::guest(name, format!("{}@example.com", name.to_lowercase()))
}

fn auth(tag: &str) -> AuthorizationId {
    AuthorizationId::new(format!("auth-{}", tag))
}

#[test]
fn test_first_bid_at_start_price_accepted() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let auction = open_auction(&store, 100, now);
    let ledger = ledger(store.clone());

    let receipt =
        ledger.place_bid(&auction.id, bidder("Amal"), 100, auth("a"), now).expect("accepted");
    assert_eq!(receipt.current_price, 100);
    assert_eq!(receipt.bid.status, BidStatus::Winning);

    let stored = store.auction(&auction.id).expect("get").expect("present");
    assert_eq!(stored.current_price, 100);
    assert_eq!(stored.bid_count, 1);
}

#[test]
fn test_first_bid_below_start_price_rejected() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let auction = open_auction(&store, 100, now);
    let ledger = ledger(store.clone());

    let err =
        ledger.place_bid(&auction.id, bidder("Amal"), 99, auth("a"), now).expect_err("too low");
    assert_eq!(err, AuctionError::BidTooLow { minimum: 100 });
}

#[test]
fn test_bid_below_tiered_minimum_rejected_and_exact_minimum_accepted() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let auction = open_auction(&store, 100, now);
    let ledger = ledger(store.clone());

    ledger.place_bid(&auction.id, bidder("Amal"), 100, auth("a"), now).expect("first");

    // Current price 100 sits in the +5 tier.
    let err = ledger
        .place_bid(&auction.id, bidder("Badr"), 104, auth("b"), now)
        .expect_err("below minimum");
    assert_eq!(err, AuctionError::BidTooLow { minimum: 105 });

    let receipt =
        ledger.place_bid(&auction.id, bidder("Badr"), 105, auth("b"), now).expect("exact minimum");
    assert_eq!(receipt.current_price, 105);
}

#[test]
fn test_minimum_next_bid_follows_step_tiers() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let config = AuctionConfig::default();

    for (price, expected) in [(500, 505), (1_200, 1_210), (3_000, 3_025), (7_000, 7_050), (20_000, 20_100)] {
        let mut auction = open_auction(&store, 100, now);
        auction.current_price = price;
        auction.bid_count = 1;
        assert_eq!(auction.minimum_next_bid(&config), expected);
    }
}

#[test]
fn test_current_price_non_decreasing_and_tracks_last_accepted() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let auction = open_auction(&store, 100, now);
    let ledger = ledger(store.clone());

    let mut last_price = 0;
    for (i, amount) in [100u64, 110, 150, 400].iter().enumerate() {
        let receipt = ledger
            .place_bid(&auction.id, bidder("Amal"), *amount, auth(&i.to_string()), now)
            .expect("accepted");
        assert!(receipt.current_price >= last_price);
        last_price = receipt.current_price;
        let stored = store.auction(&auction.id).expect("get").expect("present");
        assert_eq!(stored.current_price, *amount);
    }
}

#[test]
fn test_bid_on_pending_auction_rejected() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let auction = Auction::new(
        OwnerId::new("owner-1"),
        "Not yet open",
        100,
        now + Duration::hours(1),
        now + Duration::hours(2),
        now,
    );
    assert_eq!(auction.status, AuctionStatus::Pending);
    store.insert_auction(auction.clone()).expect("insert");
    let ledger = ledger(store);

    let err = ledger
        .place_bid(&auction.id, bidder("Amal"), 100, auth("a"), now)
        .expect_err("not active");
    assert_eq!(err, AuctionError::AuctionNotActive);
}

#[test]
fn test_bid_after_expiry_rejected_even_while_status_still_active() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let auction = open_auction(&store, 100, now);
    let ledger = ledger(store.clone());

    let after_end = auction.end_time + Duration::seconds(1);
    let err = ledger
        .place_bid(&auction.id, bidder("Amal"), 100, auth("a"), after_end)
        .expect_err("expired");
    assert_eq!(err, AuctionError::AuctionExpired);
}

#[test]
fn test_unknown_auction_rejected() {
    let store = Arc::new(MemoryStore::new());
    let ledger = ledger(store);
    let err = ledger
        .place_bid(&AuctionId::new(), bidder("Amal"), 100, auth("a"), Utc::now())
        .expect_err("missing");
    assert!(matches!(err, AuctionError::AuctionNotFound(_)));
}

#[test]
fn test_previous_top_bid_marked_outbid() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let auction = open_auction(&store, 100, now);
    let ledger = ledger(store.clone());

    let first = ledger.place_bid(&auction.id, bidder("Amal"), 100, auth("a"), now).expect("first");
    let second =
        ledger.place_bid(&auction.id, bidder("Badr"), 200, auth("b"), now).expect("second");

    let bids = store.bids_for_auction(&auction.id).expect("bids");
    let first_stored = bids.iter().find(|b| b.id == first.bid.id).expect("first present");
    let second_stored = bids.iter().find(|b| b.id == second.bid.id).expect("second present");
    assert_eq!(first_stored.status, BidStatus::Outbid);
    assert_eq!(second_stored.status, BidStatus::Winning);
}

#[test]
fn test_bid_inside_trailing_window_extends_end_time() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let mut auction = open_auction(&store, 100, now);
    auction.end_time = now + Duration::seconds(30);
    store.update_auction(&auction, 0).expect("shrink window");
    let ledger = ledger(store.clone());

    let receipt =
        ledger.place_bid(&auction.id, bidder("Amal"), 100, auth("a"), now).expect("accepted");
    assert!(receipt.time_extended);
    assert_eq!(receipt.end_time, auction.end_time + Duration::seconds(60));

    let stored = store.auction(&auction.id).expect("get").expect("present");
    assert_eq!(stored.end_time, receipt.end_time);
    assert_eq!(stored.extension_count, 1);
}

#[test]
fn test_bid_outside_trailing_window_never_extends() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let auction = open_auction(&store, 100, now);
    let ledger = ledger(store.clone());

    let receipt =
        ledger.place_bid(&auction.id, bidder("Amal"), 100, auth("a"), now).expect("accepted");
    assert!(!receipt.time_extended);
    assert_eq!(receipt.end_time, auction.end_time);
}

#[test]
fn test_extension_cap_stops_further_extensions() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let mut auction = open_auction(&store, 100, now);
    auction.end_time = now + Duration::seconds(30);
    store.update_auction(&auction, 0).expect("shrink window");
    let config = AuctionConfig { max_extensions: Some(1), ..AuctionConfig::default() };
    let ledger = BidLedger::new(store.clone(), config);

    let first = ledger.place_bid(&auction.id, bidder("Amal"), 100, auth("a"), now).expect("first");
    assert!(first.time_extended);

    // Inside the trailing window of the extended end time, but the budget
    // is spent.
    let late = now + Duration::seconds(40);
    let second =
        ledger.place_bid(&auction.id, bidder("Badr"), 200, auth("b"), late).expect("second");
    assert!(!second.time_extended, "extension budget is exhausted");
    assert_eq!(second.end_time, first.end_time);
}

#[test]
fn test_leaderboard_ranks_by_amount_then_placement_time() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let auction = open_auction(&store, 100, now);
    let ledger = ledger(store.clone());

    ledger.place_bid(&auction.id, bidder("Amal"), 100, auth("a"), now).expect("first");
    ledger
        .place_bid(&auction.id, bidder("Badr"), 110, auth("b"), now + Duration::seconds(1))
        .expect("second");
    ledger
        .place_bid(&auction.id, bidder("Dana"), 150, auth("c"), now + Duration::seconds(2))
        .expect("third");

    let board = ledger.leaderboard(&auction.id, 10).expect("leaderboard");
    assert_eq!(board.len(), 3);
    assert_eq!(board[0].rank, 1);
    assert_eq!(board[0].bidder_name, "Dana");
    assert_eq!(board[0].amount, 150);
    assert_eq!(board[2].bidder_name, "Amal");
}

#[test]
fn test_ranked_bids_exclude_released_and_failed_holds() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let auction = open_auction(&store, 100, now);
    let ledger = ledger(store.clone());

    let low = ledger.place_bid(&auction.id, bidder("Amal"), 100, auth("a"), now).expect("first");
    let high = ledger
        .place_bid(&auction.id, bidder("Badr"), 200, auth("b"), now + Duration::seconds(1))
        .expect("second");

    let mut released = low.bid.clone();
    released
        .advance_authorization(crate::auction::AuthorizationStatus::Released)
        .expect("release");
    store.update_bid(&released).expect("update");

    let ranked = ledger.ranked_bids(&auction.id).expect("ranked");
    assert_eq!(ranked.len(), 1, "only held authorizations participate in capture");
    assert_eq!(ranked[0].id, high.bid.id);
}

#[test]
fn test_transition_table_rejects_illegal_moves() {
    let now = Utc::now();
    let mut auction = Auction::new(
        OwnerId::new("owner-1"),
        "Lot",
        100,
        now - Duration::minutes(1),
        now + Duration::hours(1),
        now,
    );
    assert_eq!(auction.status, AuctionStatus::Active);

    let err = auction.transition_to(AuctionStatus::Pending, now).expect_err("backwards");
    assert_eq!(
        err,
        AuctionError::InvalidTransition { from: AuctionStatus::Active, to: AuctionStatus::Pending }
    );

    auction.transition_to(AuctionStatus::Ended, now).expect("legal");
    let err = auction.transition_to(AuctionStatus::Completed, now).expect_err("terminal");
    assert_eq!(
        err,
        AuctionError::InvalidTransition { from: AuctionStatus::Ended, to: AuctionStatus::Completed }
    );
}

#[cfg(feature = "full-tests")]
#[test]
fn test_concurrent_bidders_never_lose_updates() {
    use std::thread;

    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let auction = open_auction(&store, 100, now);
    let ledger = Arc::new(BidLedger::new(store.clone(), AuctionConfig::default()));

    let amounts: Vec<u64> = (0..16).map(|i| 100 + i * 200).collect();
    let mut handles = Vec::new();
    for (i, amount) in amounts.iter().copied().enumerate() {
        let ledger = Arc::clone(&ledger);
        let auction_id = auction.id.clone();
        handles.push(thread::spawn(move || {
            ledger
                .place_bid(&auction_id, bidder("Racer"), amount, auth(&i.to_string()), now)
                .map(|receipt| receipt.current_price)
        }));
    }

    let accepted: Vec<u64> =
        handles.into_iter().filter_map(|h| h.join().expect("join").ok()).collect();
    assert!(!accepted.is_empty());

    let stored = store.auction(&auction.id).expect("get").expect("present");
    let max_accepted = accepted.iter().copied().max().expect("max");
    assert_eq!(stored.current_price, max_accepted);
    assert_eq!(stored.bid_count as usize, accepted.len());

    let winning: Vec<_> = store
        .bids_for_auction(&auction.id)
        .expect("bids")
        .into_iter()
        .filter(|b| b.status == BidStatus::Winning)
        .collect();
    assert_eq!(winning.len(), 1, "exactly one bid stays winning");
    assert_eq!(winning[0].amount, max_accepted);
}
