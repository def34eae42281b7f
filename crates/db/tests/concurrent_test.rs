//! Concurrent access tests for stock consumption, reservations and entry
//! numbering.
//!
//! Every task waits on a barrier and then races for the same
//! (warehouse, item) key or the same ledger. The lot and ledger row locks
//! must serialize them so nothing is over-consumed and no number repeats.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;

use common::{Shop, connect, date};
use tally_core::stock::{LineRequest, MovePurpose, StockError};
use tally_db::repositories::{CreateEntryInput, ReserveInput, StockOutInput};
use tally_db::{JournalRepository, ReservationRepository, StockRepository};

const TASKS: usize = 20;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires PostgreSQL"]
async fn test_concurrent_outs_never_over_consume() {
    let db = connect().await;
    let shop = Shop::create(&db).await;
    let stock = StockRepository::new(db.clone());

    shop.receive(&stock, shop.store, dec!(4), dec!(2.00), 1).await;
    shop.receive(&stock, shop.store, dec!(6), dec!(3.00), 2).await;

    let barrier = Arc::new(Barrier::new(TASKS));
    let handles = (0..TASKS).map(|i| {
        let stock = stock.clone();
        let barrier = Arc::clone(&barrier);
        let input = StockOutInput {
            warehouse_id: shop.store,
            lines: vec![LineRequest {
                item_id: shop.item,
                quantity: dec!(1),
            }],
            move_date: date(2026, 2, 1),
            reference: Some(format!("POS-{i}")),
            purpose: Some(MovePurpose::Consumption),
            reservation_id: None,
        };
        tokio::spawn(async move {
            barrier.wait().await;
            stock.post_out(input).await
        })
    });

    let mut consumed = Decimal::ZERO;
    let mut rejected = 0;
    for result in join_all(handles).await {
        match result.expect("task panicked") {
            Ok(detail) => {
                consumed += detail
                    .lines
                    .iter()
                    .flat_map(|l| l.allocations.iter())
                    .map(|a| a.qty)
                    .sum::<Decimal>();
            }
            Err(StockError::InsufficientStock { .. }) => rejected += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(consumed, dec!(10));
    assert_eq!(rejected, TASKS - 10);
    assert_eq!(stock.on_hand(shop.store, shop.item).await.unwrap(), dec!(0));

    let lots = stock.lots(shop.store, shop.item).await.unwrap();
    assert!(lots.iter().all(|lot| lot.qty_remaining.is_zero()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires PostgreSQL"]
async fn test_concurrent_reservations_respect_on_hand() {
    let db = connect().await;
    let shop = Shop::create(&db).await;
    let stock = StockRepository::new(db.clone());
    let reservations = ReservationRepository::new(db.clone());

    shop.receive(&stock, shop.store, dec!(5), dec!(1.00), 1).await;

    let barrier = Arc::new(Barrier::new(TASKS));
    let handles = (0..TASKS).map(|i| {
        let reservations = reservations.clone();
        let barrier = Arc::clone(&barrier);
        let input = ReserveInput {
            warehouse_id: shop.store,
            item_id: shop.item,
            quantity: dec!(1),
            source_type: Some("order".to_string()),
            source_id: Some(format!("SO-{i}")),
        };
        tokio::spawn(async move {
            barrier.wait().await;
            reservations.reserve(input).await
        })
    });

    let results = join_all(handles).await;
    let granted = results
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .filter(|r| match r {
            Ok(_) => true,
            Err(StockError::InsufficientAvailableStock { .. }) => false,
            Err(e) => panic!("unexpected error: {e}"),
        })
        .count();

    assert_eq!(granted, 5);
    let availability = stock.available(shop.store, shop.item).await.unwrap();
    assert_eq!(availability.reserved, dec!(5));
    assert_eq!(availability.available, dec!(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires PostgreSQL"]
async fn test_concurrent_drafts_get_distinct_numbers() {
    let db = connect().await;
    let shop = Shop::create(&db).await;
    let journal = JournalRepository::new(db.clone());

    let barrier = Arc::new(Barrier::new(TASKS));
    let handles = (0..TASKS).map(|i| {
        let journal = journal.clone();
        let barrier = Arc::clone(&barrier);
        let input = CreateEntryInput {
            ledger_id: shop.ledger_id,
            number: None,
            date: date(2026, 2, 1),
            description: format!("Draft {i}"),
        };
        tokio::spawn(async move {
            barrier.wait().await;
            journal.create_draft(input).await
        })
    });

    let numbers: HashSet<i64> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked").expect("draft created").number)
        .collect();

    let expected: HashSet<i64> = (1..=i64::try_from(TASKS).unwrap()).collect();
    assert_eq!(numbers, expected);
}
