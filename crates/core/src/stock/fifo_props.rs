//! Property-based tests for FIFO consumption and availability.
//!
//! - Consumption conserves quantity: drawn + remaining == initial
//! - Allocations follow FIFO order and never exceed a lot
//! - The weighted unit cost lies within the consumed lots' cost range
//! - Reservations never push availability past on-hand stock

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::fifo::FifoPlanner;
use super::reservation::ReservationService;
use super::types::{LotSnapshot, ReservationSnapshot, StockKey};

/// Strategy for quantities between 0.0001 and 100.0000.
fn quantity() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|v| Decimal::new(v, 4))
}

/// Strategy for unit costs between 0.0001 and 50.0000.
fn unit_cost() -> impl Strategy<Value = Decimal> {
    (1i64..500_000i64).prop_map(|v| Decimal::new(v, 4))
}

fn lots_strategy() -> impl Strategy<Value = Vec<LotSnapshot>> {
    prop::collection::vec((0i64..30, quantity(), unit_cost()), 1..8).prop_map(|specs| {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        specs
            .into_iter()
            .map(|(day, qty, cost)| LotSnapshot {
                id: Uuid::now_v7(),
                received_at: base + Duration::days(day),
                unit_cost: cost,
                qty_remaining: qty,
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_consumption_conserves_quantity(lots in lots_strategy(), fraction in 1u32..=100u32) {
        let on_hand = FifoPlanner::on_hand(&lots);
        let requested = (on_hand * Decimal::from(fraction) / Decimal::from(100u32)).round_dp(4);
        prop_assume!(requested > Decimal::ZERO);

        let mut working = lots.clone();
        let plan = FifoPlanner::consume(&mut working, requested).unwrap();

        prop_assert_eq!(plan.quantity(), requested);
        prop_assert_eq!(FifoPlanner::on_hand(&working) + requested, on_hand);
        for lot in &working {
            prop_assert!(lot.qty_remaining >= Decimal::ZERO);
        }
    }

    #[test]
    fn prop_allocations_follow_fifo_order(lots in lots_strategy()) {
        let requested = FifoPlanner::on_hand(&lots);
        let mut working = lots;
        let plan = FifoPlanner::consume(&mut working, requested).unwrap();

        for pair in plan.allocations.windows(2) {
            let ordered = (pair[0].received_at, pair[0].lot_id) < (pair[1].received_at, pair[1].lot_id);
            prop_assert!(ordered);
        }
        // Drawing everything leaves every lot empty.
        let non_empty = working.iter().filter(|l| l.qty_remaining > Decimal::ZERO).count();
        prop_assert_eq!(non_empty, 0);
    }

    #[test]
    fn prop_unit_cost_within_range(lots in lots_strategy()) {
        let requested = FifoPlanner::on_hand(&lots);
        let mut working = lots.clone();
        let plan = FifoPlanner::consume(&mut working, requested).unwrap();
        let min = lots.iter().map(|l| l.unit_cost).min().unwrap();
        let max = lots.iter().map(|l| l.unit_cost).max().unwrap();
        prop_assert!(plan.unit_cost >= min && plan.unit_cost <= max);
    }

    #[test]
    fn prop_overdraw_never_allocates(lots in lots_strategy(), extra in quantity()) {
        let requested = FifoPlanner::on_hand(&lots) + extra;
        let mut working = lots.clone();
        prop_assert!(FifoPlanner::consume(&mut working, requested).is_err());
    }

    #[test]
    fn prop_successful_reservations_fit_on_hand(
        lots in lots_strategy(),
        requests in prop::collection::vec(quantity(), 1..12),
    ) {
        let key = StockKey::new(Uuid::from_u128(1), Uuid::from_u128(2));
        let mut reservations: Vec<ReservationSnapshot> = Vec::new();
        for qty in requests {
            let availability = ReservationService::availability(&lots, &reservations, None);
            if ReservationService::validate_reserve(key, qty, &availability).is_ok() {
                reservations.push(ReservationSnapshot {
                    id: Uuid::now_v7(),
                    key,
                    quantity: qty,
                    released: false,
                });
            }
        }
        let final_state = ReservationService::availability(&lots, &reservations, None);
        prop_assert!(final_state.reserved <= final_state.on_hand);
        prop_assert!(final_state.available >= Decimal::ZERO);
    }
}
