//! Journal posting, reversal and period lock against PostgreSQL.
//!
//! Run with `cargo test -p tally-db -- --ignored` and a reachable
//! `DATABASE_URL`.

mod common;

use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use uuid::Uuid;

use common::{Shop, connect, date};
use tally_core::ledger::{ItemLine, LedgerError};
use tally_db::entities::{journal_entries, journal_items, sea_orm_active_enums::EntryStatus};
use tally_db::repositories::{CreateEntryInput, UpdateEntryInput};
use tally_db::{ChartRepository, JournalRepository};

async fn draft(journal: &JournalRepository, shop: &Shop, day: u32) -> journal_entries::Model {
    journal
        .create_draft(CreateEntryInput {
            ledger_id: shop.ledger_id,
            number: None,
            date: date(2026, 3, day),
            description: "Cash sale".to_string(),
        })
        .await
        .unwrap()
}

async fn balanced_entry(journal: &JournalRepository, shop: &Shop) -> journal_entries::Model {
    let entry = draft(journal, shop, 10).await;
    journal
        .add_item(entry.id, ItemLine::debit(shop.cash, dec!(100), None))
        .await
        .unwrap();
    journal
        .add_item(entry.id, ItemLine::credit(shop.revenue, dec!(100), None))
        .await
        .unwrap();
    entry
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_numbers_are_sequential_per_ledger() {
    let db = connect().await;
    let shop = Shop::create(&db).await;
    let journal = JournalRepository::new(db.clone());

    let first = draft(&journal, &shop, 1).await;
    let second = draft(&journal, &shop, 2).await;
    assert_eq!(first.number, 1);
    assert_eq!(second.number, 2);

    let err = journal
        .create_draft(CreateEntryInput {
            ledger_id: shop.ledger_id,
            number: Some(2),
            date: date(2026, 3, 3),
            description: "Taken".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateNumber(2)));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_post_twice_fails_without_change() {
    let db = connect().await;
    let shop = Shop::create(&db).await;
    let journal = JournalRepository::new(db.clone());

    let entry = balanced_entry(&journal, &shop).await;
    let posted = journal.post(entry.id, "alice", Utc::now()).await.unwrap();
    assert_eq!(posted.status, EntryStatus::Posted);
    assert_eq!(posted.posted_by.as_deref(), Some("alice"));

    let err = journal.post(entry.id, "bob", Utc::now()).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotDraft { .. }));

    let reloaded = journal.get_entry(entry.id).await.unwrap();
    assert_eq!(reloaded.entry.posted_by.as_deref(), Some("alice"));
    assert_eq!(reloaded.items.len(), 2);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_unbalanced_and_empty_entries_do_not_post() {
    let db = connect().await;
    let shop = Shop::create(&db).await;
    let journal = JournalRepository::new(db.clone());

    let empty = draft(&journal, &shop, 4).await;
    let err = journal.post(empty.id, "alice", Utc::now()).await.unwrap_err();
    assert!(matches!(err, LedgerError::EmptyEntry(_)));

    let lopsided = draft(&journal, &shop, 5).await;
    journal
        .add_item(lopsided.id, ItemLine::debit(shop.cash, dec!(100), None))
        .await
        .unwrap();
    journal
        .add_item(lopsided.id, ItemLine::credit(shop.revenue, dec!(99.99), None))
        .await
        .unwrap();
    let err = journal.post(lopsided.id, "alice", Utc::now()).await.unwrap_err();
    assert!(matches!(err, LedgerError::Unbalanced { .. }));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_two_sided_item_is_rejected() {
    let db = connect().await;
    let shop = Shop::create(&db).await;
    let journal = JournalRepository::new(db.clone());

    let entry = draft(&journal, &shop, 6).await;
    let err = journal
        .add_item(
            entry.id,
            ItemLine {
                account_id: shop.cash,
                debit: dec!(10),
                credit: dec!(10),
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmountShape { .. }));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_reversal_mirrors_posted_entry() {
    let db = connect().await;
    let shop = Shop::create(&db).await;
    let journal = JournalRepository::new(db.clone());

    let entry = balanced_entry(&journal, &shop).await;
    journal.post(entry.id, "alice", Utc::now()).await.unwrap();

    let reversal = journal
        .reverse(entry.id, date(2026, 3, 11), "alice", Utc::now())
        .await
        .unwrap();
    assert_eq!(reversal.status, EntryStatus::Posted);
    assert!(reversal.is_reversal);
    assert_eq!(reversal.reversed_entry_id, Some(entry.id));
    assert_eq!(reversal.description, format!("Reversal of entry #{}", entry.number));

    let mirrored = journal.get_entry(reversal.id).await.unwrap();
    let cash = mirrored.items.iter().find(|i| i.account_id == shop.cash).unwrap();
    let revenue = mirrored
        .items
        .iter()
        .find(|i| i.account_id == shop.revenue)
        .unwrap();
    assert_eq!((cash.debit, cash.credit), (dec!(0), dec!(100)));
    assert_eq!((revenue.debit, revenue.credit), (dec!(100), dec!(0)));

    let original = journal.get_entry(entry.id).await.unwrap();
    assert_eq!(original.entry.status, EntryStatus::Posted);
    let found = journal.find_reversal(entry.id).await.unwrap();
    assert_eq!(found.map(|e| e.id), Some(reversal.id));

    let again = journal
        .reverse(entry.id, date(2026, 3, 12), "alice", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(again, LedgerError::AlreadyReversed(_)));

    let of_reversal = journal
        .reverse(reversal.id, date(2026, 3, 12), "alice", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(of_reversal, LedgerError::CannotReverseReversal(_)));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_closed_period_blocks_posting_and_later_saves() {
    let db = connect().await;
    let shop = Shop::create(&db).await;
    let chart = ChartRepository::new(db.clone());
    let journal = JournalRepository::new(db.clone());

    let posted = balanced_entry(&journal, &shop).await;
    journal.post(posted.id, "alice", Utc::now()).await.unwrap();
    let pending = balanced_entry(&journal, &shop).await;

    chart.close_period(shop.period_id, Utc::now()).await.unwrap();

    let err = journal.post(pending.id, "alice", Utc::now()).await.unwrap_err();
    assert!(matches!(err, LedgerError::PeriodClosed { .. }));

    // Already posted entries stay posted but can no longer be saved.
    let still = journal.get_entry(posted.id).await.unwrap();
    assert_eq!(still.entry.status, EntryStatus::Posted);
    let err = journal
        .update_entry(
            posted.id,
            UpdateEntryInput {
                date: None,
                description: Some("Edited".to_string()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::PeriodClosed { .. }));

    chart.reopen_period(shop.period_id).await.unwrap();
    let posted_now = journal.post(pending.id, "alice", Utc::now()).await.unwrap();
    assert_eq!(posted_now.status, EntryStatus::Posted);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_void_and_delete_rules() {
    let db = connect().await;
    let shop = Shop::create(&db).await;
    let journal = JournalRepository::new(db.clone());

    let posted = balanced_entry(&journal, &shop).await;
    journal.post(posted.id, "alice", Utc::now()).await.unwrap();
    assert!(matches!(
        journal.void(posted.id).await.unwrap_err(),
        LedgerError::CannotVoidPosted(_)
    ));
    assert!(matches!(
        journal.delete(posted.id).await.unwrap_err(),
        LedgerError::CannotDeletePosted(_)
    ));

    let voided = balanced_entry(&journal, &shop).await;
    let voided = journal.void(voided.id).await.unwrap();
    assert_eq!(voided.status, EntryStatus::Void);
    assert!(matches!(
        journal.void(voided.id).await.unwrap_err(),
        LedgerError::AlreadyVoided(_)
    ));
    assert!(matches!(
        journal
            .add_item(voided.id, ItemLine::debit(shop.cash, dec!(1), None))
            .await
            .unwrap_err(),
        LedgerError::EntryNotDraft { .. }
    ));

    let removable = balanced_entry(&journal, &shop).await;
    journal.delete(removable.id).await.unwrap();
    assert!(matches!(
        journal.get_entry(removable.id).await.unwrap_err(),
        LedgerError::EntryNotFound(_)
    ));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_trial_balance_over_posted_entries() {
    let db = connect().await;
    let shop = Shop::create(&db).await;
    let journal = JournalRepository::new(db.clone());

    let posted = balanced_entry(&journal, &shop).await;
    journal.post(posted.id, "alice", Utc::now()).await.unwrap();
    // Drafts are ignored.
    balanced_entry(&journal, &shop).await;

    let trial_balance = journal
        .trial_balance(shop.ledger_id, Some(date(2026, 1, 1)), Some(date(2026, 12, 31)))
        .await
        .unwrap();
    assert_eq!(trial_balance.total_debit, dec!(100));
    assert_eq!(trial_balance.total_credit, dec!(100));
    assert!(trial_balance.difference.is_zero());
    assert_eq!(trial_balance.rows.len(), 2);

    let cash = journal
        .account_balance(shop.cash, date(2026, 12, 31))
        .await
        .unwrap();
    assert_eq!(cash.balance, dec!(100));
    let revenue = journal
        .account_balance(shop.revenue, date(2026, 12, 31))
        .await
        .unwrap();
    assert_eq!(revenue.balance, dec!(100));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_triggers_guard_posted_entries() {
    let db = connect().await;
    let shop = Shop::create(&db).await;
    let journal = JournalRepository::new(db.clone());

    let entry = balanced_entry(&journal, &shop).await;
    let posted = journal.post(entry.id, "alice", Utc::now()).await.unwrap();

    let mut redate: journal_entries::ActiveModel = posted.clone().into();
    redate.date = Set(date(2026, 4, 1));
    let err = redate.update(&db).await.unwrap_err();
    assert!(err.to_string().contains("POSTED_ENTRY_IMMUTABLE"));

    let err = journal_entries::Entity::delete_by_id(posted.id)
        .exec(&db)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("POSTED_ENTRY_UNDELETABLE"));

    let err = journal_items::ActiveModel {
        id: Set(Uuid::now_v7()),
        entry_id: Set(posted.id),
        account_id: Set(shop.cash),
        debit: Set(dec!(5)),
        credit: Set(dec!(0)),
        description: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(&db)
    .await
    .unwrap_err();
    assert!(err.to_string().contains("ENTRY_NOT_DRAFT"));
}
