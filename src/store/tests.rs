#![allow(clippy::unwrap_used)]

use super::*;
use crate::models::{Category, DraftReceipt, LineItem, Receipt, ReceiptDate};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal_macros::dec;

fn alice() -> UserId {
    UserId::new("alice")
}

fn receipt_row(merchant: &str) -> ReceiptRow {
    let date = ReceiptDate::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    let mut draft = DraftReceipt::new(
        merchant,
        date,
        "Supplies",
        dec!(42.50),
        vec![LineItem::new("Ink", dec!(30.00)).with_quantity(2)],
    );
    draft.discount = Some(dec!(1.25));
    draft.payment_method = Some("Visa".into());
    draft.image_url = Some("data:image/png;base64,AAAA".into());
    ReceiptRow::from(&Receipt::from_draft(draft, Utc::now()))
}

fn category_row(label: &str) -> CategoryRow {
    CategoryRow::from(&Category::new(label.into(), "#558E00".into(), Utc::now()))
}

// ── Row transform ─────────────────────────────────────────────

#[test]
fn test_receipt_row_roundtrip() {
    let row = receipt_row("Staples");
    let receipt = Receipt::try_from(row.clone()).unwrap();
    assert_eq!(ReceiptRow::from(&receipt), row);
}

#[test]
fn test_receipt_row_uses_snake_case_fields() {
    let mut row = receipt_row("Staples");
    row.folder_id = Some(category_row("Business").id);
    let json = serde_json::to_value(&row).unwrap();
    assert!(json.get("folder_id").is_some());
    assert!(json.get("image_url").is_some());
    assert!(json.get("payment_method").is_some());
    assert!(json.get("updated_at").is_some());
    assert!(json.get("folderId").is_none());
}

#[test]
fn test_receipt_row_rejects_bad_date() {
    let mut row = receipt_row("Staples");
    row.date = "Jan 15, 2024".into();
    assert!(Receipt::try_from(row).is_err());
}

#[test]
fn test_receipt_row_clamps_score() {
    let mut row = receipt_row("Staples");
    row.score = 250;
    assert_eq!(Receipt::try_from(row).unwrap().score(), 100);
}

#[test]
fn test_category_row_roundtrip() {
    let row = category_row("Clients");
    let cat = Category::try_from(row.clone()).unwrap();
    assert_eq!(cat.label, "Clients");
    assert_eq!(CategoryRow::from(&cat), row);
}

// ── MemoryStore ───────────────────────────────────────────────

#[tokio::test]
async fn test_memory_insert_and_load() {
    let store = MemoryStore::new();
    let user = alice();
    store.insert_receipt(&user, &receipt_row("A")).await.unwrap();
    store.insert_receipt(&user, &receipt_row("B")).await.unwrap();

    let rows = store.load_receipts(&user).await.unwrap();
    let merchants: Vec<&str> = rows.iter().map(|r| r.merchant.as_str()).collect();
    assert_eq!(merchants, vec!["A", "B"]);
}

#[tokio::test]
async fn test_memory_partitions_by_user() {
    let store = MemoryStore::new();
    store.insert_category(&alice(), &category_row("Mine")).await.unwrap();
    let bob = UserId::new("bob");
    assert!(store.load_categories(&bob).await.unwrap().is_empty());
    assert_eq!(store.load_categories(&alice()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_memory_update_missing_fails() {
    let store = MemoryStore::new();
    assert!(store.update_receipt(&alice(), &receipt_row("A")).await.is_err());
    assert!(store.update_category(&alice(), &category_row("C")).await.is_err());
}

#[tokio::test]
async fn test_memory_injected_failures() {
    let store = MemoryStore::new();
    store.fail_next_writes(1);
    assert!(store.insert_receipt(&alice(), &receipt_row("A")).await.is_err());
    assert!(store.receipt_rows(&alice()).is_empty());
    store.insert_receipt(&alice(), &receipt_row("A")).await.unwrap();
    assert_eq!(store.receipt_rows(&alice()).len(), 1);
}

#[tokio::test]
async fn test_memory_offline_fails_reads() {
    let store = MemoryStore::new();
    store.set_offline(true);
    assert!(store.load_receipts(&alice()).await.is_err());
    store.set_offline(false);
    assert!(store.load_receipts(&alice()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_memory_cascade_unsorts_members() {
    let store = MemoryStore::new();
    let user = alice();
    let cat = category_row("Trips");
    store.insert_category(&user, &cat).await.unwrap();
    let mut r1 = receipt_row("Hotel");
    r1.folder_id = Some(cat.id.clone());
    let r2 = receipt_row("Loose");
    store.insert_receipt(&user, &r1).await.unwrap();
    store.insert_receipt(&user, &r2).await.unwrap();

    let stamp = Utc::now() + Duration::seconds(10);
    store.delete_category_cascade(&user, &cat.id, stamp).await.unwrap();

    assert!(store.category_rows(&user).is_empty());
    let rows = store.receipt_rows(&user);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.folder_id.is_none()));
    assert_eq!(rows[0].updated_at, stamp);
    assert_ne!(rows[1].updated_at, stamp);
}

#[tokio::test]
async fn test_memory_cascade_unknown_category_fails() {
    let store = MemoryStore::new();
    assert!(store
        .delete_category_cascade(&alice(), "missing", Utc::now())
        .await
        .is_err());
}

#[tokio::test]
async fn test_memory_insert_categories_all_or_nothing() {
    let store = MemoryStore::new();
    let existing = category_row("Business");
    store.insert_category(&alice(), &existing).await.unwrap();

    let batch = [category_row("Personal"), existing.clone()];
    assert!(store.insert_categories(&alice(), &batch).await.is_err());
    assert_eq!(store.category_rows(&alice()).len(), 1);

    store.fail_next_writes(1);
    let batch = [category_row("Travel"), category_row("Meals")];
    assert!(store.insert_categories(&alice(), &batch).await.is_err());
    store.insert_categories(&alice(), &batch).await.unwrap();
    let labels: Vec<String> = store
        .category_rows(&alice())
        .into_iter()
        .map(|c| c.label)
        .collect();
    assert_eq!(labels, vec!["Business", "Travel", "Meals"]);
}

// ── SqliteStore ───────────────────────────────────────────────

#[tokio::test]
async fn test_sqlite_receipt_roundtrip() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = alice();
    let row = receipt_row("Office Depot");
    store.insert_receipt(&user, &row).await.unwrap();

    let loaded = store.load_receipts(&user).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].merchant, "Office Depot");
    assert_eq!(loaded[0].amount, dec!(42.50));
    assert_eq!(loaded[0].discount, Some(dec!(1.25)));
    assert_eq!(loaded[0].items, row.items);
    assert_eq!(loaded[0].items[0].quantity, Some(2));
    assert_eq!(loaded[0].date, "2024-01-15");
}

#[tokio::test]
async fn test_sqlite_update_and_delete() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = alice();
    let cat = category_row("Business");
    store.insert_category(&user, &cat).await.unwrap();
    let mut row = receipt_row("Staples");
    store.insert_receipt(&user, &row).await.unwrap();

    row.folder_id = Some(cat.id.clone());
    row.tip = Some(dec!(2));
    store.update_receipt(&user, &row).await.unwrap();
    let loaded = store.load_receipts(&user).await.unwrap();
    assert_eq!(loaded[0].folder_id.as_deref(), Some(cat.id.as_str()));
    assert_eq!(loaded[0].tip, Some(dec!(2)));

    store.delete_receipt(&user, &row.id).await.unwrap();
    assert!(store.load_receipts(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sqlite_update_missing_fails() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(store.update_receipt(&alice(), &receipt_row("A")).await.is_err());
    assert!(store.update_category(&alice(), &category_row("C")).await.is_err());
}

#[tokio::test]
async fn test_sqlite_partitions_by_user() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.insert_receipt(&alice(), &receipt_row("A")).await.unwrap();
    let bob = UserId::new("bob");
    assert!(store.load_receipts(&bob).await.unwrap().is_empty());
    // bob cannot update alice's row
    let row = store.load_receipts(&alice()).await.unwrap().remove(0);
    assert!(store.update_receipt(&bob, &row).await.is_err());
}

#[tokio::test]
async fn test_sqlite_cascade_is_atomic() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = alice();
    let cat = category_row("Trips");
    store.insert_category(&user, &cat).await.unwrap();
    let mut r1 = receipt_row("Hilton");
    r1.folder_id = Some(cat.id.clone());
    store.insert_receipt(&user, &r1).await.unwrap();

    store
        .delete_category_cascade(&user, &cat.id, Utc::now())
        .await
        .unwrap();
    assert!(store.load_categories(&user).await.unwrap().is_empty());
    let rows = store.load_receipts(&user).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].folder_id.is_none());

    // a second cascade on the same id finds nothing and changes nothing
    assert!(store
        .delete_category_cascade(&user, &cat.id, Utc::now())
        .await
        .is_err());
}

#[tokio::test]
async fn test_sqlite_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reseet.db");
    let user = alice();
    {
        let store = SqliteStore::open(&path).unwrap();
        store.insert_category(&user, &category_row("Business")).await.unwrap();
        store.insert_receipt(&user, &receipt_row("Staples")).await.unwrap();
    }
    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.load_categories(&user).await.unwrap()[0].label, "Business");
    assert_eq!(store.load_receipts(&user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sqlite_insert_categories_all_or_nothing() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = alice();
    let existing = category_row("Business");
    store.insert_category(&user, &existing).await.unwrap();

    let batch = [category_row("Personal"), existing.clone()];
    assert!(store.insert_categories(&user, &batch).await.is_err());
    assert_eq!(store.load_categories(&user).await.unwrap().len(), 1);

    let batch = [category_row("Travel"), category_row("Meals")];
    store.insert_categories(&user, &batch).await.unwrap();
    assert_eq!(store.load_categories(&user).await.unwrap().len(), 3);
}

#[test]
fn test_sqlite_refuses_newer_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reseet.db");
    drop(SqliteStore::open(&path).unwrap());
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.pragma_update(None, "user_version", 2).unwrap();
    }
    let err = SqliteStore::open(&path).err().unwrap();
    assert!(format!("{err:#}").contains("newer than supported"));
}
