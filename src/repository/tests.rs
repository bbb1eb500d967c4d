#![allow(clippy::unwrap_used)]

use super::*;
use crate::models::{LineItem, ReceiptDate};
use crate::store::MemoryStore;
use chrono::Duration;
use rust_decimal_macros::dec;

fn user() -> UserId {
    UserId::new("u-1")
}

fn draft(merchant: &str, category: &str, day: u32) -> DraftReceipt {
    let date = ReceiptDate::new(NaiveDate::from_ymd_opt(2024, 1, day).unwrap());
    DraftReceipt::new(
        merchant,
        date,
        category,
        dec!(90),
        vec![LineItem::new("Printer paper", dec!(90))],
    )
}

async fn setup() -> (Arc<MemoryStore>, ReceiptRepository) {
    let store = Arc::new(MemoryStore::new());
    let repo = ReceiptRepository::load(store.clone(), user(), &EngineConfig::default())
        .await
        .unwrap();
    (store, repo)
}

fn stored_folder(store: &MemoryStore, id: ReceiptId) -> Option<String> {
    store
        .receipt_rows(&user())
        .into_iter()
        .find(|r| r.id == id.to_string())
        .unwrap()
        .folder_id
}

// ── Load & seeding ────────────────────────────────────────────

#[tokio::test]
async fn test_load_seeds_default_categories() {
    let (store, repo) = setup().await;
    let labels: Vec<&str> = repo.all_categories().iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["Business", "Personal"]);
    assert_eq!(store.category_rows(&user()).len(), 2);
}

#[tokio::test]
async fn test_load_does_not_reseed() {
    let (store, mut repo) = setup().await;
    repo.create_receipt(draft("Staples", "Supplies", 2)).await.unwrap();
    let again = ReceiptRepository::load(store.clone(), user(), &EngineConfig::default())
        .await
        .unwrap();
    assert_eq!(again.all_categories().len(), 2);
    assert_eq!(again.all_receipts().len(), 1);
    assert_eq!(again.all_receipts()[0].merchant, "Staples");
}

#[tokio::test]
async fn test_load_offline_is_persist_failure() {
    let store = Arc::new(MemoryStore::new());
    store.set_offline(true);
    let result = ReceiptRepository::load(store, user(), &EngineConfig::default()).await;
    assert!(matches!(result, Err(Error::PersistFailed(_))));
}

#[tokio::test]
async fn test_failed_seed_stores_nothing_and_retries() {
    let store = Arc::new(MemoryStore::new());
    store.fail_next_writes(1);
    let result = ReceiptRepository::load(store.clone(), user(), &EngineConfig::default()).await;
    assert!(matches!(result, Err(Error::PersistFailed(_))));
    assert!(store.category_rows(&user()).is_empty());

    let repo = ReceiptRepository::load(store.clone(), user(), &EngineConfig::default())
        .await
        .unwrap();
    let labels: Vec<&str> = repo.all_categories().iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["Business", "Personal"]);
    assert_eq!(store.category_rows(&user()).len(), 2);
}

#[tokio::test]
async fn test_invalid_seed_rejected_before_storage() {
    let store = Arc::new(MemoryStore::new());
    let mut config = EngineConfig::default();
    config.seed_categories[1].color = "grey".into();
    let result = ReceiptRepository::load(store.clone(), user(), &config).await;
    assert!(matches!(result, Err(Error::ValidationFailed(_))));
    assert!(store.category_rows(&user()).is_empty());
}

// ── Receipt CRUD ──────────────────────────────────────────────

#[tokio::test]
async fn test_create_receipt_starts_unsorted() {
    let (store, mut repo) = setup().await;
    let id = repo.create_receipt(draft("Office Depot", "Supplies", 3)).await.unwrap();
    let r = repo.receipt(id).unwrap();
    assert!(r.is_unsorted());
    assert_eq!(r.score(), 95);
    assert_eq!(repo.unsorted().len(), 1);
    assert_eq!(store.receipt_rows(&user()).len(), 1);
}

#[tokio::test]
async fn test_create_receipt_rejects_invalid_draft() {
    let (store, mut repo) = setup().await;
    let mut bad = draft("Office Depot", "Supplies", 3);
    bad.merchant = String::new();
    assert!(matches!(
        repo.create_receipt(bad).await,
        Err(Error::ValidationFailed(_))
    ));
    assert!(store.receipt_rows(&user()).is_empty());
}

#[tokio::test]
async fn test_update_receipt_rescores() {
    let (store, mut repo) = setup().await;
    let id = repo.create_receipt(draft("Office Depot", "Supplies", 3)).await.unwrap();
    let before = repo.receipt(id).unwrap().updated_at();

    let edit = ReceiptEdit {
        merchant: Some("Safeway".into()),
        category: Some("Food".into()),
        items: Some(vec![LineItem::new("Soda", dec!(90))]),
        ..ReceiptEdit::default()
    };
    repo.update_receipt(id, edit).await.unwrap();

    let r = repo.receipt(id).unwrap();
    // Food 40 - 10 (safeway) + 0 (amount 90) - 5 (soda)
    assert_eq!(r.score(), 25);
    assert!(r.updated_at() >= before);
    assert_eq!(store.receipt_rows(&user())[0].merchant, "Safeway");
    assert_eq!(store.receipt_rows(&user())[0].score, 25);
}

#[tokio::test]
async fn test_update_missing_receipt_not_found() {
    let (_store, mut repo) = setup().await;
    let result = repo
        .update_receipt(ReceiptId::generate(), ReceiptEdit::default())
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_delete_receipt() {
    let (store, mut repo) = setup().await;
    let id = repo.create_receipt(draft("A", "General", 1)).await.unwrap();
    repo.delete_receipt(id).await.unwrap();
    assert!(repo.receipt(id).is_none());
    assert!(store.receipt_rows(&user()).is_empty());
    assert!(matches!(repo.delete_receipt(id).await, Err(Error::NotFound(_))));
}

// ── Persist failures leave memory untouched ───────────────────

#[tokio::test]
async fn test_failed_create_leaves_memory_unchanged() {
    let (store, mut repo) = setup().await;
    store.fail_next_writes(1);
    let err = repo.create_receipt(draft("A", "General", 1)).await.unwrap_err();
    assert!(matches!(err, Error::PersistFailed(ref m) if m.contains("insert receipt")));
    assert!(repo.all_receipts().is_empty());
}

#[tokio::test]
async fn test_failed_update_leaves_memory_unchanged() {
    let (store, mut repo) = setup().await;
    let id = repo.create_receipt(draft("Staples", "Supplies", 1)).await.unwrap();
    store.fail_next_writes(1);
    let edit = ReceiptEdit {
        merchant: Some("Target".into()),
        ..ReceiptEdit::default()
    };
    assert!(repo.update_receipt(id, edit).await.is_err());
    assert_eq!(repo.receipt(id).unwrap().merchant, "Staples");
    assert_eq!(store.receipt_rows(&user())[0].merchant, "Staples");
}

#[tokio::test]
async fn test_failed_category_delete_keeps_members() {
    let (store, mut repo) = setup().await;
    let business = repo.all_categories()[0].id();
    let id = repo.create_receipt(draft("Staples", "Supplies", 1)).await.unwrap();
    repo.set_folder(id, Some(business)).await.unwrap();

    store.fail_next_writes(1);
    assert!(matches!(
        repo.delete_category(business, None).await,
        Err(Error::PersistFailed(_))
    ));
    assert!(repo.category(business).is_some());
    assert_eq!(repo.receipt(id).unwrap().folder_id(), Some(business));
    assert_eq!(stored_folder(&store, id), Some(business.to_string()));
}

// ── Folder assignment primitive ───────────────────────────────

#[tokio::test]
async fn test_set_folder_returns_previous() {
    let (store, mut repo) = setup().await;
    let business = repo.all_categories()[0].id();
    let personal = repo.all_categories()[1].id();
    let id = repo.create_receipt(draft("A", "General", 1)).await.unwrap();

    assert_eq!(repo.set_folder(id, Some(business)).await.unwrap(), None);
    assert_eq!(
        repo.set_folder(id, Some(personal)).await.unwrap(),
        Some(business)
    );
    assert_eq!(stored_folder(&store, id), Some(personal.to_string()));
    assert_eq!(repo.receipts_in(personal).len(), 1);
}

#[tokio::test]
async fn test_set_folder_same_value_writes_nothing() {
    let (store, mut repo) = setup().await;
    let id = repo.create_receipt(draft("A", "General", 1)).await.unwrap();
    store.fail_next_writes(1);
    // unsorting an unsorted receipt never reaches the store
    assert_eq!(repo.set_folder(id, None).await.unwrap(), None);
}

#[tokio::test]
async fn test_set_folder_unknown_category() {
    let (_store, mut repo) = setup().await;
    let id = repo.create_receipt(draft("A", "General", 1)).await.unwrap();
    let ghost = CategoryId::generate();
    assert!(matches!(
        repo.set_folder(id, Some(ghost)).await,
        Err(Error::NotFound(_))
    ));
    assert!(repo.receipt(id).unwrap().is_unsorted());
}

// ── Categories ────────────────────────────────────────────────

#[tokio::test]
async fn test_create_category_validates() {
    let (_store, mut repo) = setup().await;
    assert!(matches!(
        repo.create_category("   ", "#fff").await,
        Err(Error::ValidationFailed(_))
    ));
    assert!(repo.create_category("Trips", "blue").await.is_err());
    let id = repo.create_category("  Trips ", "#1d4ed8").await.unwrap();
    assert_eq!(repo.category(id).unwrap().label, "Trips");
}

#[tokio::test]
async fn test_rename_or_recolor_partial() {
    let (store, mut repo) = setup().await;
    let id = repo.all_categories()[0].id();
    repo.rename_or_recolor(
        id,
        CategoryUpdate {
            label: Some("Work".into()),
            color: None,
        },
    )
    .await
    .unwrap();
    let cat = repo.category(id).unwrap();
    assert_eq!(cat.label, "Work");
    assert_eq!(cat.color, "#558E00");
    assert_eq!(store.category_rows(&user())[0].label, "Work");

    let err = repo
        .rename_or_recolor(
            id,
            CategoryUpdate {
                label: Some(String::new()),
                color: Some("#000".into()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ValidationFailed(_)));
    assert_eq!(repo.category(id).unwrap().color, "#558E00");
}

#[tokio::test]
async fn test_delete_category_cascades_to_unsorted() {
    let (store, mut repo) = setup().await;
    let business = repo.all_categories()[0].id();
    let r1 = repo.create_receipt(draft("A", "General", 1)).await.unwrap();
    let r2 = repo.create_receipt(draft("B", "General", 2)).await.unwrap();
    let r3 = repo.create_receipt(draft("C", "General", 3)).await.unwrap();
    repo.set_folder(r1, Some(business)).await.unwrap();
    repo.set_folder(r2, Some(business)).await.unwrap();

    let outcome = repo.delete_category(business, None).await.unwrap();
    assert_eq!(outcome.unsorted, vec![r1, r2]);
    assert!(!outcome.navigate_away);

    assert!(repo.category(business).is_none());
    for id in [r1, r2, r3] {
        assert!(repo.receipt(id).unwrap().is_unsorted());
        assert_eq!(stored_folder(&store, id), None);
    }
    assert_eq!(store.category_rows(&user()).len(), 1);
}

#[tokio::test]
async fn test_delete_viewed_category_signals_navigation() {
    let (_store, mut repo) = setup().await;
    let business = repo.all_categories()[0].id();
    let personal = repo.all_categories()[1].id();
    let outcome = repo.delete_category(business, Some(business)).await.unwrap();
    assert!(outcome.navigate_away);
    let outcome = repo.delete_category(personal, Some(business)).await.unwrap();
    assert!(!outcome.navigate_away);
}

#[tokio::test]
async fn test_delete_unknown_category() {
    let (_store, mut repo) = setup().await;
    let result = repo.delete_category(CategoryId::generate(), None).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

// ── Queries ───────────────────────────────────────────────────

#[tokio::test]
async fn test_queries() {
    let (_store, mut repo) = setup().await;
    let business = repo.all_categories()[0].id();
    let personal = repo.all_categories()[1].id();
    let r1 = repo.create_receipt(draft("Staples", "Supplies", 5)).await.unwrap();
    repo.create_receipt(draft("Safeway", "Food", 20)).await.unwrap();
    repo.set_folder(r1, Some(business)).await.unwrap();

    assert_eq!(repo.category_counts(), vec![(business, 1), (personal, 0)]);
    let cutoff = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
    let recent: Vec<&str> = repo
        .receipts_since(cutoff)
        .iter()
        .map(|r| r.merchant.as_str())
        .collect();
    assert_eq!(recent, vec!["Safeway"]);
    assert_eq!(repo.receipts(|r| r.score() >= 70).len(), 1);
    assert_eq!(repo.categories(|c| c.label.starts_with('P')).len(), 1);
}

// ── Remote merge ──────────────────────────────────────────────

#[tokio::test]
async fn test_apply_remote_receipt_last_write_wins() {
    let (_store, mut repo) = setup().await;
    let id = repo.create_receipt(draft("Staples", "Supplies", 1)).await.unwrap();
    let local = repo.receipt(id).unwrap().clone();

    let mut stale = ReceiptRow::from(&local);
    stale.merchant = "Old Name".into();
    stale.updated_at = local.updated_at() - Duration::seconds(5);
    assert!(!repo.apply_remote_receipt(stale).unwrap());
    assert_eq!(repo.receipt(id).unwrap().merchant, "Staples");

    let mut tie = ReceiptRow::from(&local);
    tie.merchant = "Tie".into();
    assert!(!repo.apply_remote_receipt(tie).unwrap());

    let mut newer = ReceiptRow::from(&local);
    newer.merchant = "New Name".into();
    newer.updated_at = local.updated_at() + Duration::seconds(5);
    assert!(repo.apply_remote_receipt(newer).unwrap());
    assert_eq!(repo.receipt(id).unwrap().merchant, "New Name");
}

#[tokio::test]
async fn test_apply_remote_receipt_unknown_folder_is_unsorted() {
    let (_store, mut repo) = setup().await;
    let mut other = setup().await.1;
    let id = other.create_receipt(draft("Remote", "General", 1)).await.unwrap();
    let mut row = ReceiptRow::from(other.receipt(id).unwrap());
    row.folder_id = Some(CategoryId::generate().to_string());

    assert!(repo.apply_remote_receipt(row).unwrap());
    assert!(repo.receipt(id).unwrap().is_unsorted());
}
