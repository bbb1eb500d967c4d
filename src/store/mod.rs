//! The persistence collaborator: a row store partitioned by user.
//!
//! The repository treats storage as a durable mirror of its in-memory
//! working set. Implementations only need to store and return rows; every
//! invariant is checked before a row reaches them.

mod memory;
mod rows;
mod schema;
mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::UserId;

pub use memory::MemoryStore;
pub use rows::{CategoryRow, ReceiptRow};
pub use sqlite::SqliteStore;

#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Every receipt row owned by `user`, oldest first.
    async fn load_receipts(&self, user: &UserId) -> Result<Vec<ReceiptRow>>;

    /// Every category row owned by `user`, oldest first.
    async fn load_categories(&self, user: &UserId) -> Result<Vec<CategoryRow>>;

    async fn insert_receipt(&self, user: &UserId, row: &ReceiptRow) -> Result<()>;

    /// Replaces the stored row with the same id. Fails if there is none.
    async fn update_receipt(&self, user: &UserId, row: &ReceiptRow) -> Result<()>;

    async fn delete_receipt(&self, user: &UserId, id: &str) -> Result<()>;

    async fn insert_category(&self, user: &UserId, row: &CategoryRow) -> Result<()>;

    /// Inserts every row or none of them.
    async fn insert_categories(&self, user: &UserId, rows: &[CategoryRow]) -> Result<()>;

    /// Replaces the stored row with the same id. Fails if there is none.
    async fn update_category(&self, user: &UserId, row: &CategoryRow) -> Result<()>;

    /// Clears `folder_id` on every member receipt (stamping `updated_at`)
    /// and deletes the category. Both happen or neither does.
    async fn delete_category_cascade(
        &self,
        user: &UserId,
        id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests;
