use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{CategoryRow, ReceiptRow, ReceiptStore};
use crate::models::UserId;

#[derive(Debug, Default)]
struct Partition {
    receipts: Vec<ReceiptRow>,
    categories: Vec<CategoryRow>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    partitions: HashMap<UserId, Partition>,
    fail_writes: usize,
    offline: bool,
}

/// Map-backed store. Rows keep insertion order, which is creation order.
///
/// `fail_next_writes` and `set_offline` let tests exercise the
/// persistence-failure paths without a real backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` mutating calls fail without touching any row.
    pub fn fail_next_writes(&self, n: usize) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_writes = n;
        }
    }

    /// While offline every call, reads included, fails.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.offline = offline;
        }
    }

    /// Stored receipt rows for `user`, for inspection.
    pub fn receipt_rows(&self, user: &UserId) -> Vec<ReceiptRow> {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .partitions
                    .get(user)
                    .map(|p| p.receipts.clone())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Stored category rows for `user`, for inspection.
    pub fn category_rows(&self, user: &UserId) -> Vec<CategoryRow> {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .partitions
                    .get(user)
                    .map(|p| p.categories.clone())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        if inner.offline {
            bail!("store offline");
        }
        Ok(inner)
    }

    /// Locks for a mutation, consuming one injected failure if any remain.
    fn lock_for_write(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        let mut inner = self.lock()?;
        if inner.fail_writes > 0 {
            inner.fail_writes -= 1;
            bail!("injected write failure");
        }
        Ok(inner)
    }

    fn read<T, F>(&self, user: &UserId, f: F) -> Result<T>
    where
        F: FnOnce(Option<&Partition>) -> T,
    {
        let inner = self.lock()?;
        Ok(f(inner.partitions.get(user)))
    }

    fn write<T, F>(&self, user: &UserId, f: F) -> Result<T>
    where
        F: FnOnce(&mut Partition) -> Result<T>,
    {
        let mut inner = self.lock_for_write()?;
        let partition = inner.partitions.entry(user.clone()).or_default();
        f(partition)
    }
}

#[async_trait]
impl ReceiptStore for MemoryStore {
    async fn load_receipts(&self, user: &UserId) -> Result<Vec<ReceiptRow>> {
        self.read(user, |p| p.map(|p| p.receipts.clone()).unwrap_or_default())
    }

    async fn load_categories(&self, user: &UserId) -> Result<Vec<CategoryRow>> {
        self.read(user, |p| p.map(|p| p.categories.clone()).unwrap_or_default())
    }

    async fn insert_receipt(&self, user: &UserId, row: &ReceiptRow) -> Result<()> {
        self.write(user, |p| {
            if p.receipts.iter().any(|r| r.id == row.id) {
                bail!("receipt {} already exists", row.id);
            }
            p.receipts.push(row.clone());
            Ok(())
        })
    }

    async fn update_receipt(&self, user: &UserId, row: &ReceiptRow) -> Result<()> {
        self.write(user, |p| {
            let slot = p
                .receipts
                .iter_mut()
                .find(|r| r.id == row.id)
                .ok_or_else(|| anyhow!("no receipt {}", row.id))?;
            *slot = row.clone();
            Ok(())
        })
    }

    async fn delete_receipt(&self, user: &UserId, id: &str) -> Result<()> {
        self.write(user, |p| {
            p.receipts.retain(|r| r.id != id);
            Ok(())
        })
    }

    async fn insert_category(&self, user: &UserId, row: &CategoryRow) -> Result<()> {
        self.write(user, |p| {
            if p.categories.iter().any(|c| c.id == row.id) {
                bail!("category {} already exists", row.id);
            }
            p.categories.push(row.clone());
            Ok(())
        })
    }

    async fn insert_categories(&self, user: &UserId, rows: &[CategoryRow]) -> Result<()> {
        self.write(user, |p| {
            for (i, row) in rows.iter().enumerate() {
                let taken = p.categories.iter().chain(&rows[..i]).any(|c| c.id == row.id);
                if taken {
                    bail!("category {} already exists", row.id);
                }
            }
            p.categories.extend_from_slice(rows);
            Ok(())
        })
    }

    async fn update_category(&self, user: &UserId, row: &CategoryRow) -> Result<()> {
        self.write(user, |p| {
            let slot = p
                .categories
                .iter_mut()
                .find(|c| c.id == row.id)
                .ok_or_else(|| anyhow!("no category {}", row.id))?;
            *slot = row.clone();
            Ok(())
        })
    }

    async fn delete_category_cascade(
        &self,
        user: &UserId,
        id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        self.write(user, |p| {
            if !p.categories.iter().any(|c| c.id == id) {
                bail!("no category {id}");
            }
            for receipt in p
                .receipts
                .iter_mut()
                .filter(|r| r.folder_id.as_deref() == Some(id))
            {
                receipt.folder_id = None;
                receipt.updated_at = updated_at;
            }
            p.categories.retain(|c| c.id != id);
            Ok(())
        })
    }
}
