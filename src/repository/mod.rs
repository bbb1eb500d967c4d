//! The signed-in user's working set of receipts and categories.
//!
//! Memory is the source of truth for reads. Every mutation is written to
//! the [`ReceiptStore`] first and applied to memory only once the store has
//! accepted it, so a [`Error::PersistFailed`] always leaves memory equal to
//! what storage holds. Whether to retry is the caller's call.

use chrono::{NaiveDate, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::models::{
    validate_color, validate_label, Category, CategoryId, CategoryUpdate, DraftReceipt, Receipt,
    ReceiptEdit, ReceiptId, UserId,
};
use crate::store::{CategoryRow, ReceiptRow, ReceiptStore};

/// What `delete_category` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDeletion {
    /// Receipts that were filed in the category and are now unsorted.
    pub unsorted: Vec<ReceiptId>,
    /// The deleted category was the one being viewed.
    pub navigate_away: bool,
}

pub struct ReceiptRepository {
    store: Arc<dyn ReceiptStore>,
    user: UserId,
    categories: Vec<Category>,
    receipts: Vec<Receipt>,
}

impl ReceiptRepository {
    /// Load the user's whole working set, seeding the default categories if
    /// the user has none.
    pub async fn load(
        store: Arc<dyn ReceiptStore>,
        user: UserId,
        config: &EngineConfig,
    ) -> Result<Self> {
        let category_rows = store
            .load_categories(&user)
            .await
            .map_err(|e| persist_error(e, format!("load categories for {user}")))?;
        let receipt_rows = store
            .load_receipts(&user)
            .await
            .map_err(|e| persist_error(e, format!("load receipts for {user}")))?;

        let categories = category_rows
            .into_iter()
            .map(Category::try_from)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| persist_error(e, "decode category rows".into()))?;
        let receipts = receipt_rows
            .into_iter()
            .map(Receipt::try_from)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| persist_error(e, "decode receipt rows".into()))?;

        let mut repo = Self {
            store,
            user,
            categories,
            receipts,
        };
        repo.drop_dangling_folders();

        if repo.categories.is_empty() {
            repo.seed_categories(config).await?;
        }

        info!(
            "Loaded {} receipts and {} categories for {}",
            repo.receipts.len(),
            repo.categories.len(),
            repo.user
        );
        Ok(repo)
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn receipt(&self, id: ReceiptId) -> Option<&Receipt> {
        self.receipts.iter().find(|r| r.id == id)
    }

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        Category::find_by_id(&self.categories, id)
    }

    /// All receipts, oldest first.
    pub fn all_receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    /// All categories, in creation order.
    pub fn all_categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn receipts<P>(&self, predicate: P) -> Vec<&Receipt>
    where
        P: Fn(&Receipt) -> bool,
    {
        self.receipts.iter().filter(|r| predicate(r)).collect()
    }

    pub fn categories<P>(&self, predicate: P) -> Vec<&Category>
    where
        P: Fn(&Category) -> bool,
    {
        self.categories.iter().filter(|c| predicate(c)).collect()
    }

    pub fn unsorted(&self) -> Vec<&Receipt> {
        self.receipts(Receipt::is_unsorted)
    }

    pub fn receipts_in(&self, category: CategoryId) -> Vec<&Receipt> {
        self.receipts(|r| r.folder_id == Some(category))
    }

    /// Member count per category, in category order.
    pub fn category_counts(&self) -> Vec<(CategoryId, usize)> {
        self.categories
            .iter()
            .map(|c| {
                let count = self
                    .receipts
                    .iter()
                    .filter(|r| r.folder_id == Some(c.id))
                    .count();
                (c.id, count)
            })
            .collect()
    }

    /// Receipts dated on or after `cutoff`.
    pub fn receipts_since(&self, cutoff: NaiveDate) -> Vec<&Receipt> {
        self.receipts(|r| r.date.naive() >= cutoff)
    }

    // ── Receipt mutations ─────────────────────────────────────

    /// Confirm a draft. The new receipt starts unsorted.
    pub async fn create_receipt(&mut self, draft: DraftReceipt) -> Result<ReceiptId> {
        draft.validate()?;
        let receipt = Receipt::from_draft(draft, Utc::now());
        let id = receipt.id;
        self.store
            .insert_receipt(&self.user, &ReceiptRow::from(&receipt))
            .await
            .map_err(|e| persist_error(e, format!("insert receipt {id}")))?;
        info!(
            "Created receipt {id} ({} {}, score {})",
            receipt.merchant, receipt.amount, receipt.score
        );
        self.receipts.push(receipt);
        Ok(id)
    }

    /// Apply a content edit and recompute the score.
    pub async fn update_receipt(&mut self, id: ReceiptId, edit: ReceiptEdit) -> Result<()> {
        let idx = self.receipt_index(id)?;
        let mut updated = self.receipts[idx].clone();
        edit.apply_to(&mut updated);
        updated.validate()?;
        updated.rescore();
        updated.updated_at = Utc::now();
        self.persist_receipt(&updated).await?;
        debug!("Updated receipt {id}, score now {}", updated.score);
        self.receipts[idx] = updated;
        Ok(())
    }

    pub async fn delete_receipt(&mut self, id: ReceiptId) -> Result<()> {
        let idx = self.receipt_index(id)?;
        self.store
            .delete_receipt(&self.user, &id.to_string())
            .await
            .map_err(|e| persist_error(e, format!("delete receipt {id}")))?;
        self.receipts.remove(idx);
        info!("Deleted receipt {id}");
        Ok(())
    }

    /// Set or clear a receipt's folder, returning the previous one.
    /// Setting the folder it already has writes nothing.
    pub(crate) async fn set_folder(
        &mut self,
        id: ReceiptId,
        folder: Option<CategoryId>,
    ) -> Result<Option<CategoryId>> {
        let idx = self.receipt_index(id)?;
        if let Some(category) = folder {
            if self.category(category).is_none() {
                return Err(Error::not_found(format!("category {category}")));
            }
        }
        let previous = self.receipts[idx].folder_id;
        if previous == folder {
            debug!("Receipt {id} already in {folder:?}; nothing to do");
            return Ok(previous);
        }

        let mut updated = self.receipts[idx].clone();
        updated.folder_id = folder;
        updated.updated_at = Utc::now();
        self.persist_receipt(&updated).await?;
        self.receipts[idx] = updated;
        Ok(previous)
    }

    /// Merge a receipt row that changed elsewhere. The newer `updated_at`
    /// wins; ties keep the local copy. Returns whether the row was applied.
    pub fn apply_remote_receipt(&mut self, row: ReceiptRow) -> Result<bool> {
        let mut incoming = Receipt::try_from(row)
            .map_err(|e| Error::validation(format!("remote receipt: {e:#}")))?;
        if let Some(folder) = incoming.folder_id {
            if self.category(folder).is_none() {
                warn!(
                    "Remote receipt {} names unknown category {folder}; treating as unsorted",
                    incoming.id
                );
                incoming.folder_id = None;
            }
        }
        match self.receipts.iter().position(|r| r.id == incoming.id) {
            Some(idx) if self.receipts[idx].updated_at >= incoming.updated_at => {
                debug!("Ignoring stale remote copy of receipt {}", incoming.id);
                Ok(false)
            }
            Some(idx) => {
                self.receipts[idx] = incoming;
                Ok(true)
            }
            None => {
                self.receipts.push(incoming);
                Ok(true)
            }
        }
    }

    // ── Category mutations ────────────────────────────────────

    pub async fn create_category(&mut self, label: &str, color: &str) -> Result<CategoryId> {
        let label = validate_label(label)?;
        let color = validate_color(color)?;
        let category = Category::new(label, color, Utc::now());
        let id = category.id;
        self.store
            .insert_category(&self.user, &CategoryRow::from(&category))
            .await
            .map_err(|e| persist_error(e, format!("insert category {id}")))?;
        info!("Created category '{}' ({id})", category.label);
        self.categories.push(category);
        Ok(id)
    }

    /// Partial rename and/or recolor.
    pub async fn rename_or_recolor(&mut self, id: CategoryId, update: CategoryUpdate) -> Result<()> {
        let idx = self
            .categories
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| Error::not_found(format!("category {id}")))?;
        let mut updated = self.categories[idx].clone();
        if let Some(label) = update.label {
            updated.label = validate_label(&label)?;
        }
        if let Some(color) = update.color {
            updated.color = validate_color(&color)?;
        }
        updated.updated_at = Utc::now();
        self.store
            .update_category(&self.user, &CategoryRow::from(&updated))
            .await
            .map_err(|e| persist_error(e, format!("update category {id}")))?;
        debug!("Updated category {id}: '{}' {}", updated.label, updated.color);
        self.categories[idx] = updated;
        Ok(())
    }

    /// Unsort every member and remove the category, as one storage call.
    /// `viewing` is the category the UI currently shows, if any.
    pub async fn delete_category(
        &mut self,
        id: CategoryId,
        viewing: Option<CategoryId>,
    ) -> Result<CategoryDeletion> {
        let idx = self
            .categories
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| Error::not_found(format!("category {id}")))?;
        let now = Utc::now();
        self.store
            .delete_category_cascade(&self.user, &id.to_string(), now)
            .await
            .map_err(|e| persist_error(e, format!("delete category {id}")))?;

        let mut unsorted = Vec::new();
        for receipt in self.receipts.iter_mut().filter(|r| r.folder_id == Some(id)) {
            receipt.folder_id = None;
            receipt.updated_at = now;
            unsorted.push(receipt.id);
        }
        let removed = self.categories.remove(idx);
        info!(
            "Deleted category '{}' ({id}); {} receipts unsorted",
            removed.label,
            unsorted.len()
        );
        Ok(CategoryDeletion {
            unsorted,
            navigate_away: viewing == Some(id),
        })
    }

    // ── Internals ─────────────────────────────────────────────

    /// All seeds are stored in one call, so a failed seed leaves the
    /// account empty and the next load seeds again.
    async fn seed_categories(&mut self, config: &EngineConfig) -> Result<()> {
        let now = Utc::now();
        let seeds = config
            .seed_categories
            .iter()
            .map(|seed| {
                Ok(Category::new(
                    validate_label(&seed.label)?,
                    validate_color(&seed.color)?,
                    now,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let rows: Vec<CategoryRow> = seeds.iter().map(CategoryRow::from).collect();
        self.store
            .insert_categories(&self.user, &rows)
            .await
            .map_err(|e| persist_error(e, format!("seed categories for {}", self.user)))?;
        info!("Seeded {} default categories for {}", seeds.len(), self.user);
        self.categories.extend(seeds);
        Ok(())
    }

    fn receipt_index(&self, id: ReceiptId) -> Result<usize> {
        self.receipts
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| Error::not_found(format!("receipt {id}")))
    }

    async fn persist_receipt(&self, receipt: &Receipt) -> Result<()> {
        self.store
            .update_receipt(&self.user, &ReceiptRow::from(receipt))
            .await
            .map_err(|e| persist_error(e, format!("update receipt {}", receipt.id)))
    }

    fn drop_dangling_folders(&mut self) {
        let categories = &self.categories;
        for receipt in &mut self.receipts {
            if let Some(folder) = receipt.folder_id {
                if Category::find_by_id(categories, folder).is_none() {
                    warn!(
                        "Receipt {} names missing category {folder}; treating as unsorted",
                        receipt.id
                    );
                    receipt.folder_id = None;
                }
            }
        }
    }
}

fn persist_error(err: anyhow::Error, op: String) -> Error {
    let err = err.context(op);
    error!("Storage call failed: {err:#}");
    Error::persist(err)
}

#[cfg(test)]
mod tests;
