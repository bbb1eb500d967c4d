//! Filing receipts into categories, with a single undo slot.

use log::{debug, info};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::{CategoryId, ReceiptId};
use crate::repository::ReceiptRepository;

/// A committed move that can still be reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoTarget {
    pub receipt_id: ReceiptId,
    pub category_id: CategoryId,
    /// Folder the receipt had before the move.
    pub previous: Option<CategoryId>,
}

#[derive(Debug, Clone, Copy)]
struct PendingUndo {
    target: UndoTarget,
    expires_at: Instant,
}

pub struct CategoryAssignmentService {
    repo: ReceiptRepository,
    undo_window: Duration,
    pending: Option<PendingUndo>,
}

impl CategoryAssignmentService {
    pub fn new(repo: ReceiptRepository, config: &EngineConfig) -> Self {
        Self {
            repo,
            undo_window: config.undo_window,
            pending: None,
        }
    }

    pub fn repo(&self) -> &ReceiptRepository {
        &self.repo
    }

    pub fn repo_mut(&mut self) -> &mut ReceiptRepository {
        &mut self.repo
    }

    pub fn into_repo(self) -> ReceiptRepository {
        self.repo
    }

    /// File `receipt_id` under `category_id` and make the move undoable,
    /// replacing any earlier undo target. Moving a receipt into the folder
    /// it is already in changes nothing and leaves the undo slot as it was.
    pub async fn move_to_category(
        &mut self,
        receipt_id: ReceiptId,
        category_id: CategoryId,
    ) -> Result<UndoTarget> {
        let previous = self.repo.set_folder(receipt_id, Some(category_id)).await?;
        let target = UndoTarget {
            receipt_id,
            category_id,
            previous,
        };
        if previous == Some(category_id) {
            return Ok(target);
        }
        self.pending = Some(PendingUndo {
            target,
            expires_at: Instant::now() + self.undo_window,
        });
        info!("Moved receipt {receipt_id} to category {category_id}");
        Ok(target)
    }

    /// Clear the receipt's folder. Unsorting an unsorted receipt succeeds
    /// without writing anything.
    pub async fn unsort(&mut self, receipt_id: ReceiptId) -> Result<()> {
        let previous = self.repo.set_folder(receipt_id, None).await?;
        if previous.is_some() {
            info!("Unsorted receipt {receipt_id}");
        }
        Ok(())
    }

    /// The move that `undo_last_move` would revert right now.
    pub fn pending_undo(&self) -> Option<UndoTarget> {
        self.pending
            .filter(|p| Instant::now() < p.expires_at)
            .map(|p| p.target)
    }

    /// Revert the most recent move if its window is still open.
    ///
    /// Returns `Ok(None)` when there is nothing to undo. If the write fails
    /// the slot stays armed so the caller may retry within the window.
    pub async fn undo_last_move(&mut self) -> Result<Option<UndoTarget>> {
        let Some(pending) = self.pending else {
            return Ok(None);
        };
        if Instant::now() >= pending.expires_at {
            debug!("Undo window for receipt {} expired", pending.target.receipt_id);
            self.pending = None;
            return Ok(None);
        }

        let target = pending.target;
        let current = self.repo.receipt(target.receipt_id).map(|r| r.folder_id());
        if current != Some(Some(target.category_id)) {
            // refiled or deleted since the move
            debug!(
                "Receipt {} no longer in {}; dropping undo",
                target.receipt_id, target.category_id
            );
            self.pending = None;
            return Ok(None);
        }

        self.repo
            .set_folder(target.receipt_id, target.previous)
            .await?;
        self.pending = None;
        info!("Undid move of receipt {}", target.receipt_id);
        Ok(Some(target))
    }

    /// Drop the undo slot without reverting anything.
    pub fn clear_undo(&mut self) {
        self.pending = None;
    }
}
