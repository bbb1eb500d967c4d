//! Swipe-to-file triage over the unsorted queue.
//!
//! The host translates pointer events into [`TriageSession::drag_start`],
//! [`TriageSession::drag_move`] and [`TriageSession::drag_end`]. Positions
//! and anchor centers share one coordinate space; only distances matter.
//! Nothing is written until a drop lands on an active category.

use log::{debug, info};

use crate::assignment::{CategoryAssignmentService, UndoTarget};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::{CategoryId, Receipt, ReceiptId};
use crate::repository::ReceiptRepository;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Where a category's drop target sits on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryAnchor {
    pub category_id: CategoryId,
    pub center: Point,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriageState {
    Idle,
    Dragging {
        receipt_id: ReceiptId,
        origin: Point,
        position: Point,
        active: Option<CategoryId>,
    },
    Committing {
        receipt_id: ReceiptId,
        category_id: CategoryId,
    },
    SnappingBack {
        receipt_id: ReceiptId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Filed {
        receipt_id: ReceiptId,
        category_id: CategoryId,
    },
    SnappedBack {
        receipt_id: ReceiptId,
    },
    /// The dragged receipt was deleted or filed elsewhere before the drop.
    Stale {
        receipt_id: ReceiptId,
    },
    /// `drag_end` without a drag in progress.
    Ignored,
}

pub struct TriageSession {
    queue: Vec<ReceiptId>,
    cursor: usize,
    anchors: Vec<CategoryAnchor>,
    activation_radius: f64,
    state: TriageState,
}

impl TriageSession {
    /// Start over the repository's unsorted receipts, oldest first.
    pub fn new(repo: &ReceiptRepository, config: &EngineConfig) -> Self {
        let queue = repo.unsorted().iter().map(|r| r.id()).collect();
        Self::from_queue(queue, config)
    }

    /// The queue is a snapshot: receipts unsorted later (by undo or
    /// elsewhere) do not reappear in this session, and queued receipts that
    /// stop being unsorted are skipped.
    pub fn from_queue(queue: Vec<ReceiptId>, config: &EngineConfig) -> Self {
        debug!("Triage session over {} receipts", queue.len());
        Self {
            queue,
            cursor: 0,
            anchors: Vec::new(),
            activation_radius: config.activation_radius,
            state: TriageState::Idle,
        }
    }

    /// Replace the drop targets. List order is the tie-break order when
    /// several anchors are in range.
    pub fn set_anchors(&mut self, anchors: Vec<CategoryAnchor>) {
        self.anchors = anchors;
    }

    pub fn state(&self) -> TriageState {
        self.state
    }

    /// The receipt on display: the first queued receipt at or after the
    /// cursor that still exists and is still unsorted. `None` once
    /// everything is filed.
    pub fn current(&self, repo: &ReceiptRepository) -> Option<ReceiptId> {
        self.next_pending(repo).map(|idx| self.queue[idx])
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Queued receipts still waiting to be filed.
    pub fn remaining(&self, repo: &ReceiptRepository) -> usize {
        self.queue[self.cursor.min(self.queue.len())..]
            .iter()
            .filter(|id| is_pending(repo, **id))
            .count()
    }

    pub fn is_exhausted(&self, repo: &ReceiptRepository) -> bool {
        self.current(repo).is_none()
    }

    /// Category currently under the pointer, if dragging.
    pub fn active_category(&self) -> Option<CategoryId> {
        match self.state {
            TriageState::Dragging { active, .. } => active,
            _ => None,
        }
    }

    /// Pointer displacement since the drag began.
    pub fn drag_offset(&self) -> Option<(f64, f64)> {
        match self.state {
            TriageState::Dragging {
                origin, position, ..
            } => Some((position.x - origin.x, position.y - origin.y)),
            _ => None,
        }
    }

    /// Pick up the current receipt. A snap-back in progress is interrupted.
    /// Receipts deleted or filed elsewhere since the session began are
    /// skipped. Returns `false` when there is nothing to drag.
    pub fn drag_start(&mut self, repo: &ReceiptRepository, x: f64, y: f64) -> bool {
        if !matches!(
            self.state,
            TriageState::Idle | TriageState::SnappingBack { .. }
        ) {
            return false;
        }
        let Some(idx) = self.next_pending(repo) else {
            return false;
        };
        if idx > self.cursor {
            debug!(
                "Triage: skipped {} receipts filed or deleted elsewhere",
                idx - self.cursor
            );
        }
        self.cursor = idx;
        let receipt_id = self.queue[idx];
        let origin = Point::new(x, y);
        self.state = TriageState::Dragging {
            receipt_id,
            origin,
            position: origin,
            active: None,
        };
        debug!("Triage: dragging {receipt_id}");
        true
    }

    /// Track the pointer and recompute the active category.
    pub fn drag_move(&mut self, x: f64, y: f64) -> Option<CategoryId> {
        let point = Point::new(x, y);
        let hit = self.anchor_at(point);
        match &mut self.state {
            TriageState::Dragging {
                position, active, ..
            } => {
                *position = point;
                *active = hit;
                hit
            }
            _ => None,
        }
    }

    /// Drop. Files the receipt if a category is active, otherwise snaps
    /// back. A receipt that was deleted or filed elsewhere mid-drag is left
    /// alone. On a storage failure the session returns to `Idle` with the
    /// same receipt current.
    pub async fn drag_end(
        &mut self,
        service: &mut CategoryAssignmentService,
    ) -> Result<DropOutcome> {
        let TriageState::Dragging {
            receipt_id, active, ..
        } = self.state
        else {
            return Ok(DropOutcome::Ignored);
        };

        if !is_pending(service.repo(), receipt_id) {
            self.state = TriageState::Idle;
            info!("Triage: {receipt_id} was filed or deleted elsewhere; skipping");
            return Ok(DropOutcome::Stale { receipt_id });
        }

        let Some(category_id) = active else {
            self.state = TriageState::SnappingBack { receipt_id };
            debug!("Triage: {receipt_id} snapped back");
            return Ok(DropOutcome::SnappedBack { receipt_id });
        };

        self.state = TriageState::Committing {
            receipt_id,
            category_id,
        };
        match service.move_to_category(receipt_id, category_id).await {
            Ok(_) => {
                self.cursor += 1;
                self.state = TriageState::Idle;
                info!(
                    "Triage: filed {receipt_id} into {category_id}, {} left",
                    self.remaining(service.repo())
                );
                Ok(DropOutcome::Filed {
                    receipt_id,
                    category_id,
                })
            }
            Err(e) => {
                self.state = TriageState::Idle;
                Err(e)
            }
        }
    }

    /// The snap-back animation finished.
    pub fn settle(&mut self) {
        if matches!(self.state, TriageState::SnappingBack { .. }) {
            self.state = TriageState::Idle;
        }
    }

    /// Revert the last filing while its undo window is open. The cursor
    /// does not move back.
    pub async fn undo(
        &mut self,
        service: &mut CategoryAssignmentService,
    ) -> Result<Option<UndoTarget>> {
        service.undo_last_move().await
    }

    /// Tear down an in-flight gesture without touching any data.
    pub fn cancel(&mut self) {
        if !matches!(self.state, TriageState::Idle) {
            debug!("Triage: gesture discarded");
        }
        self.state = TriageState::Idle;
    }

    fn next_pending(&self, repo: &ReceiptRepository) -> Option<usize> {
        (self.cursor..self.queue.len()).find(|&idx| is_pending(repo, self.queue[idx]))
    }

    fn anchor_at(&self, point: Point) -> Option<CategoryId> {
        self.anchors
            .iter()
            .find(|a| point.distance_to(a.center) < self.activation_radius)
            .map(|a| a.category_id)
    }
}

fn is_pending(repo: &ReceiptRepository, id: ReceiptId) -> bool {
    repo.receipt(id).is_some_and(Receipt::is_unsorted)
}
