//! Page-scoped undo/redo history controller

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fable_core::{FableError, PageId, Result};
use fable_store::{PageContents, PageStore};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::applier::apply_snapshot;
use crate::snapshot::Snapshot;

/// Default bound on undo history depth
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Outcome of a `push_snapshot` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The snapshot is now the top of the undo stack
    Pushed,
    /// A restore was in flight; the push was dropped so the restored
    /// state does not feed back into history
    SkippedApplying,
    /// The snapshot belonged to another page and was dropped
    SkippedPageMismatch,
}

/// Read-only view of the history state, for diagnostics and for
/// enabling/disabling undo/redo controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryInfo {
    pub page_id: PageId,
    pub undo_depth: usize,
    pub redo_depth: usize,
    pub can_undo: bool,
    pub can_redo: bool,
}

#[derive(Default)]
struct Stacks {
    undo: VecDeque<Snapshot>,
    redo: VecDeque<Snapshot>,
}

impl Stacks {
    fn can_undo(&self) -> bool {
        // The top of the undo stack is the current state; undo needs a
        // prior state to restore to
        self.undo.len() > 1
    }

    fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}

/// Undo/redo history for a single page of the section/block editor.
///
/// Callers push a snapshot of the resulting full page state after every
/// committed mutation. `undo` and `redo` rewrite persistent storage
/// through the store's transactional `replace_page` and return the
/// restored rows for the caller to re-render from.
///
/// The controller is bound to one page for its whole lifetime. Hosts
/// must call `clear_history` when the user navigates to another page or
/// leaves edit mode; a stale controller would otherwise restore this
/// page's rows while another page is on screen.
///
/// Operations serialize on an internal mutex held across the storage
/// write, so a second undo/redo/push can never interleave its writes
/// with one already in flight.
pub struct PageHistory {
    page_id: PageId,
    store: Arc<dyn PageStore>,
    max_history: usize,
    applying: AtomicBool,
    state: Mutex<Stacks>,
}

impl PageHistory {
    /// Create a history bound to `page_id` with the default depth bound
    pub fn new(page_id: PageId, store: Arc<dyn PageStore>) -> Self {
        Self::with_max_history(page_id, store, DEFAULT_MAX_HISTORY)
    }

    /// Create a history with an explicit depth bound
    pub fn with_max_history(page_id: PageId, store: Arc<dyn PageStore>, max_history: usize) -> Self {
        Self {
            page_id,
            store,
            max_history,
            applying: AtomicBool::new(false),
            state: Mutex::new(Stacks::default()),
        }
    }

    /// The page this history is bound to
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Append a snapshot of the current page state to the undo stack.
    ///
    /// Call this after an action completes (create/update/delete/
    /// reorder). Pushing invalidates any forward history: the redo
    /// stack is cleared. When the depth bound is exceeded the oldest
    /// snapshot is evicted, never the newest.
    pub async fn push_snapshot(&self, snapshot: Snapshot) -> PushOutcome {
        if self.applying.load(Ordering::SeqCst) {
            debug!(page = %self.page_id, "restore in flight, dropping snapshot");
            return PushOutcome::SkippedApplying;
        }

        if snapshot.page_id != self.page_id {
            warn!(
                expected = %self.page_id,
                got = %snapshot.page_id,
                "snapshot page mismatch, skipping save"
            );
            return PushOutcome::SkippedPageMismatch;
        }

        let mut stacks = self.state.lock().await;
        stacks.undo.push_back(snapshot);
        while stacks.undo.len() > self.max_history {
            stacks.undo.pop_front();
            debug!(page = %self.page_id, "history bound reached, evicted oldest snapshot");
        }
        stacks.redo.clear();
        PushOutcome::Pushed
    }

    /// Undo the last action.
    ///
    /// Moves the current snapshot to the redo stack, restores the
    /// previous one into storage and returns the restored rows.
    /// Returns `Ok(None)` when there is no prior state to restore.
    ///
    /// On a storage error the stacks are left exactly as they were and
    /// the transactional apply has rolled back, so the operation can be
    /// retried; the error is returned for the caller to surface.
    pub async fn undo(&self) -> Result<Option<PageContents>> {
        let mut stacks = self.state.lock().await;
        if !stacks.can_undo() {
            return Ok(None);
        }

        let previous = stacks.undo[stacks.undo.len() - 2].clone();
        self.check_bound_page(&previous)?;

        let restored = match apply_snapshot(self.store.as_ref(), &self.applying, &previous).await {
            Ok(restored) => restored,
            Err(err) => {
                error!(page = %self.page_id, error = %err, "undo failed");
                return Err(err);
            }
        };

        if let Some(current) = stacks.undo.pop_back() {
            stacks.redo.push_back(current);
        }
        Ok(Some(restored))
    }

    /// Redo the last undone action.
    ///
    /// Mirror of `undo`: restores the top of the redo stack into
    /// storage and moves it back onto the undo stack. Returns
    /// `Ok(None)` when there is nothing to redo.
    pub async fn redo(&self) -> Result<Option<PageContents>> {
        let mut stacks = self.state.lock().await;
        let next = match stacks.redo.back() {
            Some(next) => next.clone(),
            None => return Ok(None),
        };
        self.check_bound_page(&next)?;

        let restored = match apply_snapshot(self.store.as_ref(), &self.applying, &next).await {
            Ok(restored) => restored,
            Err(err) => {
                error!(page = %self.page_id, error = %err, "redo failed");
                return Err(err);
            }
        };

        if let Some(next) = stacks.redo.pop_back() {
            stacks.undo.push_back(next);
        }
        Ok(Some(restored))
    }

    /// Drop both stacks.
    ///
    /// Hosts call this on page navigation, document switch, exit from
    /// edit mode and application restart.
    pub async fn clear_history(&self) {
        let mut stacks = self.state.lock().await;
        stacks.undo.clear();
        stacks.redo.clear();
        debug!(page = %self.page_id, "history cleared");
    }

    /// True when a prior state exists to restore
    pub async fn can_undo(&self) -> bool {
        self.state.lock().await.can_undo()
    }

    /// True when an undone state exists to re-apply
    pub async fn can_redo(&self) -> bool {
        self.state.lock().await.can_redo()
    }

    /// Current stack depths and capability flags
    pub async fn history_info(&self) -> HistoryInfo {
        let stacks = self.state.lock().await;
        HistoryInfo {
            page_id: self.page_id,
            undo_depth: stacks.undo.len(),
            redo_depth: stacks.redo.len(),
            can_undo: stacks.can_undo(),
            can_redo: stacks.can_redo(),
        }
    }

    /// A snapshot minted for another page must never be written into
    /// this page's rows, even if it somehow reached a stack
    fn check_bound_page(&self, snapshot: &Snapshot) -> Result<()> {
        if snapshot.page_id != self.page_id {
            return Err(FableError::PageMismatch {
                expected: self.page_id,
                got: snapshot.page_id,
            });
        }
        Ok(())
    }
}
