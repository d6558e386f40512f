//! Fable History - Page-scoped undo/redo snapshot history
//!
//! After every committed mutation the editor captures the page's full
//! state (all sections and blocks) and pushes it as a `Snapshot`.
//! `PageHistory` keeps a bounded undo stack and a redo stack of those
//! snapshots; undo/redo restore a snapshot into storage through
//! `fable_store::PageStore::replace_page` and hand the restored rows
//! back for re-rendering.
//!
//! One `PageHistory` serves exactly one page. Hosts must call
//! `clear_history` whenever the user navigates away from the page or
//! leaves edit mode.

mod applier;
mod history;
mod snapshot;

pub use history::{HistoryInfo, PageHistory, PushOutcome, DEFAULT_MAX_HISTORY};
pub use snapshot::Snapshot;
