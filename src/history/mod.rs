mod collapse;
mod diff;
mod panel;
mod selector;
mod types;

use crate::backend::{StoreError, VersionId};
use thiserror::Error;

// Re-export public types
pub use collapse::{collapse, render_view};
pub use diff::{
    compute_diff, compute_diff_with_deadline, group_into_rows, has_meaningful_changes,
    split_lines,
};
pub use panel::HistoryPanel;
pub use selector::{CompareSelector, SelectorState};
pub use types::{
    ComparePair, ContextLines, DiffLine, DiffLineType, DiffResult, DiffSummary, DiffView,
    DisplayUnit, SplitRow,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Failed to fetch from version store: {0}")]
    Fetch(#[from] StoreError),

    #[error("Select two versions to compare (have {0})")]
    NotReadyToCompare(usize),

    #[error("Version not in history: {0}")]
    UnknownVersion(VersionId),

    #[error("No version at index {0}")]
    IndexOutOfRange(usize),

    #[error("The current version cannot be restored")]
    CannotRestoreCurrent,

    #[error("Version at index {0} has no previous version")]
    NoPreviousVersion(usize),

    #[error("No restore is awaiting confirmation")]
    NoPendingRestore,
}
