mod plan;
mod planner;

use crate::backend::StoreError;
use thiserror::Error;

pub use plan::{CutoffPreset, RollbackPlan, RollbackTarget};
pub use planner::{RollbackPhase, RollbackPlanner};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RollbackError {
    #[error("Failed to fetch from version store: {0}")]
    Fetch(#[from] StoreError),

    #[error("Rollback failed: {0}")]
    Submit(String),

    #[error("No files selected for rollback")]
    EmptyPlan,

    #[error("File is not part of the fetched changes: {0}")]
    UnknownFile(String),

    #[error("Cannot {action} while in {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },
}
