//! Rollback plan data model.

use crate::backend::{FileChangeSummary, VersionId};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// A single file to roll back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackTarget {
    pub path: String,
    /// Version the file is restored to.
    pub to_version_id: VersionId,
}

/// The finalized set of per-file targets submitted as one bulk operation.
///
/// Only built from fetched summaries, so every target is one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RollbackPlan {
    targets: Vec<RollbackTarget>,
}

impl RollbackPlan {
    /// Map the summaries whose path is in `selected` to rollback targets,
    /// keeping the order of `summaries`.
    pub fn from_selection(summaries: &[FileChangeSummary], selected: &BTreeSet<String>) -> Self {
        let targets = summaries
            .iter()
            .filter(|summary| selected.contains(&summary.path))
            .map(|summary| RollbackTarget {
                path: summary.path.clone(),
                to_version_id: summary.rollback_target_version_id.clone(),
            })
            .collect();
        Self { targets }
    }

    pub fn targets(&self) -> &[RollbackTarget] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(|target| target.path.as_str())
    }
}

/// Quick-pick cutoffs relative to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutoffPreset {
    OneHour,
    SixHours,
    OneDay,
    SevenDays,
}

impl CutoffPreset {
    pub const ALL: [CutoffPreset; 4] = [
        CutoffPreset::OneHour,
        CutoffPreset::SixHours,
        CutoffPreset::OneDay,
        CutoffPreset::SevenDays,
    ];

    pub fn duration(self) -> Duration {
        match self {
            CutoffPreset::OneHour => Duration::hours(1),
            CutoffPreset::SixHours => Duration::hours(6),
            CutoffPreset::OneDay => Duration::hours(24),
            CutoffPreset::SevenDays => Duration::days(7),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CutoffPreset::OneHour => "1h",
            CutoffPreset::SixHours => "6h",
            CutoffPreset::OneDay => "24h",
            CutoffPreset::SevenDays => "7d",
        }
    }

    pub fn cutoff_from(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}
