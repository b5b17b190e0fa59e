//! Bulk rollback workflow.
//!
//! `SelectCutoff -> FetchingChanges -> SelectFiles -> Confirm -> Submitting -> Done`,
//! with `NoChanges` when nothing changed after the cutoff. A failed fetch goes
//! back to `SelectCutoff`, a failed submit back to `SelectFiles` with the
//! selection untouched.
//!
//! The fetch and submit steps are split into `begin_*`/`finish_*` so the store
//! call can run elsewhere; [`RollbackPlanner::fetch_changes`] and
//! [`RollbackPlanner::submit`] do both halves on the calling thread.

use super::RollbackError;
use super::plan::{CutoffPreset, RollbackPlan};
use crate::backend::{
    ContentSource, FileChangeSummary, FileRef, ScopeRef, StoreError, VersionStore,
};
use crate::compare_backend::fetch_pair;
use crate::config::Settings;
use crate::history::{ComparePair, DiffResult, compute_diff_with_deadline};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackPhase {
    /// Picking the cutoff; `error` holds the last fetch failure
    SelectCutoff { error: Option<String> },
    FetchingChanges,
    /// Nothing changed after the cutoff
    NoChanges,
    /// Choosing files; `error` holds the last submit failure
    SelectFiles { error: Option<String> },
    Confirm { plan: RollbackPlan },
    Submitting { plan: RollbackPlan },
    /// Submitted; the caller should refresh its views
    Done,
}

impl RollbackPhase {
    pub fn name(&self) -> &'static str {
        match self {
            RollbackPhase::SelectCutoff { .. } => "SelectCutoff",
            RollbackPhase::FetchingChanges => "FetchingChanges",
            RollbackPhase::NoChanges => "NoChanges",
            RollbackPhase::SelectFiles { .. } => "SelectFiles",
            RollbackPhase::Confirm { .. } => "Confirm",
            RollbackPhase::Submitting { .. } => "Submitting",
            RollbackPhase::Done => "Done",
        }
    }
}

pub struct RollbackPlanner {
    scope: ScopeRef,
    cutoff: DateTime<Utc>,
    default_window: Duration,
    summaries: Vec<FileChangeSummary>,
    selected: BTreeSet<String>,
    phase: RollbackPhase,
    diff_timeout: Option<std::time::Duration>,
}

impl RollbackPlanner {
    /// Start a rollback for `scope` with the cutoff suggested from `settings`
    pub fn new(scope: ScopeRef, now: DateTime<Utc>, settings: &Settings) -> Self {
        let default_window = Duration::hours(settings.default_cutoff_hours);
        Self {
            scope,
            cutoff: now - default_window,
            default_window,
            summaries: Vec::new(),
            selected: BTreeSet::new(),
            phase: RollbackPhase::SelectCutoff { error: None },
            diff_timeout: settings.diff_timeout(),
        }
    }

    pub fn scope(&self) -> &ScopeRef {
        &self.scope
    }

    pub fn phase(&self) -> &RollbackPhase {
        &self.phase
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    fn invalid(&self, action: &'static str) -> RollbackError {
        RollbackError::InvalidTransition {
            action,
            phase: self.phase.name(),
        }
    }

    // ---------------------------------------------------------------------
    // SelectCutoff
    // ---------------------------------------------------------------------

    pub fn set_cutoff(&mut self, cutoff: DateTime<Utc>) -> Result<(), RollbackError> {
        if !matches!(self.phase, RollbackPhase::SelectCutoff { .. }) {
            return Err(self.invalid("change the cutoff"));
        }
        self.cutoff = cutoff;
        self.phase = RollbackPhase::SelectCutoff { error: None };
        Ok(())
    }

    pub fn apply_preset(
        &mut self,
        preset: CutoffPreset,
        now: DateTime<Utc>,
    ) -> Result<(), RollbackError> {
        self.set_cutoff(preset.cutoff_from(now))
    }

    /// Go back to picking a cutoff, dropping fetched changes
    pub fn back_to_cutoff(&mut self) -> Result<(), RollbackError> {
        match self.phase {
            RollbackPhase::NoChanges
            | RollbackPhase::SelectFiles { .. }
            | RollbackPhase::SelectCutoff { .. } => {
                self.summaries.clear();
                self.selected.clear();
                self.phase = RollbackPhase::SelectCutoff { error: None };
                Ok(())
            }
            _ => Err(self.invalid("go back to the cutoff")),
        }
    }

    // ---------------------------------------------------------------------
    // FetchingChanges
    // ---------------------------------------------------------------------

    /// Enter `FetchingChanges`; returns the cutoff to query
    pub fn begin_fetch(&mut self) -> Result<DateTime<Utc>, RollbackError> {
        if !matches!(self.phase, RollbackPhase::SelectCutoff { .. }) {
            return Err(self.invalid("fetch changes"));
        }
        info!("Fetching changes in {} since {}", self.scope, self.cutoff);
        self.phase = RollbackPhase::FetchingChanges;
        Ok(self.cutoff)
    }

    /// Apply the store's answer. Every returned file starts out selected.
    pub fn finish_fetch(
        &mut self,
        fetched: Result<Vec<FileChangeSummary>, StoreError>,
    ) -> Result<(), RollbackError> {
        if self.phase != RollbackPhase::FetchingChanges {
            return Err(self.invalid("finish fetching"));
        }

        match fetched {
            Err(e) => {
                warn!("Failed to fetch changes for {}: {}", self.scope, e);
                self.phase = RollbackPhase::SelectCutoff {
                    error: Some(e.to_string()),
                };
                Err(RollbackError::Fetch(e))
            }
            Ok(summaries) if summaries.is_empty() => {
                info!("No changes in {} since {}", self.scope, self.cutoff);
                self.summaries.clear();
                self.selected.clear();
                self.phase = RollbackPhase::NoChanges;
                Ok(())
            }
            Ok(summaries) => {
                info!("{} files changed in {}", summaries.len(), self.scope);
                self.selected = summaries.iter().map(|s| s.path.clone()).collect();
                self.summaries = summaries;
                self.phase = RollbackPhase::SelectFiles { error: None };
                Ok(())
            }
        }
    }

    pub fn fetch_changes(&mut self, store: &dyn VersionStore) -> Result<(), RollbackError> {
        let cutoff = self.begin_fetch()?;
        let fetched = store.list_changed_since(&self.scope, cutoff);
        self.finish_fetch(fetched)
    }

    // ---------------------------------------------------------------------
    // SelectFiles
    // ---------------------------------------------------------------------

    pub fn summaries(&self) -> &[FileChangeSummary] {
        &self.summaries
    }

    pub fn is_selected(&self, path: &str) -> bool {
        self.selected.contains(path)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    fn require_select_files(&self, action: &'static str) -> Result<(), RollbackError> {
        match self.phase {
            RollbackPhase::SelectFiles { .. } => Ok(()),
            _ => Err(self.invalid(action)),
        }
    }

    fn summary(&self, path: &str) -> Result<&FileChangeSummary, RollbackError> {
        self.summaries
            .iter()
            .find(|summary| summary.path == path)
            .ok_or_else(|| RollbackError::UnknownFile(path.to_string()))
    }

    /// Flip inclusion of `path`; returns whether it is now selected
    pub fn toggle(&mut self, path: &str) -> Result<bool, RollbackError> {
        self.require_select_files("toggle a file")?;
        self.summary(path)?;
        if self.selected.remove(path) {
            Ok(false)
        } else {
            self.selected.insert(path.to_string());
            Ok(true)
        }
    }

    pub fn select_all(&mut self) -> Result<(), RollbackError> {
        self.require_select_files("select all")?;
        self.selected = self.summaries.iter().map(|s| s.path.clone()).collect();
        Ok(())
    }

    pub fn select_none(&mut self) -> Result<(), RollbackError> {
        self.require_select_files("select none")?;
        self.selected.clear();
        Ok(())
    }

    /// Diff of what rolling back `path` would change: live content on the
    /// left, the rollback target on the right. Does not touch the selection.
    pub fn preview(
        &self,
        store: &dyn VersionStore,
        path: &str,
    ) -> Result<DiffResult, RollbackError> {
        self.require_select_files("preview")?;
        let summary = self.summary(path)?;
        let pair = ComparePair {
            left: ContentSource::Live,
            right: ContentSource::Version(summary.rollback_target_version_id.clone()),
        };
        let (live, target) = fetch_pair(store, &FileRef::new(path), &pair)?;
        Ok(compute_diff_with_deadline(&live, &target, self.diff_timeout))
    }

    // ---------------------------------------------------------------------
    // Confirm
    // ---------------------------------------------------------------------

    /// Freeze the selection into a plan. An empty selection is rejected.
    pub fn confirm(&mut self) -> Result<&RollbackPlan, RollbackError> {
        self.require_select_files("confirm")?;
        if self.selected.is_empty() {
            return Err(RollbackError::EmptyPlan);
        }

        let plan = RollbackPlan::from_selection(&self.summaries, &self.selected);
        info!("Rollback plan for {} covers {} files", self.scope, plan.len());
        self.phase = RollbackPhase::Confirm { plan };
        self.plan().ok_or(RollbackError::EmptyPlan)
    }

    /// Leave `Confirm` without submitting; the selection is kept
    pub fn cancel_confirm(&mut self) -> Result<(), RollbackError> {
        if !matches!(self.phase, RollbackPhase::Confirm { .. }) {
            return Err(self.invalid("cancel confirmation"));
        }
        self.phase = RollbackPhase::SelectFiles { error: None };
        Ok(())
    }

    pub fn plan(&self) -> Option<&RollbackPlan> {
        match &self.phase {
            RollbackPhase::Confirm { plan } | RollbackPhase::Submitting { plan } => Some(plan),
            _ => None,
        }
    }

    // ---------------------------------------------------------------------
    // Submitting
    // ---------------------------------------------------------------------

    /// Enter `Submitting`; returns the plan to hand to the store
    pub fn begin_submit(&mut self) -> Result<RollbackPlan, RollbackError> {
        let plan = match &self.phase {
            RollbackPhase::Confirm { plan } => plan.clone(),
            RollbackPhase::SelectFiles { .. } if self.selected.is_empty() => {
                return Err(RollbackError::EmptyPlan);
            }
            _ => return Err(self.invalid("submit")),
        };
        if plan.is_empty() {
            return Err(RollbackError::EmptyPlan);
        }

        info!("Submitting rollback of {} files in {}", plan.len(), self.scope);
        self.phase = RollbackPhase::Submitting { plan: plan.clone() };
        Ok(plan)
    }

    pub fn finish_submit(&mut self, result: Result<(), StoreError>) -> Result<(), RollbackError> {
        if !matches!(self.phase, RollbackPhase::Submitting { .. }) {
            return Err(self.invalid("finish submitting"));
        }

        match result {
            Ok(()) => {
                info!("Rollback in {} completed", self.scope);
                self.phase = RollbackPhase::Done;
                Ok(())
            }
            Err(e) => {
                warn!("Rollback in {} failed: {}", self.scope, e);
                let message = e.to_string();
                self.phase = RollbackPhase::SelectFiles {
                    error: Some(message.clone()),
                };
                Err(RollbackError::Submit(message))
            }
        }
    }

    pub fn submit(&mut self, store: &dyn VersionStore) -> Result<(), RollbackError> {
        let plan = self.begin_submit()?;
        let result = store.submit_rollback(&self.scope, &plan);
        self.finish_submit(result)
    }

    // ---------------------------------------------------------------------
    // Done
    // ---------------------------------------------------------------------

    pub fn is_done(&self) -> bool {
        self.phase == RollbackPhase::Done
    }

    /// Start over with a fresh default cutoff
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.cutoff = now - self.default_window;
        self.summaries.clear();
        self.selected.clear();
        self.phase = RollbackPhase::SelectCutoff { error: None };
    }
}
