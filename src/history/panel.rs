use super::HistoryError;
use super::collapse::render_view;
use super::diff::compute_diff_with_deadline;
use super::selector::{CompareSelector, SelectorState};
use super::types::{ComparePair, ContextLines, DiffResult, DiffView};
use crate::backend::{ContentSource, FileRef, Version, VersionId, VersionStore};
use crate::compare_backend::fetch_pair;
use crate::config::Settings;
use std::time::Duration;
use tracing::{debug, info};

/// Version history of a single file: comparison shortcuts, compare mode and
/// confirmed restores. Index 0 of the version list is the current version.
pub struct HistoryPanel {
    file: FileRef,
    versions: Vec<Version>,
    selector: CompareSelector,
    pending_restore: Option<VersionId>,
    context: ContextLines,
    show_only_changes: bool,
    diff_timeout: Option<Duration>,
}

impl HistoryPanel {
    pub fn new(file: FileRef, settings: &Settings) -> Self {
        Self {
            file,
            versions: Vec::new(),
            selector: CompareSelector::new(),
            pending_restore: None,
            context: ContextLines::new(settings.default_context_lines),
            show_only_changes: settings.show_only_changes,
            diff_timeout: settings.diff_timeout(),
        }
    }

    pub fn file(&self) -> &FileRef {
        &self.file
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn current(&self) -> Option<&Version> {
        self.versions.first()
    }

    /// Replace the version list (newest first). Selections and pending restores
    /// that refer to versions no longer listed are dropped.
    pub fn set_versions(&mut self, versions: Vec<Version>) {
        self.versions = versions;

        let stale: Vec<VersionId> = self
            .selector
            .selected()
            .filter(|id| !self.contains(id))
            .cloned()
            .collect();
        for id in &stale {
            self.selector.deselect(id);
        }
        if let Some(id) = &self.pending_restore
            && !self.contains(id)
        {
            self.pending_restore = None;
        }
    }

    /// Fetch the version list from the store
    pub fn reload(&mut self, store: &dyn VersionStore) -> Result<(), HistoryError> {
        let versions = store.list_versions(&self.file)?;
        debug!("Loaded {} versions of {}", versions.len(), self.file);
        self.set_versions(versions);
        Ok(())
    }

    fn contains(&self, id: &VersionId) -> bool {
        self.versions.iter().any(|version| &version.id == id)
    }

    fn version_at(&self, index: usize) -> Result<&Version, HistoryError> {
        self.versions
            .get(index)
            .ok_or(HistoryError::IndexOutOfRange(index))
    }

    /// Compare the version at `index` against the live file
    pub fn compare_to_current(&self, index: usize) -> Result<ComparePair, HistoryError> {
        let version = self.version_at(index)?;
        Ok(ComparePair {
            left: ContentSource::Version(version.id.clone()),
            right: ContentSource::Live,
        })
    }

    pub fn can_compare_to_previous(&self, index: usize) -> bool {
        index + 1 < self.versions.len()
    }

    /// Compare the version at `index` against the one listed right after it
    pub fn compare_to_previous(&self, index: usize) -> Result<ComparePair, HistoryError> {
        let newer = self.version_at(index)?;
        let older = self
            .versions
            .get(index + 1)
            .ok_or(HistoryError::NoPreviousVersion(index))?;
        Ok(ComparePair {
            left: ContentSource::Version(older.id.clone()),
            right: ContentSource::Version(newer.id.clone()),
        })
    }

    pub fn compare_mode(&self) -> SelectorState {
        self.selector.state()
    }

    pub fn enter_compare_mode(&mut self) {
        self.selector.enter();
    }

    pub fn exit_compare_mode(&mut self) {
        self.selector.exit();
    }

    pub fn toggle_selection(&mut self, id: &VersionId) -> Result<(), HistoryError> {
        if !self.contains(id) {
            return Err(HistoryError::UnknownVersion(id.clone()));
        }
        self.selector.toggle(id.clone());
        Ok(())
    }

    pub fn is_selected(&self, id: &VersionId) -> bool {
        self.selector.is_selected(id)
    }

    /// Compare the two versions picked in compare mode, older on the left
    pub fn compare_selected(&self) -> Result<ComparePair, HistoryError> {
        self.selector.compare(&self.versions)
    }

    /// Ask to restore the version at `index`; nothing happens until
    /// [`confirm_restore`](Self::confirm_restore).
    pub fn request_restore(&mut self, index: usize) -> Result<&Version, HistoryError> {
        if index == 0 {
            return Err(HistoryError::CannotRestoreCurrent);
        }
        let id = self.version_at(index)?.id.clone();
        self.pending_restore = Some(id);
        self.version_at(index)
    }

    pub fn pending_restore(&self) -> Option<&VersionId> {
        self.pending_restore.as_ref()
    }

    pub fn cancel_restore(&mut self) {
        self.pending_restore = None;
    }

    /// Restore the pending version. The store appends a new version holding the
    /// restored content, so restoring the same target twice yields two copies.
    pub fn confirm_restore(&mut self, store: &dyn VersionStore) -> Result<(), HistoryError> {
        let id = self
            .pending_restore
            .clone()
            .ok_or(HistoryError::NoPendingRestore)?;

        store.restore_version(&self.file, &id)?;
        info!("Restored {} to version {}", self.file, id);
        self.pending_restore = None;
        self.reload(store)
    }

    /// Fetch both sides and diff them on the calling thread
    pub fn load_comparison(
        &self,
        store: &dyn VersionStore,
        pair: &ComparePair,
    ) -> Result<DiffResult, HistoryError> {
        let (old, new) = fetch_pair(store, &self.file, pair)?;
        Ok(compute_diff_with_deadline(&old, &new, self.diff_timeout))
    }

    pub fn context(&self) -> ContextLines {
        self.context
    }

    pub fn set_context(&mut self, context: ContextLines) {
        self.context = context;
    }

    pub fn show_only_changes(&self) -> bool {
        self.show_only_changes
    }

    pub fn set_show_only_changes(&mut self, only_changes: bool) {
        self.show_only_changes = only_changes;
    }

    pub fn view(&self, diff: &DiffResult) -> DiffView {
        render_view(diff, self.context, self.show_only_changes)
    }
}
