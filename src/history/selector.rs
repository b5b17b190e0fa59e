//! Selection of two versions of one file for comparison.
//!
//! The selection is a two-slot FIFO: when a third version is chosen the one
//! selected earliest is evicted.

use super::HistoryError;
use super::types::ComparePair;
use crate::backend::{ContentSource, Version, VersionId};
use crate::constant::MAX_COMPARE_SELECTION;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    /// Compare mode is off
    Idle,
    /// Compare mode is on with fewer than two versions held
    Selecting(usize),
    ReadyToCompare,
}

#[derive(Debug, Default)]
pub struct CompareSelector {
    active: bool,
    /// Selected ids in selection order, oldest first
    selected: VecDeque<VersionId>,
}

impl CompareSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SelectorState {
        match (self.active, self.selected.len()) {
            (false, _) => SelectorState::Idle,
            (true, n) if n >= MAX_COMPARE_SELECTION => SelectorState::ReadyToCompare,
            (true, n) => SelectorState::Selecting(n),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn enter(&mut self) {
        self.active = true;
    }

    /// Leave compare mode, dropping every held id
    pub fn exit(&mut self) {
        self.active = false;
        self.selected.clear();
    }

    /// Add `id` to the selection, entering compare mode if needed.
    /// Returns the id evicted to make room, if any.
    pub fn select(&mut self, id: VersionId) -> Option<VersionId> {
        self.active = true;
        if self.selected.contains(&id) {
            return None;
        }

        let evicted = if self.selected.len() >= MAX_COMPARE_SELECTION {
            self.selected.pop_front()
        } else {
            None
        };
        self.selected.push_back(id);
        evicted
    }

    /// Remove `id` if held. Returns whether anything changed.
    pub fn deselect(&mut self, id: &VersionId) -> bool {
        let before = self.selected.len();
        self.selected.retain(|held| held != id);
        before != self.selected.len()
    }

    pub fn toggle(&mut self, id: VersionId) {
        if !self.deselect(&id) {
            self.select(id);
        }
    }

    pub fn is_selected(&self, id: &VersionId) -> bool {
        self.selected.contains(id)
    }

    pub fn selected(&self) -> impl Iterator<Item = &VersionId> {
        self.selected.iter()
    }

    /// Order the two held versions chronologically: older on the left.
    ///
    /// Equal timestamps fall back to list position; `versions` is newest first.
    pub fn compare(&self, versions: &[Version]) -> Result<ComparePair, HistoryError> {
        if self.state() != SelectorState::ReadyToCompare {
            return Err(HistoryError::NotReadyToCompare(self.selected.len()));
        }

        let mut picked = Vec::with_capacity(MAX_COMPARE_SELECTION);
        for id in &self.selected {
            let (position, version) = versions
                .iter()
                .enumerate()
                .find(|(_, version)| &version.id == id)
                .ok_or_else(|| HistoryError::UnknownVersion(id.clone()))?;
            picked.push((
                version.created_at,
                std::cmp::Reverse(position),
                version.id.clone(),
            ));
        }
        picked.sort();

        let mut ordered = picked.into_iter().map(|(_, _, id)| id);
        match (ordered.next(), ordered.next()) {
            (Some(older), Some(newer)) => Ok(ComparePair {
                left: ContentSource::Version(older),
                right: ContentSource::Version(newer),
            }),
            _ => Err(HistoryError::NotReadyToCompare(self.selected.len())),
        }
    }
}
