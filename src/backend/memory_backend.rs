use super::{
    FileChangeSummary, FileRef, ScopeRef, StoreError, Version, VersionId, VersionStore,
};
use crate::rollback::RollbackPlan;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;
use xxhash_rust::xxh64::xxh64;

/// One entry in a file's history, oldest first in storage
#[derive(Debug, Clone)]
struct HistoryEntry {
    version: Version,
    hash: String,
}

#[derive(Default)]
struct Inner {
    /// Content-addressed blobs, deduplicated by hash
    blobs: HashMap<String, String>,
    histories: BTreeMap<FileRef, Vec<HistoryEntry>>,
    scopes: BTreeMap<ScopeRef, BTreeSet<FileRef>>,
    reject_next_submit: Option<String>,
    submitted: Vec<(ScopeRef, RollbackPlan)>,
}

/// In-memory version store with content-addressable blob storage
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate XXHash64 of content and return as hex string
    fn calculate_hash(content: &str) -> String {
        let hash = xxh64(content.as_bytes(), 0);
        format!("{:016x}", hash)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create an empty history for `file` so live reads succeed before the first save
    pub fn register_file(&self, file: &FileRef) {
        self.lock().histories.entry(file.clone()).or_default();
    }

    /// Make `file` part of `scope` for cutoff queries
    pub fn add_to_scope(&self, scope: &ScopeRef, file: &FileRef) {
        let mut inner = self.lock();
        inner.histories.entry(file.clone()).or_default();
        inner
            .scopes
            .entry(scope.clone())
            .or_default()
            .insert(file.clone());
    }

    /// Save a new version stamped with the current time
    pub fn save(&self, file: &FileRef, content: &str) -> VersionId {
        self.save_at(file, content, Utc::now(), None)
    }

    /// Save a new version with an explicit timestamp and message
    pub fn save_at(
        &self,
        file: &FileRef,
        content: &str,
        created_at: DateTime<Utc>,
        message: Option<&str>,
    ) -> VersionId {
        let mut inner = self.lock();
        let hash = Self::calculate_hash(content);
        inner
            .blobs
            .entry(hash.clone())
            .or_insert_with(|| content.to_string());

        let id = VersionId::new(Uuid::new_v4().to_string());
        inner
            .histories
            .entry(file.clone())
            .or_default()
            .push(HistoryEntry {
                version: Version {
                    id: id.clone(),
                    created_at,
                    message: message.map(str::to_string),
                },
                hash,
            });
        id
    }

    /// Reject the next rollback submission with `message`
    pub fn reject_next_submit(&self, message: impl Into<String>) {
        self.lock().reject_next_submit = Some(message.into());
    }

    /// Plans accepted so far, in submission order
    pub fn submitted_plans(&self) -> Vec<(ScopeRef, RollbackPlan)> {
        self.lock().submitted.clone()
    }

    /// Number of distinct blobs held
    pub fn blob_count(&self) -> usize {
        self.lock().blobs.len()
    }

    fn find_entry<'a>(
        inner: &'a Inner,
        file: &FileRef,
        version: &VersionId,
    ) -> Result<&'a HistoryEntry, StoreError> {
        inner
            .histories
            .get(file)
            .ok_or_else(|| StoreError::FileNotFound(file.clone()))?
            .iter()
            .find(|entry| &entry.version.id == version)
            .ok_or_else(|| StoreError::VersionNotFound(version.clone()))
    }

    /// Append a copy of `version` to the history of `file`
    fn append_copy(
        inner: &mut Inner,
        file: &FileRef,
        version: &VersionId,
        message: String,
    ) -> Result<VersionId, StoreError> {
        let hash = Self::find_entry(inner, file, version)?.hash.clone();
        let id = VersionId::new(Uuid::new_v4().to_string());
        let history = inner
            .histories
            .get_mut(file)
            .ok_or_else(|| StoreError::FileNotFound(file.clone()))?;
        history.push(HistoryEntry {
            version: Version {
                id: id.clone(),
                created_at: Utc::now(),
                message: Some(message),
            },
            hash,
        });
        Ok(id)
    }
}

fn file_name_of(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

impl VersionStore for MemoryBackend {
    fn list_versions(&self, file: &FileRef) -> Result<Vec<Version>, StoreError> {
        let inner = self.lock();
        let history = inner
            .histories
            .get(file)
            .ok_or_else(|| StoreError::FileNotFound(file.clone()))?;
        Ok(history.iter().rev().map(|entry| entry.version.clone()).collect())
    }

    fn get_version_content(
        &self,
        file: &FileRef,
        version: &VersionId,
    ) -> Result<Option<String>, StoreError> {
        let inner = self.lock();
        let entry = Self::find_entry(&inner, file, version)?;
        Ok(inner.blobs.get(&entry.hash).cloned())
    }

    fn get_live_content(&self, file: &FileRef) -> Result<Option<String>, StoreError> {
        let inner = self.lock();
        let history = inner
            .histories
            .get(file)
            .ok_or_else(|| StoreError::FileNotFound(file.clone()))?;
        Ok(history
            .last()
            .and_then(|entry| inner.blobs.get(&entry.hash).cloned()))
    }

    fn restore_version(&self, file: &FileRef, version: &VersionId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let message = format!("Restored from {}", version);
        let id = Self::append_copy(&mut inner, file, version, message)?;
        tracing::debug!("Restored {} of {} as {}", version, file, id);
        Ok(())
    }

    fn list_changed_since(
        &self,
        scope: &ScopeRef,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<FileChangeSummary>, StoreError> {
        let inner = self.lock();
        let Some(files) = inner.scopes.get(scope) else {
            return Ok(Vec::new());
        };

        let mut summaries = Vec::new();
        for file in files {
            let Some(history) = inner.histories.get(file) else {
                continue;
            };
            let changed: Vec<&HistoryEntry> = history
                .iter()
                .filter(|entry| entry.version.created_at > cutoff)
                .collect();
            let Some(latest) = changed.iter().map(|e| e.version.created_at).max() else {
                continue;
            };
            // Files created after the cutoff have nothing to roll back to
            let Some(target) = history
                .iter()
                .filter(|entry| entry.version.created_at <= cutoff)
                .max_by_key(|entry| entry.version.created_at)
            else {
                continue;
            };

            summaries.push(FileChangeSummary {
                path: file.to_string(),
                file_name: file_name_of(file.as_str()),
                versions_since_cutoff: changed.len(),
                latest_change_at: latest,
                rollback_target_version_id: target.version.id.clone(),
            });
        }
        Ok(summaries)
    }

    fn submit_rollback(&self, scope: &ScopeRef, plan: &RollbackPlan) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(message) = inner.reject_next_submit.take() {
            return Err(StoreError::Rejected(message));
        }

        // Validate every target before touching any history
        for target in plan.targets() {
            let file = FileRef::new(target.path.as_str());
            Self::find_entry(&inner, &file, &target.to_version_id)?;
        }
        for target in plan.targets() {
            Self::append_copy(
                &mut inner,
                &FileRef::new(target.path.as_str()),
                &target.to_version_id,
                format!("Rolled back to {}", target.to_version_id),
            )?;
        }
        inner.submitted.push((scope.clone(), plan.clone()));
        Ok(())
    }
}
