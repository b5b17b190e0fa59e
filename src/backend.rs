//! Version store interface and shared data model.
//!
//! The store itself lives outside this crate (a REST backend in production).
//! Everything here talks to it through [`VersionStore`]; [`MemoryBackend`] is an
//! in-process implementation used by tests and the demo.

pub mod memory_backend;

use crate::rollback::RollbackPlan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use memory_backend::MemoryBackend;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// Opaque identifier of a stored version
    VersionId
);
opaque_id!(
    /// Opaque reference to a single configuration file
    FileRef
);
opaque_id!(
    /// Opaque reference to a group of files (a server, a project...)
    ScopeRef
);

/// Errors reported by a version store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("File not found: {0}")]
    FileNotFound(FileRef),

    #[error("Version not found: {0}")]
    VersionNotFound(VersionId),

    #[error("Rejected by store: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// An immutable snapshot of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Per-file summary of what changed after a cutoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeSummary {
    pub path: String,
    pub file_name: String,
    pub versions_since_cutoff: usize,
    pub latest_change_at: DateTime<Utc>,
    pub rollback_target_version_id: VersionId,
}

/// Where one side of a comparison is read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentSource {
    Version(VersionId),
    /// The live file, fetched directly rather than from history
    Live,
}

impl fmt::Display for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentSource::Version(id) => write!(f, "version {}", id),
            ContentSource::Live => f.write_str("live"),
        }
    }
}

/// Operations this crate consumes from the version store.
///
/// Calls block; run them on a worker thread when the caller is interactive.
pub trait VersionStore: Send + Sync {
    /// Versions of `file`, newest first
    fn list_versions(&self, file: &FileRef) -> Result<Vec<Version>, StoreError>;

    fn get_version_content(
        &self,
        file: &FileRef,
        version: &VersionId,
    ) -> Result<Option<String>, StoreError>;

    fn get_live_content(&self, file: &FileRef) -> Result<Option<String>, StoreError>;

    /// Append a new version whose content equals `version`'s
    fn restore_version(&self, file: &FileRef, version: &VersionId) -> Result<(), StoreError>;

    fn list_changed_since(
        &self,
        scope: &ScopeRef,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<FileChangeSummary>, StoreError>;

    fn submit_rollback(&self, scope: &ScopeRef, plan: &RollbackPlan) -> Result<(), StoreError>;
}

/// Fetch one side of a comparison. Missing content is treated as an empty document.
pub fn fetch_content(
    store: &dyn VersionStore,
    file: &FileRef,
    source: &ContentSource,
) -> Result<String, StoreError> {
    let content = match source {
        ContentSource::Version(id) => store.get_version_content(file, id)?,
        ContentSource::Live => store.get_live_content(file)?,
    };
    Ok(content.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_transparently() {
        let id = VersionId::new("v7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"v7\"");
        let back: VersionId = serde_json::from_str("\"v7\"").unwrap();
        assert_eq!(back, id);
        assert_eq!(id.to_string(), "v7");
    }

    #[test]
    fn fetch_content_normalizes_missing_content() {
        let store = MemoryBackend::new();
        let file = FileRef::new("empty.yml");
        store.register_file(&file);

        let content = fetch_content(&store, &file, &ContentSource::Live).unwrap();
        assert_eq!(content, "");
    }

    #[test]
    fn fetch_content_reads_versions() {
        let store = MemoryBackend::new();
        let file = FileRef::new("app.yml");
        let v1 = store.save(&file, "port: 80\n");
        store.save(&file, "port: 8080\n");

        let old = fetch_content(&store, &file, &ContentSource::Version(v1)).unwrap();
        let live = fetch_content(&store, &file, &ContentSource::Live).unwrap();
        assert_eq!(old, "port: 80\n");
        assert_eq!(live, "port: 8080\n");
    }
}
