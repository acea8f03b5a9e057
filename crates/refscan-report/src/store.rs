//! Session-scoped report stores
//!
//! A store holds the report of one session between scan steps. Merging is a
//! read-modify-write, so a session must have at most one active scan at a
//! time; the stores serialize merges within a process but nothing more.

use crate::report::BrokenReferenceReport;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Report store failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backing file could not be read or written
    #[error("report store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored report is not valid JSON
    #[error("report store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Session name cannot be used as a file name
    #[error("invalid session name: {0:?}")]
    InvalidSession(String),

    /// Backend-specific failure
    #[error("report store backend error: {0}")]
    Backend(String),
}

/// Durable, session-scoped home of the broken reference report
///
/// Precondition: at most one active scan per session.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Drop the whole report
    ///
    /// # Errors
    /// Returns error if the report cannot be removed
    async fn clear(&self) -> Result<(), StoreError>;

    /// Append a fragment to the stored report
    ///
    /// The fragment is either fully merged or the call fails.
    ///
    /// # Errors
    /// Returns error if the report cannot be read or written
    async fn merge(&self, fragment: &BrokenReferenceReport) -> Result<(), StoreError>;

    /// Current report; empty when nothing was stored
    ///
    /// # Errors
    /// Returns error if the report cannot be read
    async fn read(&self) -> Result<BrokenReferenceReport, StoreError>;
}

/// Report store held in memory
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    report: Mutex<BrokenReferenceReport>,
}

impl MemoryReportStore {
    /// Empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn clear(&self) -> Result<(), StoreError> {
        *self.report.lock() = BrokenReferenceReport::new();
        Ok(())
    }

    async fn merge(&self, fragment: &BrokenReferenceReport) -> Result<(), StoreError> {
        self.report.lock().merge(fragment.clone());
        Ok(())
    }

    async fn read(&self) -> Result<BrokenReferenceReport, StoreError> {
        Ok(self.report.lock().clone())
    }
}

/// Report store persisted as one JSON document per session
#[derive(Debug)]
pub struct JsonFileReportStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileReportStore {
    /// Store backed by an explicit file
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Store for a named session under `dir`
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidSession`] unless the name is non-empty
    /// and made of ASCII alphanumerics, `-` and `_`
    pub fn for_session(dir: impl AsRef<Path>, session: &str) -> Result<Self, StoreError> {
        let valid = !session.is_empty()
            && session
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidSession(session.to_string()));
        }
        Ok(Self::new(dir.as_ref().join(format!("{session}.broken.json"))))
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BrokenReferenceReport, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(BrokenReferenceReport::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Write through a sibling temp file so readers never see half a report
    async fn save(&self, report: &BrokenReferenceReport) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec(report)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ReportStore for JsonFileReportStore {
    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn merge(&self, fragment: &BrokenReferenceReport) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut report = self.load().await?;
        report.merge(fragment.clone());
        self.save(&report).await?;
        tracing::debug!(path = %self.path.display(), sources = fragment.source_count(), "fragment merged");
        Ok(())
    }

    async fn read(&self) -> Result<BrokenReferenceReport, StoreError> {
        self.load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refscan_host::EntityId;

    fn fragment(source: u64, target: u64) -> BrokenReferenceReport {
        let mut report = BrokenReferenceReport::new();
        report.record(
            "node",
            "article",
            "field_author",
            EntityId::new(source),
            EntityId::new(target),
        );
        report
    }

    #[tokio::test]
    async fn memory_store_appends_and_clears() {
        let store = MemoryReportStore::new();
        store.merge(&fragment(1, 42)).await.unwrap();
        store.merge(&fragment(1, 43)).await.unwrap();

        let report = store.read().await.unwrap();
        assert_eq!(report.target_count(), 2);

        store.clear().await.unwrap();
        assert!(store.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_store_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileReportStore::for_session(dir.path(), "admin").unwrap();
        assert!(store.read().await.unwrap().is_empty());

        store.merge(&fragment(1, 42)).await.unwrap();
        store.merge(&fragment(2, 43)).await.unwrap();

        let reopened = JsonFileReportStore::for_session(dir.path(), "admin").unwrap();
        let report = reopened.read().await.unwrap();
        assert_eq!(report.source_count(), 2);

        reopened.clear().await.unwrap();
        reopened.clear().await.unwrap();
        assert!(store.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let a = JsonFileReportStore::for_session(dir.path(), "a").unwrap();
        let b = JsonFileReportStore::for_session(dir.path(), "b").unwrap();

        a.merge(&fragment(1, 42)).await.unwrap();
        assert!(b.read().await.unwrap().is_empty());
    }

    #[test]
    fn rejects_path_like_sessions() {
        assert!(matches!(
            JsonFileReportStore::for_session("/tmp", "../etc"),
            Err(StoreError::InvalidSession(_))
        ));
        assert!(JsonFileReportStore::for_session("/tmp", "").is_err());
    }

    #[tokio::test]
    async fn corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileReportStore::for_session(dir.path(), "broken").unwrap();
        tokio::fs::write(store.path(), b"{not json").await.unwrap();

        assert!(matches!(
            store.read().await,
            Err(StoreError::Serialization(_))
        ));
    }
}
