//! Finished report storage

use crate::error::{Result, ServiceError};
use crate::registry::SessionRegistry;
use crate::session::{ReportHandle, ReportSummary, SessionId, SessionStatus};
use pulse_analysis::ReportArtifact;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::io::AsyncWriteExt;

/// A stored report, ready to serve
#[derive(Debug, Clone)]
pub struct StoredReport {
    pub handle: ReportHandle,
    pub html: String,
}

/// Reports written to disk, indexed by session
///
/// Each session can store exactly one report. The HTML file is written
/// before the index entry appears, so a handle always points at a file.
#[derive(Debug)]
pub struct ReportStore {
    dir: PathBuf,
    registry: Arc<SessionRegistry>,
    index: RwLock<HashMap<SessionId, ReportHandle>>,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>, registry: Arc<SessionRegistry>) -> Self {
        Self {
            dir: dir.into(),
            registry,
            index: RwLock::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: SessionId) -> PathBuf {
        self.dir.join(format!("{id}.html"))
    }

    fn lookup(&self, id: SessionId) -> Result<Option<ReportHandle>> {
        Ok(self
            .index
            .read()
            .map_err(|e| ServiceError::poisoned("report index", e))?
            .get(&id)
            .cloned())
    }

    /// Persist the report for `id`
    ///
    /// A second put for the same session fails with `AlreadyStored`.
    pub async fn put(&self, id: SessionId, artifact: &ReportArtifact) -> Result<ReportHandle> {
        if self.lookup(id)?.is_some() {
            return Err(ServiceError::AlreadyStored(id));
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(id);

        // create_new makes the file itself the exactly-once guard.
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ServiceError::AlreadyStored(id));
            },
            Err(e) => return Err(e.into()),
        };
        file.write_all(artifact.html.as_bytes()).await?;
        file.flush().await?;

        let handle = ReportHandle::new(id, path).with_summary(ReportSummary::from(artifact));
        self.index
            .write()
            .map_err(|e| ServiceError::poisoned("report index", e))?
            .insert(id, handle.clone());

        tracing::debug!(session_id = %id, path = %handle.path.display(), bytes = artifact.html.len(), "Report stored");
        Ok(handle)
    }

    /// The stored report for `id`
    ///
    /// Served only once the session is `COMPLETE`, even if the file was
    /// already written. `NotReady` for any other status, `NotFound` when the
    /// session is unknown.
    pub async fn get(&self, id: SessionId) -> Result<StoredReport> {
        let session = self.registry.get(id)?;
        if session.status != SessionStatus::Complete {
            return Err(ServiceError::NotReady {
                id,
                status: session.status,
            });
        }
        let Some(handle) = self.lookup(id)? else {
            return Err(ServiceError::NotReady {
                id,
                status: session.status,
            });
        };

        let html = tokio::fs::read_to_string(&handle.path).await?;
        Ok(StoredReport { handle, html })
    }

    /// Forget and delete the report for `id`
    pub async fn remove(&self, id: SessionId) -> Result<bool> {
        let removed = self
            .index
            .write()
            .map_err(|e| ServiceError::poisoned("report index", e))?
            .remove(&id);

        let Some(handle) = removed else {
            return Ok(false);
        };

        match tokio::fs::remove_file(&handle.path).await {
            Ok(()) => {},
            Err(e) if e.kind() == ErrorKind::NotFound => {},
            Err(e) => return Err(e.into()),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::subject;
    use chrono::Utc;
    use pulse_analysis::TradingSignals;

    fn artifact(html: &str) -> ReportArtifact {
        ReportArtifact {
            symbol: "AAPL".to_string(),
            generated_at: Utc::now(),
            has_insights: false,
            last_close: 187.5,
            signals: TradingSignals::default(),
            html: html.to_string(),
        }
    }

    fn store() -> (ReportStore, Arc<SessionRegistry>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let store = ReportStore::new(tmp.path().join("reports"), Arc::clone(&registry));
        (store, registry, tmp)
    }

    /// Create a session and claim it, as the runner does before storing
    fn running(registry: &SessionRegistry) -> SessionId {
        let id = registry.create(subject("AAPL")).unwrap();
        registry.claim(id).unwrap();
        id
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (store, registry, _tmp) = store();
        let id = running(&registry);

        let handle = store.put(id, &artifact("<html>ok</html>")).await.unwrap();
        assert_eq!(handle.session_id, id);
        assert!(handle.path.ends_with(format!("{id}.html")));
        assert_eq!(handle.url, format!("/api/report/{id}"));
        assert_eq!(handle.summary.as_ref().unwrap().last_close, 187.5);

        registry.update(id, |s| s.complete(handle.clone())).unwrap();
        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.html, "<html>ok</html>");
        assert_eq!(stored.handle, handle);
    }

    #[tokio::test]
    async fn test_stored_report_hidden_until_complete() {
        let (store, registry, _tmp) = store();
        let id = running(&registry);

        let handle = store.put(id, &artifact("<html>early</html>")).await.unwrap();
        assert!(handle.path.exists());
        assert!(matches!(
            store.get(id).await,
            Err(ServiceError::NotReady { status: SessionStatus::Running, .. })
        ));

        registry
            .update(id, |s| s.fail(crate::pipeline::Stage::Report, "disk full"))
            .unwrap();
        assert!(matches!(
            store.get(id).await,
            Err(ServiceError::NotReady { status: SessionStatus::Error, .. })
        ));
    }

    #[tokio::test]
    async fn test_put_is_exactly_once() {
        let (store, registry, _tmp) = store();
        let id = running(&registry);

        let handle = store.put(id, &artifact("first")).await.unwrap();
        let second = store.put(id, &artifact("second")).await;
        assert!(matches!(second, Err(ServiceError::AlreadyStored(got)) if got == id));

        registry.update(id, |s| s.complete(handle)).unwrap();
        assert_eq!(store.get(id).await.unwrap().html, "first");
    }

    #[tokio::test]
    async fn test_not_ready_vs_not_found() {
        let (store, registry, _tmp) = store();
        let id = registry.create(subject("AAPL")).unwrap();

        assert!(matches!(
            store.get(id).await,
            Err(ServiceError::NotReady { status: SessionStatus::Pending, .. })
        ));

        registry.claim(id).unwrap();
        assert!(matches!(
            store.get(id).await,
            Err(ServiceError::NotReady { status: SessionStatus::Running, .. })
        ));

        assert!(matches!(
            store.get(SessionId::new()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove() {
        let (store, registry, _tmp) = store();
        let id = running(&registry);
        let handle = store.put(id, &artifact("bye")).await.unwrap();

        assert!(store.remove(id).await.unwrap());
        assert!(!handle.path.exists());
        assert!(!store.remove(id).await.unwrap());
    }
}
