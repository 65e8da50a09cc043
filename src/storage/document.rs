#[cfg(test)]
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::ServiceError;

/// Content digest of a stored document, used as an optimistic version token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version(u64);

impl Version {
    pub fn of(body: &[u8]) -> Self {
        let digest = Sha256::digest(body);
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Version(u64::from_be_bytes(prefix))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub version: Version,
    pub body: Vec<u8>,
}

/// Write condition for [`DocumentStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Overwrite whatever is there.
    Any,
    /// Current version must equal this one; `None` means the document must not exist yet.
    Matches(Option<Version>),
}

#[derive(Debug)]
pub enum StorageError {
    VersionMismatch { expected: Option<Version>, found: Option<Version> },
    Io(std::io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::VersionMismatch { expected, found } => write!(
                f,
                "document changed concurrently (expected {}, found {})",
                fmt_version(expected),
                fmt_version(found)
            ),
            StorageError::Io(e) => write!(f, "{e}"),
        }
    }
}

fn fmt_version(v: &Option<Version>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "none".into())
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::VersionMismatch { .. } => ServiceError::Conflict(
                "Roster was modified by another request; reload and try again".into(),
            ),
            StorageError::Io(e) => ServiceError::Storage(e.to_string()),
        }
    }
}

/// Named opaque documents with get-latest and conditional overwrite.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_latest(&self, name: &str) -> Result<Option<StoredDocument>, StorageError>;

    async fn put(
        &self,
        name: &str,
        body: Vec<u8>,
        precondition: Precondition,
    ) -> Result<Version, StorageError>;
}

fn check(precondition: Precondition, current: Option<Version>) -> Result<(), StorageError> {
    match precondition {
        Precondition::Any => Ok(()),
        Precondition::Matches(expected) if expected == current => Ok(()),
        Precondition::Matches(expected) => Err(StorageError::VersionMismatch {
            expected,
            found: current,
        }),
    }
}

/// One file per document inside `root`.
///
/// Writes go to a temp file and are renamed into place. The compare-and-swap
/// is serialized by a process-local lock, so it only guards writers sharing
/// this store instance.
pub struct FileDocumentStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    async fn read(&self, name: &str) -> Result<Option<StoredDocument>, StorageError> {
        match tokio::fs::read(self.path(name)).await {
            Ok(body) => Ok(Some(StoredDocument {
                version: Version::of(&body),
                body,
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn get_latest(&self, name: &str) -> Result<Option<StoredDocument>, StorageError> {
        self.read(name).await
    }

    async fn put(
        &self,
        name: &str,
        body: Vec<u8>,
        precondition: Precondition,
    ) -> Result<Version, StorageError> {
        let _guard = self.write_lock.lock().await;

        let current = self.read(name).await?.map(|d| d.version);
        check(precondition, current)?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(StorageError::Io)?;
        let target = self.path(name);
        let tmp = self.path(&format!(".{name}.tmp"));
        tokio::fs::write(&tmp, &body).await.map_err(StorageError::Io)?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(StorageError::Io)?;

        let version = Version::of(&body);
        debug!(document = name, %version, bytes = body.len(), "Document written");
        Ok(version)
    }
}

/// In-process store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<String, StoredDocument>>,
}

#[cfg(test)]
#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_latest(&self, name: &str) -> Result<Option<StoredDocument>, StorageError> {
        Ok(self.docs.lock().await.get(name).cloned())
    }

    async fn put(
        &self,
        name: &str,
        body: Vec<u8>,
        precondition: Precondition,
    ) -> Result<Version, StorageError> {
        let mut docs = self.docs.lock().await;
        check(precondition, docs.get(name).map(|d| d.version))?;
        let version = Version::of(&body);
        docs.insert(name.to_string(), StoredDocument { version, body });
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn file_store_missing_document_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path());
        assert!(store.get_latest("students.json").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn file_store_write_if_match() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path().join("nested"));

        let v1 = store
            .put("doc.json", b"[]".to_vec(), Precondition::Matches(None))
            .await
            .unwrap();
        let latest = store.get_latest("doc.json").await.unwrap().unwrap();
        assert_eq!(latest.version, v1);
        assert_eq!(latest.body, b"[]");

        // creating again must fail: the document exists now
        let err = store
            .put("doc.json", b"[1]".to_vec(), Precondition::Matches(None))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::VersionMismatch { .. }));

        let v2 = store
            .put("doc.json", b"[1]".to_vec(), Precondition::Matches(Some(v1)))
            .await
            .unwrap();
        assert_ne!(v1, v2);

        // stale token loses
        let err = store
            .put("doc.json", b"[2]".to_vec(), Precondition::Matches(Some(v1)))
            .await
            .unwrap_err();
        assert!(matches!(ServiceError::from(err), ServiceError::Conflict(_)));

        store
            .put("doc.json", b"[3]".to_vec(), Precondition::Any)
            .await
            .unwrap();
        assert_eq!(store.get_latest("doc.json").await.unwrap().unwrap().body, b"[3]");
    }

    #[actix_web::test]
    async fn memory_store_behaves_like_file_store() {
        let store = MemoryDocumentStore::default();
        let v1 = store
            .put("doc", b"a".to_vec(), Precondition::Any)
            .await
            .unwrap();
        assert!(store
            .put("doc", b"b".to_vec(), Precondition::Matches(None))
            .await
            .is_err());
        store
            .put("doc", b"b".to_vec(), Precondition::Matches(Some(v1)))
            .await
            .unwrap();
        assert_eq!(store.get_latest("doc").await.unwrap().unwrap().body, b"b");
    }

    #[test]
    fn version_is_content_derived() {
        assert_eq!(Version::of(b"[]"), Version::of(b"[]"));
        assert_ne!(Version::of(b"[]"), Version::of(b"[ ]"));
        assert_eq!(Version::of(b"x").to_string().len(), 16);
    }
}
