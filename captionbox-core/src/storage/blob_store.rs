use crate::error::{CaptionboxError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Logical partition of blob storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Images,
    Texts,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Images, Namespace::Texts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Images => "images",
            Namespace::Texts => "texts",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of sweeping a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub removed: usize,
    pub failed: Vec<String>,
}

/// Raw byte storage keyed by namespace and name.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, namespace: Namespace, name: &str, data: Bytes) -> Result<()>;

    async fn get(&self, namespace: Namespace, name: &str) -> Result<Bytes>;

    /// Deleting a blob that does not exist is not an error.
    async fn delete(&self, namespace: Namespace, name: &str) -> Result<()>;

    async fn list(&self, namespace: Namespace) -> Result<Vec<String>>;

    async fn exists(&self, namespace: Namespace, name: &str) -> Result<bool>;

    /// Remove every file in the namespace, continuing past individual failures.
    async fn clear(&self, namespace: Namespace) -> Result<ClearReport>;
}

/// Filesystem blob store: one directory per namespace.
pub struct FsBlobStore {
    images_dir: PathBuf,
    texts_dir: PathBuf,
    atomic_writes: bool,
}

impl FsBlobStore {
    pub fn new(images_dir: PathBuf, texts_dir: PathBuf, atomic_writes: bool) -> Result<Self> {
        std::fs::create_dir_all(&images_dir)?;
        std::fs::create_dir_all(&texts_dir)?;
        Ok(Self {
            images_dir,
            texts_dir,
            atomic_writes,
        })
    }

    pub fn namespace_dir(&self, namespace: Namespace) -> &Path {
        match namespace {
            Namespace::Images => &self.images_dir,
            Namespace::Texts => &self.texts_dir,
        }
    }

    fn blob_path(&self, namespace: Namespace, name: &str) -> Result<PathBuf> {
        validate_blob_name(name)?;
        Ok(self.namespace_dir(namespace).join(name))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, namespace: Namespace, name: &str, data: Bytes) -> Result<()> {
        let blob_path = self.blob_path(namespace, name)?;
        fs::create_dir_all(self.namespace_dir(namespace)).await?;

        if self.atomic_writes {
            // Dot-prefixed so a half-written temp never matches a stored name.
            let temp_path = self
                .namespace_dir(namespace)
                .join(format!(".{}.tmp", name));
            let written = write_file(&temp_path, &data).await;
            if let Err(error) = written {
                let _ = fs::remove_file(&temp_path).await;
                return Err(error);
            }
            if let Err(error) = fs::rename(&temp_path, &blob_path).await {
                let _ = fs::remove_file(&temp_path).await;
                return Err(error.into());
            }
        } else if let Err(error) = write_file(&blob_path, &data).await {
            let _ = fs::remove_file(&blob_path).await;
            return Err(error);
        }

        tracing::debug!("Stored blob {}/{} ({} bytes)", namespace, name, data.len());
        Ok(())
    }

    async fn get(&self, namespace: Namespace, name: &str) -> Result<Bytes> {
        let blob_path = self.blob_path(namespace, name)?;

        match fs::read(&blob_path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(CaptionboxError::BlobNotFound {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn delete(&self, namespace: Namespace, name: &str) -> Result<()> {
        let blob_path = self.blob_path(namespace, name)?;

        match fs::remove_file(&blob_path).await {
            Ok(()) => {
                tracing::debug!("Deleted blob {}/{}", namespace, name);
                Ok(())
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn list(&self, namespace: Namespace) -> Result<Vec<String>> {
        let dir = self.namespace_dir(namespace);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    if !name.starts_with('.') {
                        names.push(name.to_string());
                    }
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn exists(&self, namespace: Namespace, name: &str) -> Result<bool> {
        let blob_path = self.blob_path(namespace, name)?;
        match fs::metadata(&blob_path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    async fn clear(&self, namespace: Namespace) -> Result<ClearReport> {
        let dir = self.namespace_dir(namespace);
        let mut report = ClearReport::default();
        if !dir.exists() {
            fs::create_dir_all(dir).await?;
            return Ok(report);
        }

        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            match fs::remove_file(entry.path()).await {
                Ok(()) => report.removed += 1,
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => {
                    tracing::warn!("Failed to remove {}/{}: {}", namespace, name, error);
                    report.failed.push(name);
                }
            }
        }

        Ok(report)
    }
}

async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

/// Blob names are single, visible path components.
pub fn validate_blob_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);

    if invalid {
        return Err(CaptionboxError::InvalidInput(format!(
            "invalid blob name: {:?}",
            name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(root: &Path) -> FsBlobStore {
        FsBlobStore::new(root.join("images"), root.join("texts"), true).unwrap()
    }

    #[tokio::test]
    async fn test_blob_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());

        let data = Bytes::from("test data content");
        store.put(Namespace::Images, "abc_cat.png", data.clone()).await.unwrap();

        let retrieved = store.get(Namespace::Images, "abc_cat.png").await.unwrap();
        assert_eq!(retrieved, data);

        assert!(store.exists(Namespace::Images, "abc_cat.png").await.unwrap());
        assert!(!store.exists(Namespace::Texts, "abc_cat.png").await.unwrap());

        let names = store.list(Namespace::Images).await.unwrap();
        assert_eq!(names, vec!["abc_cat.png".to_string()]);

        store.delete(Namespace::Images, "abc_cat.png").await.unwrap();
        assert!(!store.exists(Namespace::Images, "abc_cat.png").await.unwrap());

        // Second delete is a no-op.
        store.delete(Namespace::Images, "abc_cat.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_missing_blob() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());

        let error = store.get(Namespace::Texts, "missing.txt").await.unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_put_overwrites_without_atomic_writes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let store = FsBlobStore::new(root.join("i"), root.join("t"), false).unwrap();

        store.put(Namespace::Texts, "a.txt", Bytes::from("one")).await.unwrap();
        store.put(Namespace::Texts, "a.txt", Bytes::from("two")).await.unwrap();
        assert_eq!(store.get(Namespace::Texts, "a.txt").await.unwrap(), Bytes::from("two"));
    }

    #[tokio::test]
    async fn test_put_recreates_removed_namespace_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());

        std::fs::remove_dir_all(temp_dir.path().join("texts")).unwrap();
        store.put(Namespace::Texts, "a.txt", Bytes::from("hi")).await.unwrap();
        assert!(store.exists(Namespace::Texts, "a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_sweeps_only_one_namespace() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());

        store.put(Namespace::Images, "a.png", Bytes::from("a")).await.unwrap();
        store.put(Namespace::Images, "b.png", Bytes::from("b")).await.unwrap();
        store.put(Namespace::Texts, "a.txt", Bytes::from("a")).await.unwrap();

        let report = store.clear(Namespace::Images).await.unwrap();
        assert_eq!(report.removed, 2);
        assert!(report.failed.is_empty());
        assert!(store.list(Namespace::Images).await.unwrap().is_empty());
        assert_eq!(store.list(Namespace::Texts).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_path_like_names() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());

        for name in ["", "../escape.png", "a/b.png", "a\\b.png", ".hidden"] {
            let error = store
                .put(Namespace::Images, name, Bytes::from("x"))
                .await
                .unwrap_err();
            assert!(error.is_invalid_input(), "{name:?} should be rejected");
        }
    }
}
