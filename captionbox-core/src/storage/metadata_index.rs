use crate::config::CorruptIndexPolicy;
use crate::error::{CaptionboxError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};

/// Metadata for one uploaded image/description pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// Stored image name, `{key}_{original_filename}`.
    #[serde(skip)]
    pub filename: String,
    pub original_filename: String,
    pub description: String,
    pub text_filename: String,
    /// Seconds since the Unix epoch.
    pub upload_time: f64,
}

/// Image name to descriptor, in document order.
///
/// New entries are appended, so iteration follows upload order. Removal must
/// use `shift_remove` to keep it that way.
pub type IndexEntries = IndexMap<String, AssetDescriptor>;

/// Whole-document JSON index of uploaded assets.
///
/// Every mutation is load, modify, save. Callers that modify must hold
/// [`MetadataIndex::write_lock`] for the whole sequence.
pub struct MetadataIndex {
    path: PathBuf,
    on_corrupt: CorruptIndexPolicy,
    write_lock: Mutex<()>,
}

impl MetadataIndex {
    pub fn new(path: PathBuf, on_corrupt: CorruptIndexPolicy) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            path,
            on_corrupt,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub async fn load(&self) -> Result<IndexEntries> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(IndexEntries::new());
            }
            Err(error) => return self.unreadable(error.to_string()),
        };

        match serde_json::from_slice::<IndexEntries>(&raw) {
            Ok(mut entries) => {
                for (filename, descriptor) in entries.iter_mut() {
                    descriptor.filename = filename.clone();
                }
                Ok(entries)
            }
            Err(error) => self.unreadable(error.to_string()),
        }
    }

    fn unreadable(&self, reason: String) -> Result<IndexEntries> {
        match self.on_corrupt {
            CorruptIndexPolicy::Reset => {
                tracing::warn!(
                    "Ignoring unreadable metadata index {:?}: {}",
                    self.path,
                    reason
                );
                Ok(IndexEntries::new())
            }
            CorruptIndexPolicy::Fail => Err(CaptionboxError::CorruptIndex(format!(
                "{:?}: {}",
                self.path, reason
            ))),
        }
    }

    /// Replace the document with `entries`, via a temp file and rename.
    pub async fn save(&self, entries: &IndexEntries) -> Result<()> {
        let payload = serde_json::to_vec_pretty(entries)?;
        let temp_path = self.temp_path();

        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&payload).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &self.path).await
        }
        .await;

        if let Err(error) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(CaptionboxError::Storage(format!(
                "failed to save metadata index {:?}: {}",
                self.path, error
            )));
        }

        tracing::debug!("Saved metadata index with {} entries", entries.len());
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.save(&IndexEntries::new()).await
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(filename: &str, description: &str, upload_time: f64) -> AssetDescriptor {
        AssetDescriptor {
            filename: filename.to_string(),
            original_filename: "cat.png".to_string(),
            description: description.to_string(),
            text_filename: filename.replace(".png", ".txt"),
            upload_time,
        }
    }

    #[tokio::test]
    async fn test_missing_document_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let index = MetadataIndex::new(
            temp_dir.path().join("image_metadata.json"),
            CorruptIndexPolicy::Reset,
        )
        .unwrap();

        assert!(index.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let index = MetadataIndex::new(
            temp_dir.path().join("image_metadata.json"),
            CorruptIndexPolicy::Reset,
        )
        .unwrap();

        let mut entries = IndexEntries::new();
        entries.insert("02_cat.png".to_string(), descriptor("02_cat.png", "second", 2.5));
        entries.insert("01_cat.png".to_string(), descriptor("01_cat.png", "first", 1.5));
        index.save(&entries).await.unwrap();

        let loaded = index.load().await.unwrap();
        assert_eq!(loaded, entries);
        let order: Vec<&str> = loaded.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["02_cat.png", "01_cat.png"]);
        assert_eq!(loaded["01_cat.png"].filename, "01_cat.png");
        assert!(!temp_dir.path().join("image_metadata.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_resave_keeps_document_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("image_metadata.json");
        // Random-looking keys, as written by older deployments.
        std::fs::write(
            &path,
            r#"{
  "f3c1_b.png": {"original_filename": "b.png", "description": "", "text_filename": "f3c1_b.txt", "upload_time": 1.0},
  "07aa_c.png": {"original_filename": "c.png", "description": "", "text_filename": "07aa_c.txt", "upload_time": 2.0},
  "9b2e_a.png": {"original_filename": "a.png", "description": "", "text_filename": "9b2e_a.txt", "upload_time": 3.0}
}"#,
        )
        .unwrap();
        let index = MetadataIndex::new(path.clone(), CorruptIndexPolicy::Fail).unwrap();

        let mut entries = index.load().await.unwrap();
        entries.shift_remove("07aa_c.png");
        entries.insert("01_d.png".to_string(), descriptor("01_d.png", "d", 4.0));
        index.save(&entries).await.unwrap();

        let loaded = index.load().await.unwrap();
        let order: Vec<&str> = loaded.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["f3c1_b.png", "9b2e_a.png", "01_d.png"]);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.find("f3c1_b.png").unwrap() < raw.find("9b2e_a.png").unwrap());
    }

    #[tokio::test]
    async fn test_document_layout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("image_metadata.json");
        let index = MetadataIndex::new(path.clone(), CorruptIndexPolicy::Reset).unwrap();

        let mut entries = IndexEntries::new();
        entries.insert("01_cat.png".to_string(), descriptor("01_cat.png", "a cat", 7.0));
        index.save(&entries).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let entry = &raw["01_cat.png"];
        assert_eq!(entry["original_filename"], "cat.png");
        assert_eq!(entry["description"], "a cat");
        assert_eq!(entry["text_filename"], "01_cat.txt");
        assert_eq!(entry["upload_time"], 7.0);
        assert!(entry.get("filename").is_none());
    }

    #[tokio::test]
    async fn test_corrupt_document_reset() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("image_metadata.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let index = MetadataIndex::new(path, CorruptIndexPolicy::Reset).unwrap();
        assert!(index.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_document_fail() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("image_metadata.json");
        std::fs::write(&path, b"[1, 2, 3]").unwrap();

        let index = MetadataIndex::new(path, CorruptIndexPolicy::Fail).unwrap();
        let error = index.load().await.unwrap_err();
        assert!(matches!(error, CaptionboxError::CorruptIndex(_)));
    }

    #[tokio::test]
    async fn test_save_failure_is_storage_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("image_metadata.json");
        std::fs::create_dir_all(&path).unwrap();

        let index = MetadataIndex::new(path, CorruptIndexPolicy::Reset).unwrap();
        let error = index.save(&IndexEntries::new()).await.unwrap_err();
        assert!(matches!(error, CaptionboxError::Storage(_)));
    }

    #[tokio::test]
    async fn test_clear_writes_empty_document() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("image_metadata.json");
        let index = MetadataIndex::new(path.clone(), CorruptIndexPolicy::Fail).unwrap();

        let mut entries = IndexEntries::new();
        entries.insert("01_cat.png".to_string(), descriptor("01_cat.png", "", 1.0));
        index.save(&entries).await.unwrap();
        index.clear().await.unwrap();

        assert!(index.load().await.unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }
}
