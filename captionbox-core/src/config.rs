use crate::error::{CaptionboxError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to do when the index document exists but cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptIndexPolicy {
    /// Treat the index as empty and carry on.
    #[default]
    Reset,
    /// Surface the parse failure to the caller.
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
    #[serde(default = "default_texts_dir")]
    pub texts_dir: PathBuf,
    #[serde(default = "default_index_file")]
    pub index_file: PathBuf,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_atomic_writes")]
    pub atomic_writes: bool,
    #[serde(default)]
    pub on_corrupt_index: CorruptIndexPolicy,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_texts_dir() -> PathBuf {
    PathBuf::from("texts")
}

fn default_index_file() -> PathBuf {
    PathBuf::from("image_metadata.json")
}

fn default_allowed_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_atomic_writes() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            images_dir: default_images_dir(),
            texts_dir: default_texts_dir(),
            index_file: default_index_file(),
            allowed_extensions: default_allowed_extensions(),
            atomic_writes: default_atomic_writes(),
            on_corrupt_index: CorruptIndexPolicy::default(),
        }
    }
}

impl StorageConfig {
    /// Storage rooted at `data_dir` with every other setting at its default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn images_path(&self) -> PathBuf {
        self.data_dir.join(&self.images_dir)
    }

    pub fn texts_path(&self) -> PathBuf {
        self.data_dir.join(&self.texts_dir)
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.index_file)
    }

    pub fn validate(&self) -> Result<()> {
        if self.allowed_extensions.iter().all(|ext| ext.trim().is_empty()) {
            return Err(CaptionboxError::Config(
                "storage.allowed_extensions cannot be empty".to_string(),
            ));
        }

        if self.index_file.as_os_str().is_empty() {
            return Err(CaptionboxError::Config(
                "storage.index_file cannot be empty".to_string(),
            ));
        }

        if self.images_path() == self.texts_path() {
            return Err(CaptionboxError::Config(format!(
                "images and texts must use different directories, both are {:?}",
                self.images_path()
            )));
        }

        Ok(())
    }
}
