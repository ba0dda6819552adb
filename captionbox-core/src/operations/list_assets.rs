use super::image_present;
use crate::{AssetDescriptor, BlobStore, MetadataIndex, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct ListAssetsOperation {
    blob_store: Arc<dyn BlobStore>,
    index: Arc<MetadataIndex>,
}

#[derive(Debug, Clone, Default)]
pub struct ListAssetsOperationResult {
    pub assets: Vec<AssetDescriptor>,
    /// Entries dropped because their image blob was gone.
    pub pruned: Vec<String>,
}

impl ListAssetsOperation {
    pub fn new(blob_store: Arc<dyn BlobStore>, index: Arc<MetadataIndex>) -> Self {
        Self { blob_store, index }
    }

    /// List every indexed asset whose image is still on disk, pruning the rest.
    pub async fn run(&self) -> Result<ListAssetsOperationResult> {
        let _guard = self.index.write_lock().await;
        let entries = self.index.load().await?;

        let mut result = ListAssetsOperationResult::default();
        let mut kept = entries.clone();

        for (filename, descriptor) in entries {
            if image_present(self.blob_store.as_ref(), &filename).await? {
                result.assets.push(descriptor);
            } else {
                kept.shift_remove(&filename);
                result.pruned.push(filename);
            }
        }

        if !result.pruned.is_empty() {
            self.index.save(&kept).await?;
            tracing::info!(
                "Pruned {} stale index entries: {}",
                result.pruned.len(),
                result.pruned.join(", ")
            );
        }

        Ok(result)
    }
}
