use super::image_present;
use crate::{AssetDescriptor, BlobStore, MetadataIndex, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct GetAssetOperation {
    blob_store: Arc<dyn BlobStore>,
    index: Arc<MetadataIndex>,
}

#[derive(Debug, Clone)]
pub struct GetAssetOperationRequest {
    pub filename: String,
}

#[derive(Debug, Clone)]
pub enum GetAssetOperationOutcome {
    Found(AssetDescriptor),
    NotFound,
    /// Indexed, but the image blob is gone; the entry has been dropped.
    ImageMissing,
}

impl GetAssetOperation {
    pub fn new(blob_store: Arc<dyn BlobStore>, index: Arc<MetadataIndex>) -> Self {
        Self { blob_store, index }
    }

    pub async fn run(&self, request: GetAssetOperationRequest) -> Result<GetAssetOperationOutcome> {
        let GetAssetOperationRequest { filename } = request;

        // Held for the lookup too, so a concurrent prune cannot interleave.
        let _guard = self.index.write_lock().await;
        let mut entries = self.index.load().await?;

        let Some(descriptor) = entries.get(&filename).cloned() else {
            return Ok(GetAssetOperationOutcome::NotFound);
        };

        if image_present(self.blob_store.as_ref(), &filename).await? {
            return Ok(GetAssetOperationOutcome::Found(descriptor));
        }

        entries.shift_remove(&filename);
        self.index.save(&entries).await?;
        tracing::info!("Pruned stale index entry {}", filename);

        Ok(GetAssetOperationOutcome::ImageMissing)
    }
}
