use crate::{
    AssetDescriptor, BlobStore, CaptionboxError, FilenamePolicy, MetadataIndex, Namespace, Result,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct UploadAssetOperation {
    blob_store: Arc<dyn BlobStore>,
    index: Arc<MetadataIndex>,
    naming: Arc<FilenamePolicy>,
}

#[derive(Debug, Clone)]
pub struct UploadAssetOperationRequest {
    pub image: Bytes,
    pub filename: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct UploadAssetOperationResult {
    pub descriptor: AssetDescriptor,
}

impl UploadAssetOperation {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        index: Arc<MetadataIndex>,
        naming: Arc<FilenamePolicy>,
    ) -> Self {
        Self {
            blob_store,
            index,
            naming,
        }
    }

    pub async fn run(
        &self,
        request: UploadAssetOperationRequest,
    ) -> Result<UploadAssetOperationResult> {
        let UploadAssetOperationRequest {
            image,
            filename,
            description,
        } = request;

        if image.is_empty() {
            return Err(CaptionboxError::InvalidInput(
                "image file is empty".to_string(),
            ));
        }

        let names = self.naming.derive(&filename)?;

        if let Err(error) = self
            .blob_store
            .put(Namespace::Images, &names.image_name, image)
            .await
        {
            tracing::warn!("Failed to save image {}: {}", names.image_name, error);
            self.discard(Namespace::Images, &names.image_name).await;
            return Err(CaptionboxError::Storage(format!(
                "failed to save image {}: {}",
                names.image_name, error
            )));
        }

        let text = Bytes::from(description.clone().into_bytes());
        if let Err(error) = self
            .blob_store
            .put(Namespace::Texts, &names.text_name, text)
            .await
        {
            tracing::warn!(
                "Failed to save description {}, rolling back image {}: {}",
                names.text_name,
                names.image_name,
                error
            );
            self.discard(Namespace::Texts, &names.text_name).await;
            self.discard(Namespace::Images, &names.image_name).await;
            return Err(CaptionboxError::Storage(format!(
                "failed to save description {}: {}",
                names.text_name, error
            )));
        }

        let descriptor = AssetDescriptor {
            filename: names.image_name.clone(),
            original_filename: names.original_filename,
            description,
            text_filename: names.text_name,
            upload_time: epoch_seconds(Utc::now()),
        };

        {
            let _guard = self.index.write_lock().await;
            let mut entries = self.index.load().await?;
            entries.insert(descriptor.filename.clone(), descriptor.clone());
            // Blobs stay behind if this fails; the pair is simply never listed.
            self.index.save(&entries).await?;
        }

        tracing::info!(
            "Uploaded {} ({} description bytes)",
            descriptor.filename,
            descriptor.description.len()
        );

        Ok(UploadAssetOperationResult { descriptor })
    }

    /// Best-effort removal of whatever a failed put left behind.
    async fn discard(&self, namespace: Namespace, name: &str) {
        if let Err(error) = self.blob_store.delete(namespace, name).await {
            tracing::error!("Rollback of {}/{} failed: {}", namespace, name, error);
        }
    }
}

fn epoch_seconds(now: DateTime<Utc>) -> f64 {
    now.timestamp_micros() as f64 / 1_000_000.0
}
