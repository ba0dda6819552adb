use crate::operations::{
    ClearAssetsOperation, ClearAssetsOperationResult, GetAssetOperation, GetAssetOperationOutcome,
    GetAssetOperationRequest, ListAssetsOperation, UploadAssetOperation,
    UploadAssetOperationRequest,
};
use crate::{
    AssetDescriptor, BlobStore, CaptionboxError, FilenamePolicy, FsBlobStore, MetadataIndex,
    Namespace, Result, StorageConfig,
};
use bytes::Bytes;
use std::sync::Arc;

/// Entry point for everything the HTTP layer does with stored assets.
#[derive(Clone)]
pub struct AssetRegistry {
    blob_store: Arc<dyn BlobStore>,
    index: Arc<MetadataIndex>,
    upload: UploadAssetOperation,
    list: ListAssetsOperation,
    get: GetAssetOperation,
    clear: ClearAssetsOperation,
}

impl AssetRegistry {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        index: Arc<MetadataIndex>,
        naming: FilenamePolicy,
    ) -> Self {
        let naming = Arc::new(naming);
        Self {
            upload: UploadAssetOperation::new(blob_store.clone(), index.clone(), naming),
            list: ListAssetsOperation::new(blob_store.clone(), index.clone()),
            get: GetAssetOperation::new(blob_store.clone(), index.clone()),
            clear: ClearAssetsOperation::new(blob_store.clone(), index.clone()),
            blob_store,
            index,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        config.validate()?;

        let blob_store = FsBlobStore::new(
            config.images_path(),
            config.texts_path(),
            config.atomic_writes,
        )?;
        let index = MetadataIndex::new(config.index_path(), config.on_corrupt_index)?;
        let naming = FilenamePolicy::new(&config.allowed_extensions);

        tracing::info!(
            "Asset storage ready: images={:?} texts={:?} index={:?}",
            config.images_path(),
            config.texts_path(),
            config.index_path()
        );

        Ok(Self::new(Arc::new(blob_store), Arc::new(index), naming))
    }

    pub async fn upload(
        &self,
        image: Bytes,
        filename: &str,
        description: &str,
    ) -> Result<AssetDescriptor> {
        let result = self
            .upload
            .run(UploadAssetOperationRequest {
                image,
                filename: filename.to_string(),
                description: description.to_string(),
            })
            .await?;

        Ok(result.descriptor)
    }

    pub async fn list(&self) -> Result<Vec<AssetDescriptor>> {
        Ok(self.list.run().await?.assets)
    }

    pub async fn get(&self, filename: &str) -> Result<AssetDescriptor> {
        let outcome = self
            .get
            .run(GetAssetOperationRequest {
                filename: filename.to_string(),
            })
            .await?;

        match outcome {
            GetAssetOperationOutcome::Found(descriptor) => Ok(descriptor),
            GetAssetOperationOutcome::NotFound => Err(CaptionboxError::NotFound(format!(
                "image {} does not exist",
                filename
            ))),
            GetAssetOperationOutcome::ImageMissing => Err(CaptionboxError::NotFound(format!(
                "image file {} is missing",
                filename
            ))),
        }
    }

    pub async fn clear(&self) -> Result<ClearAssetsOperationResult> {
        self.clear.run().await
    }

    /// Raw bytes of a stored blob, for the static file routes.
    pub async fn read_blob(&self, namespace: Namespace, name: &str) -> Result<Bytes> {
        match self.blob_store.get(namespace, name).await {
            Err(error) if error.is_invalid_input() => Err(CaptionboxError::BlobNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            other => other,
        }
    }

    /// Number of index entries, without reconciling.
    pub async fn indexed_count(&self) -> Result<usize> {
        Ok(self.index.load().await?.len())
    }
}
