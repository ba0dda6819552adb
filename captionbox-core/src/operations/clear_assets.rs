use crate::{BlobStore, CaptionboxError, MetadataIndex, Namespace, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct ClearAssetsOperation {
    blob_store: Arc<dyn BlobStore>,
    index: Arc<MetadataIndex>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearAssetsOperationResult {
    pub images_removed: usize,
    pub texts_removed: usize,
}

impl ClearAssetsOperation {
    pub fn new(blob_store: Arc<dyn BlobStore>, index: Arc<MetadataIndex>) -> Self {
        Self { blob_store, index }
    }

    /// Sweep both namespaces and reset the index.
    ///
    /// Not transactional: files removed before a failure stay removed, and the
    /// index is reset even when some files could not be deleted.
    pub async fn run(&self) -> Result<ClearAssetsOperationResult> {
        let _guard = self.index.write_lock().await;

        let mut result = ClearAssetsOperationResult::default();
        let mut failures = Vec::new();

        for namespace in Namespace::ALL {
            match self.blob_store.clear(namespace).await {
                Ok(report) => {
                    match namespace {
                        Namespace::Images => result.images_removed = report.removed,
                        Namespace::Texts => result.texts_removed = report.removed,
                    }
                    failures.extend(
                        report
                            .failed
                            .into_iter()
                            .map(|name| format!("{}/{}", namespace, name)),
                    );
                }
                Err(error) => {
                    tracing::warn!("Failed to sweep {}: {}", namespace, error);
                    failures.push(format!("{}/*", namespace));
                }
            }
        }

        self.index.clear().await?;

        if !failures.is_empty() {
            return Err(CaptionboxError::Storage(format!(
                "failed to remove {} files: {}",
                failures.len(),
                failures.join(", ")
            )));
        }

        tracing::info!(
            "Cleared {} images and {} texts",
            result.images_removed,
            result.texts_removed
        );

        Ok(result)
    }
}
