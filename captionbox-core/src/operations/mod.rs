pub mod clear_assets;
pub mod get_asset;
pub mod list_assets;
pub mod upload_asset;

pub use clear_assets::{ClearAssetsOperation, ClearAssetsOperationResult};
pub use get_asset::{GetAssetOperation, GetAssetOperationOutcome, GetAssetOperationRequest};
pub use list_assets::{ListAssetsOperation, ListAssetsOperationResult};
pub use upload_asset::{
    UploadAssetOperation, UploadAssetOperationRequest, UploadAssetOperationResult,
};

use crate::{BlobStore, Namespace, Result};

/// Whether the image blob behind an index entry is still on disk.
///
/// A name the blob store refuses outright cannot have a blob behind it.
pub(crate) async fn image_present(blob_store: &dyn BlobStore, filename: &str) -> Result<bool> {
    match blob_store.exists(Namespace::Images, filename).await {
        Ok(present) => Ok(present),
        Err(error) if error.is_invalid_input() => Ok(false),
        Err(error) => Err(error),
    }
}
