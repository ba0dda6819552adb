//! Storage modules for Captionbox
//!
//! Provides namespaced filesystem blob storage and the JSON metadata index.

pub mod blob_store;
pub mod metadata_index;

pub use blob_store::{BlobStore, ClearReport, FsBlobStore, Namespace, validate_blob_name};
pub use metadata_index::{AssetDescriptor, IndexEntries, MetadataIndex};
