//! Captionbox Core - paired image and caption storage on local disk
//!
//! Every upload is an image blob plus a text blob, tied together by an entry
//! in a single JSON metadata index:
//! - namespaced filesystem blob storage (`images`, `texts`)
//! - whole-document index with write-temp-then-rename saves
//! - upload rollback when the pair cannot be written completely
//! - lazy pruning of index entries whose image has disappeared

pub mod config;
pub mod error;
pub mod naming;
pub mod operations;
pub mod registry;
pub mod storage;

pub use config::{CorruptIndexPolicy, StorageConfig};
pub use error::{CaptionboxError, Result};
pub use naming::{AssetKey, BlobNames, FilenamePolicy, file_stem, sanitize_filename};
pub use registry::AssetRegistry;
pub use storage::{
    AssetDescriptor, BlobStore, ClearReport, FsBlobStore, IndexEntries, MetadataIndex, Namespace,
};
