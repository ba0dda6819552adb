use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptionboxError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("blob not found: {namespace}/{name}")]
    BlobNotFound { namespace: String, name: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("metadata index is corrupt: {0}")]
    CorruptIndex(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CaptionboxError {
    /// Caller supplied something unusable; nothing was written.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::BlobNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, CaptionboxError>;
