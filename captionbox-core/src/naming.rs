//! Asset keys and the blob names derived from them.
//!
//! An uploaded pair is stored as `images/{key}_{clean}` and
//! `texts/{key}_{clean_stem}.txt`, where `key` is 32 lowercase hex digits and
//! `clean` is the caller's filename after [`sanitize_filename`].

use crate::error::{CaptionboxError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;
use unicode_normalization::UnicodeNormalization;

/// Unique identifier minted for every upload.
///
/// The 128 bits of a ULID rendered as hex, so keys sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetKey(String);

impl AssetKey {
    pub fn generate() -> Self {
        Self(hex::encode(Ulid::new().to_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Names under which one upload is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobNames {
    pub key: AssetKey,
    pub original_filename: String,
    pub image_name: String,
    pub text_name: String,
}

/// Extension whitelist plus the naming rules for new uploads.
#[derive(Debug, Clone)]
pub struct FilenamePolicy {
    allowed_extensions: Vec<String>,
}

impl FilenamePolicy {
    pub fn new<I, S>(allowed_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Self { allowed_extensions }
    }

    /// Lowercased extension of `filename` if it is on the whitelist.
    pub fn allowed_extension(&self, filename: &str) -> Option<String> {
        let (_, ext) = filename.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        self.allowed_extensions.contains(&ext).then_some(ext)
    }

    /// Validate `filename` and mint fresh blob names for it.
    pub fn derive(&self, filename: &str) -> Result<BlobNames> {
        if filename.trim().is_empty() {
            return Err(CaptionboxError::InvalidInput(
                "no file selected".to_string(),
            ));
        }

        let ext = self.allowed_extension(filename).ok_or_else(|| {
            CaptionboxError::InvalidInput(format!("unsupported file type: {}", filename))
        })?;

        let mut clean = sanitize_filename(filename);
        let keeps_extension = clean
            .rsplit_once('.')
            .is_some_and(|(stem, clean_ext)| !stem.is_empty() && clean_ext.eq_ignore_ascii_case(&ext));
        if !keeps_extension {
            let stem = match clean.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                _ if !clean.is_empty() && !clean.eq_ignore_ascii_case(&ext) => clean.clone(),
                _ => "image".to_string(),
            };
            clean = format!("{}.{}", stem, ext);
        }

        let key = AssetKey::generate();
        let image_name = format!("{}_{}", key, clean);
        let text_name = format!("{}.txt", file_stem(&image_name));

        Ok(BlobNames {
            key,
            original_filename: clean,
            image_name,
            text_name,
        })
    }
}

/// Reduce an arbitrary client filename to a safe single path component.
///
/// The name is NFKD-folded and whatever is still non-ASCII is dropped. `/` and
/// whitespace runs turn into `_`, anything outside `[A-Za-z0-9_.-]` (a
/// backslash included) is removed, and leading or trailing `.`/`_` are
/// stripped. The result may be empty.
pub fn sanitize_filename(filename: &str) -> String {
    let ascii: String = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Everything before the last `.`, or the whole name if it has none.
pub fn file_stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}
