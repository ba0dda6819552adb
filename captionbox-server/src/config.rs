use captionbox_core::{CaptionboxError, Result, StorageConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Base for `image_url`/`text_url`; the request's Host header when unset.
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_url: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    pub fn public_url(&self) -> Option<&str> {
        self.public_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }
}

impl Config {
    /// Load `path` (optional) layered with `CAPTIONBOX_*` environment
    /// variables, e.g. `CAPTIONBOX_SERVER__BIND_ADDR`.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path).required(false))
            .add_source(
                ::config::Environment::with_prefix("CAPTIONBOX")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| CaptionboxError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| CaptionboxError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.bind_addr.trim().is_empty() {
            return Err(CaptionboxError::Config(
                "server.bind_addr cannot be empty".to_string(),
            ));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(CaptionboxError::Config(
                "server.max_upload_bytes must be positive".to_string(),
            ));
        }

        self.storage.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use captionbox_core::CorruptIndexPolicy;
    use std::path::PathBuf;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("absent.yaml");

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:5000");
        assert_eq!(config.server.public_url(), None);
        assert_eq!(config.storage.index_file, PathBuf::from("image_metadata.json"));
    }

    #[test]
    fn test_yaml_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("captionbox.yaml");
        std::fs::write(
            &path,
            r#"
server:
  bind_addr: "127.0.0.1:8080"
  public_url: "https://img.example.com/"
storage:
  data_dir: "/var/lib/captionbox"
  allowed_extensions: [png, webp]
  on_corrupt_index: fail
"#,
        )
        .unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.server.public_url(), Some("https://img.example.com"));
        assert_eq!(config.server.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/captionbox"));
        assert_eq!(config.storage.allowed_extensions, vec!["png", "webp"]);
        assert_eq!(config.storage.on_corrupt_index, CorruptIndexPolicy::Fail);
        assert_eq!(config.storage.texts_dir, PathBuf::from("texts"));
    }

    #[test]
    fn test_rejects_zero_upload_limit() {
        let mut config = Config::default();
        config.server.max_upload_bytes = 0;
        assert!(matches!(config.validate(), Err(CaptionboxError::Config(_))));
    }
}
