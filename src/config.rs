//! Media Vault - Configuration
//!
//! Defaults, then an optional JSON file, then environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Default maximum upload size (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 << 20;

/// Default thumbnail bounding box (square)
pub const DEFAULT_THUMB_SIZE: u32 = 256;

/// Vault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Storage root (originals + thumbnails)
    pub root: PathBuf,
    /// SQLite database file; `<root>/media.db` when unset
    pub database_path: Option<PathBuf>,
    /// Max thumbnail edge
    pub thumbnail_size: u32,
    /// Upload size limit, enforced while streaming
    pub max_upload_bytes: Option<u64>,
    /// Lowercase extensions accepted for upload
    pub allowed_extensions: Vec<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data/vault"),
            database_path: None,
            thumbnail_size: DEFAULT_THUMB_SIZE,
            max_upload_bytes: Some(DEFAULT_MAX_UPLOAD_BYTES),
            allowed_extensions: ["jpg", "jpeg", "png", "gif", "webp"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl VaultConfig {
    /// Config rooted at `root`, everything else default
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Load from a JSON file (if given), then apply environment overrides
    pub fn load(path: Option<&Path>) -> VaultResult<Self> {
        let mut config = match path {
            Some(path) => {
                let data = std::fs::read_to_string(path).map_err(|e| {
                    VaultError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                serde_json::from_str(&data).map_err(|e| {
                    VaultError::Config(format!("invalid config {}: {e}", path.display()))
                })?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `MEDIA_VAULT_*` / `DATABASE_PATH` overrides from a lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> VaultResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("MEDIA_VAULT_ROOT") {
            self.root = PathBuf::from(root);
        }
        if let Some(db) = lookup("DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(db));
        }
        if let Some(size) = lookup("MEDIA_VAULT_THUMB_SIZE") {
            self.thumbnail_size = size
                .parse()
                .map_err(|_| VaultError::Config(format!("MEDIA_VAULT_THUMB_SIZE: {size}")))?;
        }
        if let Some(max) = lookup("MEDIA_VAULT_MAX_UPLOAD_BYTES") {
            let max: u64 = max
                .parse()
                .map_err(|_| VaultError::Config(format!("MEDIA_VAULT_MAX_UPLOAD_BYTES: {max}")))?;
            // 0 disables the limit
            self.max_upload_bytes = (max > 0).then_some(max);
        }
        Ok(())
    }

    /// Resolved database location
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.root.join("media.db"))
    }

    /// Check a filename against the extension allow-list
    pub fn is_allowed_file(&self, filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.allowed_extensions.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::with_root("/srv/vault");
        assert_eq!(config.database_path(), PathBuf::from("/srv/vault/media.db"));
        assert_eq!(config.thumbnail_size, 256);
        assert_eq!(config.max_upload_bytes, Some(10 * 1024 * 1024));
    }

    #[test]
    fn test_allowed_extensions() {
        let config = VaultConfig::default();
        assert!(config.is_allowed_file("photo.JPG"));
        assert!(config.is_allowed_file("a.b.webp"));
        assert!(!config.is_allowed_file("notes.txt"));
        assert!(!config.is_allowed_file("noext"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("MEDIA_VAULT_ROOT", "/tmp/mv"),
            ("DATABASE_PATH", "/tmp/other.db"),
            ("MEDIA_VAULT_MAX_UPLOAD_BYTES", "0"),
        ]
        .into_iter()
        .collect();

        let mut config = VaultConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.root, PathBuf::from("/tmp/mv"));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/other.db"));
        assert_eq!(config.max_upload_bytes, None);
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = VaultConfig::default();
        let err = config
            .apply_env(|key| (key == "MEDIA_VAULT_THUMB_SIZE").then(|| "huge".to_string()))
            .unwrap_err();
        assert!(matches!(err, VaultError::Config(_)));
    }

    #[test]
    fn test_load_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        std::fs::write(&path, r#"{ "thumbnail_size": 128 }"#).unwrap();

        let config = VaultConfig::load(Some(&path)).unwrap();
        assert_eq!(config.thumbnail_size, 128);
        assert_eq!(config.allowed_extensions.len(), 5);
    }
}
