//! Source videos and the cache keys derived from them.
//!
//! A cache key names every artifact derived from one source file. It is the
//! lowercase hex SHA-1 of the canonical path and the modification time, so an
//! edited file gets fresh artifacts and two files sharing a basename in
//! different directories never collide.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha1::{Digest, Sha1};

use crate::derive::{DeriveError, DeriveResult};

/// Length of a hex encoded SHA-1 digest.
const KEY_LENGTH: usize = 40;

/// Filesystem-safe identifier naming every artifact of one source video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for a (canonical path, modification time) pair.
    pub fn derive(path: &Path, modified: SystemTime) -> Self {
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();

        let mut hasher = Sha1::new();
        hasher.update(path.as_os_str().as_encoded_bytes());
        hasher.update([0u8]);
        hasher.update(nanos.to_be_bytes());

        Self(hex::encode(hasher.finalize()))
    }

    /// Parses a key received from an untrusted source such as a URL.
    ///
    /// Only the exact shape produced by [`CacheKey::derive`] is accepted, so a
    /// parsed key can never escape the cache directories.
    ///
    /// # Errors
    ///
    /// - `KeyError::InvalidKey` - Wrong length or non lowercase-hex characters
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let well_formed = raw.len() == KEY_LENGTH
            && raw
                .bytes()
                .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte));

        if well_formed {
            Ok(Self(raw.to_string()))
        } else {
            Err(KeyError::InvalidKey {
                raw: raw.to_string(),
            })
        }
    }

    /// Returns the key as a filename stem.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors from parsing externally supplied cache keys.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Invalid cache key: {raw:?}")]
    InvalidKey { raw: String },
}

/// A video file discovered on disk.
///
/// Captures the canonical path and modification time at discovery; the
/// cache key is fixed at that moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceVideo {
    /// Canonical absolute path
    pub path: PathBuf,
    /// File name shown to users
    pub display_name: String,
    /// Modification time at discovery
    pub modified: DateTime<Utc>,
    /// Key naming all derived artifacts
    pub key: CacheKey,
}

impl SourceVideo {
    /// Opens a source video, resolving it to a canonical absolute path.
    ///
    /// # Errors
    ///
    /// - `DeriveError::InvalidPath` - Path missing, unreadable or not a regular file
    pub async fn open(path: &Path) -> DeriveResult<Self> {
        let canonical = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| DeriveError::InvalidPath {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let metadata = tokio::fs::metadata(&canonical)
            .await
            .map_err(|e| DeriveError::InvalidPath {
                path: canonical.clone(),
                reason: e.to_string(),
            })?;

        if !metadata.is_file() {
            return Err(DeriveError::InvalidPath {
                path: canonical,
                reason: "not a regular file".to_string(),
            });
        }

        let modified = metadata.modified().map_err(|e| DeriveError::InvalidPath {
            path: canonical.clone(),
            reason: e.to_string(),
        })?;

        let display_name = canonical
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| canonical.display().to_string());

        Ok(Self {
            key: CacheKey::derive(&canonical, modified),
            path: canonical,
            display_name,
            modified: DateTime::<Utc>::from(modified),
        })
    }

    /// File stem used to name exports.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "export".to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_cache_key_same_inputs_stable() {
        let when = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let first = CacheKey::derive(Path::new("/videos/a/clip.mp4"), when);
        let second = CacheKey::derive(Path::new("/videos/a/clip.mp4"), when);

        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), KEY_LENGTH);
    }

    #[test]
    fn test_cache_key_same_basename_distinct() {
        let when = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let first = CacheKey::derive(Path::new("/videos/a/clip.mp4"), when);
        let second = CacheKey::derive(Path::new("/videos/b/clip.mp4"), when);

        assert_ne!(first, second);
    }

    #[test]
    fn test_cache_key_changed_mtime_distinct() {
        let path = Path::new("/videos/a/clip.mp4");
        let before = CacheKey::derive(path, UNIX_EPOCH + Duration::from_secs(10));
        let after = CacheKey::derive(path, UNIX_EPOCH + Duration::from_secs(11));

        assert_ne!(before, after);
    }

    #[test]
    fn test_cache_key_parse_roundtrip_accepts() {
        let key = CacheKey::derive(Path::new("/videos/clip.mp4"), UNIX_EPOCH);
        let parsed = CacheKey::parse(key.as_str()).unwrap();

        assert_eq!(parsed, key);
    }

    #[test]
    fn test_cache_key_parse_traversal_rejected() {
        assert!(CacheKey::parse("../../etc/passwd").is_err());
        assert!(CacheKey::parse("").is_err());
        assert!(CacheKey::parse(&"A".repeat(KEY_LENGTH)).is_err());
        assert!(CacheKey::parse(&"a".repeat(KEY_LENGTH + 1)).is_err());
    }

    #[tokio::test]
    async fn test_source_video_open_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holiday.mp4");
        std::fs::write(&path, b"not really a video").unwrap();

        let video = SourceVideo::open(&path).await.unwrap();

        assert!(video.path.is_absolute());
        assert_eq!(video.display_name, "holiday.mp4");
        assert_eq!(video.stem(), "holiday");
        assert_eq!(video.key, SourceVideo::open(&path).await.unwrap().key);
    }

    #[tokio::test]
    async fn test_source_video_open_missing_invalid_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = SourceVideo::open(&dir.path().join("missing.mp4")).await;

        assert!(matches!(result, Err(DeriveError::InvalidPath { .. })));
    }

    #[tokio::test]
    async fn test_source_video_open_directory_invalid_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = SourceVideo::open(dir.path()).await;

        assert!(matches!(result, Err(DeriveError::InvalidPath { .. })));
    }
}
