//! On-disk artifact cache layout and lookup.
//!
//! Layout below the cache root:
//! - `audio/<key>.wav` for the normalized audio track
//! - `pitch/<key>_<+/-N>.wav` for pitch variants
//! - `thumbs/<key>.<ext>` for thumbnails
//!
//! Presence of a non-empty file at the canonical path is the only validity
//! signal. Lookups never lock; two requests missing the same artifact may
//! both regenerate it and the last rename wins.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::RepitchConfig;
use crate::source::CacheKey;

/// Kind of derived artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Normalized 48 kHz WAV
    Audio,
    /// Pitch-shifted WAV for a semitone offset
    Pitch { semitones: i32 },
    /// Representative frame
    Thumbnail,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Audio => f.write_str("audio"),
            ArtifactKind::Pitch { semitones } => write!(f, "pitch {}", shift_label(*semitones)),
            ArtifactKind::Thumbnail => f.write_str("thumbnail"),
        }
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Canonical on-disk location
    pub path: PathBuf,
    /// Whether a usable file is already present
    pub exists: bool,
}

/// Formats a semitone shift with an explicit sign, e.g. `+3`, `-2`, `+0`.
pub fn shift_label(semitones: i32) -> String {
    format!("{semitones:+}")
}

/// Deterministic naming and existence checks for derived artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
    thumbnail_extension: String,
}

impl ArtifactCache {
    /// Creates a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, thumbnail_extension: &str) -> Self {
        Self {
            root: root.into(),
            thumbnail_extension: thumbnail_extension.to_string(),
        }
    }

    /// Creates a cache from the application configuration.
    pub fn from_config(config: &RepitchConfig) -> Self {
        Self::new(&config.cache.temp_dir, config.thumbnail.extension)
    }

    /// Root directory of the cache tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding artifacts of `kind`.
    pub fn directory(&self, kind: ArtifactKind) -> PathBuf {
        match kind {
            ArtifactKind::Audio => self.root.join("audio"),
            ArtifactKind::Pitch { .. } => self.root.join("pitch"),
            ArtifactKind::Thumbnail => self.root.join("thumbs"),
        }
    }

    /// Canonical path of an artifact, whether or not it exists.
    pub fn path_for(&self, kind: ArtifactKind, key: &CacheKey) -> PathBuf {
        let file_name = match kind {
            ArtifactKind::Audio => format!("{key}.wav"),
            ArtifactKind::Pitch { semitones } => format!("{key}_{}.wav", shift_label(semitones)),
            ArtifactKind::Thumbnail => format!("{key}.{}", self.thumbnail_extension),
        };
        self.directory(kind).join(file_name)
    }

    /// Computes the canonical path and reports whether it is usable.
    ///
    /// Pure lookup with no side effects. Zero-length files are reported as
    /// missing.
    pub async fn resolve(&self, kind: ArtifactKind, key: &CacheKey) -> ResolvedArtifact {
        let path = self.path_for(kind, key);
        let exists = tokio::fs::metadata(&path)
            .await
            .map(|metadata| metadata.is_file() && metadata.len() > 0)
            .unwrap_or(false);

        if exists {
            tracing::debug!("Cache hit for {} of {}", kind, key);
        } else {
            tracing::debug!("Cache miss for {} of {}", kind, key);
        }

        ResolvedArtifact { path, exists }
    }

    /// Creates the cache directory tree.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - A directory could not be created
    pub fn ensure_layout(&self) -> std::io::Result<()> {
        for kind in [
            ArtifactKind::Audio,
            ArtifactKind::Pitch { semitones: 0 },
            ArtifactKind::Thumbnail,
        ] {
            std::fs::create_dir_all(self.directory(kind))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;

    fn sample_key() -> CacheKey {
        CacheKey::derive(Path::new("/videos/clip.mp4"), UNIX_EPOCH)
    }

    #[test]
    fn test_path_for_layout_matches_kinds() {
        let cache = ArtifactCache::new("/cache", "jpg");
        let key = sample_key();

        assert_eq!(
            cache.path_for(ArtifactKind::Audio, &key),
            PathBuf::from(format!("/cache/audio/{key}.wav"))
        );
        assert_eq!(
            cache.path_for(ArtifactKind::Pitch { semitones: 3 }, &key),
            PathBuf::from(format!("/cache/pitch/{key}_+3.wav"))
        );
        assert_eq!(
            cache.path_for(ArtifactKind::Pitch { semitones: -2 }, &key),
            PathBuf::from(format!("/cache/pitch/{key}_-2.wav"))
        );
        assert_eq!(
            cache.path_for(ArtifactKind::Pitch { semitones: 0 }, &key),
            PathBuf::from(format!("/cache/pitch/{key}_+0.wav"))
        );
        assert_eq!(
            cache.path_for(ArtifactKind::Thumbnail, &key),
            PathBuf::from(format!("/cache/thumbs/{key}.jpg"))
        );
    }

    #[test]
    fn test_shift_label_extreme_values_signed() {
        assert_eq!(shift_label(i32::MIN), "-2147483648");
        assert_eq!(shift_label(i32::MAX), "+2147483647");
    }

    #[tokio::test]
    async fn test_resolve_missing_then_present() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path(), "jpg");
        cache.ensure_layout().unwrap();
        let key = sample_key();

        let missing = cache.resolve(ArtifactKind::Audio, &key).await;
        assert!(!missing.exists);

        std::fs::write(&missing.path, b"RIFF").unwrap();
        let present = cache.resolve(ArtifactKind::Audio, &key).await;
        assert!(present.exists);
        assert_eq!(present.path, missing.path);
    }

    #[tokio::test]
    async fn test_resolve_empty_file_not_usable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path(), "jpg");
        cache.ensure_layout().unwrap();
        let key = sample_key();
        let path = cache.path_for(ArtifactKind::Thumbnail, &key);
        std::fs::write(&path, b"").unwrap();

        assert!(!cache.resolve(ArtifactKind::Thumbnail, &key).await.exists);
    }

    #[test]
    fn test_pitch_variants_distinct_paths() {
        let cache = ArtifactCache::new("/cache", "jpg");
        let key = sample_key();

        let up = cache.path_for(ArtifactKind::Pitch { semitones: 1 }, &key);
        let down = cache.path_for(ArtifactKind::Pitch { semitones: -1 }, &key);

        assert_ne!(up, down);
    }
}
