//! In-memory registry of discovered videos by cache key.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::RwLock;

use crate::source::{CacheKey, SourceVideo};

/// Maps cache keys back to the videos they were derived from.
///
/// Keys are one-way hashes, so key-addressed requests can only find their
/// source if it was registered by a scan, an extraction or an export.
#[derive(Debug, Default)]
pub struct VideoCatalog {
    videos: RwLock<HashMap<CacheKey, SourceVideo>>,
}

impl VideoCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `video`, replacing any entry with the same key.
    pub fn register(&self, video: SourceVideo) {
        self.videos.write().insert(video.key.clone(), video);
    }

    /// Registers every video in `videos`.
    pub fn register_all(&self, videos: impl IntoIterator<Item = SourceVideo>) {
        let mut map = self.videos.write();
        for video in videos {
            map.insert(video.key.clone(), video);
        }
    }

    /// Replaces everything registered under `roots` with a fresh scan.
    ///
    /// Entries below a root that are missing from `videos` are dropped, so
    /// files edited or deleted since the last scan lose their stale keys.
    /// Videos outside every root are kept.
    pub fn replace_under(&self, roots: &[PathBuf], videos: impl IntoIterator<Item = SourceVideo>) {
        let mut map = self.videos.write();
        map.retain(|_, video| !roots.iter().any(|root| video.path.starts_with(root)));
        for video in videos {
            map.insert(video.key.clone(), video);
        }
    }

    /// Looks up the video registered under `key`.
    pub fn get(&self, key: &CacheKey) -> Option<SourceVideo> {
        self.videos.read().get(key).cloned()
    }

    /// All registered videos ordered by display name, then path.
    pub fn videos(&self) -> Vec<SourceVideo> {
        let mut videos: Vec<SourceVideo> = self.videos.read().values().cloned().collect();
        videos.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.path.cmp(&b.path))
        });
        videos
    }

    /// Number of registered videos.
    pub fn len(&self) -> usize {
        self.videos.read().len()
    }

    /// Whether nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.videos.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    async fn video(dir: &Path, name: &str) -> SourceVideo {
        let path = dir.join(name);
        std::fs::write(&path, name.as_bytes()).unwrap();
        SourceVideo::open(&path).await.unwrap()
    }

    #[tokio::test]
    async fn test_catalog_register_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = VideoCatalog::new();
        let clip = video(dir.path(), "clip.mp4").await;

        catalog.register(clip.clone());

        assert_eq!(catalog.get(&clip.key), Some(clip));
        assert_eq!(catalog.len(), 1);
    }

    #[tokio::test]
    async fn test_catalog_videos_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = VideoCatalog::new();
        let zebra = video(dir.path(), "zebra.mp4").await;
        let apple = video(dir.path(), "apple.mp4").await;

        catalog.register_all([zebra.clone(), apple.clone(), zebra.clone()]);

        let names: Vec<String> = catalog
            .videos()
            .into_iter()
            .map(|v| v.display_name)
            .collect();
        assert_eq!(names, vec!["apple.mp4", "zebra.mp4"]);
    }

    #[tokio::test]
    async fn test_catalog_rescan_drops_stale_keys() {
        let library = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(library.path()).unwrap();
        let catalog = VideoCatalog::new();
        let edited = video(&root, "edited.mp4").await;
        let deleted = video(&root, "deleted.mp4").await;
        let outside = video(elsewhere.path(), "outside.mp4").await;
        catalog.register_all([edited.clone(), deleted.clone(), outside.clone()]);

        std::fs::remove_file(&deleted.path).unwrap();
        let fresh = SourceVideo {
            key: CacheKey::derive(&edited.path, std::time::UNIX_EPOCH),
            ..edited.clone()
        };
        catalog.replace_under(&[root], [fresh.clone()]);

        assert_eq!(catalog.get(&fresh.key), Some(fresh));
        assert_eq!(catalog.get(&edited.key), None);
        assert_eq!(catalog.get(&deleted.key), None);
        assert_eq!(catalog.get(&outside.key), Some(outside));
        assert_eq!(catalog.len(), 2);
    }
}
