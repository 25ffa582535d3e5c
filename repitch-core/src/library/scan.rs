//! Recursive discovery of video files under the search roots.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::source::SourceVideo;

/// Walks every root and returns the videos found, de-duplicated by key.
///
/// Roots that overlap yield each file once. Hidden entries are skipped and
/// unreadable directories are logged and skipped, never fatal.
pub async fn scan_roots(roots: &[PathBuf], extensions: &[String]) -> Vec<SourceVideo> {
    let mut found = Vec::new();
    for root in roots {
        if !is_directory(root).await {
            tracing::warn!("Search path {} is not a directory", root.display());
            continue;
        }
        scan_directory(root, extensions, &mut found).await;
    }

    let mut seen = HashSet::new();
    found.retain(|video: &SourceVideo| seen.insert(video.key.clone()));

    tracing::debug!("Scanned {} roots, found {} videos", roots.len(), found.len());
    found
}

fn scan_directory<'a>(
    dir: &'a Path,
    extensions: &'a [String],
    found: &'a mut Vec<SourceVideo>,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to scan {}: {}", dir.display(), e);
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to read entry in {}: {}", dir.display(), e);
                    break;
                }
            };

            let path = entry.path();
            if is_hidden(&path) {
                continue;
            }

            if is_directory(&path).await {
                scan_directory(&path, extensions, found).await;
            } else if has_video_extension(&path, extensions) {
                match SourceVideo::open(&path).await {
                    Ok(video) => found.push(video),
                    Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
                }
            }
        }
    })
}

async fn is_directory(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_dir())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// Case-insensitive extension match against lowercase `extensions`.
pub fn has_video_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            extensions
                .iter()
                .any(|wanted| wanted.eq_ignore_ascii_case(ext))
        })
}
