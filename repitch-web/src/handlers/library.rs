//! Search path management, video listing and health reporting

use std::path::PathBuf;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use repitch_core::library::scan_roots;
use repitch_core::wav::{format_duration, wav_duration_seconds};
use repitch_core::{CacheKey, SearchPaths, SourceVideo};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{audio_url, parse_key};
use crate::error::{ApiError, ApiResult};
use crate::extractors::{ApiJson, ApiPath};
use crate::server::AppState;

/// Body of `POST` and `DELETE /api/paths`.
#[derive(Debug, Deserialize)]
pub struct PathRequest {
    pub path: Option<String>,
}

impl PathRequest {
    fn required(&self) -> ApiResult<PathBuf> {
        match self.path.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Err(ApiError::bad_request("Missing 'path'")),
        }
    }
}

/// Current search path list.
#[derive(Debug, Serialize)]
pub struct PathsResponse {
    pub ok: bool,
    pub paths: Vec<PathBuf>,
}

impl From<&SearchPaths> for PathsResponse {
    fn from(search_paths: &SearchPaths) -> Self {
        Self {
            ok: true,
            paths: search_paths.paths().to_vec(),
        }
    }
}

/// One entry of the video listing.
#[derive(Debug, Serialize)]
pub struct VideoSummary {
    pub key: CacheKey,
    pub filename: String,
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    pub thumbnail: String,
}

impl From<&SourceVideo> for VideoSummary {
    fn from(video: &SourceVideo) -> Self {
        Self {
            key: video.key.clone(),
            filename: video.display_name.clone(),
            path: video.path.clone(),
            modified: video.modified,
            thumbnail: format!("/thumb/{}", video.key),
        }
    }
}

/// Reports liveness and whether the external tools can be launched.
pub async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let tools = &state.config.tools;
    let runner = state.pipeline.runner();
    let (ffmpeg, sox) = tokio::join!(runner.probe(&tools.ffmpeg), runner.probe(&tools.sox));

    Json(json!({
        "ok": true,
        "tools": { "ffmpeg": ffmpeg, "sox": sox }
    }))
}

/// Lists the persisted search paths.
pub async fn list_paths(State(state): State<AppState>) -> Json<PathsResponse> {
    Json(PathsResponse::from(&*state.search_paths.read()))
}

/// Adds a search path and persists the list.
pub async fn add_path(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PathRequest>,
) -> ApiResult<Json<PathsResponse>> {
    let path = request.required()?;
    let mut search_paths = state.search_paths.write();
    if search_paths.add(&path)? {
        tracing::info!("Added search path {}", path.display());
    }
    Ok(Json(PathsResponse::from(&*search_paths)))
}

/// Removes a search path and persists the list. Unknown paths are ignored.
pub async fn remove_path(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PathRequest>,
) -> ApiResult<Json<PathsResponse>> {
    let path = request.required()?;
    let mut search_paths = state.search_paths.write();
    if search_paths.remove(&path)? {
        tracing::info!("Removed search path {}", path.display());
    }
    Ok(Json(PathsResponse::from(&*search_paths)))
}

/// Scans every browse root and re-registers what it finds.
///
/// Catalog entries under a root that the scan no longer finds are dropped.
///
/// Thumbnails are not generated here; each entry links to the thumbnail
/// endpoint, which grabs the frame on first request.
pub async fn list_videos(State(state): State<AppState>) -> Json<Value> {
    let roots = state.browse_roots();
    let videos = scan_roots(&roots, &state.config.library.extensions).await;
    tracing::debug!("Found {} videos in {} roots", videos.len(), roots.len());

    let summaries: Vec<VideoSummary> = videos.iter().map(VideoSummary::from).collect();
    let mut scanned = Vec::with_capacity(roots.len());
    for root in &roots {
        scanned.push(tokio::fs::canonicalize(root).await.unwrap_or_else(|_| root.clone()));
    }
    state.catalog.replace_under(&scanned, videos);

    Json(json!({ "videos": summaries }))
}

/// Details of one registered video, including its extracted audio if any.
pub async fn video_info(
    State(state): State<AppState>,
    ApiPath(raw_key): ApiPath<String>,
) -> ApiResult<Json<Value>> {
    let key = parse_key(&raw_key)?;
    let video = state
        .catalog
        .get(&key)
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    let audio = state.pipeline.extractor().cached(&key).await;
    let duration_seconds = audio
        .as_ref()
        .and_then(|audio| wav_duration_seconds(&audio.path));

    Ok(Json(json!({
        "video": VideoSummary::from(&video),
        "audio_url": audio.as_ref().map(|_| audio_url(&key, None)),
        "duration_seconds": duration_seconds,
        "duration": format_duration(duration_seconds),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_request_blank_rejected() {
        let blank = PathRequest {
            path: Some("   ".to_string()),
        };
        let missing = PathRequest { path: None };
        let given = PathRequest {
            path: Some("/videos".to_string()),
        };

        assert!(matches!(blank.required(), Err(ApiError::BadRequest { .. })));
        assert!(matches!(missing.required(), Err(ApiError::BadRequest { .. })));
        assert_eq!(given.required().unwrap(), PathBuf::from("/videos"));
    }

    #[tokio::test]
    async fn test_video_summary_links_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mp4");
        std::fs::write(&path, b"video").unwrap();
        let video = SourceVideo::open(&path).await.unwrap();

        let summary = VideoSummary::from(&video);

        assert_eq!(summary.filename, "song.mp4");
        assert_eq!(summary.thumbnail, format!("/thumb/{}", video.key));
    }
}
