//! Audio extraction, pitch shifting, export and media delivery

use std::path::PathBuf;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use repitch_core::derive::ExportOutcome;
use repitch_core::serving::AudioReply;
use repitch_core::wav::{format_duration, wav_duration_seconds};
use repitch_core::{ArtifactKind, DeriveError, ServeError, SourceVideo};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{audio_url, parse_key};
use crate::error::{ApiError, ApiResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery};
use crate::server::AppState;

/// Body of `POST /api/extract-audio`.
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub source_path: Option<String>,
}

/// Body of `POST /api/pitch`.
#[derive(Debug, Deserialize)]
pub struct PitchRequest {
    pub key: String,
    pub semitones: i32,
}

/// Query of `GET /audio/{key}`.
#[derive(Debug, Default, Deserialize)]
pub struct AudioQuery {
    pub shift: Option<i32>,
}

/// Body of `POST /export`.
#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub source_path: Option<String>,
    pub shift: Option<i32>,
}

/// Audio location and length returned after extraction or shifting.
#[derive(Debug, Serialize)]
struct AudioInfo {
    audio_url: String,
    duration_seconds: Option<f64>,
    duration: String,
}

impl AudioInfo {
    fn new(audio_url: String, wav: &std::path::Path) -> Self {
        let duration_seconds = wav_duration_seconds(wav);
        Self {
            audio_url,
            duration_seconds,
            duration: format_duration(duration_seconds),
        }
    }
}

/// Opens the video named in a request body and registers it.
async fn open_source(state: &AppState, source_path: Option<&str>) -> ApiResult<SourceVideo> {
    let source_path = source_path
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing 'source_path'"))?;

    let video = SourceVideo::open(&PathBuf::from(source_path)).await?;
    state.catalog.register(video.clone());
    Ok(video)
}

/// Extracts (or reuses) the base audio track of a video.
pub async fn extract_audio(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ExtractRequest>,
) -> ApiResult<Json<Value>> {
    let video = open_source(&state, request.source_path.as_deref()).await?;
    let audio = state.pipeline.extractor().extract(&video).await?;
    let info = AudioInfo::new(audio_url(&video.key, None), &audio.path);

    Ok(Json(json!({
        "key": video.key,
        "filename": video.display_name,
        "audio_url": info.audio_url,
        "duration_seconds": info.duration_seconds,
        "duration": info.duration,
    })))
}

/// Generates (or reuses) a pitch variant of an extracted track.
pub async fn pitch(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PitchRequest>,
) -> ApiResult<Json<Value>> {
    let key = parse_key(&request.key)?;
    state.check_shift(request.semitones)?;

    let path = state
        .pipeline
        .audio_for(&key, Some(request.semitones))
        .await?;
    let info = AudioInfo::new(audio_url(&key, Some(request.semitones)), &path);

    Ok(Json(json!({
        "key": key,
        "semitones": request.semitones,
        "audio_url": info.audio_url,
        "duration_seconds": info.duration_seconds,
        "duration": info.duration,
    })))
}

/// Duration of an extracted base track.
pub async fn audio_meta(
    State(state): State<AppState>,
    ApiPath(raw_key): ApiPath<String>,
) -> ApiResult<Json<Value>> {
    let key = parse_key(&raw_key)?;
    let audio = state
        .pipeline
        .extractor()
        .cached(&key)
        .await
        .ok_or_else(|| DeriveError::ArtifactMissing {
            kind: ArtifactKind::Audio,
            key: key.clone(),
        })?;
    let info = AudioInfo::new(audio_url(&key, None), &audio.path);

    Ok(Json(json!(info)))
}

/// Streams the base track or a pitch variant with `Range` support.
pub async fn audio(
    State(state): State<AppState>,
    ApiPath(raw_key): ApiPath<String>,
    ApiQuery(query): ApiQuery<AudioQuery>,
    headers: HeaderMap,
) -> ApiResult<AudioReply> {
    let key = parse_key(&raw_key)?;
    if let Some(semitones) = query.shift {
        state.check_shift(semitones)?;
    }

    let path = state.pipeline.audio_for(&key, query.shift).await?;
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    Ok(state.audio_server.serve(&path, range).await?)
}

/// Returns the thumbnail image, grabbing the frame on first request.
///
/// Frame grab failures are logged and reported as a missing thumbnail so the
/// browser can fall back to a placeholder.
pub async fn thumbnail(
    State(state): State<AppState>,
    ApiPath(raw_key): ApiPath<String>,
) -> ApiResult<Response> {
    let key = parse_key(&raw_key)?;
    let thumbnails = state.pipeline.thumbnails();

    let thumbnail = match thumbnails.cached(&key).await {
        Some(thumbnail) => thumbnail,
        None => {
            let video = state
                .catalog
                .get(&key)
                .ok_or_else(|| ApiError::not_found("Thumbnail not found"))?;
            match thumbnails.thumbnail(&video).await {
                Ok(thumbnail) => thumbnail,
                Err(e) => {
                    tracing::warn!("Thumbnail generation failed for {}: {}", video.path.display(), e);
                    return Err(ApiError::not_found("Thumbnail not found"));
                }
            }
        }
    };

    let bytes = tokio::fs::read(&thumbnail.path)
        .await
        .map_err(|source| ServeError::Io {
            operation: format!("read {}", thumbnail.path.display()),
            source,
        })?;
    let content_type = mime_guess::from_path(&thumbnail.path)
        .first_raw()
        .unwrap_or("image/jpeg");

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CACHE_CONTROL, HeaderValue::from_static("max-age=3600")),
        ],
        bytes,
    )
        .into_response())
}

/// Exports a video with its original or shifted audio into the downloads folder.
pub async fn export(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ExportRequest>,
) -> ApiResult<Json<ExportOutcome>> {
    if let Some(semitones) = request.shift {
        state.check_shift(semitones)?;
    }
    let video = open_source(&state, request.source_path.as_deref()).await?;

    let outcome = state.pipeline.exporter().export(&video, request.shift).await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_info_unreadable_wav_unknown_duration() {
        let info = AudioInfo::new("/audio/k".to_string(), std::path::Path::new("/nope.wav"));

        assert_eq!(info.duration_seconds, None);
        assert_eq!(info.duration, "Unknown");
    }
}
