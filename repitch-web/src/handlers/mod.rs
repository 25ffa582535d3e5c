//! HTTP request handlers organized by functionality

pub mod library;
pub mod media;

use repitch_core::CacheKey;

use crate::error::ApiResult;

// Re-export handler functions
pub use library::{
    PathRequest, PathsResponse, VideoSummary, add_path, healthz, list_paths, list_videos,
    remove_path, video_info,
};
pub use media::{
    AudioQuery, ExportRequest, ExtractRequest, PitchRequest, audio, audio_meta, export,
    extract_audio, pitch, thumbnail,
};

/// Validates a key taken from the URL before it touches the filesystem.
fn parse_key(raw: &str) -> ApiResult<CacheKey> {
    Ok(CacheKey::parse(raw)?)
}

/// URL of the audio endpoint for `key` and an optional shift.
fn audio_url(key: &CacheKey, semitones: Option<i32>) -> String {
    match semitones {
        Some(semitones) => format!("/audio/{key}?shift={semitones}"),
        None => format!("/audio/{key}"),
    }
}
