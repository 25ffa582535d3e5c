//! HTTP server wiring for Repitch
//!
//! Builds the shared application state and routes every endpoint onto the
//! handlers. Derivation errors are turned into JSON error bodies by the
//! handlers, so a failing request never takes the server down.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use parking_lot::RwLock;
use repitch_core::library::search_paths::normalize;
use repitch_core::{
    AudioRangeServer, MediaPipeline, ProcessRunner, RepitchConfig, SearchPaths, ToolRunner,
    VideoCatalog,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, ApiResult};
use crate::handlers::{
    add_path, audio, audio_meta, export, extract_audio, healthz, list_paths, list_videos, pitch,
    remove_path, thumbnail, video_info,
};

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RepitchConfig>,
    pub pipeline: MediaPipeline,
    pub catalog: Arc<VideoCatalog>,
    pub search_paths: Arc<RwLock<SearchPaths>>,
    pub audio_server: AudioRangeServer,
    /// Browse roots given on the command line, never persisted
    pub extra_roots: Arc<Vec<PathBuf>>,
}

impl AppState {
    /// Wires the derivation pipeline and loads the persisted search paths.
    pub fn new(runner: Arc<dyn ToolRunner>, config: RepitchConfig) -> Self {
        let pipeline = MediaPipeline::new(runner, &config);
        let search_paths = SearchPaths::load_or_empty(&config.library.paths_file);
        let audio_server = AudioRangeServer::new(config.storage.file_buffer_size);

        Self {
            config: Arc::new(config),
            pipeline,
            catalog: Arc::new(VideoCatalog::new()),
            search_paths: Arc::new(RwLock::new(search_paths)),
            audio_server,
            extra_roots: Arc::new(Vec::new()),
        }
    }

    /// Adds a browse root for this process only.
    pub fn with_root(mut self, root: PathBuf) -> Self {
        Arc::make_mut(&mut self.extra_roots).push(normalize(&root));
        self
    }

    /// Persisted search paths followed by command line roots, without duplicates.
    pub fn browse_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.search_paths.read().paths().to_vec();
        for root in self.extra_roots.iter() {
            if !roots.contains(root) {
                roots.push(root.clone());
            }
        }
        roots
    }

    /// Rejects shifts beyond the configured limit.
    ///
    /// # Errors
    ///
    /// - `ApiError::BadRequest` - `|semitones|` exceeds `max_semitones`
    pub fn check_shift(&self, semitones: i32) -> ApiResult<()> {
        let limit = self.config.library.max_semitones;
        if semitones.unsigned_abs() > limit {
            return Err(ApiError::bad_request(format!(
                "'semitones' must be between -{limit} and {limit}"
            )));
        }
        Ok(())
    }
}

/// Routes every endpoint onto `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        // Library browsing
        .route(
            "/api/paths",
            get(list_paths).post(add_path).delete(remove_path),
        )
        .route("/api/videos", get(list_videos))
        .route("/api/videos/{key}", get(video_info))
        // Derivation
        .route("/api/extract-audio", post(extract_audio))
        .route("/api/pitch", post(pitch))
        .route("/api/audio-meta/{key}", get(audio_meta))
        .route("/export", post(export))
        // Media
        .route("/audio/{key}", get(audio))
        .route("/thumb/{key}", get(thumbnail))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the HTTP server until the process is stopped.
///
/// `root` adds a browse directory on top of the persisted search paths.
///
/// # Errors
///
/// - `RepitchError::Derive` - The cache directory tree could not be created
/// - `RepitchError::Io` - The listener could not bind or the server failed
pub async fn run_server(config: RepitchConfig, root: Option<PathBuf>) -> repitch_core::Result<()> {
    let address = format!("{}:{}", config.server.host, config.server.port);

    let mut state = AppState::new(Arc::new(ProcessRunner::new()), config);
    state.pipeline.prepare()?;
    if let Some(root) = root {
        state = state.with_root(root);
    }

    tracing::info!(
        "Caching artifacts under {}, exporting to {}",
        state.pipeline.cache().root().display(),
        state.pipeline.exporter().destination().display()
    );

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Repitch server running on http://{address}");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use repitch_core::runner::FakeToolRunner;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    fn state(dir: &tempfile::TempDir) -> AppState {
        AppState::new(
            Arc::new(FakeToolRunner::new()),
            RepitchConfig::for_testing(dir.path()),
        )
    }

    #[test]
    fn test_check_shift_outside_limit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);

        assert!(state.check_shift(8).is_ok());
        assert!(state.check_shift(-8).is_ok());
        assert!(matches!(
            state.check_shift(9),
            Err(ApiError::BadRequest { .. })
        ));
        assert!(state.check_shift(i32::MIN).is_err());
    }

    #[test]
    fn test_browse_roots_merges_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let videos = dir.path().join("videos");
        std::fs::create_dir(&videos).unwrap();
        state.search_paths.write().add(&videos).unwrap();

        let state = state.with_root(videos.clone());
        let extra = dir.path().join("more");
        std::fs::create_dir(&extra).unwrap();
        let state = state.with_root(extra.clone());

        assert_eq!(
            state.browse_roots(),
            vec![normalize(&videos), normalize(&extra)]
        );
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_router_malformed_query_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let uri = format!("/audio/{}?shift=abc", "a".repeat(40));

        let (status, body) = send(state(&dir), Request::get(uri).body(Body::empty()).unwrap()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_router_missing_content_type_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::post("/export")
            .body(Body::from(r#"{"source_path": "/videos/clip.mp4"}"#))
            .unwrap();

        let (status, body) = send(state(&dir), request).await;

        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_router_wrong_field_type_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::post("/api/pitch")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"key": "k", "semitones": "up"}"#))
            .unwrap();

        let (status, body) = send(state(&dir), request).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].is_string());
    }
}
