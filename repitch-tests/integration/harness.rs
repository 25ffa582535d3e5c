//! In-process test server over a temporary workspace.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use bytes::Bytes;
use repitch_core::RepitchConfig;
use repitch_core::runner::FakeToolRunner;
use repitch_web::{AppState, build_router};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestServer {
    pub dir: TempDir,
    pub runner: Arc<FakeToolRunner>,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_runner(FakeToolRunner::new())
    }

    pub fn with_runner(runner: FakeToolRunner) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = RepitchConfig::for_testing(dir.path());
        let runner = Arc::new(runner);
        let state = AppState::new(runner.clone(), config);
        state.pipeline.prepare().unwrap();

        Self { dir, runner, state }
    }

    /// Writes a stand-in video file under `videos/`.
    pub fn video(&self, name: &str) -> PathBuf {
        let videos = self.dir.path().join("videos");
        std::fs::create_dir_all(&videos).unwrap();
        let path = videos.join(name);
        std::fs::write(&path, b"not really a video").unwrap();
        path
    }

    pub fn downloads(&self) -> PathBuf {
        self.state.config.export.downloads_dir.clone()
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = build_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_range(&self, uri: &str, range: &str) -> TestResponse {
        self.send(
            Request::get(uri)
                .header(header::RANGE, range)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn send_json(&self, method: Method, uri: &str, body: Value) -> TestResponse {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Extracts the audio of `video` through the API and returns its key.
    pub async fn extract(&self, video: &std::path::Path) -> String {
        let response = self
            .send_json(
                Method::POST,
                "/api/extract-audio",
                serde_json::json!({ "source_path": video }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        response.json()["key"].as_str().unwrap().to_string()
    }
}

/// Builds a 16-bit PCM WAV with `frames` frames of silence.
pub fn pcm_wav(sample_rate: u32, channels: u16, frames: u32) -> Vec<u8> {
    let block_align = channels * 2;
    let data_len = frames * u32::from(block_align);
    let mut wav = Vec::new();
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(wav.len() + data_len as usize, 0);
    wav
}
