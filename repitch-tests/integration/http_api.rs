//! JSON API behaviour: health, search paths, listing, extraction and pitch.

use axum::http::{Method, StatusCode, header};
use repitch_core::runner::{FakeBehavior, FakeToolRunner};
use serde_json::json;

use crate::harness::{TestServer, pcm_wav};

#[tokio::test]
async fn test_healthz_missing_tool_reported() {
    let runner = FakeToolRunner::new();
    runner.mark_unavailable("sox");
    let server = TestServer::with_runner(runner);

    let response = server.get("/healthz").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["ok"], true);
    assert_eq!(body["tools"]["ffmpeg"], true);
    assert_eq!(body["tools"]["sox"], false);
}

#[tokio::test]
async fn test_paths_add_list_remove_persisted() {
    let server = TestServer::new();
    let videos = server.dir.path().join("videos");
    std::fs::create_dir_all(&videos).unwrap();

    let added = server
        .send_json(Method::POST, "/api/paths", json!({ "path": videos }))
        .await;
    assert_eq!(added.status, StatusCode::OK);
    assert_eq!(added.json()["paths"].as_array().unwrap().len(), 1);

    // Adding again keeps a single entry
    server
        .send_json(Method::POST, "/api/paths", json!({ "path": videos }))
        .await;
    let listed = server.get("/api/paths").await;
    assert_eq!(listed.json()["paths"].as_array().unwrap().len(), 1);

    let stored = std::fs::read_to_string(&server.state.config.library.paths_file).unwrap();
    assert!(stored.contains("videos"));

    let removed = server
        .send_json(Method::DELETE, "/api/paths", json!({ "path": videos }))
        .await;
    assert_eq!(removed.status, StatusCode::OK);
    assert!(removed.json()["paths"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_paths_add_without_path_bad_request() {
    let server = TestServer::new();

    let response = server.send_json(Method::POST, "/api/paths", json!({})).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "Missing 'path'");
}

#[tokio::test]
async fn test_videos_listing_then_thumbnail_generated_lazily() {
    let server = TestServer::new();
    let clip = server.video("clip.mp4");
    server.video("notes.txt");
    server
        .send_json(
            Method::POST,
            "/api/paths",
            json!({ "path": clip.parent().unwrap() }),
        )
        .await;

    let listing = server.get("/api/videos").await;
    assert_eq!(listing.status, StatusCode::OK);
    let videos = listing.json()["videos"].as_array().unwrap().clone();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0]["filename"], "clip.mp4");
    // Listing alone never runs a tool
    assert_eq!(server.runner.call_count("ffmpeg"), 0);

    let thumb_url = videos[0]["thumbnail"].as_str().unwrap().to_string();
    let first = server.get(&thumb_url).await;
    let second = server.get(&thumb_url).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.header(header::CONTENT_TYPE), Some("image/jpeg"));
    assert_eq!(first.body, second.body);
    assert_eq!(server.runner.call_count("ffmpeg"), 1);

    let key = videos[0]["key"].as_str().unwrap();
    let info = server.get(&format!("/api/videos/{key}")).await;
    assert_eq!(info.status, StatusCode::OK);
    assert_eq!(info.json()["video"]["filename"], "clip.mp4");
    assert!(info.json()["audio_url"].is_null());
}

#[tokio::test]
async fn test_videos_rescan_forgets_deleted_files() {
    let server = TestServer::new();
    let kept = server.video("kept.mp4");
    let gone = server.video("gone.mp4");
    server
        .send_json(
            Method::POST,
            "/api/paths",
            json!({ "path": kept.parent().unwrap() }),
        )
        .await;
    let listing = server.get("/api/videos").await.json();
    let key_of = |name: &str| {
        listing["videos"]
            .as_array()
            .unwrap()
            .iter()
            .find(|video| video["filename"] == name)
            .map(|video| video["key"].as_str().unwrap().to_string())
            .unwrap()
    };
    let (kept_key, gone_key) = (key_of("kept.mp4"), key_of("gone.mp4"));

    std::fs::remove_file(&gone).unwrap();
    let relisted = server.get("/api/videos").await;

    assert_eq!(relisted.json()["videos"].as_array().unwrap().len(), 1);
    let gone_info = server.get(&format!("/api/videos/{gone_key}")).await;
    let kept_info = server.get(&format!("/api/videos/{kept_key}")).await;
    assert_eq!(gone_info.status, StatusCode::NOT_FOUND);
    assert_eq!(kept_info.status, StatusCode::OK);
}

#[tokio::test]
async fn test_thumbnail_unknown_or_malformed_key_rejected() {
    let server = TestServer::new();
    let unknown = "a".repeat(40);

    let missing = server.get(&format!("/thumb/{unknown}")).await;
    let malformed = server.get("/thumb/not-a-key").await;

    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert!(malformed.json()["error"].is_string());
    assert_eq!(server.runner.call_count("ffmpeg"), 0);
}

#[tokio::test]
async fn test_thumbnail_tool_failure_not_found() {
    let runner = FakeToolRunner::new().with_default(
        "ffmpeg",
        FakeBehavior::Fail {
            exit_code: 1,
            stderr: "Invalid data found when processing input".to_string(),
        },
    );
    let server = TestServer::with_runner(runner);
    let clip = server.video("broken.mp4");
    server
        .send_json(
            Method::POST,
            "/api/paths",
            json!({ "path": clip.parent().unwrap() }),
        )
        .await;
    let listing = server.get("/api/videos").await;
    let thumb_url = listing.json()["videos"][0]["thumbnail"]
        .as_str()
        .unwrap()
        .to_string();

    let response = server.get(&thumb_url).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["error"], "Thumbnail not found");
}

#[tokio::test]
async fn test_extract_audio_reports_duration() {
    let runner = FakeToolRunner::new()
        .with_default("ffmpeg", FakeBehavior::WriteOutput(pcm_wav(8_000, 1, 8_000 * 75)));
    let server = TestServer::with_runner(runner);
    let clip = server.video("song.mp4");

    let response = server
        .send_json(
            Method::POST,
            "/api/extract-audio",
            json!({ "source_path": clip }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    let key = body["key"].as_str().unwrap();
    assert_eq!(body["filename"], "song.mp4");
    assert_eq!(body["audio_url"], format!("/audio/{key}"));
    assert_eq!(body["duration_seconds"], 75.0);
    assert_eq!(body["duration"], "01:15");

    let meta = server.get(&format!("/api/audio-meta/{key}")).await;
    assert_eq!(meta.status, StatusCode::OK);
    assert_eq!(meta.json()["duration"], "01:15");
}

#[tokio::test]
async fn test_extract_audio_missing_source_not_found() {
    let server = TestServer::new();
    let missing = server.dir.path().join("videos/missing.mp4");

    let response = server
        .send_json(
            Method::POST,
            "/api/extract-audio",
            json!({ "source_path": missing }),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(server.runner.call_count("ffmpeg"), 0);
}

#[tokio::test]
async fn test_extract_audio_silent_video_unprocessable() {
    let runner = FakeToolRunner::new().with_default(
        "ffmpeg",
        FakeBehavior::FailPartial {
            exit_code: 1,
            stderr: "Stream map '0:a:0' matches no streams.".to_string(),
            partial: b"RIFF".to_vec(),
        },
    );
    let server = TestServer::with_runner(runner);
    let clip = server.video("silent.mp4");

    let response = server
        .send_json(
            Method::POST,
            "/api/extract-audio",
            json!({ "source_path": clip }),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let audio_dir = server.state.pipeline.cache().root().join("audio");
    assert_eq!(std::fs::read_dir(audio_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_pitch_limits_and_missing_base() {
    let server = TestServer::new();
    let clip = server.video("song.mp4");
    let unknown = "b".repeat(40);

    let before = server
        .send_json(
            Method::POST,
            "/api/pitch",
            json!({ "key": unknown, "semitones": 2 }),
        )
        .await;
    assert_eq!(before.status, StatusCode::NOT_FOUND);

    let key = server.extract(&clip).await;
    let too_far = server
        .send_json(
            Method::POST,
            "/api/pitch",
            json!({ "key": key, "semitones": 9 }),
        )
        .await;
    assert_eq!(too_far.status, StatusCode::BAD_REQUEST);
    assert_eq!(server.runner.call_count("sox"), 0);

    let shifted = server
        .send_json(
            Method::POST,
            "/api/pitch",
            json!({ "key": key, "semitones": -3 }),
        )
        .await;
    assert_eq!(shifted.status, StatusCode::OK);
    assert_eq!(
        shifted.json()["audio_url"],
        format!("/audio/{key}?shift=-3")
    );
    assert_eq!(server.runner.call_count("sox"), 1);
}
