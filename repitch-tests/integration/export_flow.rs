//! Export through `POST /export`.

use axum::http::{Method, StatusCode};
use repitch_core::runner::{FakeBehavior, FakeToolRunner};
use serde_json::json;

use crate::harness::TestServer;

#[tokio::test]
async fn test_export_twice_never_overwrites() {
    let server = TestServer::new();
    let clip = server.video("concert.mp4");

    let first = server
        .send_json(Method::POST, "/export", json!({ "source_path": clip }))
        .await;
    let second = server
        .send_json(Method::POST, "/export", json!({ "source_path": clip }))
        .await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    let downloads = server.downloads();
    assert_eq!(
        first.json()["output_path"],
        json!(downloads.join("concert.mp4"))
    );
    assert_eq!(
        second.json()["output_path"],
        json!(downloads.join("concert (1).mp4"))
    );
    assert_eq!(std::fs::read_dir(&downloads).unwrap().count(), 2);
}

#[tokio::test]
async fn test_export_shifted_named_with_sign() {
    let server = TestServer::new();
    let clip = server.video("concert.mp4");

    let response = server
        .send_json(
            Method::POST,
            "/export",
            json!({ "source_path": clip, "shift": 3 }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(
        body["output_path"],
        json!(server.downloads().join("concert_+3.mp4"))
    );
    assert_eq!(body["semitones"], 3);
    assert_eq!(server.runner.call_count("sox"), 1);

    let mux = server.runner.calls().last().unwrap().command_line();
    assert!(mux.contains("-shortest"));
}

#[tokio::test]
async fn test_export_shift_beyond_limit_rejected() {
    let server = TestServer::new();
    let clip = server.video("concert.mp4");

    let response = server
        .send_json(
            Method::POST,
            "/export",
            json!({ "source_path": clip, "shift": -20 }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(server.runner.calls().is_empty());
}

#[tokio::test]
async fn test_export_mux_failure_server_error_no_leftovers() {
    let runner = FakeToolRunner::new();
    // Extraction succeeds, the mux fails after writing a header
    runner.push_behavior("ffmpeg", FakeBehavior::WriteOutput(b"RIFF".to_vec()));
    runner.push_behavior(
        "ffmpeg",
        FakeBehavior::FailPartial {
            exit_code: 1,
            stderr: "Error writing trailer".to_string(),
            partial: b"ftyp".to_vec(),
        },
    );
    let server = TestServer::with_runner(runner);
    let clip = server.video("concert.mp4");

    let response = server
        .send_json(Method::POST, "/export", json!({ "source_path": clip }))
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.json()["error"].as_str().unwrap().contains("ffmpeg"));
    assert_eq!(std::fs::read_dir(server.downloads()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_export_missing_source_path_bad_request() {
    let server = TestServer::new();

    let response = server.send_json(Method::POST, "/export", json!({})).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "Missing 'source_path'");
}
