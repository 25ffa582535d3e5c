//! Byte-range audio delivery through `GET /audio/{key}`.

use axum::http::{StatusCode, header};
use repitch_core::runner::{FakeBehavior, FakeToolRunner};

use crate::harness::TestServer;

fn payload() -> Vec<u8> {
    (0..1000u32).map(|i| (i % 251) as u8).collect()
}

async fn server_with_audio() -> (TestServer, String) {
    let runner =
        FakeToolRunner::new().with_default("ffmpeg", FakeBehavior::WriteOutput(payload()));
    let server = TestServer::with_runner(runner);
    let clip = server.video("track.mp4");
    let key = server.extract(&clip).await;
    (server, key)
}

#[tokio::test]
async fn test_audio_without_range_full_body() {
    let (server, key) = server_with_audio().await;

    let response = server.get(&format!("/audio/{key}")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header(header::ACCEPT_RANGES), Some("bytes"));
    assert_eq!(response.header(header::CACHE_CONTROL), Some("no-store"));
    assert!(response.header(header::CONTENT_TYPE).unwrap().contains("wav"));
    assert_eq!(response.header(header::CONTENT_LENGTH), Some("1000"));
    assert_eq!(response.body.as_ref(), payload().as_slice());
}

#[tokio::test]
async fn test_audio_first_hundred_bytes_partial() {
    let (server, key) = server_with_audio().await;

    let response = server
        .get_range(&format!("/audio/{key}"), "bytes=0-99")
        .await;

    assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.header(header::CONTENT_RANGE), Some("bytes 0-99/1000"));
    assert_eq!(response.header(header::CONTENT_LENGTH), Some("100"));
    assert_eq!(response.body.as_ref(), &payload()[..100]);
}

#[tokio::test]
async fn test_audio_range_past_end_not_satisfiable() {
    let (server, key) = server_with_audio().await;

    let response = server
        .get_range(&format!("/audio/{key}"), "bytes=2000-")
        .await;

    assert_eq!(response.status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.header(header::CONTENT_RANGE), Some("bytes */1000"));
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_audio_sequential_seeks_each_partial() {
    let (server, key) = server_with_audio().await;
    let uri = format!("/audio/{key}");
    let expected = payload();

    for (range, start, end) in [
        ("bytes=500-", 500usize, 999usize),
        ("bytes=100-199", 100, 199),
        ("bytes=-10", 990, 999),
        ("bytes=900-5000", 900, 999),
    ] {
        let response = server.get_range(&uri, range).await;

        assert_eq!(response.status, StatusCode::PARTIAL_CONTENT, "{range}");
        assert_eq!(
            response.header(header::CONTENT_RANGE),
            Some(format!("bytes {start}-{end}/1000").as_str())
        );
        assert_eq!(response.body.as_ref(), &expected[start..=end]);
    }

    // Extraction ran once, every seek was served from the cache
    assert_eq!(server.runner.call_count("ffmpeg"), 1);
}

#[tokio::test]
async fn test_audio_shift_query_serves_variant() {
    let (server, key) = server_with_audio().await;

    let shifted = server.get(&format!("/audio/{key}?shift=2")).await;
    let again = server.get(&format!("/audio/{key}?shift=2")).await;
    let too_far = server.get(&format!("/audio/{key}?shift=12")).await;

    assert_eq!(shifted.status, StatusCode::OK);
    assert_eq!(shifted.body.as_ref(), b"fake output");
    assert_eq!(again.body, shifted.body);
    assert_eq!(too_far.status, StatusCode::BAD_REQUEST);
    assert_eq!(server.runner.call_count("sox"), 1);
}

#[tokio::test]
async fn test_audio_before_extraction_not_found() {
    let server = TestServer::new();
    let key = "c".repeat(40);

    let response = server.get(&format!("/audio/{key}")).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.json()["error"].is_string());
}
