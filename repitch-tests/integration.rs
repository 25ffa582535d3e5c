//! Integration tests for Repitch
//!
//! Drive the HTTP router in-process with a scripted tool runner, so the full
//! request path from routing to the artifact cache is exercised without
//! ffmpeg or sox installed.

#[path = "integration/harness.rs"]
mod harness;

#[path = "integration/audio_streaming.rs"]
mod audio_streaming;
#[path = "integration/export_flow.rs"]
mod export_flow;
#[path = "integration/http_api.rs"]
mod http_api;
