//! Repitch Web - JSON API Server

#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! JSON endpoints for browsing videos, extracting and pitch-shifting their
//! audio and exporting re-muxed copies, plus byte-range audio streaming and
//! thumbnails for the browser player.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod server;

// Re-export main types
pub use error::ApiError;
pub use extractors::{ApiJson, ApiPath, ApiQuery};
pub use server::{AppState, build_router, run_server};
