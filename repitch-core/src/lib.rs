//! Repitch Core - Cached audio derivation for pitch-shifting local videos
//!
//! This crate provides the derivation pipeline behind Repitch: cache key
//! derivation, the on-disk artifact cache, audio extraction, pitch shifting,
//! thumbnails and export through external tools, byte-range serving of the
//! results, and discovery of the videos to work on.

pub mod cache;
pub mod config;
pub mod derive;
pub mod library;
pub mod runner;
pub mod serving;
pub mod source;
pub mod wav;

// Re-export main types for convenient access
pub use cache::{ArtifactCache, ArtifactKind, ResolvedArtifact};
pub use config::RepitchConfig;
pub use derive::{DeriveError, ExportOutcome, MediaPipeline};
pub use library::{LibraryError, SearchPaths, VideoCatalog};
pub use runner::{ProcessRunner, ToolRunner};
pub use serving::{AudioRangeServer, RangeError, ServeError};
pub use source::{CacheKey, KeyError, SourceVideo};

/// Core errors that can bubble up from any Repitch subsystem.
#[derive(Debug, thiserror::Error)]
pub enum RepitchError {
    #[error("Derivation error: {0}")]
    Derive(#[from] DeriveError),

    #[error("Range error: {0}")]
    Range(#[from] RangeError),

    #[error("Serve error: {0}")]
    Serve(#[from] ServeError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepitchError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            RepitchError::Derive(e) => match e {
                DeriveError::InvalidPath { path, .. } => {
                    format!("Video not found: {}", path.display())
                }
                DeriveError::NoAudioStream { path } => {
                    format!("{} has no audio track", path.display())
                }
                DeriveError::ToolLaunch { tool, .. } => {
                    format!("Could not run {tool}; is it installed and on PATH?")
                }
                DeriveError::DestinationWrite { path, .. } => {
                    format!("Cannot write to {}", path.display())
                }
                DeriveError::ArtifactMissing { kind, .. } => {
                    format!("The {kind} track has not been generated yet")
                }
                DeriveError::ExternalTool { tool, .. } | DeriveError::EmptyOutput { tool, .. } => {
                    format!("{tool} failed to process the video")
                }
                DeriveError::Io { .. } => "File system error occurred".to_string(),
            },
            RepitchError::Range(_) => "Requested range is not available".to_string(),
            RepitchError::Serve(ServeError::NotFound { path }) => {
                format!("File not found: {}", path.display())
            }
            RepitchError::Serve(_) => "Could not read file".to_string(),
            RepitchError::Key(_) => "Invalid video key".to_string(),
            RepitchError::Library(_) => "Could not update the search paths".to_string(),
            RepitchError::Configuration { reason } => format!("Configuration error: {reason}"),
            RepitchError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RepitchError::Configuration { .. }
                | RepitchError::Key(_)
                | RepitchError::Range(_)
                | RepitchError::Derive(
                    DeriveError::InvalidPath { .. } | DeriveError::NoAudioStream { .. }
                )
        )
    }
}

pub type Result<T> = std::result::Result<T, RepitchError>;
