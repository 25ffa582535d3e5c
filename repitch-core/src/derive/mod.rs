//! Artifact derivation pipeline.
//!
//! Each component checks the [`ArtifactCache`](crate::cache::ArtifactCache)
//! first and only invokes its external tool on a miss. Outputs are staged in a
//! temp file next to the destination and renamed into place on success, so a
//! failed run never leaves something the cache would mistake for a valid
//! artifact. Nothing is retried.

pub mod export;
pub mod extract;
pub mod pipeline;
pub mod pitch;
pub mod staging;
pub mod thumbnail;

use std::path::PathBuf;

pub use export::{ExportOutcome, Exporter};
pub use extract::{AudioArtifact, AudioExtractor};
pub use pipeline::MediaPipeline;
pub use pitch::{PitchShifter, PitchVariant};
pub use staging::StagedFile;
pub use thumbnail::{Thumbnail, ThumbnailGenerator};

use crate::cache::ArtifactKind;
use crate::runner::{ToolCommand, ToolOutput, ToolRunner};
use crate::source::CacheKey;

/// Errors raised while deriving artifacts or exporting videos.
#[derive(Debug, thiserror::Error)]
pub enum DeriveError {
    #[error("Invalid source path {}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error("No audio stream in {}", path.display())]
    NoAudioStream { path: PathBuf },

    #[error("{tool} failed with exit code {exit_code:?}: {stderr}")]
    ExternalTool {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        source: std::io::Error,
    },

    #[error("{tool} produced no output at {}", path.display())]
    EmptyOutput { tool: String, path: PathBuf },

    #[error("Cannot write to destination {}: {source}", path.display())]
    DestinationWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No cached {kind} artifact for {key}")]
    ArtifactMissing { kind: ArtifactKind, key: CacheKey },

    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        source: std::io::Error,
    },
}

pub type DeriveResult<T> = Result<T, DeriveError>;

/// Runs a tool and converts a non-zero exit into `DeriveError::ExternalTool`.
pub(crate) async fn run_tool(
    runner: &dyn ToolRunner,
    command: &ToolCommand,
) -> DeriveResult<ToolOutput> {
    let output = runner
        .run(command)
        .await
        .map_err(|source| DeriveError::ToolLaunch {
            tool: command.program.clone(),
            source,
        })?;

    if output.success() {
        Ok(output)
    } else {
        Err(DeriveError::ExternalTool {
            tool: command.program.clone(),
            exit_code: output.exit_code,
            stderr: output.stderr,
        })
    }
}
