//! Normalized audio extraction from source videos.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{DeriveError, DeriveResult, StagedFile, run_tool};
use crate::cache::{ArtifactCache, ArtifactKind};
use crate::config::RepitchConfig;
use crate::runner::{ToolCommand, ToolRunner};
use crate::source::{CacheKey, SourceVideo};

/// Decoder stderr fragments meaning the input has no audio track.
const MISSING_AUDIO_MARKERS: &[&str] = &["matches no streams", "does not contain any stream"];

/// The cached 48 kHz WAV of a source video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub key: CacheKey,
    pub path: PathBuf,
}

/// Demuxes and resamples the first audio stream of a video to WAV.
#[derive(Clone)]
pub struct AudioExtractor {
    runner: Arc<dyn ToolRunner>,
    cache: ArtifactCache,
    ffmpeg: String,
    sample_rate: u32,
    codec: &'static str,
}

impl AudioExtractor {
    /// Creates an extractor using the configured decoder and sample rate.
    pub fn new(runner: Arc<dyn ToolRunner>, cache: ArtifactCache, config: &RepitchConfig) -> Self {
        Self {
            runner,
            cache,
            ffmpeg: config.tools.ffmpeg.clone(),
            sample_rate: config.audio.sample_rate,
            codec: config.audio.codec,
        }
    }

    /// Returns the cached audio artifact for `key` without generating it.
    pub async fn cached(&self, key: &CacheKey) -> Option<AudioArtifact> {
        let resolved = self.cache.resolve(ArtifactKind::Audio, key).await;
        resolved.exists.then(|| AudioArtifact {
            key: key.clone(),
            path: resolved.path,
        })
    }

    /// Returns the audio artifact of `video`, extracting it on a cache miss.
    ///
    /// # Errors
    ///
    /// - `DeriveError::NoAudioStream` - The source has no audio track
    /// - `DeriveError::ExternalTool` - The decoder exited non-zero
    /// - `DeriveError::ToolLaunch` - The decoder could not be started
    /// - `DeriveError::EmptyOutput` - The decoder wrote nothing
    /// - `DeriveError::Io` - The cache directory is not writable
    pub async fn extract(&self, video: &SourceVideo) -> DeriveResult<AudioArtifact> {
        if let Some(artifact) = self.cached(&video.key).await {
            return Ok(artifact);
        }

        let destination = self.cache.path_for(ArtifactKind::Audio, &video.key);
        let staged = stage_in(&destination, "wav")?;
        let command = self.build_command(&video.path, staged.path());

        tracing::info!(
            "Extracting audio from {} into {}",
            video.path.display(),
            destination.display()
        );

        match run_tool(self.runner.as_ref(), &command).await {
            Ok(_) => {}
            Err(DeriveError::ExternalTool { stderr, .. }) if is_missing_audio(&stderr) => {
                tracing::warn!("{} has no audio stream", video.path.display());
                return Err(DeriveError::NoAudioStream {
                    path: video.path.clone(),
                });
            }
            Err(e) => return Err(e),
        }

        staged.commit(&self.ffmpeg, &destination)?;

        Ok(AudioArtifact {
            key: video.key.clone(),
            path: destination,
        })
    }

    fn build_command(&self, input: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.ffmpeg, output)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-map", "0:a:0", "-vn", "-acodec", self.codec])
            .arg("-ar")
            .arg(self.sample_rate.to_string())
            .args(["-f", "wav"])
            .arg(output)
    }
}

/// Stages a file next to `destination` inside the cache tree.
pub(crate) fn stage_in(destination: &Path, extension: &str) -> DeriveResult<StagedFile> {
    let dir = destination.parent().unwrap_or(Path::new("."));
    StagedFile::create(dir, extension).map_err(|source| DeriveError::Io {
        operation: format!("stage output in {}", dir.display()),
        source,
    })
}

fn is_missing_audio(stderr: &str) -> bool {
    MISSING_AUDIO_MARKERS
        .iter()
        .any(|marker| stderr.contains(marker))
}
