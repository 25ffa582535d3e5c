//! Representative frame grabs for the browse view.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::extract::stage_in;
use super::{DeriveError, DeriveResult, StagedFile, run_tool};
use crate::cache::{ArtifactCache, ArtifactKind};
use crate::config::RepitchConfig;
use crate::runner::{ToolCommand, ToolRunner};
use crate::source::{CacheKey, SourceVideo};

/// A cached thumbnail image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub key: CacheKey,
    pub path: PathBuf,
}

/// Grabs a single frame from a video with ffmpeg.
#[derive(Clone)]
pub struct ThumbnailGenerator {
    runner: Arc<dyn ToolRunner>,
    cache: ArtifactCache,
    ffmpeg: String,
    offset_secs: f64,
    quality: u8,
    extension: &'static str,
}

impl ThumbnailGenerator {
    /// Creates a generator using the configured seek offset and quality.
    pub fn new(runner: Arc<dyn ToolRunner>, cache: ArtifactCache, config: &RepitchConfig) -> Self {
        Self {
            runner,
            cache,
            ffmpeg: config.tools.ffmpeg.clone(),
            offset_secs: config.thumbnail.offset_secs,
            quality: config.thumbnail.quality,
            extension: config.thumbnail.extension,
        }
    }

    /// Returns the cached thumbnail for `key` without generating it.
    pub async fn cached(&self, key: &CacheKey) -> Option<Thumbnail> {
        let resolved = self.cache.resolve(ArtifactKind::Thumbnail, key).await;
        resolved.exists.then(|| Thumbnail {
            key: key.clone(),
            path: resolved.path,
        })
    }

    /// Returns the thumbnail of `video`, grabbing a frame on a cache miss.
    ///
    /// The frame at the configured offset is tried first. Videos shorter
    /// than the offset make ffmpeg fail or write nothing, in which case the
    /// first frame is grabbed instead.
    ///
    /// # Errors
    ///
    /// - `DeriveError::ExternalTool` - Both attempts failed
    /// - `DeriveError::ToolLaunch` - ffmpeg could not be started
    /// - `DeriveError::EmptyOutput` - Both attempts wrote nothing
    /// - `DeriveError::Io` - The cache directory is not writable
    pub async fn thumbnail(&self, video: &SourceVideo) -> DeriveResult<Thumbnail> {
        if let Some(thumbnail) = self.cached(&video.key).await {
            return Ok(thumbnail);
        }

        let destination = self.cache.path_for(ArtifactKind::Thumbnail, &video.key);
        let staged = stage_in(&destination, self.extension)?;

        tracing::info!(
            "Grabbing thumbnail of {} at {}s",
            video.path.display(),
            self.offset_secs
        );

        match self.grab(&video.path, &staged, self.offset_secs).await {
            Ok(()) => {}
            Err(DeriveError::ExternalTool { .. } | DeriveError::EmptyOutput { .. })
                if self.offset_secs > 0.0 =>
            {
                tracing::warn!(
                    "No frame at {}s in {}, falling back to the first frame",
                    self.offset_secs,
                    video.path.display()
                );
                self.grab(&video.path, &staged, 0.0).await?;
            }
            Err(e) => return Err(e),
        }

        staged.commit(&self.ffmpeg, &destination)?;

        Ok(Thumbnail {
            key: video.key.clone(),
            path: destination,
        })
    }

    async fn grab(&self, input: &Path, staged: &StagedFile, offset_secs: f64) -> DeriveResult<()> {
        let command = self.build_command(input, staged.path(), offset_secs);
        run_tool(self.runner.as_ref(), &command).await?;

        if staged.written_len() == 0 {
            return Err(DeriveError::EmptyOutput {
                tool: self.ffmpeg.clone(),
                path: staged.path().to_path_buf(),
            });
        }
        Ok(())
    }

    fn build_command(&self, input: &Path, output: &Path, offset_secs: f64) -> ToolCommand {
        ToolCommand::new(&self.ffmpeg, output)
            .arg("-y")
            .arg("-ss")
            .arg(offset_secs.to_string())
            .arg("-i")
            .arg(input)
            .args(["-vframes", "1"])
            .arg("-q:v")
            .arg(self.quality.to_string())
            .arg(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{FakeBehavior, FakeToolRunner};

    struct Fixture {
        _dir: tempfile::TempDir,
        runner: Arc<FakeToolRunner>,
        generator: ThumbnailGenerator,
        video: SourceVideo,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = RepitchConfig::for_testing(dir.path());
        let video_path = dir.path().join("clip.mp4");
        std::fs::write(&video_path, b"video").unwrap();

        let runner = Arc::new(FakeToolRunner::new());
        let generator =
            ThumbnailGenerator::new(runner.clone(), ArtifactCache::from_config(&config), &config);

        Fixture {
            _dir: dir,
            runner,
            generator,
            video: SourceVideo::open(&video_path).await.unwrap(),
        }
    }

    #[tokio::test]
    async fn test_thumbnail_generated_once() {
        let fx = fixture().await;

        let first = fx.generator.thumbnail(&fx.video).await.unwrap();
        let second = fx.generator.thumbnail(&fx.video).await.unwrap();

        assert_eq!(first, second);
        assert!(first.path.to_string_lossy().ends_with(".jpg"));
        assert_eq!(fx.runner.call_count("ffmpeg"), 1);

        let line = fx.runner.calls()[0].command_line();
        assert!(line.contains("-ss 1 "));
        assert!(line.contains("-vframes 1"));
        assert!(line.contains("-q:v 2"));
    }

    #[tokio::test]
    async fn test_thumbnail_short_video_falls_back_to_first_frame() {
        let fx = fixture().await;
        fx.runner.push_behavior("ffmpeg", FakeBehavior::NoOutput);

        let thumbnail = fx.generator.thumbnail(&fx.video).await.unwrap();

        assert!(thumbnail.path.is_file());
        let calls = fx.runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].command_line().contains("-ss 0 "));
    }

    #[tokio::test]
    async fn test_thumbnail_both_attempts_fail_external_tool() {
        let fx = fixture().await;
        let failure = FakeBehavior::Fail {
            exit_code: 1,
            stderr: "moov atom not found".to_string(),
        };
        fx.runner.push_behavior("ffmpeg", failure.clone());
        fx.runner.push_behavior("ffmpeg", failure);

        let result = fx.generator.thumbnail(&fx.video).await;

        assert!(matches!(result, Err(DeriveError::ExternalTool { .. })));
        assert!(fx.generator.cached(&fx.video.key).await.is_none());
    }

    #[tokio::test]
    async fn test_thumbnail_launch_error_not_retried() {
        let fx = fixture().await;
        fx.runner.push_behavior("ffmpeg", FakeBehavior::LaunchError);

        let result = fx.generator.thumbnail(&fx.video).await;

        assert!(matches!(result, Err(DeriveError::ToolLaunch { .. })));
        assert_eq!(fx.runner.call_count("ffmpeg"), 1);
    }
}
