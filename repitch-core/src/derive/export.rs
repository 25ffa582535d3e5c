//! Re-muxing a source video with a replacement audio track.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::{
    AudioExtractor, DeriveError, DeriveResult, PitchShifter, StagedFile, run_tool,
};
use crate::cache::shift_label;
use crate::config::RepitchConfig;
use crate::runner::{ToolCommand, ToolRunner};
use crate::source::SourceVideo;

/// Highest numeric suffix tried before giving up on a free file name.
const MAX_NAME_SUFFIX: u32 = 9999;

/// Result of a finished export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportOutcome {
    /// The new video in the destination directory
    pub output_path: PathBuf,
    /// Audio track that was muxed in
    pub audio_path: PathBuf,
    /// Requested shift, `None` for the original audio
    pub semitones: Option<i32>,
}

/// Combines the original video stream with base or pitch-shifted audio.
///
/// Exports are never cached; every call writes a new file, disambiguating
/// the name rather than replacing an earlier export.
#[derive(Clone)]
pub struct Exporter {
    runner: Arc<dyn ToolRunner>,
    extractor: AudioExtractor,
    shifter: PitchShifter,
    ffmpeg: String,
    destination: PathBuf,
    audio_codec: &'static str,
    audio_bitrate: &'static str,
}

impl Exporter {
    /// Creates an exporter writing into the configured downloads folder.
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        extractor: AudioExtractor,
        shifter: PitchShifter,
        config: &RepitchConfig,
    ) -> Self {
        Self {
            runner,
            extractor,
            shifter,
            ffmpeg: config.tools.ffmpeg.clone(),
            destination: config.export.downloads_dir.clone(),
            audio_codec: config.export.audio_codec,
            audio_bitrate: config.export.audio_bitrate,
        }
    }

    /// Redirects exports into `destination`.
    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = destination.into();
        self
    }

    /// Directory exports are written to.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Exports `video` with its original audio (`None`) or shifted by `semitones`.
    ///
    /// Missing audio artifacts are derived first. The video stream is
    /// copied, the audio is re-encoded, and the output stops at the end of
    /// the shorter stream.
    ///
    /// # Errors
    ///
    /// - `DeriveError::NoAudioStream` - The source has no audio track
    /// - `DeriveError::ExternalTool` - Extraction, shifting or muxing failed
    /// - `DeriveError::ToolLaunch` - A tool could not be started
    /// - `DeriveError::EmptyOutput` - The muxer wrote nothing
    /// - `DeriveError::DestinationWrite` - The destination directory is not writable
    pub async fn export(
        &self,
        video: &SourceVideo,
        semitones: Option<i32>,
    ) -> DeriveResult<ExportOutcome> {
        let audio = self.extractor.extract(video).await?;
        let audio_path = match semitones {
            Some(semitones) => self.shifter.shift(&audio, semitones).await?.path,
            None => audio.path,
        };

        tokio::fs::create_dir_all(&self.destination)
            .await
            .map_err(|source| DeriveError::DestinationWrite {
                path: self.destination.clone(),
                source,
            })?;
        let staged = StagedFile::create(&self.destination, "mp4").map_err(|source| {
            DeriveError::DestinationWrite {
                path: self.destination.clone(),
                source,
            }
        })?;

        tracing::info!(
            "Exporting {} with {} into {}",
            video.path.display(),
            audio_path.display(),
            self.destination.display()
        );

        let command = self.build_command(&video.path, &audio_path, staged.path());
        run_tool(self.runner.as_ref(), &command).await?;

        let base_name = export_base_name(&video.stem(), semitones);
        let output_path =
            staged.commit_unique(&self.ffmpeg, candidate_paths(&self.destination, &base_name))?;

        tracing::info!("Exported {}", output_path.display());

        Ok(ExportOutcome {
            output_path,
            audio_path,
            semitones,
        })
    }

    fn build_command(&self, video: &Path, audio: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.ffmpeg, output)
            .arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-c:v", "copy", "-c:a", self.audio_codec])
            .args(["-b:a", self.audio_bitrate])
            .args(["-map", "0:v:0", "-map", "1:a:0", "-shortest"])
            .arg(output)
    }
}

/// File stem of an export, e.g. `clip` or `clip_+3`.
pub fn export_base_name(stem: &str, semitones: Option<i32>) -> String {
    match semitones {
        Some(semitones) => format!("{stem}_{}", shift_label(semitones)),
        None => stem.to_string(),
    }
}

/// Candidate output paths in preference order: `name.mp4`, `name (1).mp4`, ...
fn candidate_paths(dir: &Path, base_name: &str) -> impl Iterator<Item = PathBuf> {
    let dir = dir.to_path_buf();
    let base_name = base_name.to_string();
    (0..=MAX_NAME_SUFFIX).map(move |n| {
        if n == 0 {
            dir.join(format!("{base_name}.mp4"))
        } else {
            dir.join(format!("{base_name} ({n}).mp4"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ArtifactCache;
    use crate::runner::{FakeBehavior, FakeToolRunner};

    struct Fixture {
        dir: tempfile::TempDir,
        runner: Arc<FakeToolRunner>,
        exporter: Exporter,
        video: SourceVideo,
        downloads: PathBuf,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = RepitchConfig::for_testing(dir.path());
        let video_path = dir.path().join("concert.mp4");
        std::fs::write(&video_path, b"video").unwrap();

        let runner = Arc::new(FakeToolRunner::new());
        let cache = ArtifactCache::from_config(&config);
        let extractor = AudioExtractor::new(runner.clone(), cache.clone(), &config);
        let shifter = PitchShifter::new(runner.clone(), cache, &config);
        let exporter = Exporter::new(runner.clone(), extractor, shifter, &config);

        Fixture {
            runner,
            exporter,
            video: SourceVideo::open(&video_path).await.unwrap(),
            downloads: config.export.downloads_dir.clone(),
            dir,
        }
    }

    #[test]
    fn test_export_base_name_with_and_without_shift() {
        assert_eq!(export_base_name("clip", None), "clip");
        assert_eq!(export_base_name("clip", Some(3)), "clip_+3");
        assert_eq!(export_base_name("clip", Some(-2)), "clip_-2");
        assert_eq!(export_base_name("clip", Some(0)), "clip_+0");
    }

    #[test]
    fn test_candidate_paths_numbered_suffixes() {
        let names: Vec<PathBuf> = candidate_paths(Path::new("/dl"), "clip_+1")
            .take(3)
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("/dl/clip_+1.mp4"),
                PathBuf::from("/dl/clip_+1 (1).mp4"),
                PathBuf::from("/dl/clip_+1 (2).mp4"),
            ]
        );
    }

    #[tokio::test]
    async fn test_export_twice_distinct_files() {
        let fx = fixture().await;

        let first = fx.exporter.export(&fx.video, None).await.unwrap();
        let second = fx.exporter.export(&fx.video, None).await.unwrap();

        assert_eq!(first.output_path, fx.downloads.join("concert.mp4"));
        assert_eq!(second.output_path, fx.downloads.join("concert (1).mp4"));
        assert!(first.output_path.is_file());
        assert!(second.output_path.is_file());
        // Extraction is cached, only the muxes repeat
        assert_eq!(fx.runner.call_count("ffmpeg"), 3);
    }

    #[tokio::test]
    async fn test_export_shifted_uses_pitch_variant() {
        let fx = fixture().await;

        let outcome = fx.exporter.export(&fx.video, Some(-3)).await.unwrap();

        assert_eq!(outcome.output_path, fx.downloads.join("concert_-3.mp4"));
        assert!(outcome.audio_path.to_string_lossy().ends_with("_-3.wav"));
        assert_eq!(fx.runner.call_count("sox"), 1);

        let mux = fx.runner.calls().last().unwrap().command_line();
        assert!(mux.contains("-c:v copy"));
        assert!(mux.contains("-c:a aac -b:a 192k"));
        assert!(mux.contains("-map 0:v:0 -map 1:a:0 -shortest"));
    }

    #[tokio::test]
    async fn test_export_unwritable_destination_error() {
        let fx = fixture().await;
        let blocker = fx.dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let exporter = fx.exporter.clone().with_destination(blocker.join("out"));

        let result = exporter.export(&fx.video, None).await;

        assert!(matches!(result, Err(DeriveError::DestinationWrite { .. })));
    }

    #[tokio::test]
    async fn test_export_mux_failure_leaves_no_output() {
        let fx = fixture().await;
        // First ffmpeg call extracts audio, the second muxes
        fx.runner
            .push_behavior("ffmpeg", FakeBehavior::WriteOutput(b"RIFF".to_vec()));
        fx.runner.push_behavior(
            "ffmpeg",
            FakeBehavior::FailPartial {
                exit_code: 1,
                stderr: "Could not write header".to_string(),
                partial: b"ftyp".to_vec(),
            },
        );

        let result = fx.exporter.export(&fx.video, None).await;

        assert!(matches!(result, Err(DeriveError::ExternalTool { .. })));
        let leftovers = std::fs::read_dir(&fx.downloads).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
