//! Pitch-shifted variants of the normalized audio track.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::extract::stage_in;
use super::{AudioArtifact, DeriveError, DeriveResult, run_tool};
use crate::cache::{ArtifactCache, ArtifactKind};
use crate::config::RepitchConfig;
use crate::runner::{ToolCommand, ToolRunner};
use crate::source::CacheKey;

/// A cached WAV shifted by a whole number of semitones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PitchVariant {
    pub key: CacheKey,
    pub semitones: i32,
    pub path: PathBuf,
}

/// Pitch-bend amount in cents for a semitone shift.
pub fn pitch_cents(semitones: i32) -> i64 {
    i64::from(semitones) * 100
}

/// Produces pitch variants of an audio artifact with sox.
#[derive(Clone)]
pub struct PitchShifter {
    runner: Arc<dyn ToolRunner>,
    cache: ArtifactCache,
    sox: String,
}

impl PitchShifter {
    /// Creates a shifter using the configured sox binary.
    pub fn new(runner: Arc<dyn ToolRunner>, cache: ArtifactCache, config: &RepitchConfig) -> Self {
        Self {
            runner,
            cache,
            sox: config.tools.sox.clone(),
        }
    }

    /// Returns the cached variant for (`key`, `semitones`) without generating it.
    pub async fn cached(&self, key: &CacheKey, semitones: i32) -> Option<PitchVariant> {
        let resolved = self
            .cache
            .resolve(ArtifactKind::Pitch { semitones }, key)
            .await;
        resolved.exists.then(|| PitchVariant {
            key: key.clone(),
            semitones,
            path: resolved.path,
        })
    }

    /// Returns the variant of `audio` shifted by `semitones`, creating it on a miss.
    ///
    /// A zero shift still yields its own cached file, copied from the base
    /// artifact without invoking sox.
    ///
    /// # Errors
    ///
    /// - `DeriveError::ArtifactMissing` - The base audio artifact is gone
    /// - `DeriveError::ExternalTool` - sox exited non-zero
    /// - `DeriveError::ToolLaunch` - sox could not be started
    /// - `DeriveError::EmptyOutput` - sox wrote nothing
    /// - `DeriveError::Io` - The cache directory is not writable
    pub async fn shift(&self, audio: &AudioArtifact, semitones: i32) -> DeriveResult<PitchVariant> {
        if let Some(variant) = self.cached(&audio.key, semitones).await {
            return Ok(variant);
        }

        let base_present = tokio::fs::metadata(&audio.path)
            .await
            .is_ok_and(|metadata| metadata.is_file());
        if !base_present {
            return Err(DeriveError::ArtifactMissing {
                kind: ArtifactKind::Audio,
                key: audio.key.clone(),
            });
        }

        let kind = ArtifactKind::Pitch { semitones };
        let destination = self.cache.path_for(kind, &audio.key);
        let staged = stage_in(&destination, "wav")?;

        if semitones == 0 {
            tracing::debug!("Copying {} as zero shift variant", audio.path.display());
            tokio::fs::copy(&audio.path, staged.path())
                .await
                .map_err(|source| DeriveError::Io {
                    operation: format!("copy {}", audio.path.display()),
                    source,
                })?;
            staged.commit("copy", &destination)?;
        } else {
            tracing::info!(
                "Shifting {} by {} semitones into {}",
                audio.path.display(),
                semitones,
                destination.display()
            );
            let command = self.build_command(&audio.path, staged.path(), semitones);
            run_tool(self.runner.as_ref(), &command).await?;
            staged.commit(&self.sox, &destination)?;
        }

        Ok(PitchVariant {
            key: audio.key.clone(),
            semitones,
            path: destination,
        })
    }

    fn build_command(&self, input: &Path, output: &Path, semitones: i32) -> ToolCommand {
        ToolCommand::new(&self.sox, output)
            .arg("-G")
            .arg(input)
            .args(["-t", "wav"])
            .arg(output)
            .arg("pitch")
            .arg(pitch_cents(semitones).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{FakeBehavior, FakeToolRunner};

    struct Fixture {
        _dir: tempfile::TempDir,
        runner: Arc<FakeToolRunner>,
        shifter: PitchShifter,
        audio: AudioArtifact,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = RepitchConfig::for_testing(dir.path());
        let cache = ArtifactCache::from_config(&config);
        cache.ensure_layout().unwrap();

        let key = CacheKey::derive(Path::new("/videos/clip.mp4"), std::time::UNIX_EPOCH);
        let path = cache.path_for(ArtifactKind::Audio, &key);
        std::fs::write(&path, b"RIFF base audio").unwrap();

        let runner = Arc::new(FakeToolRunner::new());
        let shifter = PitchShifter::new(runner.clone(), cache, &config);

        Fixture {
            _dir: dir,
            runner,
            shifter,
            audio: AudioArtifact { key, path },
        }
    }

    #[test]
    fn test_pitch_cents_scales_by_hundred() {
        assert_eq!(pitch_cents(3), 300);
        assert_eq!(pitch_cents(-2), -200);
        assert_eq!(pitch_cents(0), 0);
        assert_eq!(pitch_cents(i32::MIN), -214_748_364_800);
    }

    #[tokio::test]
    async fn test_shift_distinct_values_distinct_files() {
        let fx = fixture();

        let up = fx.shifter.shift(&fx.audio, 3).await.unwrap();
        let down = fx.shifter.shift(&fx.audio, -2).await.unwrap();

        assert_ne!(up.path, down.path);
        assert!(up.path.to_string_lossy().ends_with("_+3.wav"));
        assert!(down.path.to_string_lossy().ends_with("_-2.wav"));
        assert!(up.path.is_file());
        assert!(down.path.is_file());
    }

    #[tokio::test]
    async fn test_shift_repeat_call_cache_hit() {
        let fx = fixture();

        let first = fx.shifter.shift(&fx.audio, 5).await.unwrap();
        let second = fx.shifter.shift(&fx.audio, 5).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.runner.call_count("sox"), 1);
    }

    #[tokio::test]
    async fn test_shift_command_uses_cents() {
        let fx = fixture();

        fx.shifter.shift(&fx.audio, -4).await.unwrap();

        let line = fx.runner.calls()[0].command_line();
        assert!(line.starts_with("sox -G "));
        assert!(line.ends_with("pitch -400"));
    }

    #[tokio::test]
    async fn test_shift_zero_copies_without_tool() {
        let fx = fixture();

        let variant = fx.shifter.shift(&fx.audio, 0).await.unwrap();

        assert!(variant.path.to_string_lossy().ends_with("_+0.wav"));
        assert_eq!(std::fs::read(&variant.path).unwrap(), b"RIFF base audio");
        assert_eq!(fx.runner.call_count("sox"), 0);
    }

    #[tokio::test]
    async fn test_shift_tool_failure_no_variant() {
        let fx = fixture();
        fx.runner.push_behavior(
            "sox",
            FakeBehavior::FailPartial {
                exit_code: 2,
                stderr: "sox FAIL pitch: usage".to_string(),
                partial: b"RIFF".to_vec(),
            },
        );

        let result = fx.shifter.shift(&fx.audio, 7).await;

        assert!(matches!(result, Err(DeriveError::ExternalTool { .. })));
        assert!(fx.shifter.cached(&fx.audio.key, 7).await.is_none());
        assert_eq!(fx.runner.call_count("sox"), 1);
    }

    #[tokio::test]
    async fn test_shift_missing_base_artifact_missing() {
        let fx = fixture();
        std::fs::remove_file(&fx.audio.path).unwrap();

        let result = fx.shifter.shift(&fx.audio, 1).await;

        assert!(matches!(result, Err(DeriveError::ArtifactMissing { .. })));
    }

    #[tokio::test]
    async fn test_shift_concurrent_first_requests_single_variant() {
        let fx = fixture();

        let (first, second) = tokio::join!(
            fx.shifter.shift(&fx.audio, 3),
            fx.shifter.shift(&fx.audio, 3)
        );

        let first = first.unwrap();
        assert_eq!(first, second.unwrap());
        let pitch_dir = first.path.parent().unwrap();
        let names: Vec<String> = std::fs::read_dir(pitch_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}_+3.wav", fx.audio.key)]);
        assert!((1..=2).contains(&fx.runner.call_count("sox")));
    }
}
