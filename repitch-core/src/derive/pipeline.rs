//! One-stop wiring of every derivation component over a shared cache.

use std::path::PathBuf;
use std::sync::Arc;

use super::{
    AudioExtractor, DeriveError, DeriveResult, Exporter, PitchShifter, ThumbnailGenerator,
};
use crate::cache::{ArtifactCache, ArtifactKind};
use crate::config::RepitchConfig;
use crate::runner::ToolRunner;
use crate::source::CacheKey;

/// The derivation components sharing one runner and one cache tree.
#[derive(Clone)]
pub struct MediaPipeline {
    runner: Arc<dyn ToolRunner>,
    cache: ArtifactCache,
    extractor: AudioExtractor,
    shifter: PitchShifter,
    thumbnails: ThumbnailGenerator,
    exporter: Exporter,
}

impl MediaPipeline {
    /// Builds every component from `config`.
    pub fn new(runner: Arc<dyn ToolRunner>, config: &RepitchConfig) -> Self {
        let cache = ArtifactCache::from_config(config);
        let extractor = AudioExtractor::new(runner.clone(), cache.clone(), config);
        let shifter = PitchShifter::new(runner.clone(), cache.clone(), config);
        let thumbnails = ThumbnailGenerator::new(runner.clone(), cache.clone(), config);
        let exporter = Exporter::new(runner.clone(), extractor.clone(), shifter.clone(), config);

        Self {
            runner,
            cache,
            extractor,
            shifter,
            thumbnails,
            exporter,
        }
    }

    /// Creates the cache directory tree.
    ///
    /// # Errors
    ///
    /// - `DeriveError::Io` - A cache directory could not be created
    pub fn prepare(&self) -> DeriveResult<()> {
        self.cache.ensure_layout().map_err(|source| DeriveError::Io {
            operation: format!("create cache tree under {}", self.cache.root().display()),
            source,
        })
    }

    /// Tool runner shared by every component.
    pub fn runner(&self) -> &Arc<dyn ToolRunner> {
        &self.runner
    }

    /// Artifact cache shared by every component.
    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Audio extraction stage.
    pub fn extractor(&self) -> &AudioExtractor {
        &self.extractor
    }

    /// Pitch shifting stage.
    pub fn shifter(&self) -> &PitchShifter {
        &self.shifter
    }

    /// Thumbnail stage.
    pub fn thumbnails(&self) -> &ThumbnailGenerator {
        &self.thumbnails
    }

    /// Export stage writing to the configured downloads folder.
    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    /// Resolves the audio file to play for `key`.
    ///
    /// `None` selects the base track. A shift selects its pitch variant,
    /// generated from the base track if it is not cached yet.
    ///
    /// # Errors
    ///
    /// - `DeriveError::ArtifactMissing` - The base track was never extracted
    /// - `DeriveError::ExternalTool` - Generating the variant failed
    pub async fn audio_for(&self, key: &CacheKey, semitones: Option<i32>) -> DeriveResult<PathBuf> {
        let audio = self
            .extractor
            .cached(key)
            .await
            .ok_or_else(|| DeriveError::ArtifactMissing {
                kind: ArtifactKind::Audio,
                key: key.clone(),
            })?;

        match semitones {
            None => Ok(audio.path),
            Some(semitones) => Ok(self.shifter.shift(&audio, semitones).await?.path),
        }
    }
}
