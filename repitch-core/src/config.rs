//! Centralized configuration for Repitch.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::path::{Path, PathBuf};

/// Central configuration for all Repitch components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct RepitchConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub tools: ToolConfig,
    pub audio: AudioConfig,
    pub thumbnail: ThumbnailConfig,
    pub export: ExportConfig,
    pub library: LibraryConfig,
    pub storage: StorageConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
        }
    }
}

/// Location of the derived artifact tree.
///
/// Audio, pitch variants and thumbnails live in fixed subdirectories
/// below `temp_dir`.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root of the artifact cache
    pub temp_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp"),
        }
    }
}

/// External tool binaries. Bare names are resolved through `PATH`.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Decoder, thumbnailer and muxer
    pub ffmpeg: String,
    /// Pitch shifter
    pub sox: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            sox: "sox".to_string(),
        }
    }
}

/// Normalized audio track settings.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// PCM codec passed to the decoder
    pub codec: &'static str,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            codec: "pcm_s16le",
        }
    }
}

/// Thumbnail frame grab settings.
#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    /// Seek offset in seconds for the representative frame
    pub offset_secs: f64,
    /// JPEG quality scale (2 = best, 31 = worst)
    pub quality: u8,
    /// Image file extension
    pub extension: &'static str,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            offset_secs: 1.0,
            quality: 2,
            extension: "jpg",
        }
    }
}

/// Export (re-mux) settings.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Destination folder for exported videos
    pub downloads_dir: PathBuf,
    /// Audio codec for the muxed track
    pub audio_codec: &'static str,
    /// Audio bitrate for the muxed track
    pub audio_bitrate: &'static str,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
            audio_codec: "aac",
            audio_bitrate: "192k",
        }
    }
}

/// Browse library settings.
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// JSON file persisting the search path list
    pub paths_file: PathBuf,
    /// Video file extensions picked up by library scans (lowercase)
    pub extensions: Vec<String>,
    /// Largest semitone magnitude accepted over HTTP
    pub max_semitones: u32,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            paths_file: PathBuf::from("config.json"),
            extensions: vec!["mp4".to_string()],
            max_semitones: 8,
        }
    }
}

/// File serving and disk I/O configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Chunk size for streamed file bodies
    pub file_buffer_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            file_buffer_size: 65536, // 64 KiB
        }
    }
}

/// The user's downloads folder, honouring localized or redirected locations.
///
/// Falls back to `Downloads` under the home directory when the platform
/// reports none.
fn default_downloads_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}

impl RepitchConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("REPITCH_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("REPITCH_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.server.port = port;
            }
        }

        if let Some(dir) = std::env::var_os("REPITCH_TEMP_DIR") {
            config.cache.temp_dir = PathBuf::from(dir);
        }

        if let Some(dir) = std::env::var_os("REPITCH_DOWNLOADS_DIR") {
            config.export.downloads_dir = PathBuf::from(dir);
        }

        if let Ok(ffmpeg) = std::env::var("REPITCH_FFMPEG") {
            config.tools.ffmpeg = ffmpeg;
        }

        if let Ok(sox) = std::env::var("REPITCH_SOX") {
            config.tools.sox = sox;
        }

        if let Some(file) = std::env::var_os("REPITCH_PATHS_FILE") {
            config.library.paths_file = PathBuf::from(file);
        }

        if let Ok(limit) = std::env::var("REPITCH_MAX_SEMITONES") {
            if let Ok(limit) = limit.parse::<u32>() {
                config.library.max_semitones = limit;
            }
        }

        config
    }

    /// Creates a configuration with every writable location under `root`.
    pub fn for_testing(root: &Path) -> Self {
        let mut config = Self::default();
        config.cache.temp_dir = root.join("temp");
        config.export.downloads_dir = root.join("downloads");
        config.library.paths_file = root.join("config.json");
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = RepitchConfig::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.cache.temp_dir, PathBuf::from("temp"));
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.tools.ffmpeg, "ffmpeg");
        assert_eq!(config.tools.sox, "sox");
        assert_eq!(config.thumbnail.extension, "jpg");
        assert_eq!(config.library.max_semitones, 8);
        assert_eq!(config.storage.file_buffer_size, 65536);
    }

    #[test]
    fn test_default_downloads_dir_platform_folder() {
        let config = RepitchConfig::default();

        match dirs::download_dir() {
            Some(platform) => assert_eq!(config.export.downloads_dir, platform),
            None => assert!(config.export.downloads_dir.ends_with("Downloads")),
        }
    }

    #[test]
    fn test_config_for_testing_roots_all_paths() {
        let root = Path::new("/scratch/run");
        let config = RepitchConfig::for_testing(root);

        assert_eq!(config.cache.temp_dir, root.join("temp"));
        assert_eq!(config.export.downloads_dir, root.join("downloads"));
        assert_eq!(config.library.paths_file, root.join("config.json"));
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("REPITCH_PORT", "6010");
            std::env::set_var("REPITCH_TEMP_DIR", "/var/cache/repitch");
            std::env::set_var("REPITCH_SOX", "/opt/sox/bin/sox");
            std::env::set_var("REPITCH_MAX_SEMITONES", "not-a-number");
        }

        let config = RepitchConfig::from_env();

        assert_eq!(config.server.port, 6010);
        assert_eq!(config.cache.temp_dir, PathBuf::from("/var/cache/repitch"));
        assert_eq!(config.tools.sox, "/opt/sox/bin/sox");
        assert_eq!(config.library.max_semitones, 8);

        // Cleanup
        unsafe {
            std::env::remove_var("REPITCH_PORT");
            std::env::remove_var("REPITCH_TEMP_DIR");
            std::env::remove_var("REPITCH_SOX");
            std::env::remove_var("REPITCH_MAX_SEMITONES");
        }
    }
}
