//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Subcommand;
use repitch_core::wav::{format_duration, wav_duration_seconds};
use repitch_core::{MediaPipeline, ProcessRunner, RepitchConfig, Result, SearchPaths, SourceVideo};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Extra directory to browse for videos
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Extract the normalized audio track of a video
    Extract {
        /// Source video file
        video: PathBuf,
    },
    /// Produce a pitch-shifted variant of a video's audio
    Shift {
        /// Source video file
        video: PathBuf,
        /// Semitones to shift by (negative shifts down)
        #[arg(allow_negative_numbers = true)]
        semitones: i32,
    },
    /// Grab a thumbnail frame from a video
    Thumbnail {
        /// Source video file
        video: PathBuf,
    },
    /// Export a video with its original or pitch-shifted audio
    Export {
        /// Source video file
        video: PathBuf,
        /// Semitones to shift the audio by
        #[arg(short, long, allow_negative_numbers = true)]
        shift: Option<i32>,
        /// Destination directory (defaults to the downloads folder)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Manage the persisted browse directories
    Paths {
        #[command(subcommand)]
        action: PathsAction,
    },
}

/// Search path operations
#[derive(Subcommand)]
pub enum PathsAction {
    /// Show the configured directories
    List,
    /// Add a directory
    Add {
        /// Directory to browse
        path: PathBuf,
    },
    /// Remove a directory
    Remove {
        /// Directory to forget
        path: PathBuf,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the error of the command that failed
pub async fn handle_command(command: Commands) -> Result<()> {
    let config = RepitchConfig::from_env();

    match command {
        Commands::Serve { host, port, root } => serve(config, host, port, root).await,
        Commands::Extract { video } => extract(config, &video).await,
        Commands::Shift { video, semitones } => shift(config, &video, semitones).await,
        Commands::Thumbnail { video } => thumbnail(config, &video).await,
        Commands::Export {
            video,
            shift,
            output,
        } => export(config, &video, shift, output).await,
        Commands::Paths { action } => paths(&config, action),
    }
}

/// Builds the pipeline on real tools and creates the cache tree.
fn pipeline(config: &RepitchConfig) -> Result<MediaPipeline> {
    let pipeline = MediaPipeline::new(Arc::new(ProcessRunner::new()), config);
    pipeline.prepare()?;
    Ok(pipeline)
}

/// Start the web server
///
/// # Errors
/// - `RepitchError::Io` - The listener could not bind
/// - `RepitchError::Derive` - The cache tree could not be created
pub async fn serve(
    mut config: RepitchConfig,
    host: Option<String>,
    port: Option<u16>,
    root: Option<PathBuf>,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    tracing::info!(
        "Serving on {}:{} with cache {}",
        config.server.host,
        config.server.port,
        config.cache.temp_dir.display()
    );

    repitch_web::run_server(config, root).await
}

/// Extract the audio track of a video
///
/// # Errors
/// - `RepitchError::Derive` - The video is invalid, silent or ffmpeg failed
pub async fn extract(config: RepitchConfig, video: &Path) -> Result<()> {
    let pipeline = pipeline(&config)?;
    let video = SourceVideo::open(video).await?;

    let audio = pipeline.extractor().extract(&video).await?;

    println!("Audio track for {}", video.display_name);
    println!("  Key:      {}", video.key);
    println!("  Path:     {}", audio.path.display());
    println!(
        "  Duration: {}",
        format_duration(wav_duration_seconds(&audio.path))
    );
    Ok(())
}

/// Pitch-shift the audio track of a video
///
/// # Errors
/// - `RepitchError::Derive` - Extraction or the pitch shift failed
pub async fn shift(config: RepitchConfig, video: &Path, semitones: i32) -> Result<()> {
    let pipeline = pipeline(&config)?;
    let video = SourceVideo::open(video).await?;

    let audio = pipeline.extractor().extract(&video).await?;
    let variant = pipeline.shifter().shift(&audio, semitones).await?;

    println!("Shifted {} by {:+} semitones", video.display_name, semitones);
    println!("  Path:     {}", variant.path.display());
    println!(
        "  Duration: {}",
        format_duration(wav_duration_seconds(&variant.path))
    );
    Ok(())
}

/// Grab a thumbnail of a video
///
/// # Errors
/// - `RepitchError::Derive` - The video is invalid or ffmpeg failed
pub async fn thumbnail(config: RepitchConfig, video: &Path) -> Result<()> {
    let pipeline = pipeline(&config)?;
    let video = SourceVideo::open(video).await?;

    let thumbnail = pipeline.thumbnails().thumbnail(&video).await?;

    println!("Thumbnail: {}", thumbnail.path.display());
    Ok(())
}

/// Export a video with replaced audio
///
/// # Errors
/// - `RepitchError::Derive` - A derivation step or the mux failed, or the
///   destination is not writable
pub async fn export(
    config: RepitchConfig,
    video: &Path,
    shift: Option<i32>,
    output: Option<PathBuf>,
) -> Result<()> {
    let pipeline = pipeline(&config)?;
    let video = SourceVideo::open(video).await?;

    tracing::info!("Exporting {} with shift {:?}", video.path.display(), shift);
    let exporter = match output {
        Some(output) => pipeline.exporter().clone().with_destination(output),
        None => pipeline.exporter().clone(),
    };
    let outcome = exporter.export(&video, shift).await?;

    println!("Exported {}", outcome.output_path.display());
    Ok(())
}

/// Manage the persisted search paths
///
/// # Errors
/// - `RepitchError::Library` - The paths file could not be read or written
pub fn paths(config: &RepitchConfig, action: PathsAction) -> Result<()> {
    let mut search_paths = SearchPaths::load(&config.library.paths_file)?;

    match action {
        PathsAction::List => {}
        PathsAction::Add { path } => {
            if !search_paths.add(&path)? {
                println!("Already configured: {}", path.display());
            }
        }
        PathsAction::Remove { path } => {
            if !search_paths.remove(&path)? {
                println!("Not configured: {}", path.display());
            }
        }
    }

    if search_paths.paths().is_empty() {
        println!("No search paths configured.");
        println!("Use 'repitch paths add <dir>' to add one.");
    } else {
        println!("Search paths ({}):", search_paths.file().display());
        for path in search_paths.paths() {
            println!("  {}", path.display());
        }
    }
    Ok(())
}
