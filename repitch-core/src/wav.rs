//! Duration probing of cached WAV files.

use std::io::Seek;
use std::path::Path;

use hound::WavReader;

/// Duration of a PCM WAV file in seconds, or `None` if it cannot be read.
///
/// The frame count comes from the `data` chunk header, capped by the bytes
/// actually present so a truncated or still-growing file is not overstated.
pub fn wav_duration_seconds(path: &Path) -> Option<f64> {
    let probe = || -> hound::Result<f64> {
        let file_len = std::fs::metadata(path)?.len();
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        let frame_len = u64::from(spec.channels) * u64::from(spec.bits_per_sample).div_ceil(8);
        if spec.sample_rate == 0 || frame_len == 0 {
            return Err(hound::Error::FormatError("zero sample rate or frame size"));
        }

        let declared_frames = u64::from(reader.duration());
        let mut data = reader.into_inner();
        let data_offset = data.stream_position()?;
        let present_frames = file_len.saturating_sub(data_offset) / frame_len;

        Ok(declared_frames.min(present_frames) as f64 / f64::from(spec.sample_rate))
    };

    match probe() {
        Ok(seconds) => Some(seconds),
        Err(e) => {
            tracing::debug!("Cannot probe duration of {}: {}", path.display(), e);
            None
        }
    }
}

/// Formats seconds as `MM:SS`, or `HH:MM:SS` from one hour up.
///
/// Unknown durations render as `Unknown`.
pub fn format_duration(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds.filter(|s| s.is_finite() && *s >= 0.0) else {
        return "Unknown".to_string();
    };

    let total = seconds.round() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}
