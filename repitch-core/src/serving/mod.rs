//! HTTP byte-range serving of cached artifacts.

pub mod audio;
pub mod range;

use std::path::{Path, PathBuf};

pub use audio::{AudioRangeServer, AudioReply};
pub use range::{ByteRange, RangeError, RangeSpec, resolve_range};

/// Errors from opening or streaming a served file.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        source: std::io::Error,
    },
}

impl ServeError {
    fn from_open(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            ServeError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ServeError::Io {
                operation: format!("open {}", path.display()),
                source,
            }
        }
    }
}

pub type ServeResult<T> = Result<T, ServeError>;
