//! Video discovery: persisted search roots, recursive scans and the key catalog.

pub mod catalog;
pub mod scan;
pub mod search_paths;

use std::path::PathBuf;

pub use catalog::VideoCatalog;
pub use scan::scan_roots;
pub use search_paths::SearchPaths;

/// Errors from library persistence.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid search paths file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type LibraryResult<T> = Result<T, LibraryError>;
