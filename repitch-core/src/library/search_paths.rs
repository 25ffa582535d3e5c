//! Persisted list of root directories to browse.
//!
//! Stored as `{"paths": [...]}` and rewritten through a temp file and a
//! rename so a crash never leaves a truncated list behind.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{LibraryError, LibraryResult};

#[derive(Debug, Default, Serialize, Deserialize)]
struct PathsFile {
    #[serde(default)]
    paths: Vec<PathBuf>,
}

/// Ordered, de-duplicated search roots backed by a JSON file.
#[derive(Debug, Clone)]
pub struct SearchPaths {
    file: PathBuf,
    paths: Vec<PathBuf>,
}

/// Absolute form of `path`, resolving symlinks when the path exists.
pub fn normalize(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

impl SearchPaths {
    /// Starts an empty list persisted to `file`.
    pub fn empty(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            paths: Vec::new(),
        }
    }

    /// Loads the list from `file`; a missing file is an empty list.
    ///
    /// Entries are normalized and de-duplicated in their stored order.
    ///
    /// # Errors
    ///
    /// - `LibraryError::Read` - The file exists but could not be read
    /// - `LibraryError::Parse` - The file is not valid JSON of the expected shape
    pub fn load(file: impl Into<PathBuf>) -> LibraryResult<Self> {
        let file = file.into();
        let contents = match std::fs::read_to_string(&file) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No search paths file at {}", file.display());
                return Ok(Self::empty(file));
            }
            Err(source) => return Err(LibraryError::Read { path: file, source }),
        };

        let stored: PathsFile =
            serde_json::from_str(&contents).map_err(|source| LibraryError::Parse {
                path: file.clone(),
                source,
            })?;

        let mut search_paths = Self::empty(file);
        for path in stored.paths {
            let path = normalize(&path);
            if !search_paths.paths.contains(&path) {
                search_paths.paths.push(path);
            }
        }
        Ok(search_paths)
    }

    /// Loads the list, falling back to an empty one if the file is unusable.
    pub fn load_or_empty(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        Self::load(&file).unwrap_or_else(|e| {
            tracing::warn!("Failed to load search paths: {}", e);
            Self::empty(file)
        })
    }

    /// Search roots in insertion order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// JSON file the list is persisted to.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Appends `path` if it is not already listed and persists the list.
    ///
    /// Returns whether the list changed.
    ///
    /// # Errors
    ///
    /// - `LibraryError::Write` - The list could not be persisted
    pub fn add(&mut self, path: &Path) -> LibraryResult<bool> {
        let path = normalize(path);
        if self.paths.contains(&path) {
            return Ok(false);
        }
        tracing::info!("Adding search path {}", path.display());
        self.paths.push(path);
        self.save()?;
        Ok(true)
    }

    /// Removes `path` if listed and persists the list.
    ///
    /// Returns whether the list changed.
    ///
    /// # Errors
    ///
    /// - `LibraryError::Write` - The list could not be persisted
    pub fn remove(&mut self, path: &Path) -> LibraryResult<bool> {
        let path = normalize(path);
        let before = self.paths.len();
        self.paths.retain(|existing| existing != &path);
        if self.paths.len() == before {
            return Ok(false);
        }
        tracing::info!("Removing search path {}", path.display());
        self.save()?;
        Ok(true)
    }

    /// Writes the list atomically.
    ///
    /// # Errors
    ///
    /// - `LibraryError::Write` - The temp file could not be written or renamed
    pub fn save(&self) -> LibraryResult<()> {
        let write_error = |source: std::io::Error| LibraryError::Write {
            path: self.file.clone(),
            source,
        };

        let stored = PathsFile {
            paths: self.paths.clone(),
        };
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| write_error(std::io::Error::other(e)))?;

        let dir = match self.file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(write_error)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".repitch-paths-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(write_error)?;
        std::io::Write::write_all(&mut temp, json.as_bytes()).map_err(write_error)?;
        temp.persist(&self.file).map_err(|e| write_error(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_empty() {
        let dir = tempfile::tempdir().unwrap();

        let paths = SearchPaths::load(dir.path().join("config.json")).unwrap();

        assert!(paths.paths().is_empty());
    }

    #[test]
    fn test_add_persists_and_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.json");
        let videos = dir.path().join("videos");
        std::fs::create_dir_all(&videos).unwrap();
        let mut paths = SearchPaths::empty(&file);

        assert!(paths.add(&videos).unwrap());
        assert!(!paths.add(&videos.join(".")).unwrap());

        let reloaded = SearchPaths::load(&file).unwrap();
        assert_eq!(reloaded.paths(), &[videos.canonicalize().unwrap()]);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
        assert!(raw["paths"].is_array());
    }

    #[test]
    fn test_remove_unknown_path_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.json");
        let mut paths = SearchPaths::empty(&file);
        paths.add(dir.path()).unwrap();

        assert!(!paths.remove(&dir.path().join("other")).unwrap());
        assert!(paths.remove(dir.path()).unwrap());
        assert!(SearchPaths::load(&file).unwrap().paths().is_empty());
    }

    #[test]
    fn test_load_normalizes_and_deduplicates_entries() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.json");
        let root = dir.path().canonicalize().unwrap();
        let json = serde_json::json!({ "paths": [root, root.join("."), root] });
        std::fs::write(&file, json.to_string()).unwrap();

        let paths = SearchPaths::load(&file).unwrap();

        assert_eq!(paths.paths(), &[root]);
    }

    #[test]
    fn test_load_malformed_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(&file, "{ not json").unwrap();

        assert!(matches!(
            SearchPaths::load(&file),
            Err(LibraryError::Parse { .. })
        ));
        assert!(SearchPaths::load_or_empty(&file).paths().is_empty());
    }
}
