//! Write-to-temp-then-rename staging for tool outputs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tempfile::TempPath;

use super::{DeriveError, DeriveResult};

/// A hidden temp file in the destination directory.
///
/// The file is deleted when dropped unless it was committed, so every
/// early return on failure cleans up after itself.
#[derive(Debug)]
pub struct StagedFile {
    temp: TempPath,
}

impl StagedFile {
    /// Creates an empty staged file in `dir` ending in `.<extension>`.
    ///
    /// Keeping the real extension lets tools infer the output format.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - `dir` could not be created or is not writable
    pub fn create(dir: &Path, extension: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let suffix = format!(".partial.{extension}");
        let mut builder = tempfile::Builder::new();
        builder.prefix(".repitch-").suffix(&suffix);
        // Committed files keep this mode, not the 0600 of a temp file
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o644));
        }
        let temp = builder.tempfile_in(dir)?.into_temp_path();
        Ok(Self { temp })
    }

    /// Path the tool should write to.
    pub fn path(&self) -> &Path {
        &self.temp
    }

    /// Number of bytes currently in the staged file.
    pub fn written_len(&self) -> u64 {
        std::fs::metadata(&self.temp)
            .map(|metadata| metadata.len())
            .unwrap_or(0)
    }

    fn ensure_written(&self, tool: &str) -> DeriveResult<()> {
        if self.written_len() == 0 {
            return Err(DeriveError::EmptyOutput {
                tool: tool.to_string(),
                path: self.temp.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Atomically renames the staged file onto `destination`.
    ///
    /// Replaces whatever is at `destination`; concurrent producers of the
    /// same deterministic artifact are last-writer-wins.
    ///
    /// # Errors
    ///
    /// - `DeriveError::EmptyOutput` - `tool` wrote nothing
    /// - `DeriveError::Io` - The rename failed
    pub fn commit(self, tool: &str, destination: &Path) -> DeriveResult<()> {
        self.ensure_written(tool)?;
        self.temp
            .persist(destination)
            .map_err(|e| DeriveError::Io {
                operation: format!("rename into {}", destination.display()),
                source: e.error,
            })
    }

    /// Renames the staged file onto the first candidate that does not exist.
    ///
    /// Never replaces an existing file, even when another writer claims a
    /// candidate between the check and the rename.
    ///
    /// # Errors
    ///
    /// - `DeriveError::EmptyOutput` - `tool` wrote nothing
    /// - `DeriveError::DestinationWrite` - The rename failed or every candidate is taken
    pub fn commit_unique<I>(self, tool: &str, candidates: I) -> DeriveResult<PathBuf>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.ensure_written(tool)?;
        let mut temp = self.temp;
        let mut last_candidate = None;

        for candidate in candidates {
            if candidate.exists() {
                last_candidate = Some(candidate);
                continue;
            }

            match temp.persist_noclobber(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    temp = e.path;
                    last_candidate = Some(candidate);
                }
                Err(e) => {
                    return Err(DeriveError::DestinationWrite {
                        path: candidate,
                        source: e.error,
                    });
                }
            }
        }

        Err(DeriveError::DestinationWrite {
            path: last_candidate.unwrap_or_else(|| temp.to_path_buf()),
            source: std::io::Error::new(ErrorKind::AlreadyExists, "no free file name"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_file_commit_moves_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedFile::create(dir.path(), "wav").unwrap();
        std::fs::write(staged.path(), b"RIFF....").unwrap();
        let staged_path = staged.path().to_path_buf();
        let destination = dir.path().join("final.wav");

        staged.commit("ffmpeg", &destination).unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), b"RIFF....");
        assert!(!staged_path.exists());
    }

    #[test]
    fn test_staged_file_keeps_extension_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedFile::create(dir.path(), "mp4").unwrap();
        let name = staged.path().file_name().unwrap().to_string_lossy().into_owned();

        assert!(name.starts_with('.'));
        assert!(name.ends_with(".partial.mp4"));
    }

    #[test]
    fn test_staged_file_empty_commit_rejected_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedFile::create(dir.path(), "wav").unwrap();
        let staged_path = staged.path().to_path_buf();
        let destination = dir.path().join("final.wav");

        let result = staged.commit("ffmpeg", &destination);

        assert!(matches!(result, Err(DeriveError::EmptyOutput { .. })));
        assert!(!destination.exists());
        assert!(!staged_path.exists());
    }

    #[test]
    fn test_staged_file_dropped_removed() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedFile::create(dir.path(), "wav").unwrap();
        std::fs::write(staged.path(), b"partial").unwrap();
        let staged_path = staged.path().to_path_buf();

        drop(staged);

        assert!(!staged_path.exists());
    }

    #[test]
    fn test_commit_unique_skips_existing_names() {
        let dir = tempfile::tempdir().unwrap();
        let taken = dir.path().join("clip.mp4");
        std::fs::write(&taken, b"existing").unwrap();
        let staged = StagedFile::create(dir.path(), "mp4").unwrap();
        std::fs::write(staged.path(), b"new").unwrap();

        let committed = staged
            .commit_unique(
                "ffmpeg",
                vec![taken.clone(), dir.path().join("clip (1).mp4")],
            )
            .unwrap();

        assert_eq!(committed, dir.path().join("clip (1).mp4"));
        assert_eq!(std::fs::read(&taken).unwrap(), b"existing");
        assert_eq!(std::fs::read(&committed).unwrap(), b"new");
    }

    #[test]
    fn test_commit_unique_exhausted_destination_error() {
        let dir = tempfile::tempdir().unwrap();
        let taken = dir.path().join("clip.mp4");
        std::fs::write(&taken, b"existing").unwrap();
        let staged = StagedFile::create(dir.path(), "mp4").unwrap();
        std::fs::write(staged.path(), b"new").unwrap();

        let result = staged.commit_unique("ffmpeg", vec![taken]);

        assert!(matches!(result, Err(DeriveError::DestinationWrite { .. })));
    }
}
