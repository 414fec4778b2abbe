//! Local disk provider.
//!
//! Mutating operations go through [`retry`]: a build writing to the output
//! directory routinely collides with editors, indexers and the OS file
//! watcher holding the same files open. Those failures clear up within a
//! few hundred milliseconds, so each mutation is attempted
//! [`MAX_ATTEMPTS`] times with a linearly growing delay before the error
//! surfaces.
//!
//! Errors that retrying cannot fix (missing file, permission denied, bad
//! input) surface immediately.

use super::path::{DirectoryPath, FilePath};
use super::provider::{FileProvider, FsError};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::debug;
use walkdir::WalkDir;

/// Attempts per mutating operation, including the first.
pub const MAX_ATTEMPTS: u32 = 4;

/// Delay before the first retry; later retries wait a multiple of it.
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Run `op`, retrying transient I/O failures.
pub fn retry<T>(description: &str, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < MAX_ATTEMPTS && is_transient(&e) => {
                debug!(operation = description, attempt, error = %e, "retrying file operation");
                thread::sleep(RETRY_DELAY * attempt);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_transient(error: &io::Error) -> bool {
    !matches!(
        error.kind(),
        io::ErrorKind::NotFound
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::AlreadyExists
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::InvalidData
            | io::ErrorKind::Unsupported
    )
}

/// Provider backed by the local file system.
#[derive(Debug, Clone)]
pub struct LocalFileProvider {
    case_sensitive: bool,
}

impl LocalFileProvider {
    pub fn new() -> Self {
        Self {
            case_sensitive: !cfg!(any(windows, target_os = "macos")),
        }
    }

    pub fn with_case_sensitivity(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }
}

impl Default for LocalFileProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn native(path: &impl AsRef<str>) -> PathBuf {
    PathBuf::from(path.as_ref())
}

impl FileProvider for LocalFileProvider {
    fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn file_exists(&self, path: &FilePath) -> bool {
        native(path).is_file()
    }

    fn directory_exists(&self, path: &DirectoryPath) -> bool {
        native(path).is_dir()
    }

    fn file_len(&self, path: &FilePath) -> Result<u64, FsError> {
        fs::metadata(native(path))
            .map(|m| m.len())
            .map_err(|e| FsError::io(path, e))
    }

    fn open_read(&self, path: &FilePath) -> Result<Box<dyn Read + Send>, FsError> {
        let file = fs::File::open(native(path)).map_err(|e| FsError::io(path, e))?;
        Ok(Box::new(io::BufReader::new(file)))
    }

    fn open_write(&self, path: &FilePath) -> Result<Box<dyn Write + Send>, FsError> {
        let target = native(path);
        if let Some(parent) = target.parent() {
            retry("create_dir_all", || fs::create_dir_all(parent)).map_err(|e| FsError::io(path, e))?;
        }
        let file = retry("create", || fs::File::create(&target)).map_err(|e| FsError::io(path, e))?;
        Ok(Box::new(io::BufWriter::new(file)))
    }

    fn create_directory(&self, path: &DirectoryPath) -> Result<(), FsError> {
        retry("create_dir_all", || fs::create_dir_all(native(path))).map_err(|e| FsError::io(path, e))
    }

    fn delete_file(&self, path: &FilePath) -> Result<(), FsError> {
        retry("remove_file", || fs::remove_file(native(path))).map_err(|e| FsError::io(path, e))
    }

    fn delete_directory(&self, path: &DirectoryPath) -> Result<(), FsError> {
        retry("remove_dir_all", || fs::remove_dir_all(native(path))).map_err(|e| FsError::io(path, e))
    }

    fn list_files(&self, path: &DirectoryPath, recursive: bool) -> Result<Vec<FilePath>, FsError> {
        let depth = if recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();
        for entry in WalkDir::new(native(path)).min_depth(1).max_depth(depth) {
            let entry = entry.map_err(|e| FsError::io(path, e.into()))?;
            if entry.file_type().is_file() {
                files.push(FilePath::new(entry.path().to_string_lossy()));
            }
        }
        files.sort();
        Ok(files)
    }

    fn list_directories(
        &self,
        path: &DirectoryPath,
        recursive: bool,
    ) -> Result<Vec<DirectoryPath>, FsError> {
        let depth = if recursive { usize::MAX } else { 1 };
        let mut dirs = Vec::new();
        for entry in WalkDir::new(native(path)).min_depth(1).max_depth(depth) {
            let entry = entry.map_err(|e| FsError::io(path, e.into()))?;
            if entry.file_type().is_dir() {
                dirs.push(DirectoryPath::new(entry.path().to_string_lossy()));
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn copy_file(&self, from: &FilePath, to: &FilePath) -> Result<(), FsError> {
        let target = native(to);
        if let Some(parent) = target.parent() {
            retry("create_dir_all", || fs::create_dir_all(parent)).map_err(|e| FsError::io(to, e))?;
        }
        retry("copy", || fs::copy(native(from), &target))
            .map(|_| ())
            .map_err(|e| FsError::io(from, e))
    }

    fn move_file(&self, from: &FilePath, to: &FilePath) -> Result<(), FsError> {
        let target = native(to);
        if let Some(parent) = target.parent() {
            retry("create_dir_all", || fs::create_dir_all(parent)).map_err(|e| FsError::io(to, e))?;
        }
        match retry("rename", || fs::rename(native(from), &target)) {
            Ok(()) => Ok(()),
            // Renames fail across devices; fall back to copy + delete.
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                self.copy_file(from, to)?;
                self.delete_file(from)
            }
            Err(e) => Err(FsError::io(from, e)),
        }
    }
}
