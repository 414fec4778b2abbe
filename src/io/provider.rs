//! File provider trait and the file/directory handles built on it.
//!
//! The [`FileProvider`] trait is the one seam between the engine and a
//! backing store. Every operation takes an absolute, normalized path; the
//! provider decides what that path means (a location on disk, a key in an
//! embedded bundle, ...).
//!
//! [`File`] and [`Directory`] are cheap handles pairing a path with a
//! provider. They never cache existence: `exists()` asks the provider every
//! time, because the underlying store can change between calls in watch mode.

use super::glob::GlobError;
use super::path::{DirectoryPath, FilePath};
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("Path is outside every configured root: {path}")]
    OutsideRoot { path: String },
    #[error("Not found: {path}")]
    NotFound { path: String },
    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Glob(#[from] GlobError),
}

impl FsError {
    pub fn io(path: impl fmt::Display, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            return Self::NotFound {
                path: path.to_string(),
            };
        }
        Self::Io {
            path: path.to_string(),
            source,
        }
    }

    pub fn not_found(path: impl fmt::Display) -> Self {
        Self::NotFound {
            path: path.to_string(),
        }
    }

    pub fn outside_root(path: impl fmt::Display) -> Self {
        Self::OutsideRoot {
            path: path.to_string(),
        }
    }
}

/// A backing store for the virtual file system.
///
/// Implementations must be safe for concurrent reads of the same file and
/// concurrent writes to different files. Writes to the same file from two
/// threads are last-writer-wins.
pub trait FileProvider: Send + Sync {
    /// Whether paths differing only in ASCII case name different entries.
    fn case_sensitive(&self) -> bool {
        true
    }

    fn file_exists(&self, path: &FilePath) -> bool;

    fn directory_exists(&self, path: &DirectoryPath) -> bool;

    /// Length of a file in bytes.
    fn file_len(&self, path: &FilePath) -> Result<u64, FsError>;

    fn open_read(&self, path: &FilePath) -> Result<Box<dyn Read + Send>, FsError>;

    /// Open a file for writing, truncating it and creating parent
    /// directories as needed.
    fn open_write(&self, path: &FilePath) -> Result<Box<dyn Write + Send>, FsError>;

    fn create_directory(&self, path: &DirectoryPath) -> Result<(), FsError>;

    fn delete_file(&self, path: &FilePath) -> Result<(), FsError>;

    /// Delete a directory and everything beneath it.
    fn delete_directory(&self, path: &DirectoryPath) -> Result<(), FsError>;

    /// Files directly in `path`, or everything beneath it when `recursive`.
    fn list_files(&self, path: &DirectoryPath, recursive: bool) -> Result<Vec<FilePath>, FsError>;

    fn list_directories(
        &self,
        path: &DirectoryPath,
        recursive: bool,
    ) -> Result<Vec<DirectoryPath>, FsError>;

    /// Copy a file within this provider, creating parent directories.
    fn copy_file(&self, from: &FilePath, to: &FilePath) -> Result<(), FsError> {
        let mut reader = self.open_read(from)?;
        let mut writer = self.open_write(to)?;
        io::copy(&mut reader, &mut writer).map_err(|e| FsError::io(to, e))?;
        writer.flush().map_err(|e| FsError::io(to, e))
    }

    /// Move a file within this provider, creating parent directories.
    fn move_file(&self, from: &FilePath, to: &FilePath) -> Result<(), FsError> {
        self.copy_file(from, to)?;
        self.delete_file(from)
    }
}

/// Handle to a file in the virtual file system.
#[derive(Clone)]
pub struct File {
    path: FilePath,
    provider: Arc<dyn FileProvider>,
}

impl File {
    pub fn new(path: FilePath, provider: Arc<dyn FileProvider>) -> Self {
        Self { path, provider }
    }

    pub fn path(&self) -> &FilePath {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.provider.file_exists(&self.path)
    }

    pub fn len(&self) -> Result<u64, FsError> {
        self.provider.file_len(&self.path)
    }

    pub fn is_empty(&self) -> Result<bool, FsError> {
        Ok(self.len()? == 0)
    }

    pub fn directory(&self) -> Directory {
        Directory::new(self.path.directory(), Arc::clone(&self.provider))
    }

    /// Stream the content without loading it all into memory.
    pub fn open_read(&self) -> Result<Box<dyn Read + Send>, FsError> {
        self.provider.open_read(&self.path)
    }

    pub fn open_write(&self) -> Result<Box<dyn Write + Send>, FsError> {
        self.provider.open_write(&self.path)
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>, FsError> {
        let mut buf = Vec::new();
        self.open_read()?
            .read_to_end(&mut buf)
            .map_err(|e| FsError::io(&self.path, e))?;
        Ok(buf)
    }

    pub fn read_to_string(&self) -> Result<String, FsError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| {
            FsError::io(
                &self.path,
                io::Error::new(io::ErrorKind::InvalidData, e.utf8_error()),
            )
        })
    }

    pub fn write_bytes(&self, content: &[u8]) -> Result<(), FsError> {
        let mut writer = self.open_write()?;
        writer
            .write_all(content)
            .and_then(|_| writer.flush())
            .map_err(|e| FsError::io(&self.path, e))
    }

    pub fn write_text(&self, content: &str) -> Result<(), FsError> {
        self.write_bytes(content.as_bytes())
    }

    /// Copy to `dest`. With `overwrite == false` an existing destination is
    /// left untouched.
    pub fn copy_to(&self, dest: &File, overwrite: bool) -> Result<(), FsError> {
        if !overwrite && dest.exists() {
            return Ok(());
        }
        if Arc::ptr_eq(&self.provider, &dest.provider) {
            return self.provider.copy_file(&self.path, &dest.path);
        }
        let mut reader = self.open_read()?;
        let mut writer = dest.open_write()?;
        io::copy(&mut reader, &mut writer)
            .and_then(|_| writer.flush())
            .map_err(|e| FsError::io(&dest.path, e))
    }

    pub fn move_to(&self, dest: &File) -> Result<(), FsError> {
        if Arc::ptr_eq(&self.provider, &dest.provider) {
            return self.provider.move_file(&self.path, &dest.path);
        }
        self.copy_to(dest, true)?;
        self.delete()
    }

    pub fn delete(&self) -> Result<(), FsError> {
        self.provider.delete_file(&self.path)
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("File").field(&self.path.as_str()).finish()
    }
}

/// Handle to a directory in the virtual file system.
#[derive(Clone)]
pub struct Directory {
    path: DirectoryPath,
    provider: Arc<dyn FileProvider>,
}

impl Directory {
    pub fn new(path: DirectoryPath, provider: Arc<dyn FileProvider>) -> Self {
        Self { path, provider }
    }

    pub fn path(&self) -> &DirectoryPath {
        &self.path
    }

    pub fn case_sensitive(&self) -> bool {
        self.provider.case_sensitive()
    }

    pub fn exists(&self) -> bool {
        self.provider.directory_exists(&self.path)
    }

    pub fn create(&self) -> Result<(), FsError> {
        self.provider.create_directory(&self.path)
    }

    pub fn delete(&self) -> Result<(), FsError> {
        self.provider.delete_directory(&self.path)
    }

    pub fn parent(&self) -> Option<Directory> {
        self.path
            .parent()
            .map(|p| Directory::new(p, Arc::clone(&self.provider)))
    }

    /// A file beneath this directory. Absolute paths are taken as-is.
    pub fn get_file(&self, path: &FilePath) -> File {
        File::new(self.path.combine_file(path), Arc::clone(&self.provider))
    }

    pub fn get_directory(&self, path: &DirectoryPath) -> Directory {
        Directory::new(self.path.combine(path), Arc::clone(&self.provider))
    }

    /// Files in this directory. A missing directory has no files.
    pub fn get_files(&self, recursive: bool) -> Result<Vec<File>, FsError> {
        if !self.exists() {
            return Ok(Vec::new());
        }
        Ok(self
            .provider
            .list_files(&self.path, recursive)?
            .into_iter()
            .map(|p| File::new(p, Arc::clone(&self.provider)))
            .collect())
    }

    pub fn get_directories(&self, recursive: bool) -> Result<Vec<Directory>, FsError> {
        if !self.exists() {
            return Ok(Vec::new());
        }
        Ok(self
            .provider
            .list_directories(&self.path, recursive)?
            .into_iter()
            .map(|p| Directory::new(p, Arc::clone(&self.provider)))
            .collect())
    }
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Directory").field(&self.path.as_str()).finish()
    }
}
