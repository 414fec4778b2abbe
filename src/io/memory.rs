//! In-memory provider.
//!
//! Holds files as byte buffers keyed by normalized absolute path. Used for
//! resources embedded in the binary and for tests that should not touch the
//! disk. Directories are implicit: a directory exists when it was created
//! explicitly or when any file lives beneath it.

use super::path::{DirectoryPath, FilePath, NormalizedPath};
use super::provider::{FileProvider, FsError};
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, RwLock};

struct StoredFile {
    path: String,
    bytes: Arc<[u8]>,
}

/// Files and explicit directories, keyed by lookup key. Each entry keeps the
/// path as it was first given so listings preserve its case.
#[derive(Default)]
struct Store {
    files: BTreeMap<String, StoredFile>,
    directories: BTreeMap<String, String>,
}

/// Provider backed by a shared in-memory map.
#[derive(Clone, Default)]
pub struct MemoryFileProvider {
    store: Arc<RwLock<Store>>,
    case_insensitive: bool,
}

impl MemoryFileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_insensitive() -> Self {
        Self {
            case_insensitive: true,
            ..Self::default()
        }
    }

    /// Seed a file. Convenient for embedded resources and fixtures.
    pub fn add_file(&self, path: impl AsRef<str>, content: impl Into<Vec<u8>>) -> &Self {
        let path = NormalizedPath::new(path);
        let bytes: Vec<u8> = content.into();
        self.write_store().files.insert(
            self.key(&path),
            StoredFile {
                path: path.as_str().to_string(),
                bytes: bytes.into(),
            },
        );
        self
    }

    fn key(&self, path: &NormalizedPath) -> String {
        if self.case_insensitive {
            path.as_str().to_ascii_lowercase()
        } else {
            path.as_str().to_string()
        }
    }

    fn read_store(&self) -> std::sync::RwLockReadGuard<'_, Store> {
        // A panic while holding the lock leaves the map itself consistent.
        self.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_store(&self) -> std::sync::RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(|e| e.into_inner())
    }

    fn is_beneath(key: &str, dir: &str) -> bool {
        if dir == "/" {
            return key.len() > 1 && key.starts_with('/');
        }
        key.len() > dir.len() && key.starts_with(dir) && key.as_bytes()[dir.len()] == b'/'
    }

    fn depth_below(key: &str, dir: &str) -> usize {
        let rest = if dir == "/" { &key[1..] } else { &key[dir.len() + 1..] };
        rest.split('/').count()
    }

    /// Every directory implied by the stored files plus explicit ones, as
    /// lookup key to original path.
    fn all_directories(&self, store: &Store) -> BTreeMap<String, String> {
        let mut dirs = store.directories.clone();
        for file in store.files.values() {
            let mut current = NormalizedPath::new(&file.path).parent();
            while let Some(dir) = current {
                let key = self.key(&dir);
                if dirs.contains_key(&key) {
                    break;
                }
                dirs.insert(key, dir.as_str().to_string());
                current = dir.parent();
            }
        }
        dirs
    }
}

/// Buffers writes and publishes them to the store on flush and on drop,
/// only when something was written since the last publish.
struct MemoryWriter {
    key: String,
    path: String,
    buffer: Vec<u8>,
    dirty: bool,
    store: Arc<RwLock<Store>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.dirty |= !buf.is_empty();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.files.insert(
            self.key.clone(),
            StoredFile {
                path: self.path.clone(),
                bytes: Arc::from(self.buffer.as_slice()),
            },
        );
        self.dirty = false;
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl FileProvider for MemoryFileProvider {
    fn case_sensitive(&self) -> bool {
        !self.case_insensitive
    }

    fn file_exists(&self, path: &FilePath) -> bool {
        self.read_store().files.contains_key(&self.key(path.path()))
    }

    fn directory_exists(&self, path: &DirectoryPath) -> bool {
        let key = self.key(path.path());
        let store = self.read_store();
        store.directories.contains_key(&key) || store.files.keys().any(|k| Self::is_beneath(k, &key))
    }

    fn file_len(&self, path: &FilePath) -> Result<u64, FsError> {
        self.read_store()
            .files
            .get(&self.key(path.path()))
            .map(|file| file.bytes.len() as u64)
            .ok_or_else(|| FsError::not_found(path))
    }

    fn open_read(&self, path: &FilePath) -> Result<Box<dyn Read + Send>, FsError> {
        let bytes = self
            .read_store()
            .files
            .get(&self.key(path.path()))
            .map(|file| Arc::clone(&file.bytes))
            .ok_or_else(|| FsError::not_found(path))?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn open_write(&self, path: &FilePath) -> Result<Box<dyn Write + Send>, FsError> {
        let key = self.key(path.path());
        let path = path.as_str().to_string();
        self.write_store().files.insert(
            key.clone(),
            StoredFile {
                path: path.clone(),
                bytes: Arc::from(Vec::new()),
            },
        );
        Ok(Box::new(MemoryWriter {
            key,
            path,
            buffer: Vec::new(),
            dirty: false,
            store: Arc::clone(&self.store),
        }))
    }

    fn create_directory(&self, path: &DirectoryPath) -> Result<(), FsError> {
        let key = self.key(path.path());
        self.write_store()
            .directories
            .entry(key)
            .or_insert_with(|| path.as_str().to_string());
        Ok(())
    }

    fn delete_file(&self, path: &FilePath) -> Result<(), FsError> {
        self.write_store()
            .files
            .remove(&self.key(path.path()))
            .map(|_| ())
            .ok_or_else(|| FsError::not_found(path))
    }

    fn delete_directory(&self, path: &DirectoryPath) -> Result<(), FsError> {
        if !self.directory_exists(path) {
            return Err(FsError::not_found(path));
        }
        let key = self.key(path.path());
        let mut store = self.write_store();
        store.files.retain(|k, _| !Self::is_beneath(k, &key));
        store
            .directories
            .retain(|k, _| k != &key && !Self::is_beneath(k, &key));
        Ok(())
    }

    fn list_files(&self, path: &DirectoryPath, recursive: bool) -> Result<Vec<FilePath>, FsError> {
        let key = self.key(path.path());
        Ok(self
            .read_store()
            .files
            .iter()
            .filter(|(k, _)| Self::is_beneath(k, &key))
            .filter(|(k, _)| recursive || Self::depth_below(k, &key) == 1)
            .map(|(_, file)| FilePath::new(&file.path))
            .collect())
    }

    fn list_directories(
        &self,
        path: &DirectoryPath,
        recursive: bool,
    ) -> Result<Vec<DirectoryPath>, FsError> {
        let key = self.key(path.path());
        let store = self.read_store();
        Ok(self
            .all_directories(&store)
            .into_iter()
            .filter(|(k, _)| Self::is_beneath(k, &key))
            .filter(|(k, _)| recursive || Self::depth_below(k, &key) == 1)
            .map(|(_, original)| DirectoryPath::new(original))
            .collect())
    }
}
