//! The engine's view of storage: ordered input roots and one output root.
//!
//! ```text
//! root_path/                 (absolute; relative roots resolve against it)
//! ├── input/                 input root #1   ← probed first
//! ├── theme/input/           input root #2   ← shadowed by #1
//! └── output/                output root     ← all writes land here
//! ```
//!
//! A relative input path is resolved by probing each input root in order and
//! returning the first one under which the file exists, so a project's own
//! content shadows a shared theme. Input lookups that land outside every
//! root (or exist under none of them) fail. Output lookups always resolve
//! under the single output root; the file need not exist yet.

use super::glob::Globber;
use super::local::LocalFileProvider;
use super::path::{DirectoryPath, FilePath};
use super::provider::{Directory, File, FileProvider, FsError};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Virtual file system configuration plus the provider backing it.
#[derive(Clone)]
pub struct FileSystem {
    provider: Arc<dyn FileProvider>,
    root_path: DirectoryPath,
    input_paths: Vec<DirectoryPath>,
    output_path: DirectoryPath,
}

impl FileSystem {
    /// A local-disk file system rooted at `root_path`, with the
    /// conventional `input` and `output` directories.
    pub fn local(root_path: impl Into<DirectoryPath>) -> Self {
        Self::with_provider(Arc::new(LocalFileProvider::new()), root_path)
    }

    pub fn with_provider(provider: Arc<dyn FileProvider>, root_path: impl Into<DirectoryPath>) -> Self {
        Self {
            provider,
            root_path: root_path.into(),
            input_paths: vec![DirectoryPath::new("input")],
            output_path: DirectoryPath::new("output"),
        }
    }

    /// Replace the input roots. Order is probe order.
    pub fn with_input_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<DirectoryPath>,
    {
        self.input_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output_path(mut self, path: impl Into<DirectoryPath>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn provider(&self) -> &Arc<dyn FileProvider> {
        &self.provider
    }

    pub fn case_sensitive(&self) -> bool {
        self.provider.case_sensitive()
    }

    pub fn root_path(&self) -> &DirectoryPath {
        &self.root_path
    }

    /// Absolute input roots in probe order.
    pub fn input_paths(&self) -> Vec<DirectoryPath> {
        self.input_paths
            .iter()
            .map(|p| self.root_path.combine(p))
            .collect()
    }

    /// Absolute output root.
    pub fn output_path(&self) -> DirectoryPath {
        self.root_path.combine(&self.output_path)
    }

    pub fn input_directories(&self) -> Vec<Directory> {
        self.input_paths()
            .into_iter()
            .map(|p| self.directory(p))
            .collect()
    }

    pub fn output_directory(&self) -> Directory {
        self.directory(self.output_path())
    }

    /// Resolve an input file. Relative paths are probed against each input
    /// root in order; absolute paths must fall under one of them.
    pub fn get_input_file(&self, path: &FilePath) -> Result<File, FsError> {
        let case_sensitive = self.case_sensitive();
        if path.is_absolute() {
            let inside = self
                .input_paths()
                .iter()
                .any(|root| root.contains_file(path, case_sensitive));
            if !inside {
                return Err(FsError::outside_root(path));
            }
            return Ok(self.file(path.clone()));
        }
        if path.path().escapes() {
            return Err(FsError::outside_root(path));
        }
        self.input_paths()
            .iter()
            .map(|root| self.file(root.combine_file(path)))
            .find(File::exists)
            .ok_or_else(|| FsError::not_found(path))
    }

    /// The first input root containing `path` as a directory.
    pub fn get_input_directory(&self, path: &DirectoryPath) -> Result<Directory, FsError> {
        if path.is_absolute() {
            let case_sensitive = self.case_sensitive();
            let inside = self.input_paths().iter().any(|root| {
                root == path || root.path().is_ancestor_of_with_case(path.path(), case_sensitive)
            });
            if !inside {
                return Err(FsError::outside_root(path));
            }
            return Ok(self.directory(path.clone()));
        }
        if path.path().escapes() {
            return Err(FsError::outside_root(path));
        }
        self.input_paths()
            .iter()
            .map(|root| self.directory(root.combine(path)))
            .find(Directory::exists)
            .ok_or_else(|| FsError::not_found(path))
    }

    /// Resolve a file under the output root. The file is not required to
    /// exist; writing to it creates missing parent directories.
    pub fn get_output_file(&self, path: &FilePath) -> Result<File, FsError> {
        let output = self.output_path();
        if path.is_absolute() {
            if !output.contains_file(path, self.case_sensitive()) {
                return Err(FsError::outside_root(path));
            }
            return Ok(self.file(path.clone()));
        }
        if path.path().escapes() {
            return Err(FsError::outside_root(path));
        }
        Ok(self.file(output.combine_file(path)))
    }

    pub fn get_output_directory(&self, path: &DirectoryPath) -> Result<Directory, FsError> {
        let output = self.output_path();
        if path.is_absolute() {
            if path != &output && !output.path().is_ancestor_of_with_case(path.path(), self.case_sensitive()) {
                return Err(FsError::outside_root(path));
            }
            return Ok(self.directory(path.clone()));
        }
        if path.path().escapes() {
            return Err(FsError::outside_root(path));
        }
        Ok(self.directory(output.combine(path)))
    }

    /// The input root a file was resolved from, if any.
    pub fn containing_input_path(&self, path: &FilePath) -> Option<DirectoryPath> {
        let case_sensitive = self.case_sensitive();
        self.input_paths()
            .into_iter()
            .find(|root| root.contains_file(path, case_sensitive))
    }

    /// `path` relative to the input root it lives under.
    pub fn relative_input_path(&self, path: &FilePath) -> Option<FilePath> {
        let root = self.containing_input_path(path)?;
        path.relative_to_with_case(&root, self.case_sensitive())
    }

    /// Glob every input root. A relative path matched in an earlier root
    /// shadows the same relative path in later roots.
    pub fn match_input_files(&self, globber: &Globber) -> Result<Vec<File>, FsError> {
        let case_sensitive = self.case_sensitive();
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for root in self.input_directories() {
            for file in globber.match_files(&root)? {
                let Some(relative) = file.path().relative_to_with_case(root.path(), case_sensitive) else {
                    continue;
                };
                let key = if case_sensitive {
                    relative.as_str().to_string()
                } else {
                    relative.as_str().to_ascii_lowercase()
                };
                if seen.insert(key) {
                    files.push(file);
                }
            }
        }
        Ok(files)
    }

    /// Delete everything under the output root and recreate it empty.
    pub fn clean_output(&self) -> Result<(), FsError> {
        let output = self.output_directory();
        if output.exists() {
            output.delete()?;
        }
        output.create()
    }

    fn file(&self, path: FilePath) -> File {
        File::new(path, Arc::clone(&self.provider))
    }

    fn directory(&self, path: DirectoryPath) -> Directory {
        Directory::new(path, Arc::clone(&self.provider))
    }
}

impl fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystem")
            .field("root_path", &self.root_path.as_str())
            .field("input_paths", &self.input_paths)
            .field("output_path", &self.output_path.as_str())
            .finish()
    }
}
