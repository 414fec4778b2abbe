//! Virtual file system.
//!
//! | Piece | Role |
//! |---|---|
//! | [`path`] | canonical `NormalizedPath` / `FilePath` / `DirectoryPath` |
//! | [`provider`] | [`FileProvider`] trait + [`File`] / [`Directory`] handles |
//! | [`local`] | local disk, with retry on transient I/O failures |
//! | [`memory`] | in-memory store for embedded resources and tests |
//! | [`file_system`] | ordered input roots, single output root |
//! | [`glob`] | inclusion/exclusion pattern matching |

pub mod file_system;
pub mod glob;
pub mod local;
pub mod memory;
pub mod path;
pub mod provider;

pub use file_system::FileSystem;
pub use glob::{GlobError, GlobPattern, Globber};
pub use local::LocalFileProvider;
pub use memory::MemoryFileProvider;
pub use path::{DirectoryPath, FilePath, NormalizedPath};
pub use provider::{Directory, File, FileProvider, FsError};
