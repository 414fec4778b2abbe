//! Well-known metadata keys set and read by the built-in modules.

/// Absolute path of the file a document was read from.
pub const SOURCE_FILE_PATH: &str = "source_file_path";
/// File name including extension, e.g. `post.md`.
pub const SOURCE_FILE_NAME: &str = "source_file_name";
/// File name without extension, e.g. `post`.
pub const SOURCE_FILE_BASE: &str = "source_file_base";
/// Extension without the dot, e.g. `md`. Absent for extensionless files.
pub const SOURCE_FILE_EXT: &str = "source_file_ext";
/// Path relative to the input root the file was found under.
pub const RELATIVE_FILE_PATH: &str = "relative_file_path";
/// Directory part of [`RELATIVE_FILE_PATH`]; `.` for files at the root.
pub const RELATIVE_FILE_DIR: &str = "relative_file_dir";
/// Explicit output location, relative to the output root. Overrides the
/// relative source path when writing.
pub const DESTINATION: &str = "destination";
/// Absolute path a document was written to.
pub const DESTINATION_FILE_PATH: &str = "destination_file_path";
/// Output path relative to the output root.
pub const DESTINATION_RELATIVE_PATH: &str = "destination_relative_path";
