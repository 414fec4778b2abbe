//! Platform-independent path types.
//!
//! Every path in the virtual file system is stored in one canonical form:
//!
//! - backslashes become forward slashes
//! - repeated slashes collapse into one
//! - `.` segments are dropped and `..` segments are folded into their parent
//! - trailing slashes are removed (except for the root `/`)
//!
//! Equality is ordinal on that canonical string. Providers that are
//! case-insensitive compare through [`NormalizedPath::eq_with_case`].
//!
//! ```text
//! "a\\b//./c/../d/"   →  "a/b/d"
//! "/../x"             →  "/x"        (cannot climb above an absolute root)
//! "../x/./y"          →  "../x/y"    (leading `..` is kept on relative paths)
//! "C:\\site\\input"   →  "C:/site/input"
//! ```
//!
//! [`FilePath`] and [`DirectoryPath`] are thin wrappers that add the
//! operations that only make sense for one kind of path.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A canonical, forward-slash path. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NormalizedPath {
    full: String,
}

impl NormalizedPath {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            full: normalize(path.as_ref()),
        }
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.full
    }

    pub fn is_absolute(&self) -> bool {
        self.full.starts_with('/') || has_drive_prefix(&self.full)
    }

    pub fn is_relative(&self) -> bool {
        !self.is_absolute()
    }

    /// True for `/`, `C:/` and the relative root `.`.
    pub fn is_root(&self) -> bool {
        self.full == "/" || self.full == "." || (has_drive_prefix(&self.full) && self.full.len() == 3)
    }

    /// Path segments, excluding the absolute root marker.
    pub fn segments(&self) -> Vec<&str> {
        let body = self.body();
        if body.is_empty() || body == "." {
            Vec::new()
        } else {
            body.split('/').collect()
        }
    }

    /// The last segment, or `None` for a root.
    pub fn name(&self) -> Option<&str> {
        self.segments().last().copied()
    }

    /// The containing path, or `None` for a root.
    pub fn parent(&self) -> Option<NormalizedPath> {
        if self.is_root() {
            return None;
        }
        let segments = self.segments();
        if segments.last() == Some(&"..") {
            return Some(NormalizedPath::new(format!("{}/..", self.full)));
        }
        let prefix = self.root_prefix();
        let parent = segments[..segments.len() - 1].join("/");
        Some(match (prefix, parent.is_empty()) {
            (Some(root), _) => NormalizedPath::new(format!("{root}{parent}")),
            (None, true) => NormalizedPath::new("."),
            (None, false) => NormalizedPath::new(parent),
        })
    }

    /// Append `other` to this path. An absolute `other` replaces `self`.
    pub fn combine(&self, other: &NormalizedPath) -> NormalizedPath {
        if other.is_absolute() {
            return other.clone();
        }
        if other.full == "." {
            return self.clone();
        }
        if self.full == "." {
            return other.clone();
        }
        NormalizedPath::new(format!("{}/{}", self.full, other.full))
    }

    /// True when `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &NormalizedPath) -> bool {
        self.is_ancestor_of_with_case(other, true)
    }

    pub fn is_ancestor_of_with_case(&self, other: &NormalizedPath, case_sensitive: bool) -> bool {
        if self.is_absolute() != other.is_absolute() {
            return false;
        }
        let mine = self.segments();
        let theirs = other.segments();
        if mine.len() >= theirs.len() || self.root_prefix() != other.root_prefix() {
            return false;
        }
        if mine.first() == Some(&"..") || theirs.first() == Some(&"..") {
            return false;
        }
        mine.iter()
            .zip(theirs.iter())
            .all(|(a, b)| segment_eq(a, b, case_sensitive))
    }

    pub fn is_descendant_of(&self, other: &NormalizedPath) -> bool {
        other.is_ancestor_of(self)
    }

    /// Express `self` relative to `base`, e.g. `/a/b/c.txt` against `/a` is
    /// `b/c.txt`. Returns `None` when `self` is not `base` or beneath it.
    pub fn relative_to(&self, base: &NormalizedPath) -> Option<NormalizedPath> {
        self.relative_to_with_case(base, true)
    }

    pub fn relative_to_with_case(
        &self,
        base: &NormalizedPath,
        case_sensitive: bool,
    ) -> Option<NormalizedPath> {
        if self.eq_with_case(base, case_sensitive) {
            return Some(NormalizedPath::new("."));
        }
        if !base.is_ancestor_of_with_case(self, case_sensitive) {
            return None;
        }
        let skip = base.segments().len();
        Some(NormalizedPath::new(self.segments()[skip..].join("/")))
    }

    /// Equality honoring a provider's case sensitivity.
    pub fn eq_with_case(&self, other: &NormalizedPath, case_sensitive: bool) -> bool {
        if case_sensitive {
            self.full == other.full
        } else {
            self.full.eq_ignore_ascii_case(&other.full)
        }
    }

    /// Whether the path climbs out of its starting point (relative, leading `..`).
    pub fn escapes(&self) -> bool {
        self.is_relative() && self.segments().first() == Some(&"..")
    }

    fn root_prefix(&self) -> Option<&str> {
        if self.full.starts_with('/') {
            Some("/")
        } else if has_drive_prefix(&self.full) {
            Some(&self.full[..3])
        } else {
            None
        }
    }

    fn body(&self) -> &str {
        match self.root_prefix() {
            Some(prefix) => &self.full[prefix.len()..],
            None => &self.full,
        }
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl From<String> for NormalizedPath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for NormalizedPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<NormalizedPath> for String {
    fn from(value: NormalizedPath) -> Self {
        value.full
    }
}

impl From<&std::path::Path> for NormalizedPath {
    fn from(value: &std::path::Path) -> Self {
        Self::new(value.to_string_lossy())
    }
}

fn segment_eq(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

fn has_drive_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

/// Canonicalize a raw path string. Idempotent.
pub fn normalize(raw: &str) -> String {
    let replaced = raw.trim().replace('\\', "/");
    let (prefix, body) = if replaced.starts_with('/') {
        ("/".to_string(), &replaced[1..])
    } else if has_drive_prefix(&replaced) {
        let drive = replaced[..1].to_ascii_uppercase();
        (format!("{drive}:/"), &replaced[3..])
    } else if replaced.len() == 2 && replaced.ends_with(':') && replaced.as_bytes()[0].is_ascii_alphabetic() {
        (format!("{}/", replaced.to_ascii_uppercase()), "")
    } else {
        (String::new(), replaced.as_str())
    };
    let absolute = !prefix.is_empty();

    let mut stack: Vec<&str> = Vec::new();
    for segment in body.split('/') {
        match segment {
            "" | "." => {}
            ".." => match stack.last() {
                Some(&last) if last != ".." => {
                    stack.pop();
                }
                _ if absolute => {}
                _ => stack.push(".."),
            },
            other => stack.push(other),
        }
    }

    let joined = stack.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("{prefix}{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Path to a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilePath(NormalizedPath);

impl FilePath {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(NormalizedPath::new(path))
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_absolute(&self) -> bool {
        self.0.is_absolute()
    }

    /// File name including extension.
    pub fn file_name(&self) -> &str {
        self.0.name().unwrap_or("")
    }

    /// Extension without the leading dot, if any. Dotfiles such as
    /// `.gitignore` have no extension.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(pos) => Some(&name[pos + 1..]),
        }
    }

    pub fn file_stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(pos) => &name[..pos],
        }
    }

    pub fn directory(&self) -> DirectoryPath {
        DirectoryPath(self.0.parent().unwrap_or_else(|| NormalizedPath::new(".")))
    }

    /// Replace (or remove, with an empty string) the extension.
    pub fn change_extension(&self, extension: &str) -> FilePath {
        let extension = extension.trim_start_matches('.');
        let name = if extension.is_empty() {
            self.file_stem().to_string()
        } else {
            format!("{}.{}", self.file_stem(), extension)
        };
        self.directory().combine_file(&FilePath::new(name))
    }

    pub fn relative_to(&self, base: &DirectoryPath) -> Option<FilePath> {
        self.0.relative_to(&base.0).map(FilePath)
    }

    pub fn relative_to_with_case(&self, base: &DirectoryPath, case_sensitive: bool) -> Option<FilePath> {
        self.0.relative_to_with_case(&base.0, case_sensitive).map(FilePath)
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for FilePath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<String> for FilePath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for FilePath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Path to a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryPath(NormalizedPath);

impl DirectoryPath {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(NormalizedPath::new(path))
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_absolute(&self) -> bool {
        self.0.is_absolute()
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name()
    }

    pub fn parent(&self) -> Option<DirectoryPath> {
        self.0.parent().map(DirectoryPath)
    }

    pub fn combine(&self, other: &DirectoryPath) -> DirectoryPath {
        DirectoryPath(self.0.combine(&other.0))
    }

    pub fn combine_file(&self, file: &FilePath) -> FilePath {
        FilePath(self.0.combine(&file.0))
    }

    pub fn contains_file(&self, file: &FilePath, case_sensitive: bool) -> bool {
        self.0.is_ancestor_of_with_case(&file.0, case_sensitive)
    }

    pub fn relative_to(&self, base: &DirectoryPath) -> Option<DirectoryPath> {
        self.0.relative_to(&base.0).map(DirectoryPath)
    }
}

impl fmt::Display for DirectoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for DirectoryPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<String> for DirectoryPath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for DirectoryPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
