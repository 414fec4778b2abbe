//! Glob matching over the virtual file system.
//!
//! ## Pattern syntax
//!
//! | Token | Matches |
//! |---|---|
//! | `*` | any run of characters within one path segment |
//! | `?` | exactly one character within a segment |
//! | `[a-z]`, `[!a-z]` | one character from (or not from) a class |
//! | `**` | zero or more whole path segments |
//! | `{md,markdown}` | any of the comma-separated alternatives |
//! | `!pattern` | exclusion (leading `!` only) |
//!
//! Patterns are relative to the directory being matched, so `*.md` only sees
//! the root's own files while `**/*.md` sees every depth including the root.
//!
//! ## Inclusion and exclusion
//!
//! A file is matched iff at least one inclusion pattern matches it and no
//! exclusion pattern does. Exclusions win regardless of where they appear
//! in the list:
//!
//! ```text
//! ["**/*.md", "!drafts/**"]   →  every markdown file outside drafts/
//! ["!drafts/**", "**/*.md"]   →  same result
//! ```
//!
//! Patterns are all parsed before the file system is touched, so a malformed
//! pattern fails fast instead of silently matching nothing.

use super::path::NormalizedPath;
use super::provider::{Directory, File, FsError};
use glob::{MatchOptions, Pattern};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GlobError {
    #[error("Malformed glob pattern '{pattern}': {reason}")]
    Malformed { pattern: String, reason: String },
}

impl GlobError {
    fn malformed(pattern: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Recursive,
    Literal(String),
    Wildcard(Pattern),
}

impl Segment {
    fn matches(&self, name: &str, case_sensitive: bool) -> bool {
        match self {
            Segment::Recursive => true,
            Segment::Literal(lit) if case_sensitive => lit == name,
            Segment::Literal(lit) => lit.eq_ignore_ascii_case(name),
            Segment::Wildcard(pattern) => pattern.matches_with(
                name,
                MatchOptions {
                    case_sensitive,
                    require_literal_separator: true,
                    require_literal_leading_dot: false,
                },
            ),
        }
    }
}

/// A single parsed inclusion or exclusion pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    raw: String,
    exclude: bool,
    /// One segment list per brace alternative.
    alternatives: Vec<Vec<Segment>>,
}

impl GlobPattern {
    pub fn parse(raw: &str) -> Result<Self, GlobError> {
        let trimmed = raw.trim();
        let (exclude, body) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let body = body.replace('\\', "/");
        let body = body.trim_start_matches("./").trim_start_matches('/');
        if body.is_empty() {
            return Err(GlobError::malformed(raw, "pattern is empty"));
        }

        let alternatives = expand_braces(body)
            .map_err(|reason| GlobError::malformed(raw, reason))?
            .iter()
            .map(|expanded| parse_segments(raw, expanded))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            exclude,
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_exclusion(&self) -> bool {
        self.exclude
    }

    /// Whether `relative` matches this pattern's body. The exclusion flag is
    /// not applied here.
    pub fn matches(&self, relative: &NormalizedPath, case_sensitive: bool) -> bool {
        let segments = relative.segments();
        self.alternatives
            .iter()
            .any(|alt| segments_match(alt, &segments, case_sensitive))
    }
}

fn parse_segments(raw: &str, pattern: &str) -> Result<Vec<Segment>, GlobError> {
    let mut segments = Vec::new();
    for part in pattern.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(GlobError::malformed(raw, "'..' segments are not supported")),
            "**" => {
                if !matches!(segments.last(), Some(Segment::Recursive)) {
                    segments.push(Segment::Recursive);
                }
            }
            p if p.contains("**") => {
                return Err(GlobError::malformed(
                    raw,
                    "'**' must be a whole path segment",
                ));
            }
            p if p.contains(['*', '?', '[', ']']) => {
                let compiled =
                    Pattern::new(p).map_err(|e| GlobError::malformed(raw, e.msg.to_string()))?;
                segments.push(Segment::Wildcard(compiled));
            }
            p => segments.push(Segment::Literal(p.to_string())),
        }
    }
    if segments.is_empty() {
        return Err(GlobError::malformed(raw, "pattern has no segments"));
    }
    Ok(segments)
}

fn segments_match(pattern: &[Segment], path: &[&str], case_sensitive: bool) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::Recursive, rest)) => {
            (0..=path.len()).any(|skip| segments_match(rest, &path[skip..], case_sensitive))
        }
        Some((segment, rest)) => match path.split_first() {
            Some((name, remaining)) => {
                segment.matches(name, case_sensitive)
                    && segments_match(rest, remaining, case_sensitive)
            }
            None => false,
        },
    }
}

/// Expand `{a,b}` alternations, innermost-last. `a{b,c}d` → `["abd", "acd"]`.
fn expand_braces(pattern: &str) -> Result<Vec<String>, String> {
    let Some(open) = pattern.find('{') else {
        if pattern.contains('}') {
            return Err("unbalanced '}'".to_string());
        }
        return Ok(vec![pattern.to_string()]);
    };
    if pattern[..open].contains('}') {
        return Err("unbalanced '}'".to_string());
    }

    let mut depth = 0;
    let mut close = None;
    let mut splits = Vec::new();
    for (i, c) in pattern[open..].char_indices() {
        let idx = open + i;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(idx);
                    break;
                }
            }
            ',' if depth == 1 => splits.push(idx),
            _ => {}
        }
    }
    let close = close.ok_or_else(|| "unbalanced '{'".to_string())?;

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut bounds = vec![open];
    bounds.extend(&splits);
    bounds.push(close);

    let mut expanded = Vec::new();
    for window in bounds.windows(2) {
        let choice = &pattern[window[0] + 1..window[1]];
        for tail in expand_braces(&format!("{prefix}{choice}{suffix}"))? {
            if !expanded.contains(&tail) {
                expanded.push(tail);
            }
        }
    }
    Ok(expanded)
}

/// Parsed set of inclusion and exclusion patterns.
#[derive(Debug, Clone)]
pub struct Globber {
    inclusions: Vec<GlobPattern>,
    exclusions: Vec<GlobPattern>,
}

impl Globber {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, GlobError> {
        let mut inclusions = Vec::new();
        let mut exclusions = Vec::new();
        for raw in patterns {
            let pattern = GlobPattern::parse(raw.as_ref())?;
            if pattern.is_exclusion() {
                exclusions.push(pattern);
            } else {
                inclusions.push(pattern);
            }
        }
        Ok(Self {
            inclusions,
            exclusions,
        })
    }

    /// Whether a root-relative path is selected by this pattern set.
    pub fn is_match(&self, relative: &NormalizedPath, case_sensitive: bool) -> bool {
        self.inclusions
            .iter()
            .any(|p| p.matches(relative, case_sensitive))
            && !self
                .exclusions
                .iter()
                .any(|p| p.matches(relative, case_sensitive))
    }

    /// All files beneath `root` selected by this pattern set, de-duplicated.
    pub fn match_files(&self, root: &Directory) -> Result<Vec<File>, FsError> {
        if self.inclusions.is_empty() {
            return Ok(Vec::new());
        }
        let case_sensitive = root.case_sensitive();
        let mut matched = BTreeMap::new();
        for file in root.get_files(true)? {
            let Some(relative) = file
                .path()
                .path()
                .relative_to_with_case(root.path().path(), case_sensitive)
            else {
                continue;
            };
            if self.is_match(&relative, case_sensitive) {
                matched.entry(file.path().to_string()).or_insert(file);
            }
        }
        Ok(matched.into_values().collect())
    }
}

/// Match `patterns` against every file beneath `root`.
pub fn match_files<S: AsRef<str>>(root: &Directory, patterns: &[S]) -> Result<Vec<File>, FsError> {
    Globber::new(patterns)?.match_files(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory::MemoryFileProvider;
    use std::sync::Arc;

    fn tree(files: &[&str]) -> Directory {
        let provider = MemoryFileProvider::new();
        for f in files {
            provider.add_file(f, "");
        }
        Directory::new("/a".into(), Arc::new(provider))
    }

    fn matched(root: &Directory, patterns: &[&str]) -> Vec<String> {
        match_files(root, patterns)
            .unwrap()
            .iter()
            .map(|f| f.path().to_string())
            .collect()
    }

    #[test]
    fn recursive_wildcard_finds_nested_file() {
        let root = tree(&["/a/b/c/foo.txt", "/a/b/d/baz.txt"]);
        assert_eq!(matched(&root, &["**/baz.txt"]), vec!["/a/b/d/baz.txt"]);
    }

    #[test]
    fn exclusion_removes_match() {
        let root = tree(&["/a/b/c/foo.txt", "/a/b/d/baz.txt"]);
        assert!(matched(&root, &["**/baz.txt", "!**/d/*"]).is_empty());
    }

    #[test]
    fn exclusion_wins_regardless_of_order() {
        let root = tree(&["/a/b/c/foo.txt", "/a/b/d/baz.txt"]);
        assert!(matched(&root, &["!**/d/*", "**/baz.txt"]).is_empty());
    }

    #[test]
    fn recursive_wildcard_matches_every_depth() {
        let root = tree(&["/a/b/c/baz.txt", "/a/b/d/baz.txt", "/a/baz.txt"]);
        assert_eq!(
            matched(&root, &["**/baz.txt"]),
            vec!["/a/b/c/baz.txt", "/a/b/d/baz.txt", "/a/baz.txt"]
        );
    }

    #[test]
    fn star_stays_within_a_segment() {
        let root = tree(&["/a/top.md", "/a/sub/nested.md"]);
        assert_eq!(matched(&root, &["*.md"]), vec!["/a/top.md"]);
        assert_eq!(matched(&root, &["sub/*"]), vec!["/a/sub/nested.md"]);
    }

    #[test]
    fn question_mark_and_classes() {
        let root = tree(&["/a/p1.md", "/a/p2.md", "/a/px.md", "/a/p10.md"]);
        assert_eq!(matched(&root, &["p?.md"]), vec!["/a/p1.md", "/a/p2.md", "/a/px.md"]);
        assert_eq!(matched(&root, &["p[0-9].md"]), vec!["/a/p1.md", "/a/p2.md"]);
    }

    #[test]
    fn brace_alternatives() {
        let root = tree(&["/a/x.md", "/a/y.markdown", "/a/z.txt"]);
        assert_eq!(
            matched(&root, &["*.{md,markdown}"]),
            vec!["/a/x.md", "/a/y.markdown"]
        );
        assert_eq!(
            expand_braces("a{b,c{d,e}}f").unwrap(),
            vec!["abf", "acdf", "acef"]
        );
    }

    #[test]
    fn overlapping_patterns_are_deduplicated() {
        let root = tree(&["/a/x.md"]);
        assert_eq!(matched(&root, &["*.md", "**/*", "x.md"]), vec!["/a/x.md"]);
    }

    #[test]
    fn no_match_is_not_an_error() {
        let root = tree(&["/a/x.md"]);
        assert!(matched(&root, &["**/*.scss"]).is_empty());
        assert!(matched(&root, &["!x.md"]).is_empty());
    }

    #[test]
    fn trailing_recursive_wildcard_selects_subtree() {
        let root = tree(&["/a/docs/one.md", "/a/docs/deep/two.md", "/a/other.md"]);
        assert_eq!(
            matched(&root, &["docs/**"]),
            vec!["/a/docs/deep/two.md", "/a/docs/one.md"]
        );
    }

    #[test]
    fn case_insensitive_provider() {
        let provider = MemoryFileProvider::case_insensitive();
        provider.add_file("/a/README.MD", "");
        let root = Directory::new("/a".into(), Arc::new(provider));
        assert_eq!(match_files(&root, &["*.md"]).unwrap().len(), 1);
    }

    #[test]
    fn malformed_patterns_fail_fast() {
        for bad in ["", "!", "a**/b", "{a,b", "a}", "[abc", "../x"] {
            let err = GlobPattern::parse(bad).unwrap_err();
            assert!(
                matches!(err, GlobError::Malformed { .. }),
                "expected malformed for {bad:?}"
            );
        }
    }

    #[test]
    fn malformed_pattern_surfaces_as_fs_error() {
        let root = tree(&["/a/x.md"]);
        assert!(matches!(
            match_files(&root, &["*.md", "[oops"]),
            Err(FsError::Glob(_))
        ));
    }
}
