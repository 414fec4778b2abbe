//! Read input files matching glob patterns into documents.

use crate::context::ExecutionContext;
use crate::document::{Content, Document};
use crate::io::{File, Globber};
use crate::keys;
use crate::metadata::Value;
use crate::module::{Module, ModuleError};
use rayon::prelude::*;
use tracing::debug;

/// Globs every input root (earlier roots shadow later ones) and produces
/// one document per matched file: root by root, sorted by path within each
/// root. Files are read in parallel. The module's inputs are ignored.
#[derive(Debug, Clone)]
pub struct ReadFiles {
    patterns: Vec<String>,
    globber: Globber,
}

impl ReadFiles {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ModuleError> {
        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            globber: Globber::new(patterns)?,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    fn read(&self, file: &File, ctx: &ExecutionContext<'_>) -> Result<Document, ModuleError> {
        let content = Content::from_bytes(file.read_bytes()?);
        Ok(ctx.new_document(Some(file.path().clone()), content, file_metadata(file, ctx)))
    }
}

/// Source-path metadata for a file found under one of the input roots.
pub(crate) fn file_metadata(file: &File, ctx: &ExecutionContext<'_>) -> Vec<(&'static str, Value)> {
    let path = file.path();
    let mut entries = vec![
        (keys::SOURCE_FILE_PATH, Value::from(path.as_str())),
        (keys::SOURCE_FILE_NAME, Value::from(path.file_name())),
        (keys::SOURCE_FILE_BASE, Value::from(path.file_stem())),
    ];
    if let Some(ext) = path.extension() {
        entries.push((keys::SOURCE_FILE_EXT, Value::from(ext)));
    }
    if let Some(relative) = ctx.fs().relative_input_path(path) {
        entries.push((keys::RELATIVE_FILE_DIR, Value::from(relative.directory().as_str())));
        entries.push((keys::RELATIVE_FILE_PATH, Value::from(relative.as_str())));
    }
    entries
}

impl Module for ReadFiles {
    fn execute(
        &self,
        _inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, ModuleError> {
        let files = ctx.fs().match_input_files(&self.globber)?;
        debug!(
            pipeline = ctx.pipeline_name(),
            depth = ctx.depth(),
            patterns = ?self.patterns,
            documents = files.len(),
            "matched input files"
        );
        files
            .par_iter()
            .map(|file| {
                self.read(file, ctx).map_err(|e| ModuleError::Document {
                    source_path: file.path().to_string(),
                    error: Box::new(e),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::io::{FileSystem, MemoryFileProvider};
    use crate::pipeline::Pipeline;
    use std::sync::Arc;

    fn run(provider: MemoryFileProvider, patterns: &[&str]) -> Vec<Document> {
        let fs = FileSystem::with_provider(Arc::new(provider), "/site")
            .with_input_paths(["input", "theme"]);
        let mut engine = Engine::new(fs);
        engine
            .add_pipeline(Pipeline::new("read").with_module(ReadFiles::new(patterns).unwrap()))
            .unwrap();
        engine.execute().unwrap();
        engine.documents().get("read").unwrap().to_vec()
    }

    #[test]
    fn reads_matching_files_with_path_metadata() {
        let provider = MemoryFileProvider::new();
        provider
            .add_file("/site/input/posts/hello.md", "hello")
            .add_file("/site/input/about.md", "about")
            .add_file("/site/input/style.css", "body{}");
        let docs = run(provider, &["**/*.md"]);

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text(), "about");
        let post = &docs[1];
        assert_eq!(post.text(), "hello");
        assert_eq!(post.source().unwrap().as_str(), "/site/input/posts/hello.md");
        assert_eq!(post.get_string(keys::RELATIVE_FILE_PATH).as_deref(), Some("posts/hello.md"));
        assert_eq!(post.get_string(keys::RELATIVE_FILE_DIR).as_deref(), Some("posts"));
        assert_eq!(post.get_string(keys::SOURCE_FILE_NAME).as_deref(), Some("hello.md"));
        assert_eq!(post.get_string(keys::SOURCE_FILE_BASE).as_deref(), Some("hello"));
        assert_eq!(post.get_string(keys::SOURCE_FILE_EXT).as_deref(), Some("md"));
        assert_eq!(docs[0].get_string(keys::RELATIVE_FILE_DIR).as_deref(), Some("."));
    }

    #[test]
    fn exclusions_and_shadowing() {
        let provider = MemoryFileProvider::new();
        provider
            .add_file("/site/input/a.md", "mine")
            .add_file("/site/input/drafts/b.md", "draft")
            .add_file("/site/theme/a.md", "theirs")
            .add_file("/site/theme/c.md", "theme");
        let docs = run(provider, &["**/*.md", "!drafts/**"]);
        let texts: Vec<_> = docs.iter().map(|d| d.text().into_owned()).collect();
        assert_eq!(texts, vec!["mine", "theme"]);
    }

    #[test]
    fn case_insensitive_provider_keeps_relative_paths() {
        let provider = MemoryFileProvider::case_insensitive();
        provider.add_file("/Site/Input/Posts/Hello.md", "hello");
        let docs = run(provider, &["posts/*.md"]);

        assert_eq!(docs.len(), 1);
        assert_eq!(
            docs[0].get_string(keys::RELATIVE_FILE_PATH).as_deref(),
            Some("Posts/Hello.md")
        );
        assert_eq!(docs[0].get_string(keys::RELATIVE_FILE_DIR).as_deref(), Some("Posts"));
    }

    #[test]
    fn binary_files_stay_binary() {
        let provider = MemoryFileProvider::new();
        provider.add_file("/site/input/img.bin", vec![0xffu8, 0x00, 0xfe]);
        let docs = run(provider, &["*.bin"]);
        assert!(docs[0].content().is_binary());
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let docs = run(MemoryFileProvider::new(), &["**/*.nothing"]);
        assert!(docs.is_empty());
    }

    #[test]
    fn malformed_patterns_fail_fast() {
        assert!(matches!(ReadFiles::new(&["a/{b"]), Err(ModuleError::Glob(_))));
    }
}
