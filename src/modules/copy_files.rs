//! Copy input files to the output root unchanged.

use super::read_files::file_metadata;
use crate::context::ExecutionContext;
use crate::document::Document;
use crate::io::Globber;
use crate::keys;
use crate::module::{Module, ModuleError};
use rayon::prelude::*;

/// Copies every matched input file to the same relative path under the
/// output root, without reading it into a document. Emits one empty-content
/// document per copy carrying source and destination metadata.
#[derive(Debug, Clone)]
pub struct CopyFiles {
    globber: Globber,
}

impl CopyFiles {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ModuleError> {
        Ok(Self {
            globber: Globber::new(patterns)?,
        })
    }
}

impl Module for CopyFiles {
    fn execute(
        &self,
        _inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, ModuleError> {
        let fs = ctx.fs();
        fs.match_input_files(&self.globber)?
            .par_iter()
            .map(|file| -> Result<Document, ModuleError> {
                let relative = fs
                    .relative_input_path(file.path())
                    .ok_or_else(|| ModuleError::failed(format!("{} is outside every input root", file.path())))?;
                let target = fs.get_output_file(&relative)?;
                file.copy_to(&target, true)?;

                let mut entries = file_metadata(file, ctx);
                entries.push((keys::DESTINATION_FILE_PATH, target.path().as_str().into()));
                entries.push((keys::DESTINATION_RELATIVE_PATH, relative.as_str().into()));
                Ok(ctx.new_document(Some(file.path().clone()), "", entries))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::io::{FileProvider, FileSystem, MemoryFileProvider};
    use crate::pipeline::Pipeline;
    use std::sync::Arc;

    #[test]
    fn copies_matched_files_to_output() {
        let provider = Arc::new(MemoryFileProvider::new());
        provider
            .add_file("/site/input/assets/app.css", "body{}")
            .add_file("/site/input/assets/logo.png", vec![0x89u8, 0x50])
            .add_file("/site/input/index.md", "# skip");
        let fs = FileSystem::with_provider(provider.clone(), "/site");
        let mut engine = Engine::new(fs);
        engine
            .add_pipeline(Pipeline::new("assets").with_module(CopyFiles::new(&["assets/**"]).unwrap()))
            .unwrap();
        engine.execute().unwrap();

        assert!(provider.file_exists(&"/site/output/assets/app.css".into()));
        assert!(provider.file_exists(&"/site/output/assets/logo.png".into()));
        assert!(!provider.file_exists(&"/site/output/index.md".into()));

        let docs = engine.documents().get("assets").unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].content().is_empty());
        assert_eq!(
            docs[0].get_string(keys::DESTINATION_RELATIVE_PATH).as_deref(),
            Some("assets/app.css")
        );
    }

    #[test]
    fn copies_from_mixed_case_root_on_case_insensitive_provider() {
        let provider = Arc::new(MemoryFileProvider::case_insensitive());
        provider.add_file("/Site/Input/Assets/App.css", "body{}");
        let fs = FileSystem::with_provider(provider.clone(), "/site");
        let mut engine = Engine::new(fs);
        engine
            .add_pipeline(Pipeline::new("assets").with_module(CopyFiles::new(&["assets/*"]).unwrap()))
            .unwrap();
        let summary = engine.execute().unwrap();

        assert!(!summary.has_failures());
        assert!(provider.file_exists(&"/site/output/Assets/App.css".into()));
        let docs = engine.documents().get("assets").unwrap();
        assert_eq!(
            docs[0].get_string(keys::DESTINATION_RELATIVE_PATH).as_deref(),
            Some("Assets/App.css")
        );
    }
}
