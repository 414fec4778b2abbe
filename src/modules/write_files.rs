//! Write document content under the output root.

use crate::context::ExecutionContext;
use crate::document::Document;
use crate::io::FilePath;
use crate::keys;
use crate::module::{Module, ModuleError};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Writes each document to the output root and passes it on with
/// destination metadata attached.
///
/// The destination is the document's `destination` metadata when present,
/// otherwise its relative source path, with the extension replaced when the
/// module was given one. Documents with neither pass through unwritten.
///
/// A document whose content and destination match a write from an earlier
/// pass is skipped when the output file still exists.
#[derive(Debug, Clone, Default)]
pub struct WriteFiles {
    extension: Option<String>,
}

impl WriteFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: Some(extension.into()),
        }
    }

    fn destination(&self, doc: &Document) -> Result<Option<FilePath>, ModuleError> {
        if let Some(explicit) = doc.get::<String>(keys::DESTINATION)? {
            return Ok(Some(FilePath::new(explicit)));
        }
        let Some(relative) = doc.get::<String>(keys::RELATIVE_FILE_PATH)? else {
            return Ok(None);
        };
        let relative = FilePath::new(relative);
        Ok(Some(match &self.extension {
            Some(ext) => relative.change_extension(ext),
            None => relative,
        }))
    }

    fn write(&self, doc: &Document, ctx: &ExecutionContext<'_>) -> Result<Document, ModuleError> {
        let Some(relative) = self.destination(doc)? else {
            warn!(
                pipeline = ctx.pipeline_name(),
                module = ctx.module_name(),
                "document has no destination, not written"
            );
            return Ok(doc.clone());
        };
        let file = ctx.fs().get_output_file(&relative)?;
        let written_before = ctx
            .cache()
            .try_get_document_value::<FilePath>(doc, Some(relative.as_str()))
            .is_some_and(|previous| &previous == file.path());
        if written_before && file.exists() {
            debug!(path = %file.path(), "unchanged, skipping write");
        } else {
            file.write_bytes(doc.bytes())?;
            ctx.cache()
                .set_document(doc, Some(relative.as_str()), file.path().clone());
        }
        let relative = relative
            .relative_to_with_case(&ctx.fs().output_path(), ctx.fs().case_sensitive())
            .unwrap_or(relative);
        Ok(doc.with_metadata([
            (keys::DESTINATION_FILE_PATH, file.path().as_str()),
            (keys::DESTINATION_RELATIVE_PATH, relative.as_str()),
        ]))
    }
}

impl Module for WriteFiles {
    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, ModuleError> {
        inputs
            .par_iter()
            .map(|doc| self.write(doc, ctx).map_err(|e| e.for_document(doc)))
            .collect()
    }
}
