//! The module contract: `documents in → documents out`.
//!
//! Every transformation step in a pipeline implements [`Module`]. Inputs are
//! borrowed and immutable; a module produces new documents, usually by
//! cloning its inputs with [`Document::clone_with`]. Returning an empty
//! vector is valid and simply means nothing flows downstream.
//!
//! Small modules do not need their own type: [`FnModule`] wraps a closure
//! over the whole input set and [`MapModule`] wraps a per-document closure
//! that runs across the rayon pool.

use crate::context::ExecutionContext;
use crate::document::Document;
use crate::io::{FsError, GlobError};
use crate::metadata::ConversionError;
use rayon::prelude::*;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("File system error: {0}")]
    FileSystem(#[from] FsError),
    #[error("Glob error: {0}")]
    Glob(#[from] GlobError),
    #[error("Metadata error: {0}")]
    Conversion(#[from] ConversionError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Missing metadata '{0}'")]
    MissingMetadata(String),
    #[error("{0}")]
    Failed(String),
    #[error("{source_path}: {error}")]
    Document {
        source_path: String,
        #[source]
        error: Box<ModuleError>,
    },
    #[error("Child module '{module}' failed: {error}")]
    Child {
        module: String,
        #[source]
        error: Box<ModuleError>,
    },
}

impl ModuleError {
    pub fn failed(message: impl Into<String>) -> Self {
        ModuleError::Failed(message.into())
    }

    /// Attach the source path of the document being processed. Documents
    /// without a source are reported as `<generated>`.
    pub fn for_document(self, document: &Document) -> Self {
        let source_path = document
            .source()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "<generated>".to_string());
        ModuleError::Document {
            source_path,
            error: Box::new(self),
        }
    }
}

pub trait Module: Send + Sync {
    /// Name used in logs and error reports.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, ModuleError>;
}

/// `folio::modules::read_files::ReadFiles` → `ReadFiles`.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

type BatchFn =
    dyn Fn(&[Document], &ExecutionContext<'_>) -> Result<Vec<Document>, ModuleError> + Send + Sync;

/// A module built from a closure over the whole input set.
pub struct FnModule {
    name: String,
    f: Box<BatchFn>,
}

impl FnModule {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Document], &ExecutionContext<'_>) -> Result<Vec<Document>, ModuleError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl Module for FnModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, ModuleError> {
        (self.f)(inputs, ctx)
    }
}

impl fmt::Debug for FnModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModule").field("name", &self.name).finish()
    }
}

type MapFn = dyn Fn(&Document, &ExecutionContext<'_>) -> Result<Document, ModuleError> + Send + Sync;

/// A module that transforms each input independently, in parallel. Output
/// order matches input order. Errors name the failing document.
pub struct MapModule {
    name: String,
    f: Box<MapFn>,
}

impl MapModule {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Document, &ExecutionContext<'_>) -> Result<Document, ModuleError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl Module for MapModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, ModuleError> {
        inputs
            .par_iter()
            .map(|doc| (self.f)(doc, ctx).map_err(|e| e.for_document(doc)))
            .collect()
    }
}

impl fmt::Debug for MapModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapModule").field("name", &self.name).finish()
    }
}
