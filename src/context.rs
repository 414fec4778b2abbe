//! What a module sees while it runs.
//!
//! An [`ExecutionContext`] is built for every module invocation. It exposes
//! the file system, the module's own cache, the pipeline's settings, the
//! documents published by earlier pipelines, and sub-execution of child
//! module chains. Nesting is tracked as an explicit `depth` that is attached
//! to every log line emitted for the chain.

use crate::cache::{CacheManager, ExecutionCache};
use crate::document::{Content, Document};
use crate::io::{FilePath, FileSystem};
use crate::metadata::{Metadata, Value};
use crate::module::{Module, ModuleError};
use crate::pipeline::DocumentCollection;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// State shared by every module invocation of one engine.
pub(crate) struct Environment {
    pub fs: FileSystem,
    pub caches: CacheManager,
    pub documents: DocumentCollection,
}

/// A module failure together with the module that raised it.
#[derive(Debug)]
pub(crate) struct ModuleFailure {
    pub module: String,
    pub error: ModuleError,
}

/// Run `modules` in order, each one consuming the previous one's output.
pub(crate) fn run_modules(
    env: &Environment,
    pipeline: &str,
    settings: &Metadata,
    modules: &[Arc<dyn Module>],
    inputs: Vec<Document>,
    depth: usize,
) -> Result<Vec<Document>, ModuleFailure> {
    let mut documents = inputs;
    for module in modules {
        let name = module.name();
        debug!(pipeline, module = name, depth, documents = documents.len(), "executing module");
        let started = Instant::now();
        let outputs = {
            let ctx = ExecutionContext {
                env,
                pipeline,
                module: name,
                settings,
                cache: env.caches.cache_for(module),
                depth,
                inputs: &documents,
            };
            module.execute(&documents, &ctx)
        }
        .map_err(|error| ModuleFailure {
            module: name.to_string(),
            error,
        })?;
        debug!(
            pipeline,
            module = name,
            depth,
            documents = outputs.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "executed module"
        );
        documents = outputs;
    }
    Ok(documents)
}

pub struct ExecutionContext<'a> {
    env: &'a Environment,
    pipeline: &'a str,
    module: &'a str,
    settings: &'a Metadata,
    cache: Arc<ExecutionCache>,
    depth: usize,
    inputs: &'a [Document],
}

impl<'a> ExecutionContext<'a> {
    pub fn fs(&self) -> &FileSystem {
        &self.env.fs
    }

    /// This module instance's cache.
    pub fn cache(&self) -> &ExecutionCache {
        &self.cache
    }

    /// Pipeline settings layered over the engine settings.
    pub fn settings(&self) -> &Metadata {
        self.settings
    }

    /// Documents published by pipelines that already ran this pass.
    pub fn documents(&self) -> &DocumentCollection {
        &self.env.documents
    }

    pub fn pipeline_name(&self) -> &str {
        self.pipeline
    }

    pub fn module_name(&self) -> &str {
        self.module
    }

    /// Sub-execution nesting level; 0 for a pipeline's own modules.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The inputs of the current invocation.
    pub fn inputs(&self) -> &[Document] {
        self.inputs
    }

    /// A new document whose metadata falls back to the pipeline settings.
    pub fn new_document<K, V>(
        &self,
        source: Option<FilePath>,
        content: impl Into<Content>,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Document
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Document::new(source, content, self.settings.child(entries))
    }

    /// Run a child module chain one level deeper.
    ///
    /// With explicit `inputs` the chain receives exactly those. Without,
    /// it receives the current input when there is exactly one, otherwise a
    /// single empty document.
    pub fn execute(
        &self,
        modules: &[Arc<dyn Module>],
        inputs: Option<&[Document]>,
    ) -> Result<Vec<Document>, ModuleError> {
        let inputs = match inputs {
            Some(docs) => docs.to_vec(),
            None if self.inputs.len() == 1 => self.inputs.to_vec(),
            None => vec![Document::empty(self.settings.clone())],
        };
        run_modules(
            self.env,
            self.pipeline,
            self.settings,
            modules,
            inputs,
            self.depth + 1,
        )
        .map_err(|failure| ModuleError::Child {
            module: failure.module,
            error: Box::new(failure.error),
        })
    }
}
