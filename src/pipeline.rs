//! Named pipelines and the cross-pipeline document collection.

use crate::document::Document;
use crate::metadata::Value;
use crate::module::Module;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A named, ordered list of modules executed once per engine pass.
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    modules: Vec<Arc<dyn Module>>,
    process_documents_once: bool,
    settings: Vec<(String, Value)>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: Vec::new(),
            process_documents_once: false,
            settings: Vec::new(),
        }
    }

    pub fn with_module(mut self, module: impl Module + 'static) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    pub fn with_modules(mut self, modules: impl IntoIterator<Item = Arc<dyn Module>>) -> Self {
        self.modules.extend(modules);
        self
    }

    /// On later passes, feed the pipeline its own previous output instead
    /// of a fresh seed document.
    pub fn process_documents_once(mut self, once: bool) -> Self {
        self.process_documents_once = once;
        self
    }

    /// A setting visible to this pipeline's documents only.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.push((key.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modules(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }

    pub fn is_process_documents_once(&self) -> bool {
        self.process_documents_once
    }

    pub fn settings(&self) -> &[(String, Value)] {
        &self.settings
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("modules", &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>())
            .field("process_documents_once", &self.process_documents_once)
            .finish()
    }
}

/// Results of completed pipelines for the current pass, in publication
/// order.
///
/// A pipeline's results appear only once the whole pipeline has finished,
/// so its own modules never observe them within the same pass, while every
/// later pipeline does.
#[derive(Default)]
pub struct DocumentCollection {
    published: RwLock<Vec<(String, Arc<[Document]>)>>,
}

impl DocumentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<(String, Arc<[Document]>)>> {
        self.published.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<(String, Arc<[Document]>)>> {
        self.published.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Publish `documents` under `pipeline`, replacing an earlier result.
    pub fn publish(&self, pipeline: &str, documents: Vec<Document>) {
        let documents: Arc<[Document]> = documents.into();
        let mut published = self.write();
        match published.iter_mut().find(|(name, _)| name == pipeline) {
            Some(slot) => slot.1 = documents,
            None => published.push((pipeline.to_string(), documents)),
        }
    }

    pub fn get(&self, pipeline: &str) -> Option<Arc<[Document]>> {
        self.read()
            .iter()
            .find(|(name, _)| name == pipeline)
            .map(|(_, docs)| Arc::clone(docs))
    }

    pub fn contains(&self, pipeline: &str) -> bool {
        self.get(pipeline).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.read().iter().map(|(name, _)| name.clone()).collect()
    }

    /// Every published document, grouped by pipeline in publication order.
    pub fn all(&self) -> Vec<Document> {
        self.read()
            .iter()
            .flat_map(|(_, docs)| docs.iter().cloned())
            .collect()
    }

    /// Published documents of every pipeline except `pipeline`.
    pub fn except(&self, pipeline: &str) -> Vec<Document> {
        self.read()
            .iter()
            .filter(|(name, _)| name != pipeline)
            .flat_map(|(_, docs)| docs.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}

impl fmt::Debug for DocumentCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.read().iter().map(|(name, docs)| (name.clone(), docs.len())))
            .finish()
    }
}
