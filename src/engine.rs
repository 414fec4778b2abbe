//! Drives build passes over the configured pipelines.
//!
//! ## One pass
//!
//! ```text
//! Idle ──execute()──► Running(0/N) ─► Running(1/N) ─► … ─► Completed
//!                          │
//!                          └── module error + Abort policy ───► Failed
//! ```
//!
//! At the start of a pass the document collection is emptied and every
//! module cache's hit flags are reset. Pipelines then run strictly in
//! declaration order; each one's result set is published under its name
//! once all its modules finish, so only later pipelines see it. At the end
//! of the pass cache entries that were not touched are evicted.
//!
//! ## Inputs
//!
//! A pipeline normally starts from a single empty seed document; reading
//! modules ignore it and produce their own. A pipeline marked
//! `process_documents_once` instead receives its own output from the
//! previous pass when there is one.
//!
//! ## Failures
//!
//! A module error aborts its pipeline. With [`FailurePolicy::Continue`]
//! (the default) the error is recorded in the [`ExecutionSummary`] and the
//! next pipeline runs; with [`FailurePolicy::Abort`] the pass stops and the
//! error is returned. A failed `process_documents_once` pipeline republishes
//! its last good output so downstream pipelines still have something to
//! consume.
//!
//! ## Parallelism
//!
//! Pipelines run one after another on the calling thread. Modules fan their
//! per-document work out with rayon; the engine installs its own pool so
//! `max_threads` bounds that work.

use crate::cache::{CacheManager, CacheStats};
use crate::context::{Environment, run_modules};
use crate::document::Document;
use crate::io::{FileSystem, FsError};
use crate::metadata::Metadata;
use crate::module::ModuleError;
use crate::pipeline::{DocumentCollection, Pipeline};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Pipeline '{pipeline}' failed in module '{module}': {source}")]
    Pipeline {
        pipeline: String,
        module: String,
        source: ModuleError,
    },
    #[error("Duplicate pipeline name: {0}")]
    DuplicatePipeline(String),
    #[error("File system error: {0}")]
    FileSystem(#[from] FsError),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// What happens to the rest of a pass when a pipeline fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the failure and run the remaining pipelines.
    #[default]
    Continue,
    /// Stop the pass and return the error.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running { index: usize, total: usize },
    Completed,
    Failed,
}

/// Result of one pipeline within a pass.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub name: String,
    pub documents: usize,
    pub elapsed: Duration,
    /// Set when the pipeline failed: failing module and error message.
    pub failure: Option<(String, String)>,
}

/// Result of one engine pass.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    pub pass: u64,
    pub pipelines: Vec<PipelineOutcome>,
    pub elapsed: Duration,
    pub cache: CacheStats,
}

impl ExecutionSummary {
    pub fn has_failures(&self) -> bool {
        self.pipelines.iter().any(|p| p.failure.is_some())
    }

    pub fn failures(&self) -> impl Iterator<Item = &PipelineOutcome> {
        self.pipelines.iter().filter(|p| p.failure.is_some())
    }

    pub fn total_documents(&self) -> usize {
        self.pipelines.iter().map(|p| p.documents).sum()
    }
}

pub struct Engine {
    env: Environment,
    settings: Metadata,
    pipelines: Vec<Pipeline>,
    policy: FailurePolicy,
    clean_output: bool,
    max_threads: Option<usize>,
    state: EngineState,
    previous: HashMap<String, Vec<Document>>,
    passes: u64,
}

impl Engine {
    pub fn new(fs: FileSystem) -> Self {
        Self {
            env: Environment {
                fs,
                caches: CacheManager::new(true),
                documents: DocumentCollection::new(),
            },
            settings: Metadata::new(),
            pipelines: Vec::new(),
            policy: FailurePolicy::default(),
            clean_output: false,
            max_threads: None,
            state: EngineState::Idle,
            previous: HashMap::new(),
            passes: 0,
        }
    }

    /// Engine-wide settings; the outermost metadata layer every document
    /// falls back to.
    pub fn with_settings(mut self, settings: Metadata) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clean_output(mut self, clean: bool) -> Self {
        self.clean_output = clean;
        self
    }

    /// `false` runs every module against a disabled cache.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.env.caches = CacheManager::new(enabled);
        self
    }

    pub fn with_max_threads(mut self, threads: usize) -> Self {
        self.max_threads = Some(threads);
        self
    }

    pub fn add_pipeline(&mut self, pipeline: Pipeline) -> Result<(), EngineError> {
        if self.pipelines.iter().any(|p| p.name() == pipeline.name()) {
            return Err(EngineError::DuplicatePipeline(pipeline.name().to_string()));
        }
        self.pipelines.push(pipeline);
        Ok(())
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn file_system(&self) -> &FileSystem {
        &self.env.fs
    }

    pub fn settings(&self) -> &Metadata {
        &self.settings
    }

    pub fn caches(&self) -> &CacheManager {
        &self.env.caches
    }

    /// Documents published during the most recent pass.
    pub fn documents(&self) -> &DocumentCollection {
        &self.env.documents
    }

    /// Run one pass over every pipeline.
    pub fn execute(&mut self) -> Result<ExecutionSummary, EngineError> {
        let started = Instant::now();
        self.passes += 1;
        let pass = self.passes;
        let total = self.pipelines.len();
        info!(pass, pipelines = total, "starting pass");

        self.env.documents.clear();
        self.env.caches.reset_entry_hits();

        if self.clean_output {
            if let Err(e) = self.env.fs.clean_output() {
                self.state = EngineState::Failed;
                return Err(e.into());
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_threads.unwrap_or(0))
            .build();
        let pool = match pool {
            Ok(pool) => pool,
            Err(e) => {
                self.state = EngineState::Failed;
                return Err(e.into());
            }
        };

        let mut outcomes = Vec::with_capacity(total);
        let mut aborted = None;

        for (index, pipeline) in self.pipelines.iter().enumerate() {
            self.state = EngineState::Running { index, total };
            let name = pipeline.name();
            let pipeline_started = Instant::now();
            let settings = self.settings.child(pipeline.settings().iter().cloned());

            let previous = self
                .previous
                .get(name)
                .filter(|_| pipeline.is_process_documents_once());
            let inputs = match previous {
                Some(docs) => docs.clone(),
                None => vec![Document::empty(settings.clone())],
            };
            info!(pipeline = name, documents = inputs.len(), "executing pipeline");

            let result = pool.install(|| {
                run_modules(&self.env, name, &settings, pipeline.modules(), inputs, 0)
            });

            match result {
                Ok(documents) => {
                    info!(
                        pipeline = name,
                        documents = documents.len(),
                        elapsed_ms = pipeline_started.elapsed().as_millis() as u64,
                        "executed pipeline"
                    );
                    outcomes.push(PipelineOutcome {
                        name: name.to_string(),
                        documents: documents.len(),
                        elapsed: pipeline_started.elapsed(),
                        failure: None,
                    });
                    if pipeline.is_process_documents_once() {
                        self.previous.insert(name.to_string(), documents.clone());
                    }
                    self.env.documents.publish(name, documents);
                }
                Err(failure) => {
                    error!(
                        pipeline = name,
                        module = failure.module.as_str(),
                        error = %failure.error,
                        "pipeline failed"
                    );
                    let retained = self
                        .previous
                        .get(name)
                        .filter(|_| pipeline.is_process_documents_once());
                    if let Some(docs) = retained {
                        warn!(pipeline = name, documents = docs.len(), "republishing previous output");
                        self.env.documents.publish(name, docs.clone());
                    }
                    outcomes.push(PipelineOutcome {
                        name: name.to_string(),
                        documents: retained.map_or(0, Vec::len),
                        elapsed: pipeline_started.elapsed(),
                        failure: Some((failure.module.clone(), failure.error.to_string())),
                    });
                    if self.policy == FailurePolicy::Abort {
                        aborted = Some(EngineError::Pipeline {
                            pipeline: name.to_string(),
                            module: failure.module,
                            source: failure.error,
                        });
                        break;
                    }
                }
            }
        }

        let evicted = self.env.caches.clear_unhit_entries();

        if let Some(err) = aborted {
            self.state = EngineState::Failed;
            return Err(err);
        }

        let mut cache = self.env.caches.stats();
        cache.evicted = evicted as u64;
        self.state = EngineState::Completed;
        let summary = ExecutionSummary {
            pass,
            pipelines: outcomes,
            elapsed: started.elapsed(),
            cache,
        };
        info!(
            pass,
            documents = summary.total_documents(),
            failed = summary.failures().count(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "finished pass"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("fs", &self.env.fs)
            .field("pipelines", &self.pipelines)
            .field("policy", &self.policy)
            .field("state", &self.state)
            .finish()
    }
}
