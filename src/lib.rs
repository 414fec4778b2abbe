//! # Folio
//!
//! A pipeline-driven static content generator. A project declares named
//! pipelines; each pipeline is an ordered chain of modules that turns a
//! set of documents into another set. Reading modules pull files from the
//! input roots, later modules transform or annotate them, and writing
//! modules place the results under the output root.
//!
//! # Architecture: Pipelines of Modules
//!
//! ```text
//!                 ┌──────────── Engine pass ─────────────┐
//!  input roots →  │ pipeline 1: read → transform → write │ → published "1"
//!                 │ pipeline 2: from_pipeline(1) → …     │ → published "2"
//!                 └──────────────────────────────────────┘ → output root
//! ```
//!
//! Documents are immutable: content plus a layered metadata view. A
//! module never edits a document in place, it returns new ones derived
//! with [`Document::clone_with`]. Because of that, pipelines can share
//! published result sets freely and module caches can key on document
//! identity without worrying about later mutation.
//!
//! Every pass starts from an empty document collection. A pipeline's
//! output only becomes visible to later pipelines once all of its modules
//! have finished, so execution order is the declaration order and there
//! is no partial visibility.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`io`] | Normalized paths, file providers (local and in-memory), globbing, the multi-root [`FileSystem`] |
//! | [`metadata`] | Layered key/value metadata with typed conversion |
//! | [`document`] | The immutable [`Document`] and its content |
//! | [`module`] | The [`Module`] trait, module errors and closure adapters |
//! | [`modules`] | Built-in modules: read, write, copy, set metadata, from pipeline, concat |
//! | [`pipeline`] | [`Pipeline`] definitions and the published [`DocumentCollection`] |
//! | [`context`] | [`ExecutionContext`] handed to modules, including sub-execution |
//! | [`cache`] | Per-module execution caches with hit tracking and sweeping |
//! | [`engine`] | The [`Engine`] that runs passes and reports an [`ExecutionSummary`] |
//! | [`config`] | `folio.toml` loading, validation and engine construction |
//! | [`keys`] | Well-known metadata keys |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Caches Sweep Themselves
//!
//! Each module instance owns a cache. Entries that nobody reads or writes
//! during a pass are evicted at its end, so a long watch session does not
//! accumulate results for files that were deleted or renamed.
//!
//! ## First Input Root Wins
//!
//! Input roots are probed in order. A theme directory listed after the
//! project's own input directory supplies defaults that the project can
//! shadow file by file.

pub mod cache;
pub mod config;
pub mod context;
pub mod document;
pub mod engine;
pub mod io;
pub mod keys;
pub mod metadata;
pub mod module;
pub mod modules;
pub mod output;
pub mod pipeline;

pub use cache::{CacheManager, CacheStats, ExecutionCache};
pub use context::ExecutionContext;
pub use document::{Content, Document};
pub use engine::{Engine, EngineError, EngineState, ExecutionSummary, FailurePolicy};
pub use io::FileSystem;
pub use metadata::Metadata;
pub use module::{FnModule, MapModule, Module, ModuleError};
pub use pipeline::{DocumentCollection, Pipeline};
