//! Project configuration module.
//!
//! Handles loading, validating, and turning `folio.toml` into a ready
//! [`Engine`]. The user file is sparse: it is merged on top of the stock
//! defaults, so it only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! `folio.toml` lives in the project root. Relative input and output paths
//! resolve against that root:
//!
//! ```text
//! my-site/
//! ├── folio.toml
//! ├── input/        # first input root
//! ├── theme/        # second input root, shadowed by input/
//! └── output/       # output root
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! input = ["input", "theme"]   # ordered input roots, first wins
//! output = "output"            # single output root
//! clean_output = false         # empty the output root before each pass
//! failure_policy = "continue"  # or "abort"
//! cache = true                 # false runs every module uncached
//!
//! [processing]
//! max_threads = 4              # omit for all cores
//!
//! [settings]                   # engine-wide metadata
//! site_title = "My Site"
//!
//! [[pipelines]]
//! name = "content"
//! process_documents_once = false
//! settings = { layout = "post" }
//! modules = [
//!   { type = "read_files", patterns = ["**/*.md", "!drafts/**"] },
//!   { type = "write_files", extension = "html" },
//! ]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::engine::{Engine, FailurePolicy};
use crate::io::{DirectoryPath, FileSystem, Globber};
use crate::metadata::{Metadata, Value};
use crate::module::Module;
use crate::modules::{CopyFiles, FromPipeline, ReadFiles, SetMetadata, WriteFiles};
use crate::pipeline::Pipeline;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILENAME: &str = "folio.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `folio.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FolioConfig {
    /// Input roots in probe order.
    pub input: Vec<String>,
    /// Output root.
    pub output: String,
    /// Delete the output root before each pass.
    pub clean_output: bool,
    /// What a failing pipeline does to the rest of the pass.
    pub failure_policy: FailurePolicy,
    /// `false` gives every module a disabled cache.
    pub cache: bool,
    pub processing: ProcessingConfig,
    /// Engine-wide metadata settings.
    pub settings: toml::Table,
    pub pipelines: Vec<PipelineConfig>,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            input: vec!["input".to_string()],
            output: "output".to_string(),
            clean_output: false,
            failure_policy: FailurePolicy::Continue,
            cache: true,
            processing: ProcessingConfig::default(),
            settings: toml::Table::new(),
            pipelines: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub process_documents_once: bool,
    /// Settings visible only to this pipeline's documents.
    #[serde(default)]
    pub settings: toml::Table,
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

/// One built-in module, selected by its `type` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ModuleConfig {
    ReadFiles {
        patterns: Vec<String>,
    },
    WriteFiles {
        #[serde(default)]
        extension: Option<String>,
    },
    CopyFiles {
        patterns: Vec<String>,
    },
    SetMetadata {
        key: String,
        value: toml::Value,
    },
    FromPipeline {
        pipelines: Vec<String>,
    },
}

impl ModuleConfig {
    pub fn build(&self) -> Result<Arc<dyn Module>, ConfigError> {
        let invalid = |e: crate::module::ModuleError| ConfigError::Validation(e.to_string());
        let module: Arc<dyn Module> = match self {
            ModuleConfig::ReadFiles { patterns } => Arc::new(ReadFiles::new(patterns).map_err(invalid)?),
            ModuleConfig::WriteFiles { extension } => Arc::new(match extension {
                Some(ext) => WriteFiles::with_extension(ext.as_str()),
                None => WriteFiles::new(),
            }),
            ModuleConfig::CopyFiles { patterns } => Arc::new(CopyFiles::new(patterns).map_err(invalid)?),
            ModuleConfig::SetMetadata { key, value } => {
                Arc::new(SetMetadata::new(key.as_str(), toml_to_value(value)))
            }
            ModuleConfig::FromPipeline { pipelines } => Arc::new(FromPipeline::new(pipelines.iter().cloned())),
        };
        Ok(module)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of worker threads for per-document work.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

impl FolioConfig {
    /// Validate values the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.is_empty() {
            return Err(ConfigError::Validation("input must list at least one root".into()));
        }
        if self.input.iter().any(|p| p.trim().is_empty()) || self.output.trim().is_empty() {
            return Err(ConfigError::Validation("input and output paths must not be empty".into()));
        }
        if self.processing.max_threads == Some(0) {
            return Err(ConfigError::Validation("processing.max_threads must be at least 1".into()));
        }

        let names: HashSet<&str> = self.pipelines.iter().map(|p| p.name.as_str()).collect();
        let mut seen = HashSet::new();
        for pipeline in &self.pipelines {
            if pipeline.name.trim().is_empty() {
                return Err(ConfigError::Validation("pipeline names must not be empty".into()));
            }
            if !seen.insert(pipeline.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate pipeline name '{}'",
                    pipeline.name
                )));
            }
            for module in &pipeline.modules {
                validate_module(&pipeline.name, module, &names)?;
            }
        }
        Ok(())
    }

    /// Build an engine rooted at `root`. Relative paths in the config
    /// resolve against it.
    pub fn build_engine(&self, root: &Path) -> Result<Engine, ConfigError> {
        let root = std::path::absolute(root)?;
        let fs = FileSystem::local(DirectoryPath::new(root.to_string_lossy()))
            .with_input_paths(self.input.iter().map(String::as_str))
            .with_output_path(self.output.as_str());

        let mut engine = Engine::new(fs)
            .with_settings(Metadata::from_entries(table_entries(&self.settings)))
            .with_failure_policy(self.failure_policy)
            .with_clean_output(self.clean_output)
            .with_cache(self.cache)
            .with_max_threads(effective_threads(&self.processing));

        for config in &self.pipelines {
            let mut pipeline = Pipeline::new(config.name.as_str())
                .process_documents_once(config.process_documents_once);
            for (key, value) in table_entries(&config.settings) {
                pipeline = pipeline.with_setting(key, value);
            }
            let modules = config
                .modules
                .iter()
                .map(ModuleConfig::build)
                .collect::<Result<Vec<_>, _>>()?;
            engine
                .add_pipeline(pipeline.with_modules(modules))
                .map_err(|e| ConfigError::Validation(e.to_string()))?;
        }
        Ok(engine)
    }
}

fn validate_module(
    pipeline: &str,
    module: &ModuleConfig,
    names: &HashSet<&str>,
) -> Result<(), ConfigError> {
    let invalid = |msg: String| ConfigError::Validation(format!("pipeline '{pipeline}': {msg}"));
    match module {
        ModuleConfig::ReadFiles { patterns } | ModuleConfig::CopyFiles { patterns } => {
            if patterns.is_empty() {
                return Err(invalid("file modules need at least one pattern".into()));
            }
            Globber::new(patterns).map_err(|e| invalid(e.to_string()))?;
        }
        ModuleConfig::SetMetadata { key, .. } if key.is_empty() => {
            return Err(invalid("set_metadata key must not be empty".into()));
        }
        ModuleConfig::FromPipeline { pipelines } => {
            if let Some(unknown) = pipelines.iter().find(|p| !names.contains(p.as_str())) {
                return Err(invalid(format!("from_pipeline names unknown pipeline '{unknown}'")));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Convert a TOML value into a metadata value. Datetimes become strings.
pub fn toml_to_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_value).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_value(v)))
                .collect(),
        ),
    }
}

fn table_entries(table: &toml::Table) -> Vec<(String, Value)> {
    table
        .iter()
        .map(|(k, v)| (k.clone(), toml_to_value(v)))
        .collect()
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(FolioConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so a user
///   `[[pipelines]]` list replaces the stock one rather than extending it.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `folio.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `folio.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<FolioConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: FolioConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `folio.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<FolioConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `folio.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Folio Configuration
# ===================
# All top-level settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Input roots, probed in order. A file in an earlier root shadows the file
# with the same relative path in a later one (e.g. ["input", "theme"]).
input = ["input"]

# Output root. Every write lands under this directory.
output = "output"

# Delete the output root before each build pass.
clean_output = false

# What happens when a pipeline fails:
#   "continue" - report the failure and run the remaining pipelines
#   "abort"    - stop the pass at the first failing pipeline
failure_policy = "continue"

# Set to false to run every module without its execution cache.
cache = true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum worker threads for per-document work.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_threads = 4

# ---------------------------------------------------------------------------
# Settings
# ---------------------------------------------------------------------------
# Engine-wide metadata. Every document falls back to these values.
[settings]
# site_title = "My Site"

# ---------------------------------------------------------------------------
# Pipelines
# ---------------------------------------------------------------------------
# Pipelines run in the order declared. Each one sees the published output of
# the pipelines before it. Module types:
#   read_files    { patterns = [...] }        read matching input files
#   write_files   { extension = "html" }      write documents to the output root
#   copy_files    { patterns = [...] }        copy matching files unchanged
#   set_metadata  { key = "...", value = ... }
#   from_pipeline { pipelines = [...] }       documents of earlier pipelines
#
# Patterns support *, **, ?, [a-z], {a,b} and a leading ! for exclusions.
#
# [[pipelines]]
# name = "content"
# process_documents_once = false
# settings = { layout = "post" }
# modules = [
#   { type = "read_files", patterns = ["**/*.md", "!drafts/**"] },
#   { type = "write_files", extension = "html" },
# ]
#
# [[pipelines]]
# name = "assets"
# modules = [
#   { type = "copy_files", patterns = ["assets/**"] },
# ]
"##
}
