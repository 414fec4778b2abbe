//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Build
//!
//! One line per pipeline in execution order, failures expanded underneath,
//! then the cache line and a totals line:
//!
//! ```text
//! Pass 1
//! 001 content → 12 documents (34ms)
//! 002 feed → failed in WriteFiles
//!     Error: /site/input/a.md: File system error: ...
//! 003 assets → 3 documents (2ms)
//!
//! Cache: 5 cached, 2 computed (7 lookups), 7 entries
//! Built 15 documents in 2 of 3 pipelines (40ms)
//! ```
//!
//! ## Check
//!
//! ```text
//! Inputs
//!     input
//!     theme
//! Output
//!     output
//!
//! Pipelines
//! 001 content
//!     read_files: **/*.md, !drafts/**
//!     write_files → .html
//! 002 feed (process once)
//!     from_pipeline: content
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::{FolioConfig, ModuleConfig};
use crate::engine::ExecutionSummary;
use std::time::Duration;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    if ms >= 10_000 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else {
        format!("{ms}ms")
    }
}

pub fn format_summary(summary: &ExecutionSummary) -> Vec<String> {
    let mut lines = vec![format!("Pass {}", summary.pass)];
    for (i, outcome) in summary.pipelines.iter().enumerate() {
        let header = format!("{} {}", format_index(i + 1), outcome.name);
        match &outcome.failure {
            None => lines.push(format!(
                "{} → {} ({})",
                header,
                plural(outcome.documents, "document"),
                format_elapsed(outcome.elapsed)
            )),
            Some((module, message)) => {
                lines.push(format!("{header} → failed in {module}"));
                lines.push(format!("{}Error: {}", indent(1), message));
                if outcome.documents > 0 {
                    lines.push(format!(
                        "{}Kept {} from the previous pass",
                        indent(1),
                        plural(outcome.documents, "document")
                    ));
                }
            }
        }
    }
    lines.push(String::new());
    lines.push(format!("Cache: {}", summary.cache));

    let succeeded = summary.pipelines.len() - summary.failures().count();
    lines.push(format!(
        "Built {} in {} of {} ({})",
        plural(summary.total_documents(), "document"),
        succeeded,
        plural(summary.pipelines.len(), "pipeline"),
        format_elapsed(summary.elapsed)
    ));
    lines
}

pub fn print_summary(summary: &ExecutionSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}

fn module_line(module: &ModuleConfig) -> String {
    match module {
        ModuleConfig::ReadFiles { patterns } => format!("read_files: {}", patterns.join(", ")),
        ModuleConfig::CopyFiles { patterns } => format!("copy_files: {}", patterns.join(", ")),
        ModuleConfig::WriteFiles { extension: Some(ext) } => {
            format!("write_files → .{}", ext.trim_start_matches('.'))
        }
        ModuleConfig::WriteFiles { extension: None } => "write_files".to_string(),
        ModuleConfig::SetMetadata { key, value } => format!("set_metadata: {key} = {value}"),
        ModuleConfig::FromPipeline { pipelines } => format!("from_pipeline: {}", pipelines.join(", ")),
    }
}

pub fn format_config(config: &FolioConfig) -> Vec<String> {
    let mut lines = vec!["Inputs".to_string()];
    lines.extend(config.input.iter().map(|p| format!("{}{}", indent(1), p)));
    lines.push("Output".to_string());
    lines.push(format!("{}{}", indent(1), config.output));
    lines.push(String::new());

    lines.push("Pipelines".to_string());
    if config.pipelines.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    for (i, pipeline) in config.pipelines.iter().enumerate() {
        let once = if pipeline.process_documents_once {
            " (process once)"
        } else {
            ""
        };
        lines.push(format!("{} {}{}", format_index(i + 1), pipeline.name, once));
        for module in &pipeline.modules {
            lines.push(format!("{}{}", indent(1), module_line(module)));
        }
    }
    lines
}

pub fn print_config(config: &FolioConfig) {
    for line in format_config(config) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStats;
    use crate::engine::PipelineOutcome;

    fn outcome(name: &str, documents: usize, failure: Option<(&str, &str)>) -> PipelineOutcome {
        PipelineOutcome {
            name: name.to_string(),
            documents,
            elapsed: Duration::from_millis(5),
            failure: failure.map(|(m, e)| (m.to_string(), e.to_string())),
        }
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn elapsed_switches_to_seconds() {
        assert_eq!(format_elapsed(Duration::from_millis(34)), "34ms");
        assert_eq!(format_elapsed(Duration::from_millis(12_340)), "12.3s");
    }

    #[test]
    fn summary_lists_pipelines_and_failures() {
        let summary = ExecutionSummary {
            pass: 2,
            pipelines: vec![
                outcome("content", 12, None),
                outcome("feed", 0, Some(("WriteFiles", "boom"))),
                outcome("assets", 1, None),
            ],
            elapsed: Duration::from_millis(40),
            cache: CacheStats {
                hits: 5,
                misses: 2,
                entries: 7,
                evicted: 0,
            },
        };
        let lines = format_summary(&summary);
        assert_eq!(lines[0], "Pass 2");
        assert_eq!(lines[1], "001 content → 12 documents (5ms)");
        assert_eq!(lines[2], "002 feed → failed in WriteFiles");
        assert_eq!(lines[3], "    Error: boom");
        assert_eq!(lines[4], "003 assets → 1 document (5ms)");
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "Cache: 5 cached, 2 computed (7 lookups), 7 entries");
        assert_eq!(lines[7], "Built 13 documents in 2 of 3 pipelines (40ms)");
    }

    #[test]
    fn summary_mentions_retained_documents() {
        let summary = ExecutionSummary {
            pass: 3,
            pipelines: vec![outcome("once", 4, Some(("Flaky", "down")))],
            elapsed: Duration::from_millis(1),
            cache: CacheStats::default(),
        };
        let lines = format_summary(&summary);
        assert_eq!(lines[3], "    Kept 4 documents from the previous pass");
    }

    #[test]
    fn config_view() {
        let config: FolioConfig = toml::from_str(
            r#"
input = ["input", "theme"]

[[pipelines]]
name = "content"
modules = [
  { type = "read_files", patterns = ["**/*.md", "!drafts/**"] },
  { type = "write_files", extension = "html" },
]

[[pipelines]]
name = "feed"
process_documents_once = true
modules = [{ type = "from_pipeline", pipelines = ["content"] }]
"#,
        )
        .unwrap();
        let lines = format_config(&config);
        assert_eq!(
            lines,
            vec![
                "Inputs",
                "    input",
                "    theme",
                "Output",
                "    output",
                "",
                "Pipelines",
                "001 content",
                "    read_files: **/*.md, !drafts/**",
                "    write_files → .html",
                "002 feed (process once)",
                "    from_pipeline: content",
            ]
        );
    }
}
