//! Pull the published results of other pipelines.

use crate::context::ExecutionContext;
use crate::document::Document;
use crate::module::{Module, ModuleError};
use tracing::warn;

/// Outputs the documents published by the named pipelines, in the order
/// the names are given. Only pipelines that already ran this pass have
/// published anything; naming any other pipeline contributes nothing.
#[derive(Debug, Clone)]
pub struct FromPipeline {
    pipelines: Vec<String>,
}

impl FromPipeline {
    pub fn new<S: Into<String>>(pipelines: impl IntoIterator<Item = S>) -> Self {
        Self {
            pipelines: pipelines.into_iter().map(Into::into).collect(),
        }
    }
}

impl Module for FromPipeline {
    fn execute(
        &self,
        _inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, ModuleError> {
        let mut out = Vec::new();
        for name in &self.pipelines {
            match ctx.documents().get(name) {
                Some(docs) => out.extend(docs.iter().cloned()),
                None => warn!(
                    pipeline = ctx.pipeline_name(),
                    requested = name.as_str(),
                    "no published documents for pipeline"
                ),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::io::{FileSystem, MemoryFileProvider};
    use crate::module::FnModule;
    use crate::pipeline::Pipeline;
    use std::sync::Arc;

    fn emit(text: &'static str) -> FnModule {
        FnModule::new("emit", move |_, ctx| {
            Ok(vec![ctx.new_document(None, text, [("from", text)])])
        })
    }

    #[test]
    fn later_pipelines_see_earlier_results_only() {
        let fs = FileSystem::with_provider(Arc::new(MemoryFileProvider::new()), "/site");
        let mut engine = Engine::new(fs);
        engine.add_pipeline(Pipeline::new("a").with_module(emit("a"))).unwrap();
        engine
            .add_pipeline(Pipeline::new("b").with_module(FromPipeline::new(["a", "c", "b"])))
            .unwrap();
        engine.add_pipeline(Pipeline::new("c").with_module(emit("c"))).unwrap();
        engine.execute().unwrap();

        let b = engine.documents().get("b").unwrap();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].text(), "a");
    }
}
