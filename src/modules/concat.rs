//! Append the output of a child module chain to the inputs.

use crate::context::ExecutionContext;
use crate::document::Document;
use crate::module::{Module, ModuleError};
use std::fmt;
use std::sync::Arc;

/// Runs its child modules through sub-execution and returns the inputs
/// followed by whatever the children produced. The children get the
/// default sub-execution input: the single current input, or one empty
/// document.
pub struct Concat {
    modules: Vec<Arc<dyn Module>>,
}

impl Concat {
    pub fn new(modules: impl IntoIterator<Item = Arc<dyn Module>>) -> Self {
        Self {
            modules: modules.into_iter().collect(),
        }
    }
}

impl Module for Concat {
    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, ModuleError> {
        let mut out = inputs.to_vec();
        out.extend(ctx.execute(&self.modules, None)?);
        Ok(out)
    }
}

impl fmt::Debug for Concat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Concat")
            .field("modules", &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::io::{FileSystem, MemoryFileProvider};
    use crate::module::FnModule;
    use crate::modules::ReadFiles;
    use crate::pipeline::Pipeline;

    #[test]
    fn appends_child_output() {
        let provider = MemoryFileProvider::new();
        provider.add_file("/site/input/a.md", "a").add_file("/site/input/b.css", "b");
        let fs = FileSystem::with_provider(Arc::new(provider), "/site");
        let mut engine = Engine::new(fs);
        let css: Arc<dyn Module> = Arc::new(ReadFiles::new(&["*.css"]).unwrap());
        engine
            .add_pipeline(
                Pipeline::new("p")
                    .with_module(ReadFiles::new(&["*.md"]).unwrap())
                    .with_module(Concat::new([css])),
            )
            .unwrap();
        engine.execute().unwrap();
        let texts: Vec<_> = engine
            .documents()
            .get("p")
            .unwrap()
            .iter()
            .map(|d| d.text().into_owned())
            .collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn child_errors_surface_with_module_name() {
        let fs = FileSystem::with_provider(Arc::new(MemoryFileProvider::new()), "/site");
        let mut engine = Engine::new(fs);
        let broken: Arc<dyn Module> =
            Arc::new(FnModule::new("broken", |_, _| Err(ModuleError::failed("nope"))));
        engine
            .add_pipeline(Pipeline::new("p").with_module(Concat::new([broken])))
            .unwrap();
        let summary = engine.execute().unwrap();
        let (module, message) = summary.pipelines[0].failure.clone().unwrap();
        assert_eq!(module, "Concat");
        assert!(message.contains("broken"));
    }
}
