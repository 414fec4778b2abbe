//! Add or replace one metadata value on every document.

use crate::context::ExecutionContext;
use crate::document::Document;
use crate::metadata::Value;
use crate::module::{Module, ModuleError};

#[derive(Debug, Clone)]
pub struct SetMetadata {
    key: String,
    value: Value,
}

impl SetMetadata {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Module for SetMetadata {
    fn execute(
        &self,
        inputs: &[Document],
        _ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, ModuleError> {
        Ok(inputs
            .iter()
            .map(|doc| doc.with_metadata([(self.key.as_str(), self.value.clone())]))
            .collect())
    }
}
