//! Built-in modules.
//!
//! | Module | Inputs | Output |
//! |--------|--------|--------|
//! | [`ReadFiles`] | ignored | one document per matched input file |
//! | [`WriteFiles`] | documents | the same documents, written to the output root |
//! | [`CopyFiles`] | ignored | one document per file copied to the output root |
//! | [`SetMetadata`] | documents | the same documents with one value overlaid |
//! | [`FromPipeline`] | ignored | documents published by named pipelines |
//! | [`Concat`] | documents | the inputs followed by a child chain's output |

mod concat;
mod copy_files;
mod from_pipeline;
mod read_files;
mod set_metadata;
mod write_files;

pub use concat::Concat;
pub use copy_files::CopyFiles;
pub use from_pipeline::FromPipeline;
pub use read_files::ReadFiles;
pub use set_metadata::SetMetadata;
pub use write_files::WriteFiles;
