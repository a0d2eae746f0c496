//! Scoped question answering: route, retrieve, format, synthesize.

pub mod context;
pub mod pipeline;
pub mod prompts;
pub mod retriever;
pub mod router;
pub mod scope;
pub mod synthesizer;

#[cfg(test)]
pub(crate) mod testing;

pub use pipeline::{Pipeline, PipelineOptions};
pub use scope::{RequestedScope, Scope, ScopeCatalog};
