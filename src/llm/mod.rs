pub mod completion;
pub mod embeddings;
