//! # datasheet-rag
//!
//! Question answering over a small set of technical datasheets. Each question
//! is routed to the one document most likely to hold the answer, retrieval is
//! restricted to that document, and the answer is generated from the
//! retrieved passages alone.
//!
//! ## Architecture
//!
//! ```text
//!                       ┌──────────────────────────┐
//!                       │ Question + requested scope│
//!                       └────────────┬─────────────┘
//!                                    │
//!                  "auto"?  ┌────────┴────────┐  explicit scope
//!                    ┌──────┘                 └──────┐
//!                    ▼                               ▼
//!          ┌──────────────────┐            ┌──────────────────┐
//!          │   Query Router   │            │ Catalog check    │
//!          │ LLM, closed label│            │ (strict: reject  │
//!          │ set, few-shot    │            │  unknown ids)    │
//!          │ failure→unscoped │            └────────┬─────────┘
//!          └────────┬─────────┘                     │
//!                   └──────────────┬────────────────┘
//!                                  │ resolved scope
//!                                  ▼
//!                     ┌──────────────────────────┐
//!                     │    Scoped Retriever      │
//!                     │ top-k, source == scope   │
//!                     │ no global fallback       │
//!                     └────────────┬─────────────┘
//!                                  │ ≤ k passages
//!                                  ▼
//!                     ┌──────────────────────────┐
//!                     │   Context Formatter      │
//!                     │ passages joined by "\n\n"│
//!                     └────────────┬─────────────┘
//!                                  ▼
//!                     ┌──────────────────────────┐
//!                     │   Answer Synthesizer     │
//!                     │ grounded prompt, temp 0  │
//!                     └────────────┬─────────────┘
//!                                  ▼
//!                  answer + sources + scope + routed
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for paths, retrieval, chunking and LLM settings
//! - [`error`] - `RagError`, the failure taxonomy of the question-answering core
//! - [`models`] - Passages, chat messages, `AskResult` and HTTP request/response types
//! - [`chunking`] - Recursive character splitter with overlap
//! - [`ingest`] - PDF / text loading, splitting and embedding into the vector store
//! - [`llm::completion`] - Chat completion client for Ollama or OpenAI-compatible APIs
//! - [`llm::embeddings`] - Batch embeddings over HTTP, or an offline hashing embedder
//! - [`search::vector`] - In-memory vector store with cosine similarity and disk persistence
//! - [`search`] - The `VectorIndex` contract and metadata filters
//! - [`rag`] - Scope catalog, prompt templates, router, retriever, synthesizer and pipeline
//! - [`eval`] - Scenario runner producing a JSON hit-rate report
//! - [`api`] - Axum handlers for `/chat`, `/api/scopes` and `/health`
//! - [`state`] - Shared application state wiring the pipeline together

pub mod api;
pub mod chunking;
pub mod config;
pub mod error;
pub mod eval;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod rag;
pub mod search;
pub mod state;
