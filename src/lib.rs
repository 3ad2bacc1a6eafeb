//! kbqa library
//!
//! Question answering over a local text knowledge base.
//!
//! # Modules
//!
//! - `core`: configuration, knowledge file loading, paths, errors
//! - `search`: chunking, embeddings, SQLite vector store, retrieval
//! - `provider`: OpenAI-compatible HTTP client and chat answer generation
//! - `qa`: startup wiring, retrieval + generation pipeline, interactive session

pub mod core;
pub mod provider;
pub mod qa;
pub mod search;

// Re-exports for convenience
pub use crate::core::config::{load_credential, validate_credential, Config, Credential};
pub use crate::core::document::{load_documents, Document};
pub use crate::core::error::{QueryError, ServiceError, SetupError};
pub use crate::core::paths::ProjectPaths;
pub use qa::{build_pipeline, Answer, QueryPipeline, RetrievalQa, Session};
