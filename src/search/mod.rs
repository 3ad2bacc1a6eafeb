//! Retrieval over the knowledge base
//!
//! Chunking, embedding, the SQLite vector store and the index that ties
//! them together.

pub mod chunker;
pub mod embedding;
pub mod index;
pub mod vectordb;

pub use chunker::Chunker;
pub use embedding::{Embedder, HarmonicEmbedder, OpenAiEmbedder};
pub use index::{IndexOutcome, KnowledgeIndex, ScoredPassage};
pub use vectordb::VectorDB;
