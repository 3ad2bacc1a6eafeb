//! Knowledge index - chunking, embedding and the persisted vector store
//!
//! The index is rebuilt only when its fingerprint changes. The fingerprint
//! covers the knowledge text, the embedding model and the chunker settings,
//! so an edited knowledge file or a different model always triggers a full
//! rebuild, and an unchanged one is reused without any embedding calls.

use std::time::Duration;

use sha2::{Digest, Sha256};

use super::chunker::Chunker;
use super::embedding::Embedder;
use super::vectordb::{
    NewPassage, PassageRecord, VectorDB, META_BUILT_AT, META_EMBEDDING_MODEL, META_FINGERPRINT,
};
use crate::core::document::Document;
use crate::core::error::{QueryError, QueryStage, ServiceError, SetupError};

/// A retrieved passage with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage {
    pub source: String,
    pub chunk_index: usize,
    pub content: String,
    pub score: f32,
}

impl From<(PassageRecord, f32)> for ScoredPassage {
    fn from((record, score): (PassageRecord, f32)) -> Self {
        Self {
            source: record.source,
            chunk_index: record.chunk_index,
            content: record.content,
            score,
        }
    }
}

/// What happened when the index was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Reused { passages: usize },
    Rebuilt { passages: usize },
}

pub struct KnowledgeIndex {
    db: VectorDB,
    timeout: Duration,
}

/// SHA-256 over the documents, embedding model and chunker settings.
///
/// Documents are identified by file name only, so moving the project
/// directory keeps the index.
pub fn fingerprint(documents: &[Document], model_id: &str, chunker: &Chunker) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(format!("{:?}", chunker).as_bytes());
    for doc in documents {
        hasher.update([0u8]);
        let name = doc.source.file_name().unwrap_or(doc.source.as_os_str());
        hasher.update(name.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(doc.content.as_bytes());
    }
    hex::encode(hasher.finalize())
}

async fn embed_with_timeout(
    embedder: &dyn Embedder,
    texts: &[String],
    timeout: Duration,
) -> Result<Vec<Vec<f32>>, ServiceError> {
    match tokio::time::timeout(timeout, embedder.embed(texts)).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout {
            service: "embedding service",
            after: timeout,
        }),
    }
}

impl KnowledgeIndex {
    /// Open `db`, reusing its contents when the fingerprint matches, otherwise
    /// chunking and embedding `documents` and replacing the stored passages.
    pub async fn build(
        mut db: VectorDB,
        documents: &[Document],
        embedder: &dyn Embedder,
        chunker: &Chunker,
        timeout: Duration,
    ) -> Result<(Self, IndexOutcome), SetupError> {
        let fingerprint = fingerprint(documents, embedder.model_id(), chunker);
        let stored = db.get_meta(META_FINGERPRINT)?;
        let existing = db.passage_count()?;

        if stored.as_deref() == Some(fingerprint.as_str()) && existing > 0 {
            tracing::info!(passages = existing, "knowledge index unchanged, reusing");
            return Ok((
                Self { db, timeout },
                IndexOutcome::Reused { passages: existing },
            ));
        }

        let mut entries: Vec<(String, usize, String)> = Vec::new();
        for doc in documents {
            let source = doc.source.to_string_lossy().to_string();
            for chunk in chunker.chunk(&doc.content) {
                entries.push((source.clone(), chunk.index, chunk.text));
            }
        }

        tracing::info!(
            passages = entries.len(),
            model = embedder.model_id(),
            "building knowledge index"
        );

        let texts: Vec<String> = entries.iter().map(|(_, _, text)| text.clone()).collect();
        let vectors = embed_with_timeout(embedder, &texts, timeout).await?;
        if vectors.len() != entries.len() {
            return Err(ServiceError::InvalidResponse {
                service: "embedding service",
                reason: format!("expected {} embeddings, got {}", entries.len(), vectors.len()),
            }
            .into());
        }

        let passages: Vec<NewPassage<'_>> = entries
            .iter()
            .zip(vectors.iter())
            .map(|((source, chunk_index, content), embedding)| NewPassage {
                source,
                chunk_index: *chunk_index,
                content,
                embedding,
            })
            .collect();

        let built_at = chrono::Utc::now().to_rfc3339();
        db.replace_all(
            &passages,
            &[
                (META_FINGERPRINT, fingerprint.as_str()),
                (META_EMBEDDING_MODEL, embedder.model_id()),
                (META_BUILT_AT, built_at.as_str()),
            ],
        )?;

        let count = passages.len();
        Ok((Self { db, timeout }, IndexOutcome::Rebuilt { passages: count }))
    }

    /// Top `k` passages for `query`, most similar first
    pub async fn retrieve(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredPassage>, QueryError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embed_with_timeout(embedder, &[query.to_string()], self.timeout)
            .await
            .map_err(|e| QueryError::at(QueryStage::Retrieval, e))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                QueryError::Retrieval(ServiceError::InvalidResponse {
                    service: "embedding service",
                    reason: "no embedding for query".to_string(),
                })
            })?;

        let results = self.db.search(&query_vec, k)?;
        Ok(results.into_iter().map(ScoredPassage::from).collect())
    }

    pub fn passage_count(&self) -> Result<usize, QueryError> {
        Ok(self.db.passage_count()?)
    }
}
