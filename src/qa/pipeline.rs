//! Retrieval-augmented answering for a single query

use std::time::Duration;

use async_trait::async_trait;

use crate::core::error::{QueryError, QueryStage};
use crate::provider::AnswerGenerator;
use crate::search::{Embedder, KnowledgeIndex, ScoredPassage};

/// Answer text plus the passages it was generated from
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredPassage>,
}

/// Anything that can turn a question into an [`Answer`]
#[async_trait(?Send)]
pub trait QueryPipeline {
    async fn answer(&self, query: &str) -> Result<Answer, QueryError>;
}

pub struct RetrievalQa {
    index: KnowledgeIndex,
    embedder: Box<dyn Embedder>,
    generator: Box<dyn AnswerGenerator>,
    top_k: usize,
    timeout: Duration,
}

impl RetrievalQa {
    pub fn new(
        index: KnowledgeIndex,
        embedder: Box<dyn Embedder>,
        generator: Box<dyn AnswerGenerator>,
        top_k: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            index,
            embedder,
            generator,
            top_k,
            timeout,
        }
    }
}

#[async_trait(?Send)]
impl QueryPipeline for RetrievalQa {
    async fn answer(&self, query: &str) -> Result<Answer, QueryError> {
        let sources = self
            .index
            .retrieve(self.embedder.as_ref(), query, self.top_k)
            .await?;
        tracing::debug!(query, passages = sources.len(), "retrieved context");

        let context: Vec<String> = sources.iter().map(|p| p.content.clone()).collect();
        let text = match tokio::time::timeout(self.timeout, self.generator.generate(query, &context)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(QueryError::at(QueryStage::Generation, e)),
            Err(_) => {
                return Err(QueryError::Timeout {
                    stage: QueryStage::Generation,
                    after: self.timeout,
                })
            }
        };

        Ok(Answer { text, sources })
    }
}
