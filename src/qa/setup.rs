//! Startup: knowledge file, index, and the answering pipeline

use crate::core::config::{Config, EmbeddingBackend};
use crate::core::document::load_documents;
use crate::core::error::SetupError;
use crate::provider::{OpenAiChat, OpenAiClient};
use crate::search::{Chunker, Embedder, HarmonicEmbedder, IndexOutcome, KnowledgeIndex, OpenAiEmbedder, VectorDB};

use super::pipeline::RetrievalQa;

/// Load the knowledge file, open or rebuild the index, and wire the pipeline.
pub async fn build_pipeline(config: &Config) -> Result<(RetrievalQa, IndexOutcome), SetupError> {
    let paths = config.paths();
    paths.ensure_dirs()?;

    let documents = load_documents(&paths.knowledge)?;
    if documents.is_empty() {
        return Err(SetupError::EmptyKnowledgeBase(paths.knowledge.clone()));
    }

    let client = OpenAiClient::new(config)?;
    let embedder: Box<dyn Embedder> = match config.embedding_backend {
        EmbeddingBackend::OpenAi => Box::new(OpenAiEmbedder::new(
            client.clone(),
            config.embedding_model.clone(),
        )),
        EmbeddingBackend::Local => Box::new(HarmonicEmbedder::new()),
    };

    let db = VectorDB::open(&paths.index_db)?;
    let chunker = Chunker::new(config.chunk_size, config.chunk_overlap);
    let (index, outcome) = KnowledgeIndex::build(
        db,
        &documents,
        embedder.as_ref(),
        &chunker,
        config.request_timeout,
    )
    .await?;

    let generator = OpenAiChat::new(client, config.chat_model.clone(), config.temperature);
    let qa = RetrievalQa::new(
        index,
        embedder,
        Box::new(generator),
        config.top_k,
        config.request_timeout,
    );

    Ok((qa, outcome))
}
