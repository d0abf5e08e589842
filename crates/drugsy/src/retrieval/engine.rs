use std::sync::Arc;

use serde::Serialize;

use super::chunk::{chunk_document, ChunkConfig, DocumentChunk, Provenance};
use super::embedding::EmbeddingService;
use super::index::VectorIndex;
use super::literature::LiteratureSource;
use crate::errors::{ToolError, ToolResult};
use crate::prompt_template::render_prompt;
use crate::providers::base::Provider;

const GROUNDING_TEMPLATE: &str = include_str!("../prompts/grounding.md");

/// Returned when the literature search finds nothing — a normal outcome,
/// distinct from the search service being unreachable.
pub const NO_RESULTS_MESSAGE: &str =
    "No published articles were found for this query, so I cannot ground an answer in the literature.";

/// Returned when retrieval produced no usable excerpts to answer from.
pub const INSUFFICIENT_MESSAGE: &str =
    "The retrieved articles did not contain enough information to answer this query.";

#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Candidate documents fetched per query
    pub max_documents: usize,
    /// Chunks handed to the grounding prompt
    pub top_k: usize,
    pub chunking: ChunkConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        RagConfig {
            max_documents: 25,
            top_k: 5,
            chunking: ChunkConfig::default(),
        }
    }
}

#[derive(Serialize)]
struct GroundingChunk<'a> {
    source_id: &'a str,
    title: &'a str,
    year: Option<i32>,
    abstract_only: bool,
    text: &'a str,
}

#[derive(Serialize)]
struct GroundingContext<'a> {
    query: &'a str,
    chunks: Vec<GroundingChunk<'a>>,
}

/// Answers a free-text question grounded in freshly retrieved literature.
///
/// Every call runs the full pipeline against a fresh, query-scoped vector
/// index; the index is an owned local and is dropped on every exit path.
pub struct RagEngine {
    source: Arc<dyn LiteratureSource>,
    embeddings: Arc<dyn EmbeddingService>,
    provider: Arc<dyn Provider>,
    config: RagConfig,
}

impl RagEngine {
    pub fn new(
        source: Arc<dyn LiteratureSource>,
        embeddings: Arc<dyn EmbeddingService>,
        provider: Arc<dyn Provider>,
        config: RagConfig,
    ) -> Self {
        Self {
            source,
            embeddings,
            provider,
            config,
        }
    }

    pub async fn answer(&self, query: &str) -> ToolResult<String> {
        // 1. Fetch candidates; only total search failure aborts
        let articles = self.source.search(query, self.config.max_documents).await?;
        if articles.is_empty() {
            tracing::debug!(query, "literature search returned no articles");
            return Ok(NO_RESULTS_MESSAGE.to_string());
        }

        // 2. Chunk, resolving full text per article where possible
        let mut chunks: Vec<DocumentChunk> = Vec::new();
        for article in &articles {
            let full_text = match self.source.full_text(article).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(article = %article.id, error = %e, "skipping full text");
                    None
                }
            };
            let article_chunks = chunk_document(article, full_text.as_deref(), &self.config.chunking);
            if article_chunks.is_empty() {
                tracing::debug!(article = %article.id, "dropped: no abstract or full text");
            }
            chunks.extend(article_chunks);
        }
        if chunks.is_empty() {
            return Ok(INSUFFICIENT_MESSAGE.to_string());
        }

        // 3. Embed every chunk into a fresh query-scoped index
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self
            .embeddings
            .embed_batch(&texts)
            .await
            .map_err(|e| ToolError::Retrieval(format!("embedding failed: {}", e)))?;
        let mut index = VectorIndex::new();
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            index.insert(chunk, vector);
        }

        // 4. Retrieve nearest chunks for the query
        let query_vector = self
            .embeddings
            .embed(query)
            .await
            .map_err(|e| ToolError::Retrieval(format!("query embedding failed: {}", e)))?;
        let retrieved = index.query(&query_vector, self.config.top_k);
        if retrieved.is_empty() {
            return Ok(INSUFFICIENT_MESSAGE.to_string());
        }
        tracing::debug!(
            retrieved = retrieved.len(),
            indexed = index.len(),
            "grounding answer in retrieved chunks"
        );

        // 5. Synthesize strictly from the retrieved text
        let context = GroundingContext {
            query,
            chunks: retrieved
                .iter()
                .map(|chunk| GroundingChunk {
                    source_id: &chunk.source_id,
                    title: &chunk.metadata.source_title,
                    year: chunk.metadata.source_year,
                    abstract_only: chunk.metadata.provenance == Provenance::AbstractOnly,
                    text: &chunk.text,
                })
                .collect(),
        };
        let prompt = render_prompt(GROUNDING_TEMPLATE, &context)
            .map_err(|e| ToolError::ExecutionFailed(format!("grounding prompt failed: {}", e)))?;

        self.provider
            .complete_text(&prompt)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("grounded synthesis failed: {}", e)))
    }
}
