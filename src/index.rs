use crate::chunking::TextChunk;
use crate::embeddings::{cosine_similarity, Embedder, Embedding};
use anyhow::{bail, Result};
use log::debug;

/// A chunk returned by a similarity search together with its score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

/// In-memory vector index over the chunks of one document set.
///
/// Built once from a full chunk sequence and never mutated afterwards;
/// re-ingestion builds a new index.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    chunks: Vec<TextChunk>,
    embeddings: Vec<Embedding>,
    dims: usize,
}

impl VectorIndex {
    /// Embed every chunk once and store the (chunk, vector) pairs
    pub async fn build<E: Embedder>(chunks: Vec<TextChunk>, embedder: &E) -> Result<Self> {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        Self::from_parts(chunks, embeddings)
    }

    /// Assemble an index from chunks and their already computed embeddings
    pub fn from_parts(chunks: Vec<TextChunk>, embeddings: Vec<Embedding>) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            bail!(
                "Embedding count mismatch: {} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            );
        }

        let dims = embeddings.first().map(Embedding::dims).unwrap_or(0);
        if let Some(bad) = embeddings.iter().position(|e| e.dims() != dims) {
            bail!(
                "Embedding dimension mismatch at chunk {}: expected {}, got {}",
                bad,
                dims,
                embeddings[bad].dims()
            );
        }

        Ok(VectorIndex {
            chunks,
            embeddings,
            dims,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Vector dimension shared by every stored embedding
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Search for the `limit` chunks most similar to the query.
    ///
    /// Results are ordered by non-increasing cosine similarity; equal
    /// scores keep the original chunk order.
    pub fn search(&self, query: &Embedding, limit: usize) -> Result<Vec<ScoredChunk>> {
        if !self.is_empty() && query.dims() != self.dims {
            bail!(
                "Query embedding has {} dimensions, index has {}",
                query.dims(),
                self.dims
            );
        }

        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(idx, embedding)| {
                let score = cosine_similarity(&query.values, &embedding.values);
                // Non-finite vectors rank below every real match
                (idx, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();

        // sort_by is stable, so ties stay in chunk order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(idx, score)| ScoredChunk {
                chunk: self.chunks[idx].clone(),
                score,
            })
            .collect())
    }
}

/// Wraps a [`VectorIndex`] with a fixed result size
#[derive(Debug, Clone)]
pub struct Retriever {
    index: VectorIndex,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: VectorIndex, top_k: usize) -> Self {
        Retriever { index, top_k }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Embed the question and return the top-k most similar chunks
    pub async fn retrieve<E: Embedder>(&self, embedder: &E, question: &str) -> Result<Vec<ScoredChunk>> {
        let query = embedder.embed(question).await?;
        let results = self.index.search(&query, self.top_k)?;

        for result in &results {
            debug!(
                "Retrieved chunk {} (score {:.4})",
                result.chunk.chunk_index, result.score
            );
        }

        Ok(results)
    }
}
