#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use crate::config::Config;
use crate::database::{RetrievedChunk, VectorStore};
use crate::embeddings::Embedder;

/// Answers natural-language queries with the closest indexed chunks.
pub struct Retriever<E: Embedder> {
    store: VectorStore,
    embedder: E,
}

impl<E: Embedder> Retriever<E> {
    pub async fn open(config: &Config, repo_root: &Path, embedder: E) -> Result<Self> {
        let index_dir = config.index_dir(repo_root);
        let store = VectorStore::open(&index_dir, config.embedding.embedding_dimension as usize)
            .await
            .context("Failed to open vector store")?;

        Ok(Self { store, embedder })
    }

    /// Return the `top_k` chunks nearest to `query`, closest first. An empty
    /// index yields an empty result.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let top_k = top_k.max(1);

        let vectors = self
            .embedder
            .embed_batch(&[query.to_string()])
            .context("Failed to embed query")?;
        let query_vector = vectors
            .into_iter()
            .next()
            .context("Embedder returned no vector for query")?;

        let hits = self.store.search(&query_vector, top_k).await?;
        debug!("Retrieved {} chunks for query", hits.len());
        Ok(hits)
    }
}

/// Render retrieved chunks as a prompt-ready snippet block, keeping the
/// result under `max_chars` characters. Chunks are emitted in retrieval
/// order until the budget runs out. The first chunk is always emitted, even
/// when it alone exceeds the budget: the planner gets the single best match
/// rather than no context at all.
pub fn format_snippets(chunks: &[RetrievedChunk], max_chars: usize) -> String {
    const SEPARATOR: &str = "\n---\n";

    let mut blocks: Vec<String> = Vec::new();
    let mut used = 0;

    for chunk in chunks {
        let record = &chunk.record;
        let block = format!(
            "[{} :: {} :: lines {}-{}]\n{}\n",
            record.rel_path, record.symbol, record.start_line, record.end_line, record.content
        );

        let cost = block.chars().count()
            + if blocks.is_empty() {
                0
            } else {
                SEPARATOR.len()
            };
        if used + cost > max_chars && !blocks.is_empty() {
            break;
        }
        used += cost;
        blocks.push(block);
    }

    blocks.join(SEPARATOR)
}
