use super::*;
use crate::database::ChunkRecord;
use crate::indexer::Indexer;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const STUB_DIM: usize = 64;

struct StubEmbedder;

impl Embedder for StubEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let digest = Sha256::digest(text.as_bytes());
                let mut vector: Vec<f32> = digest
                    .iter()
                    .cycle()
                    .take(STUB_DIM)
                    .map(|&b| f32::from(b) / 255.0)
                    .collect();
                crate::embeddings::normalize(&mut vector);
                vector
            })
            .collect())
    }

    fn batch_size(&self) -> usize {
        4
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.embedding.embedding_dimension = STUB_DIM as u32;
    config
}

fn hit(rel_path: &str, symbol: &str, content: &str, distance: f32) -> RetrievedChunk {
    RetrievedChunk {
        record: ChunkRecord {
            file_path: format!("/repo/{rel_path}"),
            rel_path: rel_path.to_string(),
            symbol: symbol.to_string(),
            start_line: 1,
            end_line: 5,
            content: content.to_string(),
            indexed_at: "2024-01-01T00:00:00Z".to_string(),
        },
        distance,
    }
}

#[tokio::test]
async fn retrieve_from_empty_index_returns_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config();

    let retriever = Retriever::open(&config, temp_dir.path(), StubEmbedder)
        .await
        .expect("should open retriever");
    let hits = retriever
        .retrieve("where is the entry point?", 5)
        .await
        .expect("retrieve should succeed");
    assert!(hits.is_empty());
}

#[tokio::test]
async fn retrieve_finds_indexed_chunks() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config();

    let source = "def alpha():\n    return 1\n";
    let path: PathBuf = temp_dir.path().join("a.py");
    fs::write(&path, source).unwrap();

    let mut indexer = Indexer::open(&config, temp_dir.path(), StubEmbedder)
        .await
        .expect("should open indexer");
    indexer.update(&[path]).await.expect("indexing should succeed");

    let retriever = Retriever::open(&config, temp_dir.path(), StubEmbedder)
        .await
        .expect("should open retriever");
    let hits = retriever
        .retrieve("alpha function", 3)
        .await
        .expect("retrieve should succeed");

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.rel_path, "a.py");
    assert_eq!(hits[0].record.symbol, "alpha");
}

#[tokio::test]
async fn retrieve_treats_zero_top_k_as_one() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config();

    let path = temp_dir.path().join("a.py");
    fs::write(&path, "def alpha():\n    return 1\n").unwrap();
    let mut indexer = Indexer::open(&config, temp_dir.path(), StubEmbedder)
        .await
        .expect("should open indexer");
    indexer.update(&[path]).await.expect("indexing should succeed");

    let retriever = Retriever::open(&config, temp_dir.path(), StubEmbedder)
        .await
        .expect("should open retriever");
    let hits = retriever
        .retrieve("anything", 0)
        .await
        .expect("retrieve should succeed");
    assert_eq!(hits.len(), 1);
}

#[test]
fn format_snippets_renders_headers_and_separators() {
    let hits = vec![
        hit("a.py", "alpha", "def alpha(): ...", 0.1),
        hit("b.py", "Beta.run", "def run(self): ...", 0.2),
    ];

    let rendered = format_snippets(&hits, 10_000);
    assert!(rendered.starts_with("[a.py :: alpha :: lines 1-5]\n"));
    assert!(rendered.contains("\n---\n"));
    assert!(rendered.contains("[b.py :: Beta.run :: lines 1-5]"));
}

#[test]
fn format_snippets_respects_char_budget() {
    let hits = vec![
        hit("a.py", "alpha", &"x".repeat(50), 0.1),
        hit("b.py", "beta", &"y".repeat(5000), 0.2),
    ];

    let rendered = format_snippets(&hits, 200);
    assert!(rendered.contains("a.py"));
    assert!(!rendered.contains("b.py"));
}

#[test]
fn format_snippets_always_includes_first_chunk() {
    // Even when the first chunk alone exceeds the budget.
    let hits = vec![hit("a.py", "alpha", &"x".repeat(500), 0.1)];
    let rendered = format_snippets(&hits, 10);
    assert!(rendered.contains("a.py"));
}

#[test]
fn format_snippets_empty_input() {
    assert_eq!(format_snippets(&[], 100), "");
}
