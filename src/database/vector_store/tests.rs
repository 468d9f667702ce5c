use super::*;
use tempfile::TempDir;

const TEST_DIM: usize = 8;

fn test_record(id_suffix: &str, rel_path: &str, seed: f32) -> EmbeddingRecord {
    let mut vector = vec![0.0; TEST_DIM];
    vector[0] = 1.0;
    vector[1] = seed;
    crate::embeddings::normalize(&mut vector);

    EmbeddingRecord {
        id: format!("{rel_path}:{id_suffix}"),
        vector,
        metadata: ChunkRecord {
            file_path: format!("/repo/{rel_path}"),
            rel_path: rel_path.to_string(),
            symbol: id_suffix.to_string(),
            start_line: 1,
            end_line: 10,
            content: format!("content for {id_suffix}"),
            indexed_at: "2024-01-01T00:00:00Z".to_string(),
        },
    }
}

#[tokio::test]
async fn store_initialization() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let result = VectorStore::open(temp_dir.path(), TEST_DIM).await;
    assert!(
        result.is_ok(),
        "Failed to initialize VectorStore: {:?}",
        result.err()
    );

    let store = result.expect("should get result successfully");
    assert_eq!(store.table_name, "chunks");
    assert_eq!(store.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn search_on_empty_table_returns_nothing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(temp_dir.path(), TEST_DIM)
        .await
        .expect("should create vector store");

    let query = vec![1.0; TEST_DIM];
    let hits = store.search(&query, 5).await.expect("search should succeed");
    assert!(hits.is_empty());
}

#[tokio::test]
async fn upsert_and_count() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path(), TEST_DIM)
        .await
        .expect("should create vector store");

    let records = vec![
        test_record("alpha:1-10", "a.py", 0.1),
        test_record("beta:1-10", "b.py", 0.9),
    ];
    store
        .upsert_batch(records)
        .await
        .expect("should store batch");

    assert_eq!(store.count().await.expect("should count"), 2);
}

#[tokio::test]
async fn upsert_same_ids_does_not_duplicate() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path(), TEST_DIM)
        .await
        .expect("should create vector store");

    let record = test_record("alpha:1-10", "a.py", 0.1);
    store
        .upsert_batch(vec![record.clone()])
        .await
        .expect("first insert should succeed");
    store
        .upsert_batch(vec![record])
        .await
        .expect("second insert should succeed");

    assert_eq!(store.count().await.expect("should count"), 1);
}

#[tokio::test]
async fn search_orders_by_distance() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path(), TEST_DIM)
        .await
        .expect("should create vector store");

    let near = test_record("near:1-10", "a.py", 0.1);
    let far = test_record("far:1-10", "b.py", 5.0);
    let query = near.vector.clone();

    store
        .upsert_batch(vec![far, near])
        .await
        .expect("should store batch");

    let hits = store.search(&query, 2).await.expect("search should succeed");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].record.symbol, "near:1-10");
    assert!(hits[0].distance <= hits[1].distance);
}

#[tokio::test]
async fn delete_file_entries_removes_only_that_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path(), TEST_DIM)
        .await
        .expect("should create vector store");

    store
        .upsert_batch(vec![
            test_record("one:1-10", "a.py", 0.1),
            test_record("two:11-20", "a.py", 0.2),
            test_record("other:1-10", "b.py", 0.3),
        ])
        .await
        .expect("should store batch");

    store
        .delete_file_entries("a.py")
        .await
        .expect("delete should succeed");

    assert_eq!(store.count().await.expect("should count"), 1);

    let query = vec![1.0; TEST_DIM];
    let hits = store.search(&query, 5).await.expect("search should succeed");
    assert!(hits.iter().all(|h| h.record.rel_path == "b.py"));
}

#[tokio::test]
async fn dimension_mismatch_recreates_table() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path(), 16)
        .await
        .expect("should create vector store");

    // First insert uses a different dimension than the table was created with.
    store
        .upsert_batch(vec![test_record("alpha:1-10", "a.py", 0.1)])
        .await
        .expect("should recreate table and store");

    assert_eq!(store.vector_dimension, Some(TEST_DIM));
    assert_eq!(store.count().await.expect("should count"), 1);
}

#[tokio::test]
async fn reopen_detects_existing_dimension() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    {
        let mut store = VectorStore::open(temp_dir.path(), TEST_DIM)
            .await
            .expect("should create vector store");
        store
            .upsert_batch(vec![test_record("alpha:1-10", "a.py", 0.1)])
            .await
            .expect("should store");
    }

    // Reopen with a different default; the existing schema wins.
    let store = VectorStore::open(temp_dir.path(), 32)
        .await
        .expect("should reopen vector store");
    assert_eq!(store.vector_dimension, Some(TEST_DIM));
    assert_eq!(store.count().await.expect("should count"), 1);
}

#[tokio::test]
async fn ids_with_quotes_are_escaped() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path(), TEST_DIM)
        .await
        .expect("should create vector store");

    let mut record = test_record("odd:1-10", "it's.py", 0.1);
    record.id = "it's.py:odd:1-10".to_string();
    store
        .upsert_batch(vec![record])
        .await
        .expect("should store record with quote in id");

    store
        .delete_file_entries("it's.py")
        .await
        .expect("delete should succeed");
    assert_eq!(store.count().await.expect("should count"), 0);
}

#[test]
fn escape_literal_doubles_single_quotes() {
    assert_eq!(escape_literal("plain"), "plain");
    assert_eq!(escape_literal("it's"), "it''s");
}
