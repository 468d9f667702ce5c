pub mod hashes;
pub mod vector_store;

pub use hashes::{FileHashes, content_digest};
pub use vector_store::{RetrievedChunk, VectorStore};

/// One indexed chunk as stored in the vector table.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    /// Chunk identity: `rel_path:symbol:start-end`.
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkRecord,
}

/// Chunk metadata columns stored alongside each vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    /// Absolute path of the source file.
    pub file_path: String,
    /// Path relative to the repository root.
    pub rel_path: String,
    /// Dotted symbol path or `__file__`.
    pub symbol: String,
    pub start_line: u32,
    pub end_line: u32,
    /// The chunk's embedding text, returned verbatim by retrieval.
    pub content: String,
    /// RFC 3339 timestamp of when the chunk was indexed.
    pub indexed_at: String,
}
