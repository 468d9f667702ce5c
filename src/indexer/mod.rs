
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::chunker;
use crate::config::Config;
use crate::database::{ChunkRecord, EmbeddingRecord, FileHashes, VectorStore, content_digest};
use crate::embeddings::Embedder;
use crate::repo;

const LOCK_FILE_NAME: &str = "indexer.lock";

/// Counters reported after an indexing run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexingStats {
    pub files_scanned: usize,
    pub files_skipped_unchanged: usize,
    pub files_indexed: usize,
    pub files_unreadable: usize,
    pub chunks_embedded: usize,
}

/// Advisory lock guarding the index directory against concurrent runs.
/// Released on drop.
struct IndexLock {
    path: PathBuf,
}

impl IndexLock {
    fn acquire(index_dir: &Path) -> Result<Self> {
        let path = index_dir.join(LOCK_FILE_NAME);
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(anyhow::anyhow!(
                "Another indexing run appears to be in progress ({} exists). \
                 Remove the file if no other run is active.",
                path.display()
            )),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to create lock file {}", path.display()))
            }
        }
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove lock file {}: {}", self.path.display(), e);
        }
    }
}

/// Keeps the vector index in sync with the repository's source files,
/// re-embedding only files whose content hash changed.
pub struct Indexer<E: Embedder> {
    repo_root: PathBuf,
    index_dir: PathBuf,
    max_chars_per_file: usize,
    store: VectorStore,
    embedder: E,
    hashes: FileHashes,
}

impl<E: Embedder> Indexer<E> {
    pub async fn open(config: &Config, repo_root: &Path, embedder: E) -> Result<Self> {
        let index_dir = config.index_dir(repo_root);
        fs::create_dir_all(&index_dir)
            .with_context(|| format!("Failed to create index directory {}", index_dir.display()))?;

        let store = VectorStore::open(&index_dir, config.embedding.embedding_dimension as usize)
            .await
            .context("Failed to open vector store")?;
        let hashes = FileHashes::load(&index_dir);

        Ok(Self {
            repo_root: repo_root.to_path_buf(),
            index_dir,
            max_chars_per_file: config.index.max_chars_per_file,
            store,
            embedder,
            hashes,
        })
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Bring the index up to date for the given files. Unchanged files are
    /// skipped via their content hash; changed files have their old chunks
    /// deleted and all current chunks re-embedded.
    pub async fn update(&mut self, files: &[PathBuf]) -> Result<IndexingStats> {
        let _lock = IndexLock::acquire(&self.index_dir)?;

        let mut stats = IndexingStats::default();
        let mut pending_chunks: Vec<chunker::CodeChunk> = Vec::new();
        let mut pending_hashes: Vec<(String, String)> = Vec::new();

        for file in files {
            stats.files_scanned += 1;

            let rel_path = match file.strip_prefix(&self.repo_root) {
                Ok(rel) => rel.to_string_lossy().into_owned(),
                Err(_) => file.to_string_lossy().into_owned(),
            };

            let text = match repo::read_text_safely(file, self.max_chars_per_file) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Skipping unreadable file {}: {}", file.display(), e);
                    stats.files_unreadable += 1;
                    continue;
                }
            };

            if text.is_empty() {
                debug!("Skipping empty file {rel_path}");
                continue;
            }

            let digest = content_digest(&text);
            if self.hashes.get(&rel_path) == Some(digest.as_str()) {
                stats.files_skipped_unchanged += 1;
                continue;
            }

            debug!("Reindexing {rel_path}");
            self.store.delete_file_entries(&rel_path).await?;

            let chunks = chunker::chunk_file(&rel_path, &text);
            pending_chunks.extend(chunks);
            pending_hashes.push((rel_path, digest));
            stats.files_indexed += 1;
        }

        stats.chunks_embedded = self.embed_and_store(&pending_chunks).await?;

        // Hashes are recorded only after the chunks are safely stored, so a
        // crash mid-run re-indexes rather than silently drops files.
        for (rel_path, digest) in pending_hashes {
            self.hashes.insert(rel_path, digest);
        }
        self.hashes.save().context("Failed to save file hashes")?;

        if stats.files_indexed > 0 {
            if let Err(e) = self.store.optimize().await {
                warn!("Index optimization failed: {e}");
            }
        }

        info!(
            "Indexing complete: {} scanned, {} unchanged, {} reindexed, {} chunks embedded",
            stats.files_scanned,
            stats.files_skipped_unchanged,
            stats.files_indexed,
            stats.chunks_embedded
        );

        Ok(stats)
    }

    async fn embed_and_store(&mut self, chunks: &[chunker::CodeChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let batch_size = self.embedder.batch_size().max(1);
        let indexed_at = Utc::now().to_rfc3339();
        let mut total = 0;

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .context("Failed to embed chunk batch")?;

            if vectors.len() != batch.len() {
                return Err(anyhow::anyhow!(
                    "Embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                ));
            }

            let records: Vec<EmbeddingRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| EmbeddingRecord {
                    id: chunk.id(),
                    vector,
                    metadata: ChunkRecord {
                        file_path: self.repo_root.join(&chunk.file_path).display().to_string(),
                        rel_path: chunk.file_path.clone(),
                        symbol: chunk.symbol.clone(),
                        start_line: chunk.start_line,
                        end_line: chunk.end_line,
                        content: chunk.text.clone(),
                        indexed_at: indexed_at.clone(),
                    },
                })
                .collect();

            total += records.len();
            self.store.upsert_batch(records).await?;
        }

        Ok(total)
    }
}
