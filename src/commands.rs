use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::database::FileHashes;
use crate::embeddings::EmbeddingClient;
use crate::indexer::Indexer;
use crate::llm::ChatClient;
use crate::patch::{self, FilePatch};
use crate::planner;
use crate::repo;
use crate::retriever::{self, Retriever};

const DEFAULT_PATCH_NAME: &str = "patchforge.patch";

fn resolve_repo(repo: &Path) -> Result<PathBuf> {
    repo.canonicalize()
        .with_context(|| format!("Repository path {} does not exist", repo.display()))
}

/// Git-tracked files eligible for indexing: excluded directories and the
/// index directory itself are filtered out.
fn tracked_source_files(config: &Config, repo_root: &Path) -> Result<Vec<PathBuf>> {
    let mut excludes: Vec<&str> = repo::DEFAULT_EXCLUDES.to_vec();
    let index_root = Path::new(&config.index.dir)
        .components()
        .next()
        .and_then(|c| c.as_os_str().to_str());
    if let Some(dir) = index_root {
        excludes.push(dir);
    }

    let files = repo::list_tracked_files(repo_root)?;
    Ok(repo::filter_files(repo_root, files, &excludes))
}

/// Bring the index up to date for every tracked source file.
#[inline]
pub async fn index_repo(repo: &Path) -> Result<()> {
    let repo_root = resolve_repo(repo)?;
    let config = Config::load(&repo_root)?;
    let files = tracked_source_files(&config, &repo_root)?;

    info!("Indexing {} tracked files", files.len());

    let embedder = EmbeddingClient::new(&config)?;
    let mut indexer = Indexer::open(&config, &repo_root, embedder).await?;
    let stats = indexer.update(&files).await?;

    println!("{}", style("Index updated").bold().green());
    println!("  Files scanned: {}", stats.files_scanned);
    println!("  Unchanged (skipped): {}", stats.files_skipped_unchanged);
    println!("  Reindexed: {}", stats.files_indexed);
    println!("  Unreadable (skipped): {}", stats.files_unreadable);
    println!("  Chunks embedded: {}", stats.chunks_embedded);

    Ok(())
}

/// Search the index and print the closest chunks.
#[inline]
pub async fn search_index(repo: &Path, query: &str, top_k: Option<usize>) -> Result<()> {
    let repo_root = resolve_repo(repo)?;
    let config = Config::load(&repo_root)?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let embedder = EmbeddingClient::new(&config)?;
    let retriever = Retriever::open(&config, &repo_root, embedder).await?;
    let hits = retriever.retrieve(query, top_k).await?;

    if hits.is_empty() {
        println!("No results. Has the repository been indexed?");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        let record = &hit.record;
        println!(
            "{} {} (distance {:.4})",
            style(format!("{}.", rank + 1)).bold(),
            style(format!(
                "{} :: {} :: lines {}-{}",
                record.rel_path, record.symbol, record.start_line, record.end_line
            ))
            .cyan(),
            hit.distance
        );
    }

    Ok(())
}

/// Print index health: chunk count, hashed file count, repository state.
#[inline]
pub async fn show_status(repo: &Path) -> Result<()> {
    let repo_root = resolve_repo(repo)?;
    let config = Config::load(&repo_root)?;
    let index_dir = config.index_dir(&repo_root);

    println!("{}", style("Repository").bold());
    println!("  Root: {}", repo_root.display());
    println!("  Branch: {}", repo::current_branch(&repo_root)?);
    println!("  HEAD: {}", repo::head_commit(&repo_root)?);

    println!("{}", style("Index").bold());
    println!("  Directory: {}", index_dir.display());
    if !index_dir.exists() {
        println!("  Not yet created. Run `patchforge index` first.");
        return Ok(());
    }

    let hashes = FileHashes::load(&index_dir);
    let store = crate::database::VectorStore::open(
        &index_dir,
        config.embedding.embedding_dimension as usize,
    )
    .await?;
    println!("  Indexed files: {}", hashes.len());
    println!("  Stored chunks: {}", store.count().await?);

    Ok(())
}

/// The full pipeline: index, retrieve, plan, generate per-file diffs, merge,
/// write the patch, and dry-run it with git.
#[inline]
pub async fn generate_patch(repo: &Path, requirement: &str, output: Option<&Path>) -> Result<()> {
    let repo_root = resolve_repo(repo)?;
    let config = Config::load(&repo_root)?;

    let head = repo::head_commit(&repo_root)?;
    println!(
        "Working on {} ({} @ {})",
        repo_root.display(),
        repo::current_branch(&repo_root)?,
        &head[..head.len().min(12)]
    );

    // Refresh the index so retrieval sees the current working tree.
    let files = tracked_source_files(&config, &repo_root)?;
    let embedder = EmbeddingClient::new(&config)?;
    let mut indexer = Indexer::open(&config, &repo_root, embedder).await?;
    let stats = indexer.update(&files).await?;
    info!(
        "Index refreshed: {} reindexed, {} chunks embedded",
        stats.files_indexed, stats.chunks_embedded
    );

    let embedder = EmbeddingClient::new(&config)?;
    let retriever = Retriever::open(&config, &repo_root, embedder).await?;
    let hits = retriever.retrieve(requirement, config.retrieval.top_k).await?;
    if hits.is_empty() {
        println!("The index is empty; nothing to retrieve, nothing to do.");
        return Ok(());
    }

    let snippets = retriever::format_snippets(&hits, config.retrieval.max_snippet_chars);
    println!("Retrieved {} chunks as context", hits.len());

    let model = ChatClient::new(&config)?;
    let plan = planner::plan_changes(&model, requirement, &snippets)?;
    println!("{}", style("Change plan").bold());
    println!(
        "{}",
        serde_json::to_string_pretty(&plan).context("Failed to render change plan")?
    );

    let mut targets = plan.target_paths();
    if targets.is_empty() {
        println!("The plan names no files to change; nothing to do.");
        return Ok(());
    }
    if targets.len() > config.limits.max_files_for_llm {
        warn!(
            "Plan targets {} files, capping at {}",
            targets.len(),
            config.limits.max_files_for_llm
        );
        targets.truncate(config.limits.max_files_for_llm);
    }

    let design_notes = plan.design_notes.join("\n- ");
    let mut patches: Vec<FilePatch> = Vec::with_capacity(targets.len());
    for rel_path in &targets {
        println!("Generating diff for {rel_path}");
        let file_patch = patch::generate_file_patch(
            &model,
            &repo_root,
            requirement,
            &design_notes,
            rel_path,
            config.index.max_chars_per_file,
        )?;
        patches.push(file_patch);
    }

    let merged = patch::merge_patches(&patches)?;
    if merged.is_empty() {
        println!("No diffs were produced; nothing to write.");
        return Ok(());
    }

    let patch_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| repo_root.join(DEFAULT_PATCH_NAME));
    std::fs::write(&patch_path, &merged)
        .with_context(|| format!("Failed to write patch to {}", patch_path.display()))?;
    println!("Patch written to {}", style(patch_path.display()).cyan());

    let (applies, diagnostics) = repo::apply_check(&repo_root, &patch_path)?;
    if applies {
        println!("{}", style("git apply --check passed").green());
    } else {
        println!("{}", style("git apply --check failed").red());
        if !diagnostics.is_empty() {
            println!("{diagnostics}");
        }
        println!("The patch was kept for manual review.");
    }

    Ok(())
}
