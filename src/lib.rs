use thiserror::Error;

pub type Result<T> = std::result::Result<T, PatchforgeError>;

#[derive(Error, Debug)]
pub enum PatchforgeError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Git error: {0}")]
    Git(String),

    #[error("{rel_path}: model response contained no usable diff hunks")]
    EmptyDiff { rel_path: String },

    #[error("{rel_path}: not a structurally valid unified diff, refusing to merge")]
    MalformedDiff { rel_path: String },

    #[error("Change plan response is not parseable JSON; response began with: {excerpt}")]
    MalformedPlan { excerpt: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chunker;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod indexer;
pub mod llm;
pub mod patch;
pub mod planner;
pub mod repo;
pub mod retriever;
