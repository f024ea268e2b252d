//! askdoc-core: Retrieval-augmented questions over local files
//!
//! This library reads a file or directory into documents, embeds them
//! through an OpenAI-compatible API, persists the resulting vector index
//! to a fixed storage directory, and answers questions against it.

pub mod config;
pub mod consts;
pub mod discover;
pub mod embed;
pub mod extract;
pub mod index;
pub mod llm;
pub mod manager;
pub mod openai;
pub mod search;
pub mod storage;

use std::path::PathBuf;

pub use config::{Config, DeletePolicy};
pub use consts::*;
pub use discover::SourcePath;
pub use embed::Embedder;
pub use extract::Document;
pub use index::VectorIndex;
pub use llm::Llm;
pub use manager::{DeleteOutcome, IndexHandle, IndexManager, IndexState, ResolveOutcome, ServiceContext};
pub use search::{QueryResult, SourceCitation};
pub use storage::{LoadOutcome, Storage};

#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("Failed to build index: {0}")]
    Build(String),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Index is not initialized.")]
    NotReady,

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Failed to delete storage {}: {source}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API error: {0}")]
    Api(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AskError>;
