//! Configuration handling: environment variables, optionally seeded from `.env`

use std::path::PathBuf;
use std::str::FromStr;

use crate::{
    AskError, Result, DEFAULT_API_BASE, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
    DEFAULT_EMBED_BATCH_SIZE, DEFAULT_EMBED_MODEL, DEFAULT_LLM_MODEL, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_STORAGE_DIR, DEFAULT_TOP_K,
};

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_API_BASE: &str = "OPENAI_BASE_URL";
pub const ENV_LLM_MODEL: &str = "OPENAI_MODEL";
pub const ENV_EMBED_MODEL: &str = "OPENAI_EMBED_MODEL";
pub const ENV_STORAGE_DIR: &str = "ASKDOC_STORAGE_DIR";
pub const ENV_CHUNK_SIZE: &str = "ASKDOC_CHUNK_SIZE";
pub const ENV_CHUNK_OVERLAP: &str = "ASKDOC_CHUNK_OVERLAP";
pub const ENV_TOP_K: &str = "ASKDOC_TOP_K";
pub const ENV_EMBED_BATCH_SIZE: &str = "ASKDOC_EMBED_BATCH_SIZE";
pub const ENV_MAX_FILE_SIZE: &str = "ASKDOC_MAX_FILE_SIZE";
pub const ENV_INCLUDE_EXTENSIONS: &str = "ASKDOC_INCLUDE_EXTENSIONS";
pub const ENV_EXCLUDE_EXTENSIONS: &str = "ASKDOC_EXCLUDE_EXTENSIONS";
pub const ENV_RESPECT_GITIGNORE: &str = "ASKDOC_RESPECT_GITIGNORE";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "ASKDOC_REQUEST_TIMEOUT_SECS";
pub const ENV_DELETE_POLICY: &str = "ASKDOC_DELETE_POLICY";

/// What happens to the in-memory index when its storage is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Leave the loaded index usable even though its storage is gone.
    #[default]
    Keep,
    /// Drop the loaded index together with its storage.
    Invalidate,
}

impl FromStr for DeletePolicy {
    type Err = AskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "invalidate" => Ok(Self::Invalidate),
            other => Err(AskError::Config(format!(
                "Unknown delete policy: {}. Supported: keep, invalidate",
                other
            ))),
        }
    }
}

/// Runtime configuration, resolved each time an index is loaded or built.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key sent as a bearer token
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    pub api_base: String,

    /// Chat-completion model used to answer queries
    pub llm_model: String,

    /// Embedding model used for documents and queries
    pub embed_model: String,

    /// Directory holding the persisted index
    pub storage_dir: PathBuf,

    /// Chunk size in characters
    pub chunk_size: usize,

    /// Chunk overlap in characters
    pub chunk_overlap: usize,

    /// Chunks retrieved per query
    pub top_k: usize,

    /// Chunks per embeddings request
    pub embed_batch_size: usize,

    /// Maximum file size to index (bytes)
    pub max_file_size: u64,

    /// File extensions to include (empty = all files)
    pub include_extensions: Vec<String>,

    /// File extensions to exclude
    pub exclude_extensions: Vec<String>,

    /// Honour .gitignore files while walking directories
    pub respect_gitignore: bool,

    /// HTTP request timeout; `None` waits indefinitely
    pub request_timeout_secs: Option<u64>,

    /// Handle treatment on storage deletion
    pub delete_policy: DeletePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            include_extensions: Vec::new(),
            exclude_extensions: Vec::new(),
            respect_gitignore: false,
            request_timeout_secs: None,
            delete_policy: DeletePolicy::Keep,
        }
    }
}

impl Config {
    /// Load config from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("Ignoring unreadable .env file: {}", e);
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Unset or empty
    /// variables fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let config = Self {
            api_key: get(ENV_API_KEY),
            api_base: get(ENV_API_BASE)
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            llm_model: get(ENV_LLM_MODEL).unwrap_or(defaults.llm_model),
            embed_model: get(ENV_EMBED_MODEL).unwrap_or(defaults.embed_model),
            storage_dir: get(ENV_STORAGE_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            chunk_size: parse_var(ENV_CHUNK_SIZE, get(ENV_CHUNK_SIZE))?
                .unwrap_or(defaults.chunk_size),
            chunk_overlap: parse_var(ENV_CHUNK_OVERLAP, get(ENV_CHUNK_OVERLAP))?
                .unwrap_or(defaults.chunk_overlap),
            top_k: parse_var(ENV_TOP_K, get(ENV_TOP_K))?.unwrap_or(defaults.top_k),
            embed_batch_size: parse_var(ENV_EMBED_BATCH_SIZE, get(ENV_EMBED_BATCH_SIZE))?
                .unwrap_or(defaults.embed_batch_size),
            max_file_size: parse_var(ENV_MAX_FILE_SIZE, get(ENV_MAX_FILE_SIZE))?
                .unwrap_or(defaults.max_file_size),
            include_extensions: get(ENV_INCLUDE_EXTENSIONS)
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            exclude_extensions: get(ENV_EXCLUDE_EXTENSIONS)
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            respect_gitignore: parse_var(ENV_RESPECT_GITIGNORE, get(ENV_RESPECT_GITIGNORE))?
                .unwrap_or(defaults.respect_gitignore),
            request_timeout_secs: parse_var(
                ENV_REQUEST_TIMEOUT_SECS,
                get(ENV_REQUEST_TIMEOUT_SECS),
            )?,
            delete_policy: parse_var(ENV_DELETE_POLICY, get(ENV_DELETE_POLICY))?
                .unwrap_or(defaults.delete_policy),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the indexer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(AskError::Config("chunk size must be greater than 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AskError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(AskError::Config("top-k must be greater than 0".into()));
        }
        if self.embed_batch_size == 0 {
            return Err(AskError::Config(
                "embedding batch size must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// The API key, or a config error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AskError::Config(format!("{} is not set", ENV_API_KEY)))
    }

    /// API key with everything but the last four characters hidden.
    pub fn masked_api_key(&self) -> String {
        match self.api_key.as_deref() {
            None => "(not set)".to_string(),
            Some(key) => {
                let chars: Vec<char> = key.chars().collect();
                let visible = chars.len().min(4);
                let tail: String = chars[chars.len() - visible..].iter().collect();
                format!("{}{}", "*".repeat(8), tail)
            }
        }
    }
}

fn parse_var<T>(key: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| AskError::Config(format!("invalid value for {}: {:?} ({})", key, v, e)))
        })
        .transpose()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
