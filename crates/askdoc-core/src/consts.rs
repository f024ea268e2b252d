/// Default storage directory for the persisted index (relative to the working directory)
pub const DEFAULT_STORAGE_DIR: &str = "./storage";

/// Default OpenAI-compatible API base URL
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default chat-completion model
pub const DEFAULT_LLM_MODEL: &str = "gpt-3.5-turbo";

/// Default embedding model
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-ada-002";

/// Default chunk size in characters (roughly ~512 tokens)
pub const DEFAULT_CHUNK_SIZE: usize = 2000;

/// Default chunk overlap in characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Default number of chunks retrieved per query
pub const DEFAULT_TOP_K: usize = 2;

/// Default number of chunks sent per embeddings request
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 10;

/// Default max file size (1MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Status line reported after a successful resolve
pub const INDEX_READY_MESSAGE: &str = "Index initialized successfully.";
