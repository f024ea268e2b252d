//! Index lifecycle: load-or-build, query, delete

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::{
    embed::Embedder,
    extract,
    index::{IndexStats, ProgressCallback, ProgressEvent, VectorIndex},
    llm::Llm,
    openai::{OpenAiClient, OpenAiEmbedder, OpenAiLlm},
    search::{QueryResult, Searcher},
    AskError, Config, DeletePolicy, LoadOutcome, Result, SourcePath, Storage,
};

/// Config plus the model clients resolved from it.
#[derive(Clone)]
pub struct ServiceContext {
    config: Config,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn Llm>,
}

impl ServiceContext {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, llm: Arc<dyn Llm>) -> Self {
        Self {
            config,
            embedder,
            llm,
        }
    }

    /// OpenAI-compatible embedder and chat model for `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let client = OpenAiClient::new(&config)?;
        let embedder = OpenAiEmbedder::new(client.clone(), config.embed_model.clone());
        let llm = OpenAiLlm::new(client, config.llm_model.clone());
        Ok(Self::new(config, Arc::new(embedder), Arc::new(llm)))
    }

    /// Resolve configuration from the environment and build the clients.
    pub fn from_env() -> Result<Self> {
        Self::from_config(Config::from_env()?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn llm(&self) -> &dyn Llm {
        self.llm.as_ref()
    }
}

impl fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContext")
            .field("api_base", &self.config.api_base)
            .field("embed_model", &self.embedder.model())
            .field("llm_model", &self.llm.model())
            .finish()
    }
}

/// A ready index and the services it answers queries with.
#[derive(Debug)]
pub struct IndexHandle {
    index: VectorIndex,
    services: ServiceContext,
}

impl IndexHandle {
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn services(&self) -> &ServiceContext {
        &self.services
    }
}

/// Lifecycle of the process-wide index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Uninitialized,
    Ready,
    /// The last resolve failed. An earlier handle may still be held.
    Failed,
}

/// How a successful resolve obtained its index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Loaded from storage; the source path was not read.
    Loaded,
    /// Built from the source path and persisted.
    Built(IndexStats),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The user declined; nothing was touched.
    Cancelled,
    Deleted { handle_dropped: bool },
}

/// Owns the single index slot and its persisted storage.
pub struct IndexManager {
    storage: Storage,
    handle: Option<IndexHandle>,
    last_failed: bool,
    progress_callback: Option<ProgressCallback>,
}

impl IndexManager {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            handle: None,
            last_failed: false,
            progress_callback: None,
        }
    }

    /// Set a callback to receive progress updates while resolving.
    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress_callback = Some(callback);
    }

    fn emit_progress(&self, event: ProgressEvent) {
        if let Some(ref callback) = self.progress_callback {
            callback(event);
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn handle(&self) -> Option<&IndexHandle> {
        self.handle.as_ref()
    }

    pub fn state(&self) -> IndexState {
        if self.last_failed {
            IndexState::Failed
        } else if self.handle.is_some() {
            IndexState::Ready
        } else {
            IndexState::Uninitialized
        }
    }

    /// Load the persisted index, or build one from `source` and persist it.
    ///
    /// On success the new handle replaces any previous one. On failure the
    /// previous handle is kept and the state becomes [`IndexState::Failed`].
    pub fn resolve_or_build(
        &mut self,
        source: &SourcePath,
        services: ServiceContext,
    ) -> Result<ResolveOutcome> {
        self.resolve_or_build_with(source, || Ok(services))
    }

    /// Like [`IndexManager::resolve_or_build`], resolving the services first.
    /// A failure to resolve them counts as a failed resolve.
    pub fn resolve_or_build_with<F>(
        &mut self,
        source: &SourcePath,
        make_services: F,
    ) -> Result<ResolveOutcome>
    where
        F: FnOnce() -> Result<ServiceContext>,
    {
        let resolved = make_services().and_then(|services| {
            let (index, outcome) = self.load_or_build(source, &services)?;
            Ok((index, outcome, services))
        });

        match resolved {
            Ok((index, outcome, services)) => {
                tracing::info!(
                    "Index ready: {} documents, {} chunks",
                    index.metadata().document_count,
                    index.metadata().chunk_count
                );
                self.handle = Some(IndexHandle { index, services });
                self.last_failed = false;
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!("Failed to initialize index from {}: {}", source, e);
                self.last_failed = true;
                Err(e)
            }
        }
    }

    fn load_or_build(
        &self,
        source: &SourcePath,
        services: &ServiceContext,
    ) -> Result<(VectorIndex, ResolveOutcome)> {
        services.config().validate()?;

        let storage_dir = self.storage.dir();
        self.emit_progress(ProgressEvent::Loading {
            storage: storage_dir,
        });

        match self.storage.load(services.embedder().model())? {
            LoadOutcome::Loaded(index) => {
                tracing::info!("Loaded index from {}", storage_dir.display());
                return Ok((index, ResolveOutcome::Loaded));
            }
            LoadOutcome::NotFound => {
                tracing::info!("No index at {}, building from {}", storage_dir.display(), source);
            }
            LoadOutcome::Corrupt(reason) => {
                tracing::warn!(
                    "Failed to load index from {} ({}), rebuilding from {}",
                    storage_dir.display(),
                    reason,
                    source
                );
            }
        }

        self.emit_progress(ProgressEvent::Reading { source });
        let documents = extract::load_source(source, services.config(), storage_dir)?;
        tracing::debug!("Read {} documents", documents.len());

        let (index, stats) = VectorIndex::build(
            documents,
            services.config(),
            services.embedder(),
            self.progress_callback.as_ref(),
        )?;

        self.emit_progress(ProgressEvent::Persisting {
            storage: storage_dir,
        });
        self.storage.persist(&index)?;

        Ok((index, ResolveOutcome::Built(stats)))
    }

    /// Answer `text` from the current index.
    pub fn query(&self, text: &str) -> Result<QueryResult> {
        let handle = self.handle.as_ref().ok_or(AskError::NotReady)?;
        let services = &handle.services;
        Searcher::new(
            &handle.index,
            services.embedder(),
            services.llm(),
            services.config().top_k,
        )
        .query(text)
    }

    /// Remove the persisted index once `confirm` agrees.
    ///
    /// The in-memory handle survives unless its config sets the delete
    /// policy to [`DeletePolicy::Invalidate`].
    pub fn delete_storage<F>(&mut self, confirm: F) -> Result<DeleteOutcome>
    where
        F: FnOnce(&Path) -> bool,
    {
        if !confirm(self.storage.dir()) {
            tracing::debug!("Storage deletion cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }

        self.storage.delete()?;
        tracing::info!("Deleted storage {}", self.storage.dir().display());

        let policy = self
            .handle
            .as_ref()
            .map(|h| h.services.config().delete_policy)
            .unwrap_or_default();
        let handle_dropped = match policy {
            DeletePolicy::Keep => false,
            DeletePolicy::Invalidate => {
                self.last_failed = false;
                self.handle.take().is_some()
            }
        };
        Ok(DeleteOutcome::Deleted { handle_dropped })
    }
}

impl fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexManager")
            .field("storage", &self.storage)
            .field("state", &self.state())
            .finish()
    }
}
