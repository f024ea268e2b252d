//! Indexing logic: chunk documents, embed chunks, keep vectors in memory

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    embed::{cosine_similarity, l2_norm, Embedder},
    extract::{self, Document},
    AskError, Config, Result, SourcePath,
};

/// Version of the persisted layout written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Progress events emitted while resolving an index.
#[derive(Debug, Clone)]
pub enum ProgressEvent<'a> {
    /// Trying the persisted index.
    Loading { storage: &'a Path },
    /// Reading documents from the source path.
    Reading { source: &'a SourcePath },
    /// Generating embeddings.
    Embedding { current: usize, total: usize },
    /// Writing the index to storage.
    Persisting { storage: &'a Path },
}

/// Type alias for progress callback.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send>;

/// Metadata stored with each chunk vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Identifier of the owning document
    pub doc_id: String,
    /// Chunk index within the document
    pub chunk_index: usize,
    /// Starting line number
    pub start_line: usize,
    /// Ending line number
    pub end_line: usize,
    /// The actual text content
    pub text: String,
}

/// A chunk together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub payload: ChunkPayload,
    pub embedding: Vec<f32>,
}

/// Describes how an index was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub format_version: u32,
    pub embed_model: String,
    pub dimension: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub document_count: usize,
    pub chunk_count: usize,
    /// Build time (unix timestamp)
    pub created_at: u64,
}

/// Stats from an indexing run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks_created: usize,
    pub embedding_requests: usize,
}

/// A chunk returned from a similarity search.
#[derive(Debug, Clone)]
pub struct ScoredChunk<'a> {
    pub score: f32,
    pub payload: &'a ChunkPayload,
}

/// In-memory vector index over a document set.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    metadata: IndexMetadata,
    documents: Vec<Document>,
    chunks: Vec<StoredChunk>,
    norms: Vec<f32>,
}

impl VectorIndex {
    /// Chunk and embed `documents`, batching requests by `config.embed_batch_size`.
    pub fn build(
        documents: Vec<Document>,
        config: &Config,
        embedder: &dyn Embedder,
        progress: Option<&ProgressCallback>,
    ) -> Result<(Self, IndexStats)> {
        if documents.is_empty() {
            return Err(AskError::Build("no documents to index".to_string()));
        }
        if config.embed_batch_size == 0 {
            return Err(AskError::Build(
                "embedding batch size must be greater than 0".to_string(),
            ));
        }

        let mut payloads = Vec::new();
        for doc in &documents {
            for chunk in extract::chunk_text(&doc.text, config.chunk_size, config.chunk_overlap) {
                payloads.push(ChunkPayload {
                    doc_id: doc.id.clone(),
                    chunk_index: chunk.index,
                    start_line: chunk.start_line,
                    end_line: chunk.end_line,
                    text: chunk.text,
                });
            }
        }
        if payloads.is_empty() {
            return Err(AskError::Build(
                "documents contain no text to index".to_string(),
            ));
        }

        let mut stats = IndexStats {
            documents: documents.len(),
            chunks_created: payloads.len(),
            embedding_requests: 0,
        };

        let total = payloads.len();
        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(total);
        for batch in payloads.chunks(config.embed_batch_size) {
            let texts: Vec<&str> = batch.iter().map(|p| p.text.as_str()).collect();
            let batch_embeddings = embedder
                .embed_batch(&texts)
                .map_err(|e| AskError::Build(format!("embedding failed: {}", e)))?;
            stats.embedding_requests += 1;

            if batch_embeddings.len() != texts.len() {
                return Err(AskError::Build(format!(
                    "embedder returned {} vectors for {} chunks",
                    batch_embeddings.len(),
                    texts.len()
                )));
            }
            embeddings.extend(batch_embeddings);

            if let Some(callback) = progress {
                callback(ProgressEvent::Embedding {
                    current: embeddings.len(),
                    total,
                });
            }
            tracing::debug!("Embedded {}/{} chunks", embeddings.len(), total);
        }

        let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
        let chunks: Vec<StoredChunk> = payloads
            .into_iter()
            .zip(embeddings)
            .map(|(payload, embedding)| StoredChunk { payload, embedding })
            .collect();

        let metadata = IndexMetadata {
            format_version: FORMAT_VERSION,
            embed_model: embedder.model().to_string(),
            dimension,
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            document_count: documents.len(),
            chunk_count: chunks.len(),
            created_at: unix_now(),
        };

        let index = Self::from_parts(metadata, documents, chunks).map_err(AskError::Build)?;
        Ok((index, stats))
    }

    /// Reassemble an index, checking that the parts agree with each other.
    /// The error string describes the first inconsistency found.
    pub fn from_parts(
        metadata: IndexMetadata,
        documents: Vec<Document>,
        chunks: Vec<StoredChunk>,
    ) -> std::result::Result<Self, String> {
        if metadata.format_version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {} (expected {})",
                metadata.format_version, FORMAT_VERSION
            ));
        }
        if metadata.document_count != documents.len() || metadata.chunk_count != chunks.len() {
            return Err(format!(
                "metadata lists {} documents/{} chunks, found {}/{}",
                metadata.document_count,
                metadata.chunk_count,
                documents.len(),
                chunks.len()
            ));
        }

        let ids: HashSet<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        for chunk in &chunks {
            if !ids.contains(chunk.payload.doc_id.as_str()) {
                return Err(format!(
                    "chunk references unknown document {}",
                    chunk.payload.doc_id
                ));
            }
            if chunk.embedding.len() != metadata.dimension {
                return Err(format!(
                    "vector of length {} in a {}-dimensional index",
                    chunk.embedding.len(),
                    metadata.dimension
                ));
            }
        }

        let norms = chunks.iter().map(|c| l2_norm(&c.embedding)).collect();
        Ok(Self {
            metadata,
            documents,
            chunks,
            norms,
        })
    }

    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn chunks(&self) -> &[StoredChunk] {
        &self.chunks
    }

    /// Return the `limit` chunks most similar to `query`, best first.
    /// Ties keep index order.
    pub fn search(&self, query: &[f32], limit: usize) -> Vec<ScoredChunk<'_>> {
        let query_norm = l2_norm(query);
        let mut scored: Vec<ScoredChunk<'_>> = self
            .chunks
            .iter()
            .zip(&self.norms)
            .map(|(chunk, norm)| ScoredChunk {
                score: cosine_similarity(query, &chunk.embedding, query_norm, *norm),
                payload: &chunk.payload,
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        scored
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds text as [len, count('a'), count('b')].
    struct LetterEmbedder {
        calls: AtomicUsize,
    }

    impl Embedder for LetterEmbedder {
        fn model(&self) -> &str {
            "letters"
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    vec![
                        t.len() as f32,
                        t.matches('a').count() as f32,
                        t.matches('b').count() as f32,
                    ]
                })
                .collect())
        }
    }

    fn letter_embedder() -> LetterEmbedder {
        LetterEmbedder {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_build_batches_requests() {
        let config = Config {
            chunk_size: 10,
            chunk_overlap: 0,
            embed_batch_size: 2,
            ..Config::default()
        };
        let docs = vec![
            Document::new("one", "aaaa\nbbbb\ncccc\n"),
            Document::new("two", "abab\n"),
        ];
        let embedder = letter_embedder();

        let (index, stats) = VectorIndex::build(docs, &config, &embedder, None).unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.chunks_created, index.chunks().len());
        assert_eq!(stats.embedding_requests, stats.chunks_created.div_ceil(2));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), stats.embedding_requests);
        assert_eq!(index.metadata().dimension, 3);
        assert_eq!(index.metadata().embed_model, "letters");
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let docs = vec![
            Document::new("as", "aaaaaaaa"),
            Document::new("bs", "bbbbbbbb"),
        ];
        let embedder = letter_embedder();
        let (index, _) = VectorIndex::build(docs, &Config::default(), &embedder, None).unwrap();

        let query = embedder.embed("bbb").unwrap();
        let results = index.search(&query, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].payload.doc_id, "bs");
    }

    #[test]
    fn test_build_rejects_blank_documents() {
        let embedder = letter_embedder();
        let result = VectorIndex::build(
            vec![Document::new("empty", "")],
            &Config::default(),
            &embedder,
            None,
        );
        assert!(matches!(result, Err(AskError::Build(_))));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_build_rejects_zero_batch_size() {
        let config = Config {
            embed_batch_size: 0,
            ..Config::default()
        };
        let embedder = letter_embedder();
        let result = VectorIndex::build(
            vec![Document::new("one", "abc")],
            &config,
            &embedder,
            None,
        );
        assert!(matches!(result, Err(AskError::Build(_))));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_from_parts_detects_dangling_chunk() {
        let embedder = letter_embedder();
        let (index, _) = VectorIndex::build(
            vec![Document::new("a", "aaa")],
            &Config::default(),
            &embedder,
            None,
        )
        .unwrap();

        let mut chunks = index.chunks().to_vec();
        chunks[0].payload.doc_id = "missing".into();
        let result = VectorIndex::from_parts(
            index.metadata().clone(),
            index.documents().to_vec(),
            chunks,
        );
        assert!(result.unwrap_err().contains("unknown document"));
    }
}
