//! Retrieval-augmented querying

use serde::Serialize;

use crate::{
    embed::Embedder,
    index::VectorIndex,
    llm::{self, Llm},
    AskError, Result,
};

/// A passage that contributed to an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCitation {
    pub doc_id: String,
    pub score: f32,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

/// The answer to a query plus the passages it was based on, best match first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<SourceCitation>,
}

impl QueryResult {
    /// One `> Source (Doc id: ...): ...` line per citation, passage text
    /// truncated to `max_len` characters.
    pub fn formatted_sources(&self, max_len: usize) -> String {
        self.sources
            .iter()
            .map(|s| format!("> Source (Doc id: {}): {}", s.doc_id, truncate(&s.text, max_len)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.chars().count() > max_len {
        let head: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Searcher for querying an index.
pub struct Searcher<'a> {
    index: &'a VectorIndex,
    embedder: &'a dyn Embedder,
    llm: &'a dyn Llm,
    top_k: usize,
}

impl<'a> Searcher<'a> {
    pub fn new(
        index: &'a VectorIndex,
        embedder: &'a dyn Embedder,
        llm: &'a dyn Llm,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            llm,
            top_k,
        }
    }

    /// Embed the query, retrieve the closest chunks and ask the model.
    pub fn query(&self, text: &str) -> Result<QueryResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AskError::Query("query text is empty".to_string()));
        }

        let query_embedding = self
            .embedder
            .embed(text)
            .map_err(|e| AskError::Query(e.to_string()))?;

        let retrieved = self.index.search(&query_embedding, self.top_k);
        tracing::debug!("Retrieved {} chunks for query", retrieved.len());

        let context: Vec<&str> = retrieved.iter().map(|r| r.payload.text.as_str()).collect();
        let prompt = llm::qa_prompt(&context, text);
        let answer = self
            .llm
            .complete(&prompt)
            .map_err(|e| AskError::Query(e.to_string()))?;

        let sources = retrieved
            .into_iter()
            .map(|r| SourceCitation {
                doc_id: r.payload.doc_id.clone(),
                score: r.score,
                start_line: r.payload.start_line,
                end_line: r.payload.end_line,
                text: r.payload.text.clone(),
            })
            .collect();

        Ok(QueryResult {
            answer: answer.trim().to_string(),
            sources,
        })
    }
}
