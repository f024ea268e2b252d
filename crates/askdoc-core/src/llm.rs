//! Language-model completion and the question-answering prompt

use crate::Result;

/// Produces a text completion for a prompt.
pub trait Llm: Send + Sync {
    /// Name of the chat model.
    fn model(&self) -> &str;

    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Render the question-answering prompt from retrieved passages.
pub fn qa_prompt(context: &[&str], query: &str) -> String {
    let context = context.join("\n\n");
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {query}\n\
         Answer: "
    )
}
