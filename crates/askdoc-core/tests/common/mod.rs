#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use askdoc_core::{AskError, Config, Embedder, Llm, Result, ServiceContext};

/// Deterministic embedder: [greeting words, "world", bias]. Counts requests.
pub struct CountingEmbedder {
    model: String,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl CountingEmbedder {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_requests(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl Embedder for CountingEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AskError::Api("status=500: embedding backend down".into()));
        }
        Ok(texts
            .iter()
            .map(|t| {
                let t = t.to_lowercase();
                let greeting = (t.matches("hello").count() + t.matches("greeting").count()) as f32;
                vec![greeting, t.matches("world").count() as f32, 1.0]
            })
            .collect())
    }
}

/// Answers with the first context passage. Records every prompt.
pub struct EchoLlm {
    prompts: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl EchoLlm {
    pub fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    pub fn fail_requests(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl Llm for EchoLlm {
    fn model(&self) -> &str {
        "echo"
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(AskError::Api("failed to call chat endpoint: connection refused".into()));
        }
        let first_passage = prompt
            .split("---------------------\n")
            .nth(1)
            .and_then(|context| context.lines().next())
            .unwrap_or("");
        Ok(format!("  The context says: {}\n", first_passage))
    }
}

pub struct Services {
    pub embedder: Arc<CountingEmbedder>,
    pub llm: Arc<EchoLlm>,
}

impl Services {
    pub fn new() -> Self {
        Self::with_model("mock-embed")
    }

    pub fn with_model(model: &str) -> Self {
        Self {
            embedder: Arc::new(CountingEmbedder::new(model)),
            llm: Arc::new(EchoLlm::new()),
        }
    }

    pub fn context(&self, config: Config) -> ServiceContext {
        ServiceContext::new(config, self.embedder.clone(), self.llm.clone())
    }

    pub fn remote_calls(&self) -> usize {
        self.embedder.call_count() + self.llm.call_count()
    }
}

pub fn test_config() -> Config {
    Config {
        api_key: Some("sk-test".into()),
        ..Config::default()
    }
}

/// Write `files` (relative path, contents) below `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(rel, contents)| {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, contents).unwrap();
            path
        })
        .collect()
}
