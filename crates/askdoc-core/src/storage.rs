//! Persisted index storage: three JSON artifacts in one fixed directory

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    extract::Document,
    index::{IndexMetadata, StoredChunk, VectorIndex},
    AskError, Result,
};

const DOCSTORE_FILE: &str = "docstore.json";
const VECTOR_STORE_FILE: &str = "vector_store.json";
const INDEX_STORE_FILE: &str = "index_store.json";

/// Result of trying to load the persisted index.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(VectorIndex),
    /// Nothing has been persisted yet.
    NotFound,
    /// Something is persisted but cannot be used; carries the reason.
    Corrupt(String),
}

/// The storage directory for the persisted index.
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    fn docstore_path(&self) -> PathBuf {
        self.dir.join(DOCSTORE_FILE)
    }

    fn vector_store_path(&self) -> PathBuf {
        self.dir.join(VECTOR_STORE_FILE)
    }

    fn index_store_path(&self) -> PathBuf {
        self.dir.join(INDEX_STORE_FILE)
    }

    /// Read the persisted metadata without loading vectors.
    pub fn metadata(&self) -> Result<Option<IndexMetadata>> {
        match read_json::<IndexMetadata>(&self.index_store_path()) {
            Ok(meta) => Ok(Some(meta)),
            Err(ReadFailure::Missing) => Ok(None),
            Err(ReadFailure::Decode(reason)) => Err(AskError::Storage(reason)),
            Err(ReadFailure::Io(e)) => Err(e.into()),
        }
    }

    /// Try to load the persisted index built with `embed_model`.
    ///
    /// Missing or unusable artifacts are reported through [`LoadOutcome`];
    /// only I/O failures other than "not found" are returned as errors.
    pub fn load(&self, embed_model: &str) -> Result<LoadOutcome> {
        match fs::metadata(&self.dir) {
            Ok(m) if m.is_dir() => {}
            Ok(_) => {
                return Ok(LoadOutcome::Corrupt(format!(
                    "{} is not a directory",
                    self.dir.display()
                )));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LoadOutcome::NotFound),
            Err(e) => return Err(self.storage_error("inspect", &self.dir, e)),
        }

        let metadata: IndexMetadata = match self.read_artifact(&self.index_store_path())? {
            Ok(m) => m,
            Err(reason) => return Ok(LoadOutcome::Corrupt(reason)),
        };
        if metadata.embed_model != embed_model {
            return Ok(LoadOutcome::Corrupt(format!(
                "index was built with embedding model {}, configured model is {}",
                metadata.embed_model, embed_model
            )));
        }

        let documents: Vec<Document> = match self.read_artifact(&self.docstore_path())? {
            Ok(d) => d,
            Err(reason) => return Ok(LoadOutcome::Corrupt(reason)),
        };
        let chunks: Vec<StoredChunk> = match self.read_artifact(&self.vector_store_path())? {
            Ok(c) => c,
            Err(reason) => return Ok(LoadOutcome::Corrupt(reason)),
        };

        Ok(match VectorIndex::from_parts(metadata, documents, chunks) {
            Ok(index) => LoadOutcome::Loaded(index),
            Err(reason) => LoadOutcome::Corrupt(reason),
        })
    }

    /// Write the index, replacing whatever was stored before.
    pub fn persist(&self, index: &VectorIndex) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| self.storage_error("create", &self.dir, e))?;

        // Metadata last: load checks the other two artifacts against it
        self.write_artifact(&self.docstore_path(), index.documents())?;
        self.write_artifact(&self.vector_store_path(), index.chunks())?;
        self.write_artifact(&self.index_store_path(), index.metadata())?;

        tracing::info!(
            "Persisted {} documents / {} chunks to {}",
            index.metadata().document_count,
            index.metadata().chunk_count,
            self.dir.display()
        );
        Ok(())
    }

    /// Remove the storage directory and everything in it.
    pub fn delete(&self) -> Result<()> {
        fs::remove_dir_all(&self.dir).map_err(|source| AskError::Delete {
            path: self.dir.clone(),
            source,
        })
    }

    /// Outer error: real I/O failure. Inner error: artifact missing or undecodable.
    fn read_artifact<T: DeserializeOwned>(
        &self,
        path: &Path,
    ) -> Result<std::result::Result<T, String>> {
        match read_json(path) {
            Ok(value) => Ok(Ok(value)),
            Err(ReadFailure::Missing) => Ok(Err(format!("{} is missing", path.display()))),
            Err(ReadFailure::Decode(reason)) => Ok(Err(reason)),
            Err(ReadFailure::Io(e)) => Err(self.storage_error("read", path, e)),
        }
    }

    fn write_artifact<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let tmp = path.with_extension("tmp");
        let json = serde_json::to_vec(value)?;
        fs::write(&tmp, json).map_err(|e| self.storage_error("write", &tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| self.storage_error("finalize", path, e))?;
        Ok(())
    }

    fn storage_error(&self, action: &str, path: &Path, e: std::io::Error) -> AskError {
        AskError::Storage(format!("failed to {} {}: {}", action, path.display(), e))
    }
}

enum ReadFailure {
    Missing,
    Decode(String),
    Io(std::io::Error),
}

fn read_json<T: DeserializeOwned>(path: &Path) -> std::result::Result<T, ReadFailure> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(ReadFailure::Missing),
        Err(e) => return Err(ReadFailure::Io(e)),
    };
    serde_json::from_slice(&bytes)
        .map_err(|e| ReadFailure::Decode(format!("failed to decode {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{embed::Embedder, Config};

    struct FixedEmbedder;

    impl Embedder for FixedEmbedder {
        fn model(&self) -> &str {
            "fixed"
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn sample_index() -> VectorIndex {
        let docs = vec![Document::new("a.txt", "hello"), Document::new("b.txt", "world")];
        VectorIndex::build(docs, &Config::default(), &FixedEmbedder, None)
            .unwrap()
            .0
    }

    #[test]
    fn test_missing_dir_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let storage = Storage::new(temp.path().join("storage"));
        assert!(matches!(storage.load("fixed").unwrap(), LoadOutcome::NotFound));
        assert!(storage.metadata().unwrap().is_none());
    }

    #[test]
    fn test_persist_then_load() {
        let temp = tempfile::tempdir().unwrap();
        let storage = Storage::new(temp.path().join("storage"));
        let index = sample_index();
        storage.persist(&index).unwrap();

        match storage.load("fixed").unwrap() {
            LoadOutcome::Loaded(loaded) => {
                assert_eq!(loaded.documents(), index.documents());
                assert_eq!(loaded.chunks(), index.chunks());
                assert_eq!(loaded.metadata(), index.metadata());
            }
            other => panic!("expected Loaded, got {:?}", other),
        }
        assert!(!temp.path().join("storage/docstore.tmp").exists());
    }

    #[test]
    fn test_persist_overwrites() {
        let temp = tempfile::tempdir().unwrap();
        let storage = Storage::new(temp.path().join("storage"));
        storage.persist(&sample_index()).unwrap();

        let single = VectorIndex::build(
            vec![Document::new("c.txt", "only")],
            &Config::default(),
            &FixedEmbedder,
            None,
        )
        .unwrap()
        .0;
        storage.persist(&single).unwrap();

        let LoadOutcome::Loaded(loaded) = storage.load("fixed").unwrap() else {
            panic!("expected Loaded");
        };
        assert_eq!(loaded.documents().len(), 1);
        assert_eq!(loaded.documents()[0].id, "c.txt");
    }

    #[test]
    fn test_corrupt_artifacts() {
        let temp = tempfile::tempdir().unwrap();
        let storage = Storage::new(temp.path().join("storage"));

        // Empty directory: metadata missing
        fs::create_dir_all(storage.dir()).unwrap();
        assert!(matches!(storage.load("fixed").unwrap(), LoadOutcome::Corrupt(_)));

        // Garbage vectors
        storage.persist(&sample_index()).unwrap();
        fs::write(storage.dir().join(VECTOR_STORE_FILE), "not json").unwrap();
        let LoadOutcome::Corrupt(reason) = storage.load("fixed").unwrap() else {
            panic!("expected Corrupt");
        };
        assert!(reason.contains("vector_store.json"));
    }

    #[test]
    fn test_model_mismatch_is_corrupt() {
        let temp = tempfile::tempdir().unwrap();
        let storage = Storage::new(temp.path().join("storage"));
        storage.persist(&sample_index()).unwrap();

        let LoadOutcome::Corrupt(reason) = storage.load("other-model").unwrap() else {
            panic!("expected Corrupt");
        };
        assert!(reason.contains("other-model"));
    }

    #[test]
    fn test_storage_path_is_a_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("storage");
        fs::write(&path, "oops").unwrap();
        assert!(matches!(Storage::new(&path).load("fixed").unwrap(), LoadOutcome::Corrupt(_)));
    }

    #[test]
    fn test_delete() {
        let temp = tempfile::tempdir().unwrap();
        let storage = Storage::new(temp.path().join("storage"));
        storage.persist(&sample_index()).unwrap();
        assert!(storage.exists());

        storage.delete().unwrap();
        assert!(!storage.exists());

        // Second delete has nothing to remove
        assert!(matches!(storage.delete(), Err(AskError::Delete { .. })));
    }
}
