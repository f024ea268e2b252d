//! Document loading and text chunking
//!
//! Files are read as raw UTF-8 text. There is no encoding detection: a
//! single file that does not decode is an error, while undecodable files
//! found during a directory walk are skipped.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{discover, AskError, Config, Result, SourcePath};

/// One ingested file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier: the file path as it was read
    pub id: String,
    /// Raw text content
    pub text: String,
    /// Blake3 hash of the text
    pub hash: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let hash = blake3::hash(text.as_bytes()).to_hex().to_string();
        Self {
            id: id.into(),
            text,
            hash,
        }
    }
}

/// Read a file as one document.
pub fn read_single_file(path: &Path) -> Result<Document> {
    let text = std::fs::read_to_string(path).map_err(|source| AskError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Document::new(path.to_string_lossy(), text))
}

/// Read every file in `files`, skipping the ones that cannot be read as text.
pub fn read_documents(files: &[PathBuf]) -> Vec<Document> {
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        match read_single_file(path) {
            Ok(doc) => documents.push(doc),
            Err(e) => tracing::warn!("Skipping {}", e),
        }
    }
    documents
}

/// Load the documents named by `source`, never reading from `storage_dir`.
pub fn load_source(
    source: &SourcePath,
    config: &Config,
    storage_dir: &Path,
) -> Result<Vec<Document>> {
    match source {
        SourcePath::File(path) => Ok(vec![read_single_file(path)?]),
        SourcePath::Directory(path) => {
            let files = discover::walk_directory(path, config, storage_dir)?;
            let documents = read_documents(&files);
            if documents.is_empty() {
                return Err(AskError::Build(format!(
                    "no readable documents found under {}",
                    path.display()
                )));
            }
            Ok(documents)
        }
    }
}

/// A chunk of text with metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The text content
    pub text: String,
    /// Starting line number (1-indexed)
    pub start_line: usize,
    /// Ending line number (1-indexed)
    pub end_line: usize,
    /// Chunk index within the document
    pub index: usize,
}

/// Split text into chunks of at most `chunk_size` characters with `overlap`
/// characters repeated between neighbours. Chunks prefer to end on a line
/// break.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    // Byte offset of every character, plus the end of the text
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = offsets.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut chunk_index = 0;

    while start < char_count {
        let window_end = (start + chunk_size).min(char_count);
        let start_byte = offsets[start];

        // Try to break at a line boundary inside the window
        let end = if window_end < char_count {
            let window = &text[start_byte..offsets[window_end]];
            window
                .rfind('\n')
                .map(|p| start + window[..=p].chars().count())
                .unwrap_or(window_end)
        } else {
            window_end
        };
        let end_byte = offsets[end];

        let start_line = text[..start_byte].matches('\n').count() + 1;
        let end_line = start_line
            + text[start_byte..end_byte]
                .trim_end_matches('\n')
                .matches('\n')
                .count();

        chunks.push(Chunk {
            text: text[start_byte..end_byte].to_string(),
            start_line,
            end_line,
            index: chunk_index,
        });

        if end >= char_count {
            break;
        }

        start = if overlap < end - start {
            (end - overlap).max(start + 1)
        } else {
            end
        };
        chunk_index += 1;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_chunk_text() {
        let text = "line1\nline2\nline3\nline4\nline5\n";
        let chunks = chunk_text(text, 12, 4);

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].text, "line1\nline2\n");
        assert_eq!(chunks[0].end_line, 2);
        assert!(chunks.iter().all(|c| c.text.len() <= 12));
        assert!(chunks.last().unwrap().text.ends_with("line5\n"));
    }

    #[test]
    fn test_chunk_small_text_is_single_chunk() {
        let chunks = chunk_text("hello", 2000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello");
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 1));
    }

    #[test]
    fn test_chunk_empty() {
        let chunks = chunk_text("", 100, 10);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_chunk_size_counts_characters() {
        let text = "é".repeat(30);
        let chunks = chunk_text(&text, 10, 0);
        let lengths: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
        assert_eq!(lengths, vec![10, 10, 10]);

        let text = "日本語のテキスト".repeat(3);
        let chunks = chunk_text(&text, 10, 2);
        let lengths: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
        assert_eq!(lengths, vec![10, 10, 8]);
        assert_eq!(
            chunks[0].text.chars().skip(8).collect::<String>(),
            chunks[1].text.chars().take(2).collect::<String>()
        );
    }

    #[test]
    fn test_chunk_multibyte_does_not_panic() {
        let text = "héllo wörld ünïcödé ".repeat(20);
        let chunks = chunk_text(&text, 7, 3);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| !c.text.is_empty()));
        assert!(text.ends_with(&chunks.last().unwrap().text));
    }

    #[test]
    fn test_read_single_file_is_raw_contents() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "first line\nsecond line\n").unwrap();

        let doc = read_single_file(&path).unwrap();
        assert_eq!(doc.id, path.to_string_lossy());
        assert_eq!(doc.text, "first line\nsecond line\n");
        assert_eq!(doc.hash, blake3::hash(doc.text.as_bytes()).to_hex().to_string());
    }

    #[test]
    fn test_read_single_file_rejects_invalid_utf8() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("blob.bin");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let result = read_single_file(&path);
        assert!(matches!(result, Err(AskError::Read { .. })));
    }

    #[test]
    fn test_directory_skips_undecodable_files() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "hello").unwrap();
        fs::write(temp.path().join("b.bin"), [0xff, 0xfe]).unwrap();

        let docs = load_source(
            &SourcePath::Directory(temp.path().to_path_buf()),
            &Config::default(),
            &temp.path().join("storage"),
        )
        .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "hello");
    }

    #[test]
    fn test_empty_directory_is_build_error() {
        let temp = tempfile::tempdir().unwrap();
        let result = load_source(
            &SourcePath::Directory(temp.path().to_path_buf()),
            &Config::default(),
            &temp.path().join("storage"),
        );
        assert!(matches!(result, Err(AskError::Build(_))));
    }
}
