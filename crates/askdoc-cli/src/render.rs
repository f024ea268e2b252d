//! Terminal output: results log, progress spinner, syntax-highlighted passages

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

use askdoc_core::index::{ProgressCallback, ProgressEvent};
use askdoc_core::{Config, QueryResult, SourceCitation, Storage};
use indicatif::{ProgressBar, ProgressStyle};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::as_24_bit_terminal_escaped;

/// Passages longer than this are shown as head and tail only
const MAX_PASSAGE_LINES: usize = 12;
const HEAD_LINES: usize = 5;
const TAIL_LINES: usize = 3;

const THEME: &str = "base16-ocean.dark";

/// Passage length in `--plain` citations
const PLAIN_SOURCE_LEN: usize = 100;

/// Spinner driven by index progress events.
pub fn progress_spinner() -> (ProgressBar, ProgressCallback) {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let callback: ProgressCallback = Box::new({
        let pb = pb.clone();
        move |event| match event {
            ProgressEvent::Loading { storage } => {
                pb.enable_steady_tick(std::time::Duration::from_millis(100));
                pb.set_message(format!("Loading index from {}...", storage.display()));
            }
            ProgressEvent::Reading { source } => {
                pb.set_message(format!("Reading {}...", source));
            }
            ProgressEvent::Embedding { current, total } => {
                pb.set_message(format!("Embedding chunks {}/{}...", current, total));
            }
            ProgressEvent::Persisting { storage } => {
                pb.set_message(format!("Saving index to {}...", storage.display()));
            }
        }
    });

    (pb, callback)
}

/// Print an answer and its citations, query first.
///
/// Citations are highlighted only when stdout is a terminal.
pub fn print_query_result(
    query: &str,
    result: &QueryResult,
    highlighter: &PassageHighlighter,
    plain: bool,
) {
    println!("{} Results:", query);
    println!("{}", result.answer);

    if plain || !io::stdout().is_terminal() {
        println!("{}", result.formatted_sources(PLAIN_SOURCE_LEN));
        return;
    }

    for (i, source) in result.sources.iter().enumerate() {
        print_source(i + 1, source, highlighter);
    }
}

fn print_source(rank: usize, source: &SourceCitation, highlighter: &PassageHighlighter) {
    println!(
        "\x1b[1;36m> Source [{}]\x1b[0m \x1b[1m{}\x1b[0m lines {}-{}  {}score {:.3}\x1b[0m",
        rank,
        source.doc_id,
        source.start_line,
        source.end_line,
        score_color(source.score),
        source.score,
    );

    let lines: Vec<&str> = source.text.lines().collect();
    let highlighted = highlighter.highlight_lines(&source.doc_id, &lines);
    print!("{}", format_passage(&highlighted, source.start_line));
}

fn score_color(score: f32) -> &'static str {
    if score > 0.8 {
        "\x1b[32m"
    } else if score > 0.7 {
        "\x1b[33m"
    } else {
        "\x1b[31m"
    }
}

/// Number passage lines from `start_line`, eliding the middle of long passages.
fn format_passage(lines: &[String], start_line: usize) -> String {
    let last_line = start_line + lines.len().saturating_sub(1);
    let width = last_line.to_string().len();
    let numbered = |offset: usize| {
        format!("  {:>width$} │ {}\n", start_line + offset, lines[offset], width = width)
    };

    let mut out = String::new();
    if lines.len() <= MAX_PASSAGE_LINES {
        for offset in 0..lines.len() {
            out.push_str(&numbered(offset));
        }
        return out;
    }

    let tail_start = lines.len() - TAIL_LINES;
    for offset in 0..HEAD_LINES {
        out.push_str(&numbered(offset));
    }
    out.push_str(&format!(
        "  {:>width$} ┆ \x1b[2mlines {}-{} omitted\x1b[0m\n",
        "",
        start_line + HEAD_LINES,
        start_line + tail_start - 1,
        width = width
    ));
    for offset in tail_start..lines.len() {
        out.push_str(&numbered(offset));
    }
    out
}

/// Ask a yes/no question on stdin. Anything but "y"/"yes" is a no.
pub fn confirm(question: &str) -> bool {
    print!("{} [y/N] ", question);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

/// Print configuration and what the storage directory holds.
pub fn print_status(config: &Config, storage: &Storage) {
    println!("Configuration:");
    println!("  API base:        {}", config.api_base);
    println!("  API key:         {}", config.masked_api_key());
    println!("  Chat model:      {}", config.llm_model);
    println!("  Embedding model: {}", config.embed_model);
    println!(
        "  Chunk size:      {} chars ({} overlap)",
        config.chunk_size, config.chunk_overlap
    );
    println!("  Top-k:           {}", config.top_k);
    println!();
    println!("Storage: {}", storage.dir().display());
    match storage.metadata() {
        Ok(Some(meta)) => {
            println!("  Documents:       {}", meta.document_count);
            println!("  Chunks:          {}", meta.chunk_count);
            println!("  Embedding model: {} ({} dims)", meta.embed_model, meta.dimension);
        }
        Ok(None) if storage.exists() => println!("  (incomplete, will be rebuilt)"),
        Ok(None) => println!("  (empty)"),
        Err(e) => println!("  (unreadable: {})", e),
    }
}

/// Highlights cited passages by the language of their document.
pub struct PassageHighlighter {
    syntaxes: SyntaxSet,
    theme: Option<Theme>,
}

impl PassageHighlighter {
    pub fn new() -> Self {
        let mut themes = ThemeSet::load_defaults();
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme: themes.themes.remove(THEME),
        }
    }

    /// Syntax picked from the document id's extension, then its file name
    /// (for `Makefile` and friends), falling back to plain text.
    fn syntax_for(&self, doc_id: &str) -> &SyntaxReference {
        let path = Path::new(doc_id);
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.syntaxes.find_syntax_by_extension(ext))
            .or_else(|| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .and_then(|name| self.syntaxes.find_syntax_by_extension(name))
            })
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text())
    }

    /// Highlight every line of a passage. Parser state carries across lines,
    /// so callers pass the whole passage even if they only show part of it.
    pub fn highlight_lines(&self, doc_id: &str, lines: &[&str]) -> Vec<String> {
        let Some(theme) = &self.theme else {
            return lines.iter().map(|line| line.to_string()).collect();
        };
        let mut highlighter = HighlightLines::new(self.syntax_for(doc_id), theme);

        lines
            .iter()
            .map(|line| {
                let line_with_newline = format!("{}\n", line);
                match highlighter.highlight_line(&line_with_newline, &self.syntaxes) {
                    Ok(ranges) => format!(
                        "{}\x1b[0m",
                        as_24_bit_terminal_escaped(&ranges, false).trim_end_matches('\n')
                    ),
                    Err(_) => line.to_string(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_format_passage_pads_to_last_line_number() {
        let out = format_passage(&owned(&["a", "b"]), 9);
        assert_eq!(out, "   9 │ a\n  10 │ b\n");
    }

    #[test]
    fn test_format_passage_elides_middle() {
        let lines: Vec<String> = (1..=20).map(|i| format!("line{}", i)).collect();
        let out = format_passage(&lines, 1);
        assert!(out.contains("   5 │ line5\n"));
        assert!(!out.contains("line6\n"));
        assert!(out.contains("lines 6-17 omitted"));
        assert!(out.contains("  18 │ line18\n"));
        assert!(out.ends_with("  20 │ line20\n"));
    }

    #[test]
    fn test_highlight_keeps_line_text() {
        let highlighter = PassageHighlighter::new();
        let lines = ["fn main() {", "    println!(\"hi\");", "}"];
        let out = highlighter.highlight_lines("src/main.rs", &lines);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|l| !l.contains('\n')));
        assert!(out[1].contains("println"));
    }

    #[test]
    fn test_syntax_falls_back_to_plain_text() {
        let highlighter = PassageHighlighter::new();
        assert_eq!(highlighter.syntax_for("notes.unknownext").name, "Plain Text");
        assert_eq!(highlighter.syntax_for("lib.rs").name, "Rust");
    }
}
