//! Interactive session: one command per line, one index per process

use std::path::PathBuf;

use anyhow::Result;
use askdoc_core::{Config, IndexManager, IndexState, SourcePath};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::render::{self, PassageHighlighter};

const HELP: &str = "\
Commands:
  file on|off     Treat loaded paths as a single file (currently {mode})
  load <path>     Load the stored index, or build one from <path>
  ask <question>  Ask a question (any other line is asked as-is)
  delete          Delete the stored index
  status          Show configuration and index state
  help            Show this help
  quit            Leave the session";

/// A parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    SingleFile(bool),
    Load(PathBuf),
    Ask(String),
    Delete,
    Status,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_lowercase().as_str() {
        "file" => match rest.to_lowercase().as_str() {
            "on" | "yes" | "true" => Command::SingleFile(true),
            "off" | "no" | "false" => Command::SingleFile(false),
            _ => Command::Invalid("usage: file on|off".to_string()),
        },
        "load" if rest.is_empty() => Command::Invalid("usage: load <path>".to_string()),
        "load" => Command::Load(PathBuf::from(rest)),
        "ask" if rest.is_empty() => Command::Invalid("usage: ask <question>".to_string()),
        "ask" => Command::Ask(rest.to_string()),
        "delete" if rest.is_empty() => Command::Delete,
        "status" if rest.is_empty() => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Ask(line.to_string()),
    }
}

struct Session {
    manager: IndexManager,
    config: Config,
    single_file: bool,
    highlighter: PassageHighlighter,
}

impl Session {
    /// Run one command. Returns false when the session should end.
    /// Every outcome, success or failure, is printed to the results log.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Empty => {}
            Command::Quit => return false,
            Command::Help => {
                let mode = if self.single_file { "on" } else { "off" };
                println!("{}", HELP.replace("{mode}", mode));
            }
            Command::Invalid(usage) => println!("{}", usage),
            Command::SingleFile(on) => {
                self.single_file = on;
                println!(
                    "Paths are now read as {}.",
                    if on { "a single file" } else { "a folder" }
                );
            }
            Command::Load(path) => {
                let source = SourcePath::new(path, self.single_file);
                if let Err(e) = crate::resolve(&mut self.manager, &source) {
                    println!("Failed to initialize index from {}: {}", source, e);
                }
            }
            Command::Ask(query) => match self.manager.query(&query) {
                Ok(result) => {
                    render::print_query_result(&query, &result, &self.highlighter, false)
                }
                Err(e) => println!("{}", e),
            },
            Command::Delete => {
                let outcome = self.manager.delete_storage(|_| {
                    render::confirm("Are you sure you want to delete the storage?")
                });
                match outcome {
                    Ok(outcome) => crate::report_delete(outcome),
                    Err(e) => println!("{}", e),
                }
            }
            Command::Status => {
                render::print_status(&self.config, self.manager.storage());
                let state = match self.manager.state() {
                    IndexState::Uninitialized => "not loaded",
                    IndexState::Ready => "ready",
                    IndexState::Failed => "last load failed",
                };
                println!();
                println!("Session:");
                println!("  Single file:     {}", if self.single_file { "on" } else { "off" });
                println!("  Index:           {}", state);
            }
        }
        true
    }
}

/// Read commands until `quit`, Ctrl-C or end of input.
pub fn run() -> Result<()> {
    let config = Config::from_env()?;
    let manager = crate::open_manager(&config);
    let mut session = Session {
        manager,
        config,
        single_file: false,
        highlighter: PassageHighlighter::new(),
    };
    let mut rl = DefaultEditor::new()?;

    println!("askdoc interactive session. Type 'help' for commands.");
    loop {
        match rl.readline("askdoc> ") {
            Ok(line) => {
                let command = parse_command(&line);
                if command != Command::Empty {
                    let _ = rl.add_history_entry(line.trim());
                }
                if !session.handle(command) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Exiting...");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
