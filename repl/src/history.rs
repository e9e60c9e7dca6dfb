use crate::completer::RxCompleter;
use crate::display::{self, DisplayConfig, OutputMode};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rustyline::error::ReadlineError;
use rustyline::history::{DefaultHistory, History, SearchDirection};
use rustyline::{Editor, Result};
use serde_json::json;
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Entries listed by a bare `.history`.
const SHOWN_ENTRIES: usize = 20;

/// What an input line asked the shell to explain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Template,
    Count,
    Sort,
    Derive,
    Schema,
    Setting,
    History,
}

impl EntryKind {
    pub fn classify(line: &str) -> Self {
        let trimmed = line.trim_start();
        if !trimmed.starts_with('.') {
            // bare lines are templates
            return EntryKind::Template;
        }
        match trimmed.split_whitespace().next().unwrap_or_default() {
            ".template" | ".t" => EntryKind::Template,
            ".count" => EntryKind::Count,
            ".sort" => EntryKind::Sort,
            ".derive" | ".d" => EntryKind::Derive,
            ".entity" | ".use" | ".entities" => EntryKind::Schema,
            ".history" | ".hist" => EntryKind::History,
            _ => EntryKind::Setting,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryKind::Template => "template",
            EntryKind::Count => "count",
            EntryKind::Sort => "sort",
            EntryKind::Derive => "derive",
            EntryKind::Schema => "schema",
            EntryKind::Setting => "setting",
            EntryKind::History => "history",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// 1-based, as accepted by `.history <n>`.
    pub number: usize,
    pub kind: EntryKind,
    pub text: String,
}

/// The most recent `shown` entries, multiline templates folded onto one line.
pub fn recent_entries<H: History>(history: &H, shown: usize) -> Vec<HistoryEntry> {
    let len = history.len();
    (len.saturating_sub(shown)..len)
        .filter_map(|index| {
            let found = history.get(index, SearchDirection::Forward).ok().flatten()?;
            let text = found.entry.split_whitespace().collect::<Vec<_>>().join(" ");
            Some(HistoryEntry {
                number: index + 1,
                kind: EntryKind::classify(&text),
                text,
            })
        })
        .collect()
}

pub struct HistoryManager {
    path: PathBuf,
}

impl HistoryManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self, editor: &mut Editor<RxCompleter, DefaultHistory>) {
        match editor.load_history(&self.path) {
            Ok(()) => tracing::debug!("Loaded history from {}", self.path.display()),
            Err(ReadlineError::Io(err)) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("No history at {}", self.path.display());
            }
            Err(err) => tracing::warn!("Ignoring unreadable history {}: {}", self.path.display(), err),
        }
    }

    pub fn save(&self, editor: &mut Editor<RxCompleter, DefaultHistory>) -> Result<()> {
        editor.save_history(&self.path)
    }

    pub fn display(&self, editor: &Editor<RxCompleter, DefaultHistory>, config: &DisplayConfig) {
        let entries = recent_entries(editor.history(), SHOWN_ENTRIES);
        if entries.is_empty() {
            display::print_info("No history available");
            return;
        }

        match config.output_mode {
            OutputMode::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec!["#", "Kind", "Entry"]);
                for entry in &entries {
                    table.add_row(vec![
                        entry.number.to_string(),
                        entry.kind.to_string(),
                        display::truncate(&entry.text, config.max_column_width + 20),
                    ]);
                }
                println!("{}", table);
                display::print_hint("Use .history <n> to explain entry n again");
            }
            OutputMode::Json => {
                let value: Vec<_> = entries
                    .iter()
                    .map(|e| json!({"number": e.number, "kind": e.kind.to_string(), "text": e.text}))
                    .collect();
                println!("{}", serde_json::Value::Array(value));
            }
            OutputMode::Plain => {
                for entry in &entries {
                    println!("{:4} {:9} {}", entry.number, entry.kind, entry.text);
                }
            }
        }
    }

    /// The line to run again for `.history <n>`.
    pub fn replay(
        &self,
        editor: &Editor<RxCompleter, DefaultHistory>,
        n: usize,
    ) -> std::result::Result<String, String> {
        let history = editor.history();
        let entry = n
            .checked_sub(1)
            .and_then(|index| history.get(index, SearchDirection::Forward).ok().flatten())
            .map(|found| found.entry.to_string())
            .ok_or_else(|| format!("History entry {} not found", n))?;

        if EntryKind::classify(&entry) == EntryKind::History {
            return Err(format!("Entry {} is itself a .history command", n));
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(lines: &[&str]) -> DefaultHistory {
        let mut history = DefaultHistory::new();
        for line in lines {
            history.add(line).unwrap();
        }
        history
    }

    #[test]
    fn test_classifies_entries() {
        assert_eq!(EntryKind::classify("select u from User u;"), EntryKind::Template);
        assert_eq!(EntryKind::classify(".d findByName"), EntryKind::Derive);
        assert_eq!(EntryKind::classify(".sort select u from User u ; name"), EntryKind::Sort);
        assert_eq!(EntryKind::classify(".entity User *id:int"), EntryKind::Schema);
        assert_eq!(EntryKind::classify(".hist 3"), EntryKind::History);
        assert_eq!(EntryKind::classify(".mode json"), EntryKind::Setting);
    }

    #[test]
    fn test_recent_entries_are_numbered_and_folded() {
        let history = history(&[
            ".use User",
            "select u\n  from User u;",
            ".derive findByAgeGreaterThan",
        ]);

        let entries = recent_entries(&history, 2);
        assert_eq!(
            entries,
            vec![
                HistoryEntry {
                    number: 2,
                    kind: EntryKind::Template,
                    text: "select u from User u;".to_string(),
                },
                HistoryEntry {
                    number: 3,
                    kind: EntryKind::Derive,
                    text: ".derive findByAgeGreaterThan".to_string(),
                },
            ]
        );
        assert_eq!(recent_entries(&history, 20).len(), 3);
    }
}
