//! # Module Metadata Documents
//!
//! Every module repository describes itself in a small bracket-tag text file,
//! conventionally `lib/ModuleInfo.txt`:
//!
//! ```text
//! [Module Name] Frame Assembly
//! [Module Info] Aluminium extrusion frame,
//! continued on the next line.
//! [Module Address] https://github.com/example/frame-bolts
//! [Module Address] https://gitlab.com/example/frame-panels/-/tree/dev
//! [Team/Assigned] Mechanical
//! [Completed] In progress
//! [Tasks]
//! [Cut extrusions] Completed Yes
//! [Drill holes] Completed No
//! ```
//!
//! ## Parsing
//!
//! Parsing happens in two passes:
//!
//! 1.  **Line classification (`entries`)**: each line becomes a key line, a
//!     continuation, or nothing. Continuations are folded into a preceding
//!     `[Module Info]` entry; anywhere else they are dropped. The result is a
//!     flat list of `(key, value)` pairs.
//! 2.  **Semantic mapping (`ModuleRecord::from_entries`)**: pairs are mapped
//!     onto the typed `ModuleRecord`. Key matching is case-insensitive.
//!
//! Parsing never fails. Lines that cannot be classified are skipped, and
//! bracketed keys the engine does not understand are kept in
//! `ModuleRecord::extensions`.
//!
//! ## Patching
//!
//! `MetadataDocument` keeps the raw lines of a file so a single field can be
//! rewritten without touching anything else. This is how status fields and
//! deployment timestamps are written back to disk.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Directory inside a module repository that holds the metadata file.
pub const METADATA_DIR: &str = "lib";

/// Recognized bracket keys.
pub mod keys {
    pub const MODULE_NAME: &str = "Module Name";
    pub const MODULE_INFO: &str = "Module Info";
    pub const MODULE_ADDRESS: &str = "Module Address";
    pub const MODULE_BRANCH: &str = "Module Branch";
    pub const ASSIGNED: &str = "Team/Assigned";
    pub const COMPLETED: &str = "Completed";
    pub const DEPLOYED: &str = "Deployed";
    pub const TASKS: &str = "Tasks";
}

/// Value of a task line inside a `[Tasks]` block, e.g. `Completed Yes`.
static TASK_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^completed\s+(yes|no)$").expect("valid task regex"));

/// Progress state of a module, stored in the `[Completed]` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl CompletionStatus {
    /// Interpret the value of a `[Completed]` line.
    ///
    /// Anything other than `Yes` or `In progress` counts as not started.
    pub fn from_field(value: &str) -> Self {
        let value = value.trim().to_lowercase();
        match value.as_str() {
            "yes" | "completed" | "true" => CompletionStatus::Completed,
            "in progress" | "in-progress" | "inprogress" => CompletionStatus::InProgress,
            _ => CompletionStatus::NotStarted,
        }
    }

    /// The text written to a `[Completed]` line.
    pub fn as_field(&self) -> &'static str {
        match self {
            CompletionStatus::NotStarted => "No",
            CompletionStatus::InProgress => "In progress",
            CompletionStatus::Completed => "Yes",
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CompletionStatus::NotStarted => "not started",
            CompletionStatus::InProgress => "in progress",
            CompletionStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

impl FromStr for CompletionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "not-started" | "no" => Ok(CompletionStatus::NotStarted),
            "in-progress" => Ok(CompletionStatus::InProgress),
            "completed" | "yes" => Ok(CompletionStatus::Completed),
            other => Err(format!(
                "unknown completion status '{}' (expected not-started, in-progress or completed)",
                other
            )),
        }
    }
}

/// One `[<task name>] Completed Yes|No` line of a `[Tasks]` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub name: String,
    pub completed: bool,
}

/// A `(key, value)` pair produced by line classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

/// Shape of a single raw line.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Key { key: &'a str, value: &'a str },
    Continuation(&'a str),
    Blank,
    /// Starts with `[` but has no closing bracket.
    Malformed,
}

fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }
    if let Some(rest) = trimmed.strip_prefix('[') {
        return match rest.find(']') {
            Some(end) => Line::Key {
                key: rest[..end].trim(),
                value: rest[end + 1..].trim(),
            },
            None => Line::Malformed,
        };
    }
    Line::Continuation(trimmed)
}

fn key_is(key: &str, expected: &str) -> bool {
    key.trim().eq_ignore_ascii_case(expected)
}

/// First pass: turn raw text into a flat list of key/value entries.
///
/// Continuation lines are appended to a directly preceding `[Module Info]`
/// entry with a single separating space. Blank lines inside a continuation
/// run are skipped without ending it; any bracketed line ends it.
pub fn entries(text: &str) -> Vec<Entry> {
    let mut out: Vec<Entry> = Vec::new();
    let mut folding = false;

    for raw in text.lines() {
        match classify(raw) {
            Line::Key { key, value } => {
                folding = key_is(key, keys::MODULE_INFO);
                out.push(Entry {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
            Line::Continuation(text) => {
                if folding {
                    if let Some(last) = out.last_mut() {
                        if !last.value.is_empty() {
                            last.value.push(' ');
                        }
                        last.value.push_str(text);
                    }
                }
            }
            Line::Blank => {}
            Line::Malformed => folding = false,
        }
    }

    out
}

/// Parsed content of a module metadata file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleRecord {
    pub name: Option<String>,
    pub description: String,
    pub branch: Option<String>,
    /// Declared child addresses in document order, duplicates included.
    pub submodule_addresses: Vec<String>,
    pub assigned: Option<String>,
    pub completed: Option<CompletionStatus>,
    pub deployed: Option<String>,
    pub tasks: Vec<TaskEntry>,
    /// Bracketed keys without a meaning to the engine, in document order.
    pub extensions: Vec<(String, String)>,
}

impl ModuleRecord {
    /// Parse a metadata document. Never fails.
    pub fn parse(text: &str) -> Self {
        Self::from_entries(entries(text))
    }

    /// Second pass: map classified entries onto a record.
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut record = ModuleRecord::default();
        let mut in_tasks = false;

        for Entry { key, value } in entries {
            if in_tasks {
                if let Some(caps) = TASK_VALUE.captures(&value) {
                    record.tasks.push(TaskEntry {
                        name: key,
                        completed: caps[1].eq_ignore_ascii_case("yes"),
                    });
                    continue;
                }
                in_tasks = false;
            }

            if key_is(&key, keys::MODULE_NAME) {
                record.name = Some(value).filter(|v| !v.is_empty());
            } else if key_is(&key, keys::MODULE_INFO) {
                record.description = value;
            } else if key_is(&key, keys::MODULE_ADDRESS) {
                if !value.is_empty() {
                    record.submodule_addresses.push(value);
                }
            } else if key_is(&key, keys::MODULE_BRANCH) {
                if !value.is_empty() {
                    record.branch = Some(value);
                }
            } else if key_is(&key, keys::ASSIGNED) {
                record.assigned = Some(value);
            } else if key_is(&key, keys::COMPLETED) {
                record.completed = Some(CompletionStatus::from_field(&value));
            } else if key_is(&key, keys::DEPLOYED) {
                record.deployed = Some(value);
            } else if key_is(&key, keys::TASKS) {
                in_tasks = true;
            } else {
                record.extensions.push((key, value));
            }
        }

        record
    }

    /// Serialize in canonical field order.
    pub fn to_document(&self) -> String {
        let mut lines = Vec::new();
        let mut push = |key: &str, value: &str| {
            if value.is_empty() {
                lines.push(format!("[{}]", key));
            } else {
                lines.push(format!("[{}] {}", key, value));
            }
        };

        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            push(keys::MODULE_NAME, name);
        }
        if !self.description.is_empty() {
            push(keys::MODULE_INFO, &self.description);
        }
        if let Some(branch) = &self.branch {
            push(keys::MODULE_BRANCH, branch);
        }
        for address in &self.submodule_addresses {
            push(keys::MODULE_ADDRESS, address);
        }
        if let Some(assigned) = &self.assigned {
            push(keys::ASSIGNED, assigned);
        }
        if let Some(completed) = self.completed {
            push(keys::COMPLETED, completed.as_field());
        }
        if let Some(deployed) = &self.deployed {
            push(keys::DEPLOYED, deployed);
        }
        for (key, value) in &self.extensions {
            push(key, value);
        }
        if !self.tasks.is_empty() {
            push(keys::TASKS, "");
            for task in &self.tasks {
                let state = if task.completed { "Yes" } else { "No" };
                push(&task.name, &format!("Completed {}", state));
            }
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// Look up an extension field by key, case-insensitively.
    pub fn extension(&self, key: &str) -> Option<&str> {
        self.extensions
            .iter()
            .find(|(k, _)| key_is(k, key))
            .map(|(_, v)| v.as_str())
    }
}

/// A metadata file held as raw lines, for targeted edits.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataDocument {
    lines: Vec<String>,
    trailing_newline: bool,
}

impl MetadataDocument {
    pub fn parse(text: &str) -> Self {
        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);
        let lines = if text.is_empty() {
            Vec::new()
        } else {
            body.split('\n').map(str::to_string).collect()
        };
        Self {
            lines,
            trailing_newline,
        }
    }

    /// Typed view of the current content.
    pub fn record(&self) -> ModuleRecord {
        ModuleRecord::parse(&self.render())
    }

    /// Value of the first line with the given key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match classify(line) {
            Line::Key { key: k, value } if key_is(k, key) => Some(value),
            _ => None,
        })
    }

    /// Replace the first line whose key matches, or append a new line.
    ///
    /// The matched line keeps its own spelling of the key and its line
    /// ending. No other line is touched.
    pub fn set_field(&mut self, key: &str, value: &str) {
        for line in self.lines.iter_mut() {
            let existing_key = match classify(line) {
                Line::Key { key: k, .. } if key_is(k, key) => k.to_string(),
                _ => continue,
            };
            let cr = if line.ends_with('\r') { "\r" } else { "" };
            *line = format!("[{}] {}{}", existing_key, value, cr);
            return;
        }
        self.lines.push(format!("[{}] {}", key, value));
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for MetadataDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "[Module Name] Frame Assembly\n\
[Module Info] Aluminium extrusion frame,\n\
continued on the next line.\n\
[Module Address] https://github.com/example/frame-bolts\n\
[Module Address] https://gitlab.com/example/frame-panels/-/tree/dev\n\
[Team/Assigned] Mechanical\n\
[Completed] In progress\n\
[Tasks]\n\
[Cut extrusions] Completed Yes\n\
[Drill holes] Completed No\n";

    #[test]
    fn test_entries_fold_module_info_continuations() {
        let entries = entries("[Module Info] first\nsecond\n\n  third  \n[Module Name] X\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value, "first second third");
        assert_eq!(entries[1].key, "Module Name");
    }

    #[test]
    fn test_entries_drop_continuations_after_other_keys() {
        let entries = entries("[Module Name] X\nstray text\n[Completed] No\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value, "X");
    }

    #[test]
    fn test_entries_skip_malformed_lines() {
        let entries = entries("[Module Info] a\n[broken line\nb\n[Module Name] X\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value, "a");
    }

    #[test]
    fn test_parse_sample() {
        let record = ModuleRecord::parse(SAMPLE);
        assert_eq!(record.name.as_deref(), Some("Frame Assembly"));
        assert_eq!(
            record.description,
            "Aluminium extrusion frame, continued on the next line."
        );
        assert_eq!(record.submodule_addresses.len(), 2);
        assert_eq!(record.assigned.as_deref(), Some("Mechanical"));
        assert_eq!(record.completed, Some(CompletionStatus::InProgress));
        assert_eq!(
            record.tasks,
            vec![
                TaskEntry {
                    name: "Cut extrusions".to_string(),
                    completed: true
                },
                TaskEntry {
                    name: "Drill holes".to_string(),
                    completed: false
                },
            ]
        );
        assert!(record.extensions.is_empty());
    }

    #[test]
    fn test_parse_keys_case_insensitive() {
        let record = ModuleRecord::parse("[module name] lower\n[MODULE ADDRESS] https://github.com/u/a\n[module branch] dev\n");
        assert_eq!(record.name.as_deref(), Some("lower"));
        assert_eq!(record.submodule_addresses, vec!["https://github.com/u/a"]);
        assert_eq!(record.branch.as_deref(), Some("dev"));
    }

    #[test]
    fn test_parse_keeps_duplicate_addresses_in_order() {
        let record = ModuleRecord::parse(
            "[Module Address] https://github.com/u/b\n[Module Address] https://github.com/u/a\n[Module Address] https://github.com/u/b\n",
        );
        assert_eq!(
            record.submodule_addresses,
            vec![
                "https://github.com/u/b",
                "https://github.com/u/a",
                "https://github.com/u/b"
            ]
        );
    }

    #[test]
    fn test_parse_ignores_empty_name_and_branch() {
        let record = ModuleRecord::parse("[Module Name]\n[Module Branch]   \n");
        assert_eq!(record.name, None);
        assert_eq!(record.branch, None);
    }

    #[test]
    fn test_tasks_block_ends_at_non_task_line() {
        let record =
            ModuleRecord::parse("[Tasks]\n[Wire] Completed yes\n[Completed] Yes\n[Extra] Completed No\n");
        assert_eq!(record.tasks.len(), 1);
        assert_eq!(record.completed, Some(CompletionStatus::Completed));
        // Outside the block the same shape is just an unknown key.
        assert_eq!(record.extension("Extra"), Some("Completed No"));
    }

    #[test]
    fn test_unknown_keys_are_extensions() {
        let record = ModuleRecord::parse("[Custom] value\n[Module Name] X\n[Other] \n");
        assert_eq!(
            record.extensions,
            vec![
                ("Custom".to_string(), "value".to_string()),
                ("Other".to_string(), String::new())
            ]
        );
    }

    #[test]
    fn test_completion_status_fields() {
        assert_eq!(CompletionStatus::from_field("Yes"), CompletionStatus::Completed);
        assert_eq!(
            CompletionStatus::from_field("in progress"),
            CompletionStatus::InProgress
        );
        assert_eq!(CompletionStatus::from_field("No"), CompletionStatus::NotStarted);
        assert_eq!(CompletionStatus::from_field("maybe"), CompletionStatus::NotStarted);
        assert_eq!(CompletionStatus::InProgress.as_field(), "In progress");
        assert_eq!(
            "in-progress".parse::<CompletionStatus>(),
            Ok(CompletionStatus::InProgress)
        );
        assert!("done-ish".parse::<CompletionStatus>().is_err());
    }

    #[test]
    fn test_to_document_is_stable() {
        let record = ModuleRecord::parse(SAMPLE);
        let once = record.to_document();
        let twice = ModuleRecord::parse(&once).to_document();
        assert_eq!(once, twice);
        assert!(once.contains("[Tasks]\n[Cut extrusions] Completed Yes\n"));
    }

    #[test]
    fn test_patch_preserves_unknown_lines() {
        let text = "[Module Name] X\n[Custom] keep me exactly  \n[Completed] No\n";
        let mut doc = MetadataDocument::parse(text);
        doc.set_field(keys::COMPLETED, "Yes");
        assert_eq!(
            doc.render(),
            "[Module Name] X\n[Custom] keep me exactly  \n[Completed] Yes\n"
        );
    }

    #[test]
    fn test_patch_matches_key_case_insensitively() {
        let mut doc = MetadataDocument::parse("[team/assigned] None\n[Module Name] X");
        doc.set_field(keys::ASSIGNED, "Electronics");
        assert_eq!(doc.render(), "[team/assigned] Electronics\n[Module Name] X");
        assert_eq!(doc.get("Team/Assigned"), Some("Electronics"));
    }

    #[test]
    fn test_patch_appends_missing_field() {
        let mut doc = MetadataDocument::parse("[Module Name] X");
        doc.set_field(keys::DEPLOYED, "2024-01-02 03:04:05");
        assert_eq!(doc.render(), "[Module Name] X\n[Deployed] 2024-01-02 03:04:05");

        let mut empty = MetadataDocument::parse("");
        empty.set_field(keys::COMPLETED, "No");
        assert_eq!(empty.render(), "[Completed] No");
    }

    #[test]
    fn test_patch_keeps_crlf_line_endings() {
        let mut doc = MetadataDocument::parse("[Completed] No\r\n[Custom] x\r\n");
        doc.set_field(keys::COMPLETED, "Yes");
        assert_eq!(doc.render(), "[Completed] Yes\r\n[Custom] x\r\n");
        assert_eq!(doc.record().completed, Some(CompletionStatus::Completed));
    }
}
