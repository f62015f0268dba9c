//! Line-oriented content diff with a bounded scan
//!
//! Compares two content snapshots positionally, line by line, and reports
//! the differing lines grouped into consecutive same-kind runs. Scanning
//! stops once [`MAX_DIFF_LINES`] differing lines have been found so that a
//! large page cannot make a check arbitrarily expensive.

use serde::{Deserialize, Serialize};

/// Maximum number of differing lines inspected per comparison
pub const MAX_DIFF_LINES: usize = 20;

/// How a single line differs between the old and new content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

/// A run of consecutive changed lines of the same kind
///
/// `line` is the 1-based number of the first line of the run; `old` and
/// `new` are the newline-joined non-empty lines of each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChange {
    pub line: u32,
    pub kind: ChangeKind,
    pub old: String,
    pub new: String,
}

/// Summary of a content comparison
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffInfo {
    /// Number of differing lines found before the scan cap
    pub total_changed_lines: u32,
    pub changes: Vec<LineChange>,
}

/// Compare two content snapshots line by line
///
/// Pure and deterministic: identical inputs always produce identical
/// output. Lines present on only one side compare as empty on the other.
pub fn diff(old: &str, new: &str) -> DiffInfo {
    let old_lines: Vec<&str> = old.split('\n').collect();
    let new_lines: Vec<&str> = new.split('\n').collect();
    let line_count = old_lines.len().max(new_lines.len());

    let mut found: Vec<(usize, &str, &str, ChangeKind)> = Vec::new();
    for i in 0..line_count {
        let old_line = old_lines.get(i).copied().unwrap_or("");
        let new_line = new_lines.get(i).copied().unwrap_or("");
        if old_line == new_line {
            continue;
        }
        found.push((i + 1, old_line, new_line, classify(old_line, new_line)));
        if found.len() == MAX_DIFF_LINES {
            break;
        }
    }

    let total_changed_lines = found.len() as u32;

    struct Run<'a> {
        line: usize,
        kind: ChangeKind,
        old: Vec<&'a str>,
        new: Vec<&'a str>,
    }

    let mut runs: Vec<Run<'_>> = Vec::new();
    for (line, old_line, new_line, kind) in found {
        match runs.last_mut() {
            // Adjacent by line number and same kind: extend the run
            Some(run) if run.kind == kind && run.line + run.old.len() == line => {
                run.old.push(old_line);
                run.new.push(new_line);
            }
            _ => runs.push(Run {
                line,
                kind,
                old: vec![old_line],
                new: vec![new_line],
            }),
        }
    }

    let changes = runs
        .into_iter()
        .map(|run| LineChange {
            line: run.line as u32,
            kind: run.kind,
            old: join_non_empty(&run.old),
            new: join_non_empty(&run.new),
        })
        .collect();

    DiffInfo {
        total_changed_lines,
        changes,
    }
}

fn classify(old_line: &str, new_line: &str) -> ChangeKind {
    if old_line.is_empty() && !new_line.is_empty() {
        ChangeKind::Added
    } else if !old_line.is_empty() && new_line.is_empty() {
        ChangeKind::Removed
    } else {
        ChangeKind::Modified
    }
}

fn join_non_empty(lines: &[&str]) -> String {
    lines
        .iter()
        .filter(|line| !line.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}
