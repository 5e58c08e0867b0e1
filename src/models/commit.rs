use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    /// Path before the change; only set for renames.
    pub previous_path: Option<String>,
    pub kind: ChangeKind,
    pub added: usize,
    pub removed: usize,
}

impl FileChange {
    pub fn added(path: impl Into<String>, lines: usize) -> Self {
        Self {
            path: path.into(),
            previous_path: None,
            kind: ChangeKind::Added,
            added: lines,
            removed: 0,
        }
    }

    pub fn modified(path: impl Into<String>, added: usize, removed: usize) -> Self {
        Self {
            path: path.into(),
            previous_path: None,
            kind: ChangeKind::Modified,
            added,
            removed,
        }
    }

    pub fn deleted(path: impl Into<String>, lines: usize) -> Self {
        Self {
            path: path.into(),
            previous_path: None,
            kind: ChangeKind::Deleted,
            added: 0,
            removed: lines,
        }
    }

    pub fn renamed(
        from: impl Into<String>,
        to: impl Into<String>,
        added: usize,
        removed: usize,
    ) -> Self {
        Self {
            path: to.into(),
            previous_path: Some(from.into()),
            kind: ChangeKind::Renamed,
            added,
            removed,
        }
    }
}

/// One commit as produced by a history source. Never mutated after extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub message: String,
    pub changes: Vec<FileChange>,
}

impl CommitRecord {
    pub fn touched_paths(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|change| change.path.as_str())
    }

    pub fn total_churn(&self) -> usize {
        self.changes.iter().map(|c| c.added + c.removed).sum()
    }
}
