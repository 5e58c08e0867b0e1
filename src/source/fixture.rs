use crate::error::{ForensicsError, Result};
use crate::models::commit::{CommitRecord, FileChange};
use crate::source::HistorySource;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone)]
pub enum FixtureEdit {
    Write { path: String, content: String },
    Rename { from: String, to: String, content: Option<String> },
    Delete { path: String },
}

impl FixtureEdit {
    pub fn write(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Write {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Rename {
            from: from.into(),
            to: to.into(),
            content: None,
        }
    }

    /// Rename and edit in the same commit.
    pub fn rename_with(
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::Rename {
            from: from.into(),
            to: to.into(),
            content: Some(content.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::Delete { path: path.into() }
    }
}

/// In-memory history for tests and synthetic scenarios.
///
/// Every commit records the full tree so content can be read back at any
/// point in history, the way a real VCS would serve it.
#[derive(Debug, Default)]
pub struct FixtureHistory {
    commits: Vec<CommitRecord>,
    trees: HashMap<String, BTreeMap<String, String>>,
    current: BTreeMap<String, String>,
    unreadable: HashSet<(String, String)>,
}

impl FixtureHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `edits` as one commit and return its id.
    pub fn commit(
        &mut self,
        author: &str,
        timestamp: DateTime<Utc>,
        message: &str,
        edits: Vec<FixtureEdit>,
    ) -> String {
        let id = format!("{:040x}", self.commits.len() + 1);
        let mut changes = Vec::with_capacity(edits.len());

        for edit in edits {
            match edit {
                FixtureEdit::Write { path, content } => {
                    let change = match self.current.get(&path) {
                        Some(old) => {
                            let (added, removed) = line_delta(old, &content);
                            FileChange::modified(path.clone(), added, removed)
                        }
                        None => FileChange::added(path.clone(), content.lines().count()),
                    };
                    self.current.insert(path, content);
                    changes.push(change);
                }
                FixtureEdit::Rename { from, to, content } => {
                    let old = self.current.remove(&from).unwrap_or_default();
                    let new = content.unwrap_or_else(|| old.clone());
                    let (added, removed) = line_delta(&old, &new);
                    self.current.insert(to.clone(), new);
                    changes.push(FileChange::renamed(from, to, added, removed));
                }
                FixtureEdit::Delete { path } => {
                    let old = self.current.remove(&path).unwrap_or_default();
                    changes.push(FileChange::deleted(path, old.lines().count()));
                }
            }
        }

        self.trees.insert(id.clone(), self.current.clone());
        self.commits.push(CommitRecord {
            id: id.clone(),
            timestamp,
            author: author.to_string(),
            message: message.to_string(),
            changes,
        });
        id
    }

    /// Make `read_content(commit_id, path)` fail, as a corrupt object would.
    pub fn mark_unreadable(&mut self, commit_id: &str, path: &str) {
        self.unreadable
            .insert((commit_id.to_string(), path.to_string()));
    }

    pub fn commits(&self) -> &[CommitRecord] {
        &self.commits
    }
}

impl HistorySource for FixtureHistory {
    fn list_commits(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CommitRecord>> {
        Ok(self
            .commits
            .iter()
            .filter(|c| since <= c.timestamp && c.timestamp <= until)
            .cloned()
            .collect())
    }

    fn read_content(&self, commit_id: &str, path: &str) -> Result<Vec<u8>> {
        let fail = |reason: &str| ForensicsError::SnapshotRetrieval {
            commit: commit_id.to_string(),
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if self
            .unreadable
            .contains(&(commit_id.to_string(), path.to_string()))
        {
            return Err(fail("object is corrupt"));
        }

        let tree = self.trees.get(commit_id).ok_or_else(|| fail("unknown commit"))?;
        tree.get(path)
            .map(|content| content.as_bytes().to_vec())
            .ok_or_else(|| fail("path not present at commit"))
    }
}

// Multiset line difference; good enough for synthetic diff stats.
fn line_delta(old: &str, new: &str) -> (usize, usize) {
    let mut remaining: HashMap<&str, usize> = HashMap::new();
    for line in old.lines() {
        *remaining.entry(line).or_insert(0) += 1;
    }

    let mut added = 0;
    for line in new.lines() {
        match remaining.get_mut(line) {
            Some(count) if *count > 0 => *count -= 1,
            _ => added += 1,
        }
    }
    let removed = remaining.values().sum();
    (added, removed)
}
