use crate::models::commit::ChangeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCommit {
    pub commit_id: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    /// Name the file had when this commit touched it.
    pub path_at_commit: String,
    pub kind: ChangeKind,
    pub added: usize,
    pub removed: usize,
}

/// Where to read one sampled version of a file. Content is fetched lazily by the sampler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRef {
    pub timestamp: DateTime<Utc>,
    pub commit_id: String,
    pub path: String,
}

/// History of one logical file, with renames folded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHistory {
    /// Latest name of the file.
    pub path: String,
    /// Earlier names, oldest first.
    pub aliases: Vec<String>,
    pub commits: Vec<FileCommit>,
    pub contributor_counts: BTreeMap<String, usize>,
    pub snapshots: Vec<SnapshotRef>,
    pub weeks_with_concurrent_authors: usize,
    pub deleted: bool,
    /// The first change seen in the window was not a creation, so the file is older than the window.
    #[serde(default)]
    pub existed_before_window: bool,
}

impl FileHistory {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            aliases: Vec::new(),
            commits: Vec::new(),
            contributor_counts: BTreeMap::new(),
            snapshots: Vec::new(),
            weeks_with_concurrent_authors: 0,
            deleted: false,
            existed_before_window: false,
        }
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    pub fn contributor_count(&self) -> usize {
        self.contributor_counts.len()
    }

    pub fn commit_ids(&self) -> Vec<&str> {
        self.commits.iter().map(|c| c.commit_id.as_str()).collect()
    }

    pub fn first_commit_at(&self) -> Option<DateTime<Utc>> {
        self.commits.first().map(|c| c.timestamp)
    }

    pub fn last_commit_at(&self) -> Option<DateTime<Utc>> {
        self.commits.last().map(|c| c.timestamp)
    }

    pub fn total_churn(&self) -> usize {
        self.commits.iter().map(|c| c.added + c.removed).sum()
    }

    pub fn authors(&self) -> BTreeSet<&str> {
        self.contributor_counts.keys().map(String::as_str).collect()
    }
}
