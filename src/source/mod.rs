//! History input boundary.
//!
//! The engine never talks to a VCS directly; everything it knows about a
//! repository comes through [`HistorySource`]. [`git::GitHistorySource`]
//! reads a real repository through libgit2, [`fixture::FixtureHistory`]
//! builds synthetic histories in memory.

pub mod fixture;
pub mod git;

use crate::engine::settings::FULL_WINDOW_DAYS;
use crate::error::{ForensicsError, Result};
use crate::models::commit::{ChangeKind, CommitRecord};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

pub use fixture::FixtureHistory;
pub use git::GitHistorySource;

/// Capability the engine needs from a version-control history.
pub trait HistorySource: Send + Sync {
    /// Commits with `since <= timestamp <= until`, in any order.
    fn list_commits(&self, since: DateTime<Utc>, until: DateTime<Utc>)
        -> Result<Vec<CommitRecord>>;

    /// Content of `path` as of `commit_id`.
    fn read_content(&self, commit_id: &str, path: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl HistoryWindow {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { since, until }
    }

    pub fn ending_at(until: DateTime<Utc>, days: u32) -> Self {
        Self {
            since: until - Duration::days(days as i64),
            until,
        }
    }

    pub fn last_days(days: u32) -> Self {
        Self::ending_at(Utc::now(), days)
    }

    pub fn days(&self) -> f64 {
        (self.until - self.since).num_seconds() as f64 / 86_400.0
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.since <= at && at <= self.until
    }

    pub fn is_full_year(&self) -> bool {
        self.days() >= FULL_WINDOW_DAYS as f64
    }
}

/// Read the commit log for `window`, validated and sorted ascending by `(timestamp, id)`.
///
/// An empty window is an error: callers must not report all-zero metrics for it.
pub fn extract_history(
    source: &dyn HistorySource,
    window: &HistoryWindow,
) -> Result<Vec<CommitRecord>> {
    if window.since >= window.until {
        return Err(ForensicsError::extraction(format!(
            "empty history window: {} is not before {}",
            window.since, window.until
        )));
    }

    let mut commits = source.list_commits(window.since, window.until)?;
    validate_commits(&commits, window)?;

    if commits.is_empty() {
        return Err(ForensicsError::extraction(format!(
            "no commits between {} and {}",
            window.since.date_naive(),
            window.until.date_naive()
        )));
    }

    commits.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    log::info!(
        "extracted {} commits between {} and {}",
        commits.len(),
        window.since.date_naive(),
        window.until.date_naive()
    );
    Ok(commits)
}

/// [`extract_history`] on the blocking pool, bounded by `timeout`.
pub async fn extract_history_with_timeout(
    source: Arc<dyn HistorySource>,
    window: HistoryWindow,
    timeout: std::time::Duration,
) -> Result<Vec<CommitRecord>> {
    let task = tokio::task::spawn_blocking(move || extract_history(source.as_ref(), &window));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ForensicsError::extraction(format!(
            "history extraction task failed: {join_err}"
        ))),
        Err(_) => Err(ForensicsError::extraction(format!(
            "history extraction timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

fn validate_commits(commits: &[CommitRecord], window: &HistoryWindow) -> Result<()> {
    let mut seen = HashSet::with_capacity(commits.len());

    for commit in commits {
        if commit.id.trim().is_empty() {
            return Err(ForensicsError::extraction("commit with empty id"));
        }
        if !seen.insert(commit.id.as_str()) {
            return Err(ForensicsError::extraction(format!(
                "duplicate commit id {}",
                commit.id
            )));
        }
        if !window.contains(commit.timestamp) {
            return Err(ForensicsError::extraction(format!(
                "commit {} at {} lies outside the requested window",
                commit.id, commit.timestamp
            )));
        }
        for change in &commit.changes {
            if change.path.trim().is_empty() {
                return Err(ForensicsError::extraction(format!(
                    "commit {} has a change with an empty path",
                    commit.id
                )));
            }
            if change.kind == ChangeKind::Renamed && change.previous_path.is_none() {
                return Err(ForensicsError::extraction(format!(
                    "commit {} renames {} without a previous path",
                    commit.id, change.path
                )));
            }
        }
    }

    Ok(())
}
