use crate::error::{ForensicsError, Result};
use crate::models::commit::{ChangeKind, CommitRecord, FileChange};
use crate::source::HistorySource;
use chrono::{DateTime, TimeZone, Utc};
use git2::{Delta, DiffFindOptions, Oid, Patch, Repository, Sort};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// History source backed by a git repository through libgit2.
///
/// Walks first-parent diffs from HEAD; merge commits are skipped so their
/// changes are not counted twice. Renames are detected with libgit2's
/// similarity search.
pub struct GitHistorySource {
    repo: Mutex<Repository>,
    root: PathBuf,
}

impl GitHistorySource {
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path).map_err(|e| {
            ForensicsError::extraction(format!(
                "NOT_GIT_REPO: {} is not a git repository: {e}",
                path.display()
            ))
        })?;
        let root = repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| repo.path().to_path_buf());
        log::debug!("opened git repository at {}", root.display());

        Ok(Self {
            repo: Mutex::new(repo),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn with_repo<T>(&self, f: impl FnOnce(&Repository) -> Result<T>) -> Result<T> {
        let repo = self
            .repo
            .lock()
            .map_err(|_| ForensicsError::extraction("repository lock poisoned"))?;
        f(&repo)
    }
}

impl HistorySource for GitHistorySource {
    fn list_commits(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CommitRecord>> {
        self.with_repo(|repo| {
            let mut revwalk = repo.revwalk()?;
            revwalk.push_head()?;
            revwalk.set_sorting(Sort::TIME)?;

            let cutoff = since.timestamp();
            let latest = until.timestamp();
            let mut records = Vec::new();
            let mut merges_skipped = 0usize;

            for oid in revwalk {
                let commit = repo.find_commit(oid?)?;
                let seconds = commit.time().seconds();

                if seconds > latest {
                    continue;
                }
                if seconds < cutoff {
                    break;
                }
                if commit.parent_count() > 1 {
                    merges_skipped += 1;
                    continue;
                }

                records.push(commit_record(repo, &commit)?);
            }

            log::debug!(
                "read {} commits from git ({} merges skipped)",
                records.len(),
                merges_skipped
            );
            Ok(records)
        })
    }

    fn read_content(&self, commit_id: &str, path: &str) -> Result<Vec<u8>> {
        let fail = |reason: String| ForensicsError::SnapshotRetrieval {
            commit: commit_id.to_string(),
            path: path.to_string(),
            reason,
        };

        self.with_repo(|repo| {
            let oid = Oid::from_str(commit_id).map_err(|e| fail(e.to_string()))?;
            let commit = repo.find_commit(oid).map_err(|e| fail(e.to_string()))?;
            let tree = commit.tree().map_err(|e| fail(e.to_string()))?;
            let entry = tree
                .get_path(Path::new(path))
                .map_err(|e| fail(e.to_string()))?;
            let object = entry.to_object(repo).map_err(|e| fail(e.to_string()))?;
            let blob = object.peel_to_blob().map_err(|e| fail(e.to_string()))?;
            Ok(blob.content().to_vec())
        })
    }
}

fn commit_record(repo: &Repository, commit: &git2::Commit) -> Result<CommitRecord> {
    let tree = commit.tree()?;
    let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());

    let mut diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
    let mut find = DiffFindOptions::new();
    find.renames(true);
    diff.find_similar(Some(&mut find))?;

    let mut changes = Vec::new();
    for idx in 0..diff.deltas().len() {
        let Some(delta) = diff.get_delta(idx) else {
            continue;
        };

        // Binary files have no patch and therefore no line stats.
        let (added, removed) = match Patch::from_diff(&diff, idx)? {
            Some(patch) => {
                let (_, additions, deletions) = patch.line_stats()?;
                (additions, deletions)
            }
            None => (0, 0),
        };

        let new_path = delta.new_file().path().map(path_string);
        let old_path = delta.old_file().path().map(path_string);

        let change = match (delta.status(), new_path, old_path) {
            (Delta::Added | Delta::Copied, Some(path), _) => FileChange {
                path,
                previous_path: None,
                kind: ChangeKind::Added,
                added,
                removed,
            },
            (Delta::Deleted, _, Some(path)) => FileChange {
                path,
                previous_path: None,
                kind: ChangeKind::Deleted,
                added,
                removed,
            },
            (Delta::Renamed, Some(path), Some(previous)) => FileChange {
                path,
                previous_path: Some(previous),
                kind: ChangeKind::Renamed,
                added,
                removed,
            },
            (Delta::Modified | Delta::Typechange, Some(path), _) => FileChange {
                path,
                previous_path: None,
                kind: ChangeKind::Modified,
                added,
                removed,
            },
            _ => continue,
        };
        changes.push(change);
    }

    let seconds = commit.time().seconds();
    let timestamp = Utc.timestamp_opt(seconds, 0).single().ok_or_else(|| {
        ForensicsError::extraction(format!(
            "commit {} has an invalid timestamp {seconds}",
            commit.id()
        ))
    })?;

    let author = commit.author();
    Ok(CommitRecord {
        id: commit.id().to_string(),
        timestamp,
        author: format!(
            "{} <{}>",
            author.name().unwrap_or("unknown"),
            author.email().unwrap_or("")
        ),
        message: commit.message().unwrap_or("").trim().to_string(),
        changes,
    })
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
