use crate::engine::settings::AnalysisConfig;
use crate::error::Result;
use crate::models::commit::{ChangeKind, CommitRecord};
use crate::models::file_history::{FileCommit, FileHistory, SnapshotRef};
use crate::source::HistoryWindow;
use chrono::{DateTime, Datelike, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Logical files touched by one commit, named by their latest path.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitTouch {
    pub commit_id: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub message: String,
    pub paths: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FileMetrics {
    /// Latest path → history of that logical file
    pub files: BTreeMap<String, FileHistory>,
    pub touches: Vec<CommitTouch>,
    pub authors: BTreeSet<String>,
}

impl FileMetrics {
    pub fn total_commits(&self) -> usize {
        self.touches.len()
    }

    /// Files still present at the end of the window.
    pub fn live_files(&self) -> impl Iterator<Item = &FileHistory> {
        self.files.values().filter(|f| !f.deleted)
    }
}

/// Group commits into one history per logical file, following renames.
pub fn aggregate(commits: &[CommitRecord], config: &AnalysisConfig) -> Result<FileMetrics> {
    let excludes = config.exclude_matchers()?;
    let is_excluded = |path: &str| excludes.iter().any(|p| p.matches(path));

    let mut ordered: Vec<&CommitRecord> = commits.iter().collect();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    let mut logical: Vec<FileHistory> = Vec::new();
    let mut alias: HashMap<String, usize> = HashMap::new();
    let mut touched: Vec<(&CommitRecord, BTreeSet<usize>)> = Vec::with_capacity(ordered.len());
    let mut authors = BTreeSet::new();

    for commit in ordered {
        authors.insert(commit.author.clone());
        let mut ids = BTreeSet::new();

        for change in &commit.changes {
            if is_excluded(&change.path) {
                // Moving into an excluded path takes the file out of the analysed set.
                if change.kind == ChangeKind::Renamed {
                    if let Some(id) = change.previous_path.as_deref().and_then(|p| alias.remove(p)) {
                        logical[id].deleted = true;
                    }
                }
                continue;
            }

            let id = match change.kind {
                ChangeKind::Renamed => {
                    let previous = change.previous_path.as_deref().unwrap_or(&change.path);
                    let id = match alias.remove(previous) {
                        Some(id) => id,
                        None => new_file(&mut logical, &change.path),
                    };
                    alias.insert(change.path.clone(), id);
                    let file = &mut logical[id];
                    if file.path != change.path {
                        let old = std::mem::replace(&mut file.path, change.path.clone());
                        file.aliases.push(old);
                    }
                    file.deleted = false;
                    id
                }
                ChangeKind::Deleted => {
                    let id = match alias.remove(&change.path) {
                        Some(id) => id,
                        None => new_file(&mut logical, &change.path),
                    };
                    logical[id].deleted = true;
                    id
                }
                ChangeKind::Added | ChangeKind::Modified => {
                    let id = match alias.get(&change.path) {
                        Some(id) => *id,
                        None => {
                            let id = new_file(&mut logical, &change.path);
                            alias.insert(change.path.clone(), id);
                            id
                        }
                    };
                    logical[id].deleted = false;
                    id
                }
            };

            let file = &mut logical[id];
            if !ids.insert(id) {
                // Same logical file twice in one commit: fold into the entry already recorded.
                if let Some(last) = file.commits.last_mut() {
                    last.added += change.added;
                    last.removed += change.removed;
                    last.path_at_commit = change.path.clone();
                    last.kind = change.kind;
                }
                continue;
            }

            file.commits.push(FileCommit {
                commit_id: commit.id.clone(),
                timestamp: commit.timestamp,
                author: commit.author.clone(),
                path_at_commit: change.path.clone(),
                kind: change.kind,
                added: change.added,
                removed: change.removed,
            });
        }

        touched.push((commit, ids));
    }

    for file in &mut logical {
        finish_history(file, config.snapshot_cadence_days);
    }

    let keys = assign_keys(&logical);
    let touches = touched
        .into_iter()
        .map(|(commit, ids)| CommitTouch {
            commit_id: commit.id.clone(),
            timestamp: commit.timestamp,
            author: commit.author.clone(),
            message: commit.message.clone(),
            paths: ids.into_iter().map(|id| keys[id].clone()).collect(),
        })
        .collect();

    let files: BTreeMap<String, FileHistory> = keys.into_iter().zip(logical).collect();

    log::debug!(
        "aggregated {} logical files from {} commits",
        files.len(),
        commits.len()
    );

    Ok(FileMetrics {
        files,
        touches,
        authors,
    })
}

fn new_file(logical: &mut Vec<FileHistory>, path: &str) -> usize {
    logical.push(FileHistory::new(path));
    logical.len() - 1
}

fn finish_history(file: &mut FileHistory, cadence_days: u32) {
    let mut counts = BTreeMap::new();
    let mut weeks: BTreeMap<(i32, u32), BTreeSet<&str>> = BTreeMap::new();

    for commit in &file.commits {
        *counts.entry(commit.author.clone()).or_insert(0) += 1;
        let week = commit.timestamp.iso_week();
        weeks
            .entry((week.year(), week.week()))
            .or_default()
            .insert(commit.author.as_str());
    }

    file.existed_before_window = file
        .commits
        .first()
        .map_or(false, |c| c.kind != ChangeKind::Added);
    file.weeks_with_concurrent_authors = weeks.values().filter(|a| a.len() >= 2).count();
    file.contributor_counts = counts;
    file.snapshots = plan_snapshots(&file.commits, cadence_days);
}

/// Last readable version in every cadence bucket, counted from the file's first commit.
fn plan_snapshots(commits: &[FileCommit], cadence_days: u32) -> Vec<SnapshotRef> {
    let Some(first) = commits.first() else {
        return Vec::new();
    };
    let bucket_secs = cadence_days.max(1) as i64 * 86_400;

    let mut buckets: BTreeMap<i64, &FileCommit> = BTreeMap::new();
    for commit in commits.iter().filter(|c| c.kind != ChangeKind::Deleted) {
        let bucket = (commit.timestamp - first.timestamp).num_seconds() / bucket_secs;
        buckets.insert(bucket, commit);
    }

    buckets
        .into_values()
        .map(|c| SnapshotRef {
            timestamp: c.timestamp,
            commit_id: c.commit_id.clone(),
            path: c.path_at_commit.clone(),
        })
        .collect()
}

// Live files own their path; a deleted file whose name was reused gets a suffix.
fn assign_keys(logical: &[FileHistory]) -> Vec<String> {
    let mut keys = vec![String::new(); logical.len()];
    let mut taken = BTreeSet::new();

    let live = logical.iter().enumerate().filter(|(_, f)| !f.deleted);
    let dead = logical.iter().enumerate().filter(|(_, f)| f.deleted);
    for (idx, file) in live.chain(dead) {
        let mut key = file.path.clone();
        let mut n = 1;
        while taken.contains(&key) {
            n += 1;
            key = format!("{}~{}", file.path, n);
        }
        taken.insert(key.clone());
        keys[idx] = key;
    }
    keys
}

/// Commits per day of file age within `window`.
///
/// Old files accumulate commits simply by existing; comparing raw counts
/// across files without this normalisation is meaningless. A file created
/// before the window is as old as the window itself.
pub fn change_frequency(history: &FileHistory, window: &HistoryWindow) -> f64 {
    let Some(first) = history.first_commit_at() else {
        return 0.0;
    };
    let born = if history.existed_before_window {
        window.since.min(first)
    } else {
        first
    };
    let age_days = ((window.until - born).num_seconds() as f64 / 86_400.0).max(1.0);
    history.commit_count() as f64 / age_days
}
