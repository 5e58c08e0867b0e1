use crate::analysis::churn::FileMetrics;
use crate::analysis::complexity::{classify_trend, complexity_score};
use crate::engine::settings::AnalysisConfig;
use crate::error::ForensicsError;
use crate::models::complexity::{ComplexitySample, ComplexityTrend};
use crate::models::file_history::{FileHistory, SnapshotRef};
use crate::models::report::{EntityIssue, IssueKind};
use crate::source::HistorySource;
use rayon::prelude::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct SamplingOutcome {
    pub trends: BTreeMap<String, ComplexityTrend>,
    pub issues: Vec<EntityIssue>,
}

impl SamplingOutcome {
    /// `None` when nothing was readable or the latest version has no source lines.
    pub fn latest_complexity(&self, path: &str) -> Option<f64> {
        self.trends
            .get(path)
            .and_then(|t| t.latest())
            .filter(|score| score.loc > 0)
            .map(|score| score.value)
    }
}

/// Read one planned version as UTF-8 text.
fn read_snapshot(
    source: &dyn HistorySource,
    snapshot: &SnapshotRef,
) -> Result<String, ForensicsError> {
    let retrieval = |reason: String| ForensicsError::SnapshotRetrieval {
        commit: snapshot.commit_id.clone(),
        path: snapshot.path.clone(),
        reason,
    };

    let bytes = source
        .read_content(&snapshot.commit_id, &snapshot.path)
        .map_err(|e| match e {
            ForensicsError::SnapshotRetrieval { reason, .. } => retrieval(reason),
            other => retrieval(other.to_string()),
        })?;
    String::from_utf8(bytes).map_err(|_| retrieval("content is not valid UTF-8".to_string()))
}

/// Reconstruct each live file at its planned snapshots and classify the complexity trend.
///
/// Files are independent, so they are fanned out over the rayon pool and merged at the end.
pub fn sample_complexity(
    source: &dyn HistorySource,
    metrics: &FileMetrics,
    config: &AnalysisConfig,
) -> SamplingOutcome {
    let files: Vec<&FileHistory> = metrics.live_files().collect();

    let per_file: Vec<(String, ComplexityTrend, Vec<EntityIssue>)> = files
        .par_iter()
        .map(|file| sample_file(source, file, config))
        .collect();

    let mut outcome = SamplingOutcome::default();
    for (path, trend, issues) in per_file {
        outcome.trends.insert(path, trend);
        outcome.issues.extend(issues);
    }

    log::debug!(
        "sampled complexity for {} files ({} snapshot failures)",
        outcome.trends.len(),
        outcome.issues.len()
    );
    outcome
}

fn sample_file(
    source: &dyn HistorySource,
    file: &FileHistory,
    config: &AnalysisConfig,
) -> (String, ComplexityTrend, Vec<EntityIssue>) {
    let mut samples = Vec::with_capacity(file.snapshots.len());
    let mut issues = Vec::new();

    for snapshot in &file.snapshots {
        match read_snapshot(source, snapshot) {
            Ok(content) => samples.push(ComplexitySample {
                timestamp: snapshot.timestamp,
                commit_id: snapshot.commit_id.clone(),
                score: complexity_score(&content, &config.complexity),
            }),
            Err(err) => {
                log::warn!("skipping snapshot of {}: {err}", file.path);
                issues.push(EntityIssue {
                    path: Some(file.path.clone()),
                    kind: IssueKind::SnapshotRetrieval,
                    detail: err.to_string(),
                });
            }
        }
    }

    let skipped = issues.len();
    let trend = classify_trend(&file.path, samples, skipped, &config.trend);
    (file.path.clone(), trend, issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::churn::aggregate;
    use crate::models::complexity::{Confidence, TrendClass};
    use crate::source::fixture::{FixtureEdit, FixtureHistory};
    use crate::models::commit::CommitRecord;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn body(functions: usize) -> String {
        (0..functions)
            .map(|i| format!("def f{i}():\n    if x:\n        return {i}\n"))
            .collect()
    }

    #[test]
    fn samples_each_cadence_bucket_and_classifies_growth() {
        let mut history = FixtureHistory::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for month in 0..4 {
            history.commit(
                "alice",
                t0 + Duration::days(31 * month),
                "grow",
                vec![FixtureEdit::write("svc.py", body(4 + month as usize * 2))],
            );
        }

        let config = AnalysisConfig::default();
        let metrics = aggregate(history.commits(), &config).unwrap();
        let outcome = sample_complexity(&history, &metrics, &config);

        let trend = &outcome.trends["svc.py"];
        assert_eq!(trend.samples.len(), 4);
        assert_eq!(trend.confidence, Confidence::Normal);
        assert!(outcome.issues.is_empty());
        assert!(trend.change_pct.unwrap() > 0.0);
        assert!(outcome.latest_complexity("svc.py").unwrap() > trend.samples[0].score.value);
    }

    #[test]
    fn unreadable_snapshot_is_skipped_and_lowers_confidence() {
        let mut history = FixtureHistory::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut ids = Vec::new();
        for month in 0..3 {
            ids.push(history.commit(
                "alice",
                t0 + Duration::days(31 * month),
                "edit",
                vec![FixtureEdit::write("a.py", body(3 + month as usize))],
            ));
        }
        history.mark_unreadable(&ids[1], "a.py");

        let config = AnalysisConfig::default();
        let metrics = aggregate(history.commits(), &config).unwrap();
        let outcome = sample_complexity(&history, &metrics, &config);

        let trend = &outcome.trends["a.py"];
        assert_eq!(trend.samples.len(), 2);
        assert_eq!(trend.skipped_samples, 1);
        assert_eq!(trend.confidence, Confidence::Reduced);
        assert_eq!(trend.class, TrendClass::InsufficientHistory);
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].kind, IssueKind::SnapshotRetrieval);
    }

    struct CountingSource {
        inner: FixtureHistory,
        reads: AtomicUsize,
        binary_path: &'static str,
    }

    impl HistorySource for CountingSource {
        fn list_commits(
            &self,
            since: DateTime<Utc>,
            until: DateTime<Utc>,
        ) -> crate::error::Result<Vec<CommitRecord>> {
            self.inner.list_commits(since, until)
        }

        fn read_content(&self, commit_id: &str, path: &str) -> crate::error::Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if path == self.binary_path {
                return Ok(vec![0xff, 0xfe, 0x00]);
            }
            self.inner.read_content(commit_id, path)
        }
    }

    #[test]
    fn reads_each_planned_snapshot_once_and_rejects_binary_content() {
        let mut history = FixtureHistory::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for month in 0..3 {
            history.commit(
                "alice",
                t0 + Duration::days(31 * month),
                "edit",
                vec![
                    FixtureEdit::write("a.py", body(2 + month as usize)),
                    FixtureEdit::write("logo.png", format!("v{month}")),
                ],
            );
        }

        let config = AnalysisConfig::default();
        let metrics = aggregate(history.commits(), &config).unwrap();
        let planned: usize = metrics.live_files().map(|f| f.snapshots.len()).sum();
        let source = CountingSource {
            inner: history,
            reads: AtomicUsize::new(0),
            binary_path: "logo.png",
        };

        let outcome = sample_complexity(&source, &metrics, &config);
        assert_eq!(planned, 6);
        assert_eq!(source.reads.load(Ordering::SeqCst), planned);
        assert_eq!(outcome.trends["a.py"].samples.len(), 3);
        assert_eq!(outcome.trends["logo.png"].skipped_samples, 3);
        assert!(outcome
            .issues
            .iter()
            .all(|i| i.path.as_deref() == Some("logo.png") && i.detail.contains("UTF-8")));
    }

    #[test]
    fn deleted_files_are_not_sampled() {
        let mut history = FixtureHistory::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        history.commit("alice", t0, "add", vec![FixtureEdit::write("gone.py", body(1))]);
        history.commit(
            "alice",
            t0 + Duration::days(1),
            "remove",
            vec![FixtureEdit::delete("gone.py")],
        );

        let config = AnalysisConfig::default();
        let metrics = aggregate(history.commits(), &config).unwrap();
        let outcome = sample_complexity(&history, &metrics, &config);
        assert!(outcome.trends.is_empty());
    }
}
