use chrono::{DateTime, Duration, TimeZone, Utc};
use gitforensics::engine::settings::FULL_WINDOW_DAYS;
use gitforensics::models::commit::CommitRecord;
use gitforensics::models::complexity::Confidence;
use gitforensics::models::ownership::ConcentrationClass;
use gitforensics::models::report::IssueKind;
use gitforensics::models::risk::FileStatus;
use gitforensics::source::fixture::FixtureEdit;
use gitforensics::{
    analyze_source, run_analysis, AnalysisConfig, AnalysisRequest, CostParameters,
    FixtureHistory, ForensicsError, HistorySource, HistoryWindow, TeamMapping,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 3, 1, 10, 0, 0).unwrap()
}

fn python_module(functions: usize) -> String {
    (0..functions)
        .map(|i| {
            format!(
                "def step_{i}(ctx):\n    if ctx.ready:\n        for item in ctx.items:\n            ctx.apply(item, {i})\n    return ctx\n\n"
            )
        })
        .collect()
}

struct Scenario {
    history: FixtureHistory,
    last_core_commit: String,
    window: HistoryWindow,
}

/// Six files, sixty commits, one of them every five days. `core.py` takes forty
/// commits from eleven authors; `api.py` rides along whenever dev00 or dev01
/// commits, so it never has more than two authors.
fn scenario() -> Scenario {
    let mut history = FixtureHistory::new();
    let others = ["db.py", "utils.py", "config.yaml", "README.md"];
    let mut last_core_commit = String::new();

    for i in 0..60usize {
        let at = t0() + Duration::days(5 * i as i64);
        let message = if i % 5 == 0 { "fix: guard empty batch" } else { "feat: extend pipeline" };

        if i < 40 {
            let dev = i % 11;
            let author = format!("dev{dev:02} <dev{dev:02}@example.com>");
            let mut edits = vec![FixtureEdit::write("core.py", python_module(4 + i))];
            if dev < 2 {
                edits.push(FixtureEdit::write("api.py", python_module(2 + i / 8)));
            }
            last_core_commit = history.commit(&author, at, message, edits);
        } else {
            let path = others[i % others.len()];
            let content = match path {
                "config.yaml" => format!("retries: {i}\ntimeout: 30\n"),
                "README.md" => format!("# Pipeline\n\nRevision {i}.\n"),
                _ => python_module(1 + i % 3),
            };
            history.commit(
                if i % 2 == 0 { "erin <erin@example.com>" } else { "frank <frank@example.com>" },
                at,
                message,
                vec![FixtureEdit::write(path, content)],
            );
        }
    }

    Scenario {
        history,
        last_core_commit,
        window: HistoryWindow::ending_at(t0() + Duration::days(300), FULL_WINDOW_DAYS),
    }
}

#[test]
fn end_to_end_report_matches_expected_shape() {
    init_logging();
    let scenario = scenario();
    let request = AnalysisRequest::new(scenario.window)
        .with_cost(CostParameters::new(110.0, 12_000.0, 8));

    let report = run_analysis(&scenario.history, &AnalysisConfig::default(), &request)
        .expect("analysis succeeds");

    assert_eq!(report.commit_count, 60);
    assert_eq!(report.files.len(), 6);
    assert!(report.warnings.is_empty());
    assert!(report.issues.is_empty());

    let core = report.ownership_of("core.py").expect("core ownership");
    assert_eq!(core.contributor_count, 11);
    assert_eq!(core.concentration_class, ConcentrationClass::Diffuse);
    assert!((core.commit_share - 40.0 / 60.0).abs() < 1e-9);
    assert!((core.shares.values().sum::<f64>() - 1.0).abs() < 1e-9);

    let diffuse: Vec<_> = report
        .ownership
        .iter()
        .filter(|o| o.contributor_count > 9)
        .map(|o| o.path.as_str())
        .collect();
    assert_eq!(diffuse, vec!["core.py"]);
    assert!(report
        .ownership
        .iter()
        .filter(|o| o.path != "core.py")
        .all(|o| o.contributor_count <= 2));

    assert_eq!(report.hotspots[0].path, "core.py");
    assert_eq!(report.hotspots[0].norm_freq, 1.0);
    assert_eq!(report.hotspots[0].norm_complexity, 1.0);

    let pair = report
        .couplings
        .iter()
        .find(|p| p.involves("core.py") && p.involves("api.py"))
        .expect("core/api coupling");
    assert_eq!(pair.file_a, "api.py");
    assert_eq!(pair.co_change_count, 8);
    assert!((pair.strength - 1.0).abs() < 1e-9);

    let core_score = report.file("core.py").expect("core risk");
    assert_eq!(core_score.status, FileStatus::Scored);
    assert_eq!(core_score.bug_fix_commits, 8);
    assert!(core_score.is_hotspot);

    let truck = report.truck_factor.as_ref().expect("truck factor");
    assert!(truck.value >= 1);

    let cost = report.cost.as_ref().expect("cost estimate");
    assert!(cost.has_exposure);
    assert!(cost.total.low < cost.total.high);
    assert!(cost.total.low <= cost.total.likely && cost.total.likely <= cost.total.high);
    assert_eq!(cost.files[0].path, "core.py");
}

#[test]
fn long_lived_file_touched_once_does_not_outrank_a_busy_one() {
    init_logging();
    let window = HistoryWindow::ending_at(t0() + Duration::days(365), FULL_WINDOW_DAYS);
    let build = |early_touch: bool| {
        let mut history = FixtureHistory::new();
        history.commit(
            "erin <erin@example.com>",
            t0() - Duration::days(400),
            "feat: legacy loader",
            vec![FixtureEdit::write("legacy.py", python_module(1))],
        );
        if early_touch {
            history.commit(
                "erin <erin@example.com>",
                t0() + Duration::days(2),
                "chore: tidy legacy loader",
                vec![FixtureEdit::write("legacy.py", python_module(2))],
            );
        }
        for i in 0..40usize {
            history.commit(
                "frank <frank@example.com>",
                t0() + Duration::days(5 * i as i64),
                "feat: extend pipeline",
                vec![FixtureEdit::write("core.py", python_module(4 + i))],
            );
        }
        history.commit(
            "erin <erin@example.com>",
            t0() + Duration::days(364),
            "fix: legacy path",
            vec![FixtureEdit::write("legacy.py", python_module(1))],
        );
        run_analysis(&history, &AnalysisConfig::default(), &AnalysisRequest::new(window))
            .expect("analysis succeeds")
    };

    let report = build(false);
    let legacy = report.file("legacy.py").expect("legacy scored");
    let core = report.file("core.py").expect("core scored");
    assert!((legacy.freq - 1.0 / 365.0).abs() < 1e-9);
    assert!(core.freq > legacy.freq);
    assert_eq!(core.norm_freq, Some(1.0));
    assert_eq!(report.hotspots[0].path, "core.py");

    let touched_again = build(true);
    let legacy_after = touched_again.file("legacy.py").expect("legacy scored");
    assert_eq!(legacy_after.commit_count, 2);
    assert!(legacy_after.freq > legacy.freq);
    assert!(legacy_after.norm_freq >= legacy.norm_freq);
    assert_eq!(touched_again.hotspots[0].path, "core.py");
}

#[test]
fn report_serializes_to_json() {
    let scenario = scenario();
    let report = run_analysis(
        &scenario.history,
        &AnalysisConfig::default(),
        &AnalysisRequest::new(scenario.window),
    )
    .expect("analysis succeeds");

    let value = serde_json::to_value(&report).expect("serialize report");
    assert_eq!(value["commit_count"], 60);
    assert_eq!(value["files"][0]["status"]["state"], "scored");
}

#[test]
fn unreadable_snapshot_is_reported_without_aborting() {
    let mut scenario = scenario();
    scenario
        .history
        .mark_unreadable(&scenario.last_core_commit, "core.py");

    let report = run_analysis(
        &scenario.history,
        &AnalysisConfig::default(),
        &AnalysisRequest::new(scenario.window),
    )
    .expect("partial failure is not fatal");

    let issue = report
        .issues
        .iter()
        .find(|i| i.kind == IssueKind::SnapshotRetrieval)
        .expect("snapshot issue recorded");
    assert_eq!(issue.path.as_deref(), Some("core.py"));

    let trend = report
        .trends
        .iter()
        .find(|t| t.path == "core.py")
        .expect("core trend");
    assert_eq!(trend.confidence, Confidence::Reduced);
    assert_eq!(report.file("core.py").unwrap().status, FileStatus::Scored);
}

#[test]
fn team_mapping_fills_in_the_team_term() {
    let scenario = scenario();
    let teams: TeamMapping = (0..11)
        .map(|i| {
            (
                format!("dev{i:02} <dev{i:02}@example.com>"),
                if i < 6 { "platform" } else { "product" }.to_string(),
            )
        })
        .collect();

    let with_teams = run_analysis(
        &scenario.history,
        &AnalysisConfig::default(),
        &AnalysisRequest::new(scenario.window).with_teams(teams),
    )
    .unwrap();
    let without = run_analysis(
        &scenario.history,
        &AnalysisConfig::default(),
        &AnalysisRequest::new(scenario.window),
    )
    .unwrap();

    let mapped = with_teams.coordination.iter().find(|c| c.path == "core.py").unwrap();
    let degraded = without.coordination.iter().find(|c| c.path == "core.py").unwrap();
    assert_eq!(mapped.team_count, Some(2));
    assert!(!mapped.degraded);
    assert!(degraded.degraded);
    assert_eq!(degraded.team_count, None);
}

struct RecordingSource {
    inner: FixtureHistory,
    listed: AtomicBool,
}

impl HistorySource for RecordingSource {
    fn list_commits(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> gitforensics::Result<Vec<CommitRecord>> {
        self.listed.store(true, Ordering::SeqCst);
        self.inner.list_commits(since, until)
    }

    fn read_content(&self, commit_id: &str, path: &str) -> gitforensics::Result<Vec<u8>> {
        self.inner.read_content(commit_id, path)
    }
}

#[test]
fn invalid_configuration_fails_before_history_is_read() {
    let scenario = scenario();
    let source = RecordingSource {
        inner: scenario.history,
        listed: AtomicBool::new(false),
    };
    let mut config = AnalysisConfig::default();
    config.exclude_patterns = vec!["[unclosed".to_string()];

    let err = run_analysis(&source, &config, &AnalysisRequest::new(scenario.window))
        .expect_err("bad glob is rejected");
    assert!(matches!(err, ForensicsError::Configuration(_)));
    assert!(!source.listed.load(Ordering::SeqCst));
}

struct SlowSource;

impl HistorySource for SlowSource {
    fn list_commits(
        &self,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> gitforensics::Result<Vec<CommitRecord>> {
        std::thread::sleep(std::time::Duration::from_millis(400));
        Ok(Vec::new())
    }

    fn read_content(&self, commit_id: &str, path: &str) -> gitforensics::Result<Vec<u8>> {
        Err(ForensicsError::SnapshotRetrieval {
            commit: commit_id.to_string(),
            path: path.to_string(),
            reason: "slow source has no content".to_string(),
        })
    }
}

#[tokio::test]
async fn extraction_timeout_is_fatal() {
    init_logging();
    let window = HistoryWindow::ending_at(t0(), FULL_WINDOW_DAYS);
    let err = analyze_source(
        Arc::new(SlowSource),
        &AnalysisConfig::default(),
        &AnalysisRequest::new(window),
        std::time::Duration::from_millis(20),
    )
    .await
    .expect_err("extraction should time out");

    assert!(matches!(err, ForensicsError::Extraction(ref msg) if msg.contains("timed out")));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn async_pipeline_matches_sync_pipeline() {
    let scenario = scenario();
    let window = scenario.window;
    let source = Arc::new(scenario.history);
    let config = AnalysisConfig::default();
    let request = AnalysisRequest::new(window);

    let sync = run_analysis(source.as_ref(), &config, &request).unwrap();
    let asynchronous = analyze_source(
        source.clone(),
        &config,
        &request,
        std::time::Duration::from_secs(10),
    )
    .await
    .unwrap();

    assert_eq!(sync.files, asynchronous.files);
    assert_eq!(sync.couplings, asynchronous.couplings);
    assert_eq!(sync.truck_factor, asynchronous.truck_factor);
}
