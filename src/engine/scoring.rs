use crate::analysis::brittleness::brittleness_ratios;
use crate::analysis::churn::{aggregate, change_frequency, FileMetrics};
use crate::analysis::classifier::{
    bug_fix_count, classify_commits, CommitClassifier, ConventionalCommitClassifier,
};
use crate::analysis::coordination::coordination_scores;
use crate::analysis::cost::{translate_costs, CostInput};
use crate::analysis::coupling::{detect_coupling, CouplingOutcome};
use crate::analysis::hotspot::{score_hotspots, HotspotOutcome};
use crate::analysis::knowledge::{ownership_profiles, truck_factor};
use crate::analysis::sampler::{sample_complexity, SamplingOutcome};
use crate::engine::db::{calibration_factor, CalibrationStore};
use crate::engine::settings::{AnalysisConfig, FULL_WINDOW_DAYS};
use crate::error::Result;
use crate::models::commit::CommitRecord;
use crate::models::complexity::TrendClass;
use crate::models::cost::{CostEstimate, CostParameters};
use crate::models::ownership::{
    ConcentrationClass, CoordinationScore, OwnershipProfile, TeamMapping,
};
use crate::models::report::{AnalysisReport, EntityIssue, IssueKind};
use crate::models::risk::{CoupledFile, FileStatus, RiskScore};
use crate::source::{extract_history, extract_history_with_timeout, GitHistorySource, HistorySource, HistoryWindow};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything a run needs besides the history and the configuration.
#[derive(Clone)]
pub struct AnalysisRequest {
    pub window: HistoryWindow,
    pub teams: Option<TeamMapping>,
    pub cost: Option<CostParameters>,
    pub calibration: Option<(Arc<dyn CalibrationStore>, String)>,
    pub classifier: Arc<dyn CommitClassifier>,
}

impl AnalysisRequest {
    pub fn new(window: HistoryWindow) -> Self {
        Self {
            window,
            teams: None,
            cost: None,
            calibration: None,
            classifier: Arc::new(ConventionalCommitClassifier::default()),
        }
    }

    /// Window of `config.window_days` ending now.
    pub fn for_config(config: &AnalysisConfig) -> Self {
        Self::new(HistoryWindow::last_days(config.window_days))
    }

    pub fn with_teams(mut self, teams: TeamMapping) -> Self {
        self.teams = Some(teams);
        self
    }

    pub fn with_cost(mut self, parameters: CostParameters) -> Self {
        self.cost = Some(parameters);
        self
    }

    pub fn with_calibration(
        mut self,
        store: Arc<dyn CalibrationStore>,
        project: impl Into<String>,
    ) -> Self {
        self.calibration = Some((store, project.into()));
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn CommitClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    fn validate(&self, config: &AnalysisConfig) -> Result<()> {
        config.validate()?;
        if let Some(cost) = &self.cost {
            cost.validate()?;
        }
        Ok(())
    }
}

/// Full pipeline over `source`: extract, aggregate, score.
///
/// Configuration problems and extraction failures abort the run. Anything
/// that only affects one file or one metric is recorded in `issues`.
pub fn run_analysis(
    source: &dyn HistorySource,
    config: &AnalysisConfig,
    request: &AnalysisRequest,
) -> Result<AnalysisReport> {
    request.validate(config)?;
    let start = Instant::now();
    let commits = extract_history(source, &request.window)?;
    analyze_commits(source, &commits, config, request, start)
}

/// [`run_analysis`] with extraction bounded by `timeout`.
pub async fn analyze_source(
    source: Arc<dyn HistorySource>,
    config: &AnalysisConfig,
    request: &AnalysisRequest,
    timeout: Duration,
) -> Result<AnalysisReport> {
    request.validate(config)?;
    let start = Instant::now();
    let commits = extract_history_with_timeout(source.clone(), request.window, timeout).await?;
    analyze_commits(source.as_ref(), &commits, config, request, start)
}

/// Analyse the git repository containing `path`.
pub async fn analyze_repository(
    path: impl AsRef<Path>,
    config: &AnalysisConfig,
    request: &AnalysisRequest,
    timeout: Duration,
) -> Result<AnalysisReport> {
    request.validate(config)?;
    let source: Arc<dyn HistorySource> = Arc::new(GitHistorySource::open(path.as_ref())?);
    analyze_source(source, config, request, timeout).await
}

fn analyze_commits(
    source: &dyn HistorySource,
    commits: &[CommitRecord],
    config: &AnalysisConfig,
    request: &AnalysisRequest,
    start: Instant,
) -> Result<AnalysisReport> {
    let window = request.window;
    let until = window.until;
    let mut issues: Vec<EntityIssue> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if !window.is_full_year() {
        let message = format!(
            "analysis window covers {:.0} days; thresholds assume {FULL_WINDOW_DAYS}",
            window.days()
        );
        log::warn!("{message}");
        warnings.push(message);
    }

    let metrics = aggregate(commits, config)?;
    log::info!(
        "aggregated {} commits into {} files ({} authors)",
        commits.len(),
        metrics.files.len(),
        metrics.authors.len()
    );

    let sampling = sample_complexity(source, &metrics, config);
    issues.extend(sampling.issues.iter().cloned());

    let hotspots = score_hotspots(&metrics, &sampling, &window, &config.hotspot);
    let coupling = detect_coupling(&metrics, &config.coupling);
    let ownership = ownership_profiles(&metrics, until, &config.ownership);

    let truck = match truck_factor(&ownership, &config.ownership) {
        Ok(tf) => Some(tf),
        Err(err) if !err.is_fatal() => {
            log::warn!("truck factor unavailable: {err}");
            issues.push(EntityIssue {
                path: None,
                kind: IssueKind::InsufficientHistory,
                detail: err.to_string(),
            });
            None
        }
        Err(err) => return Err(err),
    };

    let coordination = coordination_scores(
        &metrics,
        request.teams.as_ref(),
        &config.coordination,
        config.ownership.diffuse_contributors,
    );
    let brittleness = brittleness_ratios(&metrics, &config.brittleness);
    let kinds = classify_commits(&metrics, request.classifier.as_ref());
    let bug_fixes: HashMap<&str, usize> = metrics
        .files
        .keys()
        .map(|key| (key.as_str(), bug_fix_count(kinds.get(key))))
        .collect();

    let files = risk_scores(
        &metrics,
        &sampling,
        &hotspots,
        &coupling,
        &coordination,
        &bug_fixes,
        &window,
    );

    let cost = match &request.cost {
        Some(parameters) => Some(estimate_cost(
            &files,
            &ownership,
            &coordination,
            parameters,
            config,
            request,
            &mut issues,
        )?),
        None => None,
    };

    let report = AnalysisReport {
        run_id: uuid::Uuid::new_v4().to_string(),
        generated_at: chrono::Utc::now(),
        window,
        commit_count: commits.len(),
        author_count: metrics.authors.len(),
        files,
        hotspots: hotspots.hotspots,
        couplings: coupling.pairs,
        clusters: coupling.clusters,
        hubs: coupling.hubs,
        ownership,
        truck_factor: truck,
        coordination,
        trends: sampling.trends.into_values().collect(),
        brittleness,
        cost,
        issues,
        warnings,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    log::info!(
        "analysis {} finished in {}ms: {} files, {} hotspots, {} coupled pairs, {} issues",
        report.run_id,
        report.duration_ms,
        report.files.len(),
        report.hotspots.len(),
        report.couplings.len(),
        report.issues.len()
    );
    Ok(report)
}

fn risk_scores(
    metrics: &FileMetrics,
    sampling: &SamplingOutcome,
    hotspots: &HotspotOutcome,
    coupling: &CouplingOutcome,
    coordination: &[CoordinationScore],
    bug_fixes: &HashMap<&str, usize>,
    window: &HistoryWindow,
) -> Vec<RiskScore> {
    let coordination_by_path: HashMap<&str, f64> = coordination
        .iter()
        .map(|c| (c.path.as_str(), c.score))
        .collect();

    metrics
        .files
        .iter()
        .map(|(key, file)| {
            let trend = sampling.trends.get(key);
            let scored = hotspots.scores.get(key).filter(|_| !file.deleted);

            let status = if file.deleted {
                FileStatus::Excluded {
                    reason: "deleted within the analysis window".to_string(),
                }
            } else if scored.is_some() {
                FileStatus::Scored
            } else if trend.map_or(true, |t| t.samples.is_empty()) {
                FileStatus::Excluded {
                    reason: "no snapshot could be read".to_string(),
                }
            } else {
                FileStatus::InsufficientData {
                    reason: "latest snapshot has no source lines".to_string(),
                }
            };

            let coupled_with = coupling
                .pairs
                .iter()
                .filter_map(|pair| {
                    pair.peer_of(key).map(|peer| CoupledFile {
                        path: peer.to_string(),
                        strength: pair.strength,
                    })
                })
                .collect();

            RiskScore {
                path: key.clone(),
                status,
                commit_count: file.commit_count(),
                contributor_count: file.contributor_count(),
                freq: change_frequency(file, window),
                norm_freq: scored.map(|s| s.norm_freq),
                complexity: scored.map(|s| s.complexity),
                norm_complexity: scored.map(|s| s.norm_complexity),
                hotspot_risk: scored.map(|s| s.risk),
                is_hotspot: scored.map_or(false, |s| s.is_hotspot),
                coordination_risk: coordination_by_path.get(key.as_str()).copied().unwrap_or(0.0),
                coupled_with,
                trend: trend.map_or(TrendClass::InsufficientHistory, |t| t.class),
                bug_fix_commits: bug_fixes.get(key.as_str()).copied().unwrap_or(0),
            }
        })
        .collect()
}

fn estimate_cost(
    files: &[RiskScore],
    ownership: &[OwnershipProfile],
    coordination: &[CoordinationScore],
    parameters: &CostParameters,
    config: &AnalysisConfig,
    request: &AnalysisRequest,
    issues: &mut Vec<EntityIssue>,
) -> Result<CostEstimate> {
    let diffuse: HashMap<&str, bool> = ownership
        .iter()
        .map(|o| (o.path.as_str(), o.concentration_class == ConcentrationClass::Diffuse))
        .collect();
    let weeks: HashMap<&str, usize> = coordination
        .iter()
        .map(|c| (c.path.as_str(), c.weeks_with_concurrent_authors))
        .collect();

    let inputs: Vec<CostInput> = files
        .iter()
        .filter(|f| f.status.is_scored())
        .map(|f| CostInput {
            path: f.path.clone(),
            commits: f.commit_count,
            bug_fix_commits: f.bug_fix_commits,
            contributors: f.contributor_count,
            is_hotspot: f.is_hotspot,
            diffuse_ownership: diffuse.get(f.path.as_str()).copied().unwrap_or(false),
            coordination_score: f.coordination_risk,
            concurrent_weeks: weeks.get(f.path.as_str()).copied().unwrap_or(0),
        })
        .collect();

    let factor = match &request.calibration {
        Some((store, project)) => match store.records(project) {
            Ok(records) => {
                let factor = calibration_factor(&records);
                if factor.is_none() {
                    log::info!(
                        "{} calibration records for {project}; estimates stay uncalibrated",
                        records.len()
                    );
                }
                factor
            }
            Err(err) => {
                log::warn!("calibration store unavailable, continuing uncalibrated: {err}");
                issues.push(EntityIssue {
                    path: None,
                    kind: IssueKind::Calibration,
                    detail: err.to_string(),
                });
                None
            }
        },
        None => None,
    };

    translate_costs(
        &inputs,
        &config.cost_model,
        parameters,
        request.window.days(),
        factor,
    )
}
