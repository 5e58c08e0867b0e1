use crate::analysis::churn::FileMetrics;
use crate::engine::settings::CoordinationWeights;
use crate::models::file_history::FileHistory;
use crate::models::ownership::{CoordinationLevel, CoordinationScore, TeamMapping};

pub fn coordination_level(score: f64) -> CoordinationLevel {
    if score < 0.3 {
        CoordinationLevel::Low
    } else if score < 0.6 {
        CoordinationLevel::Moderate
    } else {
        CoordinationLevel::High
    }
}

/// Weighted sum of contributor, team and concurrency terms, each saturating at 1.
///
/// Without a team mapping the team term is dropped and the remaining weights
/// are rescaled, and the score is marked `degraded`.
pub fn coordination_score(
    history: &FileHistory,
    teams: Option<&TeamMapping>,
    weights: &CoordinationWeights,
    diffuse_contributors: usize,
) -> CoordinationScore {
    let contributors = history.contributor_count();
    let weeks = history.weeks_with_concurrent_authors;

    let contributor_term = (contributors as f64 / (diffuse_contributors + 1) as f64).min(1.0);
    let concurrency_term = (weeks as f64 / weights.concurrency_weeks_cap as f64).min(1.0);

    let mapping = teams.filter(|m| !m.is_empty());
    let (score, team_count) = match mapping {
        Some(mapping) => {
            let count = mapping.distinct_teams(history.authors());
            let team_term = (count.saturating_sub(1) as f64 / 3.0).min(1.0);
            let score = weights.contributors * contributor_term
                + weights.teams * team_term
                + weights.concurrency * concurrency_term;
            (score, Some(count))
        }
        None => {
            let total = weights.contributors + weights.concurrency;
            let score = (weights.contributors * contributor_term
                + weights.concurrency * concurrency_term)
                / total;
            (score, None)
        }
    };

    let score = score.clamp(0.0, 1.0);
    CoordinationScore {
        path: history.path.clone(),
        score,
        contributor_count: contributors,
        team_count,
        weeks_with_concurrent_authors: weeks,
        level: coordination_level(score),
        degraded: team_count.is_none(),
    }
}

pub fn coordination_scores(
    metrics: &FileMetrics,
    teams: Option<&TeamMapping>,
    weights: &CoordinationWeights,
    diffuse_contributors: usize,
) -> Vec<CoordinationScore> {
    if teams.map_or(true, TeamMapping::is_empty) {
        log::info!("no team mapping supplied; coordination scores exclude the team term");
    }
    metrics
        .live_files()
        .map(|file| coordination_score(file, teams, weights, diffuse_contributors))
        .collect()
}
