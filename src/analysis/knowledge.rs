use crate::analysis::churn::FileMetrics;
use crate::engine::settings::OwnershipConfig;
use crate::error::{ForensicsError, Result};
use crate::models::file_history::FileHistory;
use crate::models::ownership::{ConcentrationClass, OwnershipProfile, TruckFactor};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Most recent commit per author anywhere in the window.
pub fn last_activity(metrics: &FileMetrics) -> BTreeMap<&str, DateTime<Utc>> {
    let mut last: BTreeMap<&str, DateTime<Utc>> = BTreeMap::new();
    for touch in &metrics.touches {
        let entry = last.entry(touch.author.as_str()).or_insert(touch.timestamp);
        if touch.timestamp > *entry {
            *entry = touch.timestamp;
        }
    }
    last
}

/// Diffuse ownership is checked first: a file with many contributors is
/// diffuse even when one of them holds most of the commits.
pub fn classify_concentration(
    primary_share: f64,
    contributor_count: usize,
    config: &OwnershipConfig,
) -> ConcentrationClass {
    if contributor_count > config.diffuse_contributors {
        ConcentrationClass::Diffuse
    } else if primary_share > config.single_owner_share {
        ConcentrationClass::SingleOwner
    } else if primary_share > config.dominant_owner_share {
        ConcentrationClass::DominantOwner
    } else {
        ConcentrationClass::Shared
    }
}

pub fn ownership_profile(
    history: &FileHistory,
    total_commits: usize,
    last_seen: &BTreeMap<&str, DateTime<Utc>>,
    until: DateTime<Utc>,
    config: &OwnershipConfig,
) -> Option<OwnershipProfile> {
    let commits = history.commit_count();
    if commits == 0 {
        return None;
    }

    let shares: BTreeMap<String, f64> = history
        .contributor_counts
        .iter()
        .map(|(author, count)| (author.clone(), *count as f64 / commits as f64))
        .collect();

    // Highest count wins; ties go to the alphabetically first author.
    let (primary_owner, primary_count) = history
        .contributor_counts
        .iter()
        .fold(None::<(&String, usize)>, |best, (author, count)| match best {
            Some((_, best_count)) if best_count >= *count => best,
            _ => Some((author, *count)),
        })?;

    let cutoff = until - Duration::days(config.inactive_owner_days as i64);
    let owner_inactive = last_seen
        .get(primary_owner.as_str())
        .map(|last| *last < cutoff)
        .unwrap_or(true);

    let primary_share = primary_count as f64 / commits as f64;
    Some(OwnershipProfile {
        path: history.path.clone(),
        contributor_count: history.contributor_count(),
        primary_owner: primary_owner.clone(),
        primary_share,
        concentration_class: classify_concentration(
            primary_share,
            history.contributor_count(),
            config,
        ),
        commit_share: if total_commits == 0 {
            0.0
        } else {
            commits as f64 / total_commits as f64
        },
        owner_inactive,
        shares,
    })
}

/// Profiles for every file still present at the end of the window.
pub fn ownership_profiles(
    metrics: &FileMetrics,
    until: DateTime<Utc>,
    config: &OwnershipConfig,
) -> Vec<OwnershipProfile> {
    let last_seen = last_activity(metrics);
    let total = metrics.total_commits();
    metrics
        .live_files()
        .filter_map(|file| ownership_profile(file, total, &last_seen, until, config))
        .collect()
}

/// Greedy truck factor.
///
/// Contributors are ranked by how many files they primarily own (share above
/// `primary_share`), ties broken by their first owned path and then by name,
/// and consumed until their combined files cover more than
/// `coverage_threshold` of all files. Greedy cover is an approximation of
/// the true minimum; that is accepted.
pub fn truck_factor(profiles: &[OwnershipProfile], config: &OwnershipConfig) -> Result<TruckFactor> {
    if profiles.is_empty() {
        return Err(ForensicsError::insufficient(
            "truck factor",
            "no files with history in the analysis window",
        ));
    }

    let mut owned: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for profile in profiles {
        for (author, share) in &profile.shares {
            if *share > config.primary_share {
                owned
                    .entry(author.as_str())
                    .or_default()
                    .insert(profile.path.as_str());
            }
        }
    }

    let mut ranked: Vec<(&str, BTreeSet<&str>)> = owned.into_iter().collect();
    ranked.sort_by(|(author_a, files_a), (author_b, files_b)| {
        files_b
            .len()
            .cmp(&files_a.len())
            .then_with(|| files_a.first().cmp(&files_b.first()))
            .then_with(|| author_a.cmp(author_b))
    });

    let total = profiles.len();
    let threshold = config.coverage_threshold;
    let mut covered: BTreeSet<&str> = BTreeSet::new();
    let mut contributors = Vec::new();

    for (author, files) in ranked {
        if covered.len() as f64 / total as f64 > threshold {
            break;
        }
        contributors.push(author.to_string());
        covered.extend(files);
    }

    let coverage = covered.len() as f64 / total as f64;
    Ok(TruckFactor {
        value: contributors.len(),
        contributors,
        covered_files: covered.len(),
        total_files: total,
        coverage,
        threshold,
        threshold_reached: coverage > threshold,
    })
}
