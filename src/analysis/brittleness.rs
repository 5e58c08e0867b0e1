use crate::analysis::churn::FileMetrics;
use crate::engine::settings::BrittlenessConfig;
use crate::models::brittleness::{BrittlenessBand, BrittlenessRatio};
use crate::models::file_history::FileHistory;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

const TEST_DIRS: [&str; 3] = ["tests", "test", "__tests__"];

/// What a test file is presumed to exercise: same stem and extension, in `dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSubject {
    pub dir: String,
    pub stem: String,
    pub ext: String,
}

fn split_path(path: &str) -> (Vec<&str>, &str) {
    let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let name = parts.pop().unwrap_or("");
    (parts, name)
}

fn stem_and_ext(name: &str) -> (String, String) {
    let path = Path::new(name);
    let stem = path.file_stem().unwrap_or_default().to_string_lossy().into_owned();
    let ext = path.extension().unwrap_or_default().to_string_lossy().into_owned();
    (stem, ext)
}

/// Strip the naming conventions that mark a test: `foo.test`, `foo.spec`,
/// `test_foo`, `foo_test`, `FooTest`, `FooTests`.
fn strip_test_affixes(stem: &str) -> Option<&str> {
    let stripped = stem
        .strip_suffix(".test")
        .or_else(|| stem.strip_suffix(".spec"))
        .or_else(|| stem.strip_prefix("test_"))
        .or_else(|| stem.strip_suffix("_test"))
        .or_else(|| stem.strip_suffix("Tests"))
        .or_else(|| stem.strip_suffix("Test"))?;
    (!stripped.is_empty()).then_some(stripped)
}

pub fn is_test_path(path: &str) -> bool {
    test_subject(path).is_some()
}

/// `None` for production files.
pub fn test_subject(path: &str) -> Option<TestSubject> {
    let (dirs, name) = split_path(path);
    let (stem, ext) = stem_and_ext(name);
    let in_test_dir = dirs.iter().any(|d| TEST_DIRS.contains(d));

    let subject_stem = match strip_test_affixes(&stem) {
        Some(stripped) => stripped.to_string(),
        None if in_test_dir => stem.clone(),
        None => return None,
    };

    let dir = dirs
        .iter()
        .filter(|d| !TEST_DIRS.contains(d))
        .copied()
        .collect::<Vec<_>>()
        .join("/");

    Some(TestSubject {
        dir,
        stem: subject_stem,
        ext,
    })
}

fn directory_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

pub fn brittleness_band(ratio: Option<f64>, config: &BrittlenessConfig) -> BrittlenessBand {
    match ratio {
        None => BrittlenessBand::InsufficientData,
        Some(r) if r <= config.healthy_max => BrittlenessBand::Healthy,
        Some(r) if r <= config.elevated_max => BrittlenessBand::Elevated,
        Some(_) => BrittlenessBand::Brittle,
    }
}

fn ratio_for(test: &FileHistory, production: &FileHistory, config: &BrittlenessConfig) -> BrittlenessRatio {
    let production_commits: HashSet<&str> = production.commit_ids().into_iter().collect();
    let solo = test
        .commits
        .iter()
        .filter(|c| !production_commits.contains(c.commit_id.as_str()))
        .count();

    let test_changes = test.commit_count();
    let production_changes = production.commit_count();
    let ratio = (production_changes >= config.min_production_changes && production_changes > 0)
        .then(|| test_changes as f64 / production_changes as f64);

    BrittlenessRatio {
        test_path: test.path.clone(),
        production_path: production.path.clone(),
        test_changes,
        production_changes,
        solo_test_changes: solo,
        ratio,
        band: brittleness_band(ratio, config),
    }
}

/// Pair every live test file with its production file and compare change rates.
///
/// A production file in the test's directory (test directories stripped) is
/// preferred; otherwise the only file with that stem and extension anywhere.
/// Ambiguous or orphaned tests are skipped.
pub fn brittleness_ratios(metrics: &FileMetrics, config: &BrittlenessConfig) -> Vec<BrittlenessRatio> {
    let mut by_stem: BTreeMap<(String, String), Vec<&FileHistory>> = BTreeMap::new();
    let mut tests: Vec<(&FileHistory, TestSubject)> = Vec::new();

    for file in metrics.live_files() {
        match test_subject(&file.path) {
            Some(subject) => tests.push((file, subject)),
            None => {
                let (_, name) = split_path(&file.path);
                by_stem.entry(stem_and_ext(name)).or_default().push(file);
            }
        }
    }

    let mut ratios = Vec::new();
    for (test, subject) in tests {
        let Some(candidates) = by_stem.get(&(subject.stem.clone(), subject.ext.clone())) else {
            log::debug!("no production file found for test {}", test.path);
            continue;
        };

        let production = candidates
            .iter()
            .find(|c| directory_of(&c.path) == subject.dir)
            .or_else(|| (candidates.len() == 1).then(|| &candidates[0]));

        match production {
            Some(production) => ratios.push(ratio_for(test, production, config)),
            None => log::debug!(
                "test {} matches {} production files; skipped",
                test.path,
                candidates.len()
            ),
        }
    }

    ratios.sort_by(|a, b| match (a.ratio, b.ratio) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.test_path.cmp(&b.test_path)));
    ratios
}
