use crate::analysis::churn::FileMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitKind {
    BugFix,
    Feature,
    Refactor,
    Test,
    Docs,
    Chore,
    Other,
}

pub trait CommitClassifier: Send + Sync {
    fn classify(&self, message: &str) -> CommitKind;
}

/// Matches whole words of the subject line against keyword lists, checked in order.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    rules: Vec<(CommitKind, Vec<String>)>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        let rule = |kind: CommitKind, words: &[&str]| -> (CommitKind, Vec<String>) {
            (kind, words.iter().map(|w| w.to_string()).collect())
        };
        Self {
            rules: vec![
                rule(
                    CommitKind::BugFix,
                    &["fix", "fixes", "fixed", "bug", "bugfix", "hotfix", "patch", "regression", "crash"],
                ),
                rule(CommitKind::Refactor, &["refactor", "refactoring", "cleanup", "restructure", "simplify"]),
                rule(CommitKind::Test, &["test", "tests", "testing", "spec"]),
                rule(CommitKind::Docs, &["doc", "docs", "documentation", "readme", "changelog"]),
                rule(CommitKind::Chore, &["chore", "bump", "release", "deps", "ci", "build", "merge"]),
                rule(CommitKind::Feature, &["add", "adds", "added", "feature", "feat", "implement", "introduce", "support"]),
            ],
        }
    }
}

impl KeywordClassifier {
    pub fn new(rules: Vec<(CommitKind, Vec<String>)>) -> Self {
        Self { rules }
    }
}

fn subject_line(message: &str) -> &str {
    message.lines().next().unwrap_or("").trim()
}

impl CommitClassifier for KeywordClassifier {
    fn classify(&self, message: &str) -> CommitKind {
        let words: Vec<String> = subject_line(message)
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        self.rules
            .iter()
            .find(|(_, keywords)| words.iter().any(|w| keywords.contains(w)))
            .map(|(kind, _)| *kind)
            .unwrap_or(CommitKind::Other)
    }
}

/// `type(scope)!: subject` headers, falling back to keywords for free-form messages.
#[derive(Debug, Clone, Default)]
pub struct ConventionalCommitClassifier {
    fallback: KeywordClassifier,
}

impl ConventionalCommitClassifier {
    pub fn new(fallback: KeywordClassifier) -> Self {
        Self { fallback }
    }

    fn header_type(subject: &str) -> Option<String> {
        let (head, rest) = subject.split_once(':')?;
        if !rest.starts_with(' ') {
            return None;
        }
        let head = head.strip_suffix('!').unwrap_or(head);
        let kind = match head.split_once('(') {
            Some((kind, scope)) if scope.ends_with(')') => kind,
            Some(_) => return None,
            None => head,
        };
        (!kind.is_empty() && kind.chars().all(|c| c.is_ascii_alphabetic()))
            .then(|| kind.to_ascii_lowercase())
    }
}

impl CommitClassifier for ConventionalCommitClassifier {
    fn classify(&self, message: &str) -> CommitKind {
        let subject = subject_line(message);
        match Self::header_type(subject).as_deref() {
            Some("fix") => CommitKind::BugFix,
            Some("feat") => CommitKind::Feature,
            Some("refactor") | Some("perf") | Some("style") => CommitKind::Refactor,
            Some("test") => CommitKind::Test,
            Some("docs") => CommitKind::Docs,
            Some("chore") | Some("build") | Some("ci") | Some("revert") => CommitKind::Chore,
            _ => self.fallback.classify(message),
        }
    }
}

/// Commit kind counts per logical file.
pub fn classify_commits(
    metrics: &FileMetrics,
    classifier: &dyn CommitClassifier,
) -> BTreeMap<String, BTreeMap<CommitKind, usize>> {
    let kinds: BTreeMap<&str, CommitKind> = metrics
        .touches
        .iter()
        .map(|t| (t.commit_id.as_str(), classifier.classify(&t.message)))
        .collect();

    metrics
        .files
        .iter()
        .map(|(key, file)| {
            let mut counts: BTreeMap<CommitKind, usize> = BTreeMap::new();
            for commit in &file.commits {
                let kind = kinds
                    .get(commit.commit_id.as_str())
                    .copied()
                    .unwrap_or(CommitKind::Other);
                *counts.entry(kind).or_insert(0) += 1;
            }
            (key.clone(), counts)
        })
        .collect()
}

pub fn bug_fix_count(counts: Option<&BTreeMap<CommitKind, usize>>) -> usize {
    counts
        .and_then(|c| c.get(&CommitKind::BugFix))
        .copied()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::churn::aggregate;
    use crate::engine::settings::AnalysisConfig;
    use crate::source::fixture::{FixtureEdit, FixtureHistory};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn keywords_match_whole_words_only() {
        let classifier = KeywordClassifier::default();
        assert_eq!(classifier.classify("Fix null deref in parser"), CommitKind::BugFix);
        assert_eq!(classifier.classify("prefix handling for urls"), CommitKind::Other);
        assert_eq!(classifier.classify("Add export button"), CommitKind::Feature);
        assert_eq!(classifier.classify("Update README"), CommitKind::Docs);
        // Bug fixes outrank features when both words appear.
        assert_eq!(classifier.classify("add guard to fix crash"), CommitKind::BugFix);
    }

    #[test]
    fn only_subject_line_is_considered() {
        let classifier = KeywordClassifier::default();
        assert_eq!(
            classifier.classify("Tidy imports\n\nThis does not fix anything."),
            CommitKind::Other
        );
    }

    #[test]
    fn conventional_headers() {
        let classifier = ConventionalCommitClassifier::default();
        assert_eq!(classifier.classify("fix(parser): handle empty input"), CommitKind::BugFix);
        assert_eq!(classifier.classify("feat!: drop legacy api"), CommitKind::Feature);
        assert_eq!(classifier.classify("refactor(core)!: split module"), CommitKind::Refactor);
        assert_eq!(classifier.classify("ci: cache toolchain"), CommitKind::Chore);
        assert_eq!(classifier.classify("Fix: typo"), CommitKind::BugFix);
        // Not a header: falls back to keywords.
        assert_eq!(classifier.classify("Note:nothing"), CommitKind::Other);
        assert_eq!(classifier.classify("Bump deps"), CommitKind::Chore);
    }

    #[test]
    fn counts_kinds_per_file() {
        let mut history = FixtureHistory::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        history.commit("a", t0, "feat: api", vec![FixtureEdit::write("api.rs", "1\n")]);
        history.commit(
            "a",
            t0 + Duration::days(1),
            "fix: off by one",
            vec![FixtureEdit::write("api.rs", "2\n"), FixtureEdit::write("db.rs", "1\n")],
        );
        history.commit(
            "b",
            t0 + Duration::days(2),
            "hotfix for crash",
            vec![FixtureEdit::write("api.rs", "3\n")],
        );

        let metrics = aggregate(history.commits(), &AnalysisConfig::default()).unwrap();
        let counts = classify_commits(&metrics, &ConventionalCommitClassifier::default());

        assert_eq!(bug_fix_count(counts.get("api.rs")), 2);
        assert_eq!(counts["api.rs"][&CommitKind::Feature], 1);
        assert_eq!(bug_fix_count(counts.get("db.rs")), 1);
        assert_eq!(bug_fix_count(counts.get("missing.rs")), 0);
    }
}
