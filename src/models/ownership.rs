use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationClass {
    SingleOwner,
    DominantOwner,
    Shared,
    Diffuse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipProfile {
    pub path: String,
    /// author → fraction of this file's commits (sums to 1.0)
    pub shares: BTreeMap<String, f64>,
    pub contributor_count: usize,
    pub primary_owner: String,
    pub primary_share: f64,
    pub concentration_class: ConcentrationClass,
    /// This file's commits over all commits in the window.
    pub commit_share: f64,
    pub owner_inactive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruckFactor {
    pub value: usize,
    /// Contributors in the order the greedy pass consumed them.
    pub contributors: Vec<String>,
    pub covered_files: usize,
    pub total_files: usize,
    pub coverage: f64,
    pub threshold: f64,
    pub threshold_reached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationLevel {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationScore {
    pub path: String,
    pub score: f64,
    pub contributor_count: usize,
    pub team_count: Option<usize>,
    pub weeks_with_concurrent_authors: usize,
    pub level: CoordinationLevel,
    /// Team term dropped because no mapping was supplied.
    pub degraded: bool,
}

/// Caller-supplied author → team assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMapping {
    teams: HashMap<String, String>,
}

impl TeamMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, author: impl Into<String>, team: impl Into<String>) -> &mut Self {
        self.teams.insert(author.into(), team.into());
        self
    }

    pub fn team_of(&self, author: &str) -> Option<&str> {
        self.teams.get(author).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Distinct teams among `authors`; unmapped authors each count as their own team.
    pub fn distinct_teams<'a>(&self, authors: impl IntoIterator<Item = &'a str>) -> usize {
        let mut teams = BTreeSet::new();
        for author in authors {
            match self.team_of(author) {
                Some(team) => teams.insert(format!("team:{team}")),
                None => teams.insert(format!("author:{author}")),
            };
        }
        teams.len()
    }
}

impl FromIterator<(String, String)> for TeamMapping {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            teams: iter.into_iter().collect(),
        }
    }
}
