use crate::models::complexity::TrendClass;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FileStatus {
    Scored,
    InsufficientData { reason: String },
    /// Left out of scoring (error or file gone); never the same thing as low risk.
    Excluded { reason: String },
}

impl FileStatus {
    pub fn is_scored(&self) -> bool {
        matches!(self, Self::Scored)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub path: String,
    pub risk: f64,
    pub freq: f64,
    pub complexity: f64,
    pub norm_freq: f64,
    pub norm_complexity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoupledFile {
    pub path: String,
    pub strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub path: String,
    pub status: FileStatus,
    pub commit_count: usize,
    pub contributor_count: usize,
    /// commits per day of file age
    pub freq: f64,
    pub norm_freq: Option<f64>,
    pub complexity: Option<f64>,
    pub norm_complexity: Option<f64>,
    pub hotspot_risk: Option<f64>,
    pub is_hotspot: bool,
    pub coordination_risk: f64,
    pub coupled_with: Vec<CoupledFile>,
    pub trend: TrendClass,
    pub bug_fix_commits: usize,
}
