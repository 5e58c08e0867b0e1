use crate::models::brittleness::BrittlenessRatio;
use crate::models::complexity::ComplexityTrend;
use crate::models::cost::CostEstimate;
use crate::models::coupling::{CouplingCluster, CouplingHub, CouplingPair};
use crate::models::ownership::{CoordinationScore, OwnershipProfile, TruckFactor};
use crate::models::risk::{Hotspot, RiskScore};
use crate::source::HistoryWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    InsufficientHistory,
    SnapshotRetrieval,
    Calibration,
}

/// Per-entity problem collected during a run; never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityIssue {
    pub path: Option<String>,
    pub kind: IssueKind,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub window: HistoryWindow,
    pub commit_count: usize,
    pub author_count: usize,
    pub files: Vec<RiskScore>,
    pub hotspots: Vec<Hotspot>,
    pub couplings: Vec<CouplingPair>,
    pub clusters: Vec<CouplingCluster>,
    pub hubs: Vec<CouplingHub>,
    pub ownership: Vec<OwnershipProfile>,
    pub truck_factor: Option<TruckFactor>,
    pub coordination: Vec<CoordinationScore>,
    pub trends: Vec<ComplexityTrend>,
    pub brittleness: Vec<BrittlenessRatio>,
    pub cost: Option<CostEstimate>,
    pub issues: Vec<EntityIssue>,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

impl AnalysisReport {
    pub fn file(&self, path: &str) -> Option<&RiskScore> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn ownership_of(&self, path: &str) -> Option<&OwnershipProfile> {
        self.ownership.iter().find(|o| o.path == path)
    }

    pub fn excluded_files(&self) -> impl Iterator<Item = &RiskScore> {
        self.files.iter().filter(|f| !f.status.is_scored())
    }
}
