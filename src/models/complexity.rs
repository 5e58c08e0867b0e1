use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityScore {
    pub loc: usize,
    pub avg_indent_depth: f64,
    pub function_count: usize,
    pub long_function_count: usize,
    /// Weighted sum of the four proxies above.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexitySample {
    pub timestamp: DateTime<Utc>,
    pub commit_id: String,
    pub score: ComplexityScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendClass {
    Improving,
    Stable,
    /// Moved between the stable band and the improving/deteriorating bands.
    Drifting,
    Deteriorating,
    Volatile,
    InsufficientHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Normal,
    /// One or more snapshots could not be read.
    Reduced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityTrend {
    pub path: String,
    pub samples: Vec<ComplexitySample>,
    /// Percent change from the first to the last sample.
    pub change_pct: Option<f64>,
    pub max_swing_pct: Option<f64>,
    pub class: TrendClass,
    pub skipped_samples: usize,
    pub confidence: Confidence,
}

impl ComplexityTrend {
    pub fn latest(&self) -> Option<&ComplexityScore> {
        self.samples.last().map(|s| &s.score)
    }
}
