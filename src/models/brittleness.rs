use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrittlenessBand {
    Healthy,
    Elevated,
    Brittle,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrittlenessRatio {
    pub test_path: String,
    pub production_path: String,
    pub test_changes: usize,
    pub production_changes: usize,
    /// Test commits that did not touch the production file.
    pub solo_test_changes: usize,
    pub ratio: Option<f64>,
    pub band: BrittlenessBand,
}
