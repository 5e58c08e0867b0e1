use serde::{Deserialize, Serialize};

/// Unordered pair of files that change together; `file_a < file_b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingPair {
    pub file_a: String,
    pub file_b: String,
    pub co_change_count: usize,
    pub changes_a: usize,
    pub changes_b: usize,
    pub strength: f64,
}

impl CouplingPair {
    pub fn involves(&self, path: &str) -> bool {
        self.file_a == path || self.file_b == path
    }

    pub fn peer_of(&self, path: &str) -> Option<&str> {
        if self.file_a == path {
            Some(&self.file_b)
        } else if self.file_b == path {
            Some(&self.file_a)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingCluster {
    pub members: Vec<String>,
    pub edge_count: usize,
    pub mean_strength: f64,
}

/// File with many strong temporal couplings ("god file").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouplingHub {
    pub path: String,
    pub degree: usize,
}
