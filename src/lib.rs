//! Metrics engine over version-control history.
//!
//! History comes in through a [`HistorySource`]; [`run_analysis`] turns it
//! into an [`AnalysisReport`] with hotspots, temporal coupling, ownership,
//! coordination risk, complexity trends, test brittleness and an optional
//! debt-cost range.

pub mod analysis;
pub mod engine;
pub mod error;
pub mod models;
pub mod source;

pub use analysis::classifier::{
    CommitClassifier, CommitKind, ConventionalCommitClassifier, KeywordClassifier,
};
pub use engine::db::{
    calibration_factor, CalibrationStore, InMemoryCalibrationStore, SqliteCalibrationStore,
};
pub use engine::scoring::{analyze_repository, analyze_source, run_analysis, AnalysisRequest};
pub use engine::settings::{load_config, save_config, AnalysisConfig};
pub use error::{ForensicsError, Result};
pub use models::cost::{CalibrationRecord, CostParameters};
pub use models::ownership::TeamMapping;
pub use models::report::AnalysisReport;
pub use source::{
    extract_history, extract_history_with_timeout, FixtureHistory, GitHistorySource,
    HistorySource, HistoryWindow,
};
