pub mod brittleness;
pub mod commit;
pub mod complexity;
pub mod coupling;
pub mod cost;
pub mod file_history;
pub mod ownership;
pub mod report;
pub mod risk;
