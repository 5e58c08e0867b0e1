pub mod brittleness;
pub mod churn;
pub mod classifier;
pub mod complexity;
pub mod coordination;
pub mod cost;
pub mod coupling;
pub mod hotspot;
pub mod knowledge;
pub mod sampler;
