use crate::error::{ForensicsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relative width below which a range claims more than two significant figures.
pub const MIN_RELATIVE_WIDTH: f64 = 0.01;

/// Empirical multiplier range with the research it comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierRange {
    pub low: f64,
    pub likely: f64,
    pub high: f64,
    #[serde(default)]
    pub citation: String,
}

impl MultiplierRange {
    pub fn new(low: f64, likely: f64, high: f64, citation: impl Into<String>) -> Self {
        Self {
            low,
            likely,
            high,
            citation: citation.into(),
        }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 1.0, 1.0, "")
    }

    /// Component-wise maximum, used when several drivers apply to one file.
    pub fn max(&self, other: &MultiplierRange) -> MultiplierRange {
        MultiplierRange {
            low: self.low.max(other.low),
            likely: self.likely.max(other.likely),
            high: self.high.max(other.high),
            citation: if other.likely > self.likely {
                other.citation.clone()
            } else {
                self.citation.clone()
            },
        }
    }

    pub fn validate(&self, name: &str, floor: f64) -> Result<()> {
        let values = [self.low, self.likely, self.high];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForensicsError::configuration(format!(
                "{name}: range values must be finite"
            )));
        }
        if self.low < floor {
            return Err(ForensicsError::configuration(format!(
                "{name}: low bound {} is below {floor}",
                self.low
            )));
        }
        if !(self.low <= self.likely && self.likely <= self.high) {
            return Err(ForensicsError::configuration(format!(
                "{name}: expected low <= likely <= high, got {} / {} / {}",
                self.low, self.likely, self.high
            )));
        }
        let width = (self.high - self.low) / self.likely;
        if self.likely <= 0.0 || width < MIN_RELATIVE_WIDTH {
            return Err(ForensicsError::configuration(format!(
                "{name}: range {}..{} is too narrow and implies false precision",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

/// Multipliers used by the cost translator. Configuration, not constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostModel {
    pub diffuse_ownership: MultiplierRange,
    pub hotspot: MultiplierRange,
    /// Hours lost per contributor in a week with concurrent edits.
    pub coordination_hours: MultiplierRange,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            diffuse_ownership: MultiplierRange::new(
                2.0,
                2.5,
                3.0,
                "Files with more than 9 contributors show 2-3x defect rates (Microsoft Research, organizational metrics)",
            ),
            hotspot: MultiplierRange::new(
                4.0,
                6.0,
                9.0,
                "High-change, high-complexity files carry 4-9x defect density (Tornhill, Your Code as a Crime Scene)",
            ),
            coordination_hours: MultiplierRange::new(
                0.5,
                1.0,
                1.5,
                "Coordination overhead per contributor-week on concurrently edited files",
            ),
        }
    }
}

impl CostModel {
    pub fn validate(&self) -> Result<()> {
        self.diffuse_ownership.validate("costModel.diffuseOwnership", 1.0)?;
        self.hotspot.validate("costModel.hotspot", 1.0)?;
        self.coordination_hours
            .validate("costModel.coordinationHours", 0.0)?;
        Ok(())
    }
}

/// Business inputs supplied by the caller for one estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostParameters {
    pub hourly_rate: f64,
    pub average_incident_cost: f64,
    pub team_size: usize,
    pub hours_per_change: f64,
    pub incidents_per_bug_fix: f64,
}

impl CostParameters {
    pub fn new(hourly_rate: f64, average_incident_cost: f64, team_size: usize) -> Self {
        Self {
            hourly_rate,
            average_incident_cost,
            team_size,
            hours_per_change: 2.0,
            incidents_per_bug_fix: 0.1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.hourly_rate.is_finite() && self.hourly_rate > 0.0) {
            return Err(ForensicsError::configuration(
                "hourly_rate must be a positive number",
            ));
        }
        if !(self.average_incident_cost.is_finite() && self.average_incident_cost >= 0.0) {
            return Err(ForensicsError::configuration(
                "average_incident_cost must not be negative",
            ));
        }
        if self.team_size == 0 {
            return Err(ForensicsError::configuration("team_size must be at least 1"));
        }
        if !(self.hours_per_change.is_finite() && self.hours_per_change > 0.0) {
            return Err(ForensicsError::configuration(
                "hours_per_change must be a positive number",
            ));
        }
        if !(0.0..=1.0).contains(&self.incidents_per_bug_fix) {
            return Err(ForensicsError::configuration(
                "incidents_per_bug_fix must be within 0..=1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostRange {
    pub low: f64,
    pub likely: f64,
    pub high: f64,
}

impl CostRange {
    pub fn zero() -> Self {
        Self {
            low: 0.0,
            likely: 0.0,
            high: 0.0,
        }
    }

    pub fn add(&self, other: &CostRange) -> CostRange {
        CostRange {
            low: self.low + other.low,
            likely: self.likely + other.likely,
            high: self.high + other.high,
        }
    }

    pub fn scale(&self, factor: f64) -> CostRange {
        CostRange {
            low: self.low * factor,
            likely: self.likely * factor,
            high: self.high * factor,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.high <= 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCost {
    pub path: String,
    pub maintenance: CostRange,
    pub incidents: CostRange,
    pub coordination: CostRange,
    pub total: CostRange,
    pub drivers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Annualised, rounded to two significant figures.
    pub total: CostRange,
    pub files: Vec<FileCost>,
    pub calibration_factor: Option<f64>,
    /// False when no file carries a cost driver. Only then is `total` allowed to
    /// collapse to the zero range (`low == high == 0`); an exposed estimate
    /// always keeps `low < high`.
    pub has_exposure: bool,
    pub assumptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub project: String,
    pub estimated_value: f64,
    pub actual_value: f64,
    pub recorded_at: DateTime<Utc>,
}
