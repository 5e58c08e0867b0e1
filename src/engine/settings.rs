use crate::error::{ForensicsError, Result};
use crate::models::cost::CostModel;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

const SETTINGS_SCHEMA_VERSION: i64 = 2;

/// Research thresholds in this domain assume a twelve month lookback.
pub const FULL_WINDOW_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplexityConfig {
    pub loc_weight: f64,
    pub indent_weight: f64,
    pub function_weight: f64,
    pub long_function_weight: f64,
    pub long_function_loc: usize,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            loc_weight: 0.05,
            indent_weight: 2.0,
            function_weight: 0.5,
            long_function_weight: 3.0,
            long_function_loc: 50,
        }
    }
}

/// Percent bands for trend classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrendThresholds {
    pub improving_pct: f64,
    pub stable_pct: f64,
    pub deteriorating_pct: f64,
    pub volatility_pct: f64,
    pub min_snapshots: usize,
}

impl Default for TrendThresholds {
    fn default() -> Self {
        Self {
            improving_pct: -20.0,
            stable_pct: 10.0,
            deteriorating_pct: 20.0,
            volatility_pct: 15.0,
            min_snapshots: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HotspotConfig {
    pub min_norm_freq: f64,
    pub min_norm_complexity: f64,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            min_norm_freq: 0.1,
            min_norm_complexity: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CouplingConfig {
    pub minimum_threshold: usize,
    pub max_files_per_commit: usize,
    pub cluster_strength: f64,
    pub hub_min_degree: usize,
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            minimum_threshold: 3,
            max_files_per_commit: 20,
            cluster_strength: 0.5,
            hub_min_degree: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OwnershipConfig {
    pub coverage_threshold: f64,
    pub primary_share: f64,
    pub single_owner_share: f64,
    pub dominant_owner_share: f64,
    pub diffuse_contributors: usize,
    pub inactive_owner_days: u32,
}

impl Default for OwnershipConfig {
    fn default() -> Self {
        Self {
            coverage_threshold: 0.8,
            primary_share: 0.5,
            single_owner_share: 0.8,
            dominant_owner_share: 0.6,
            diffuse_contributors: 9,
            inactive_owner_days: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoordinationWeights {
    pub contributors: f64,
    pub teams: f64,
    pub concurrency: f64,
    /// Concurrent weeks at which the concurrency term saturates.
    pub concurrency_weeks_cap: usize,
}

impl Default for CoordinationWeights {
    fn default() -> Self {
        Self {
            contributors: 0.4,
            teams: 0.3,
            concurrency: 0.3,
            concurrency_weeks_cap: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrittlenessConfig {
    pub healthy_max: f64,
    pub elevated_max: f64,
    pub min_production_changes: usize,
}

impl Default for BrittlenessConfig {
    fn default() -> Self {
        Self {
            healthy_max: 1.0,
            elevated_max: 2.0,
            min_production_changes: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    pub schema_version: i64,
    pub window_days: u32,
    pub snapshot_cadence_days: u32,
    pub exclude_patterns: Vec<String>,
    pub complexity: ComplexityConfig,
    pub trend: TrendThresholds,
    pub hotspot: HotspotConfig,
    pub coupling: CouplingConfig,
    pub ownership: OwnershipConfig,
    pub coordination: CoordinationWeights,
    pub brittleness: BrittlenessConfig,
    pub cost_model: CostModel,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            schema_version: SETTINGS_SCHEMA_VERSION,
            window_days: FULL_WINDOW_DAYS,
            snapshot_cadence_days: 30,
            exclude_patterns: Vec::new(),
            complexity: ComplexityConfig::default(),
            trend: TrendThresholds::default(),
            hotspot: HotspotConfig::default(),
            coupling: CouplingConfig::default(),
            ownership: OwnershipConfig::default(),
            coordination: CoordinationWeights::default(),
            brittleness: BrittlenessConfig::default(),
            cost_model: CostModel::default(),
        }
    }
}

impl AnalysisConfig {
    /// Fail fast on out-of-range settings, before any history is read.
    pub fn validate(&self) -> Result<()> {
        if self.window_days == 0 {
            return Err(ForensicsError::configuration("windowDays must be at least 1"));
        }
        if self.snapshot_cadence_days == 0 {
            return Err(ForensicsError::configuration(
                "snapshotCadenceDays must be at least 1",
            ));
        }
        self.exclude_matchers()?;

        let c = &self.complexity;
        for (name, weight) in [
            ("complexity.locWeight", c.loc_weight),
            ("complexity.indentWeight", c.indent_weight),
            ("complexity.functionWeight", c.function_weight),
            ("complexity.longFunctionWeight", c.long_function_weight),
        ] {
            ensure_non_negative(name, weight)?;
        }
        if c.long_function_loc == 0 {
            return Err(ForensicsError::configuration(
                "complexity.longFunctionLoc must be at least 1",
            ));
        }

        let t = &self.trend;
        if !(t.improving_pct < -t.stable_pct
            && t.stable_pct >= 0.0
            && t.stable_pct < t.deteriorating_pct)
        {
            return Err(ForensicsError::configuration(
                "trend bands must satisfy improvingPct < -stablePct <= 0 <= stablePct < deterioratingPct",
            ));
        }
        if !(t.volatility_pct > 0.0) {
            return Err(ForensicsError::configuration("trend.volatilityPct must be positive"));
        }
        if t.min_snapshots < 2 {
            return Err(ForensicsError::configuration("trend.minSnapshots must be at least 2"));
        }

        ensure_unit("hotspot.minNormFreq", self.hotspot.min_norm_freq)?;
        ensure_unit("hotspot.minNormComplexity", self.hotspot.min_norm_complexity)?;

        let k = &self.coupling;
        if k.minimum_threshold == 0 {
            return Err(ForensicsError::configuration(
                "coupling.minimumThreshold must be at least 1",
            ));
        }
        if k.max_files_per_commit < 2 {
            return Err(ForensicsError::configuration(
                "coupling.maxFilesPerCommit must be at least 2",
            ));
        }
        if !(k.cluster_strength > 0.0 && k.cluster_strength <= 1.0) {
            return Err(ForensicsError::configuration(
                "coupling.clusterStrength must be within (0, 1]",
            ));
        }
        if k.hub_min_degree == 0 {
            return Err(ForensicsError::configuration(
                "coupling.hubMinDegree must be at least 1",
            ));
        }

        let o = &self.ownership;
        if !(o.coverage_threshold > 0.0 && o.coverage_threshold <= 1.0) {
            return Err(ForensicsError::configuration(format!(
                "ownership.coverageThreshold must be within (0, 1], got {}",
                o.coverage_threshold
            )));
        }
        if !(o.primary_share >= 0.5 && o.primary_share < 1.0) {
            return Err(ForensicsError::configuration(
                "ownership.primaryShare must be within [0.5, 1)",
            ));
        }
        if !(o.dominant_owner_share > 0.0
            && o.dominant_owner_share < o.single_owner_share
            && o.single_owner_share <= 1.0)
        {
            return Err(ForensicsError::configuration(
                "ownership shares must satisfy 0 < dominantOwnerShare < singleOwnerShare <= 1",
            ));
        }
        if o.diffuse_contributors == 0 {
            return Err(ForensicsError::configuration(
                "ownership.diffuseContributors must be at least 1",
            ));
        }

        let w = &self.coordination;
        for (name, weight) in [
            ("coordination.contributors", w.contributors),
            ("coordination.teams", w.teams),
            ("coordination.concurrency", w.concurrency),
        ] {
            ensure_non_negative(name, weight)?;
        }
        if w.contributors + w.concurrency <= f64::EPSILON {
            return Err(ForensicsError::configuration(
                "coordination weights for contributors and concurrency cannot both be zero",
            ));
        }
        if w.concurrency_weeks_cap == 0 {
            return Err(ForensicsError::configuration(
                "coordination.concurrencyWeeksCap must be at least 1",
            ));
        }

        let b = &self.brittleness;
        if !(b.healthy_max > 0.0 && b.healthy_max < b.elevated_max) {
            return Err(ForensicsError::configuration(
                "brittleness bands must satisfy 0 < healthyMax < elevatedMax",
            ));
        }

        self.cost_model.validate()
    }

    pub fn exclude_matchers(&self) -> Result<Vec<glob::Pattern>> {
        self.exclude_patterns
            .iter()
            .map(|raw| {
                glob::Pattern::new(raw).map_err(|e| {
                    ForensicsError::configuration(format!("invalid exclude pattern '{raw}': {e}"))
                })
            })
            .collect()
    }

    pub fn is_full_window(&self) -> bool {
        self.window_days >= FULL_WINDOW_DAYS
    }
}

fn ensure_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ForensicsError::configuration(format!(
            "{name} must be a non-negative number, got {value}"
        )))
    }
}

fn ensure_unit(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(ForensicsError::configuration(format!(
            "{name} must be within [0, 1), got {value}"
        )))
    }
}

/// Load settings from a JSON file, filling gaps with defaults. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    let original = if path.exists() {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str::<Value>(&raw)?
    } else {
        json!({})
    };

    let config = config_from_value(original)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &AnalysisConfig) -> Result<()> {
    config.validate()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}

/// Migrate and merge a raw settings document, then deserialize it.
pub fn config_from_value(input: Value) -> Result<AnalysisConfig> {
    let migrated = migrate_settings(input);
    Ok(serde_json::from_value(migrated)?)
}

fn migrate_settings(input: Value) -> Value {
    let defaults = default_settings();
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    let version = out
        .get("schemaVersion")
        .and_then(Value::as_i64)
        .unwrap_or(SETTINGS_SCHEMA_VERSION);

    if version < 2 {
        migrate_coverage_from_percentage(&mut out);
    }

    deep_merge_defaults(&mut out, &defaults);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schemaVersion".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    serde_json::to_value(AnalysisConfig::default()).unwrap_or_else(|_| json!({}))
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

// Schema v1 stored the truck-factor coverage as a percentage.
fn migrate_coverage_from_percentage(settings: &mut Value) {
    let Some(ownership) = settings.get_mut("ownership").and_then(Value::as_object_mut) else {
        return;
    };

    if let Some(v) = ownership.get("coverageThreshold").and_then(Value::as_f64) {
        if v > 1.0 {
            ownership.insert("coverageThreshold".to_string(), json!(v / 100.0));
        }
    }
}
