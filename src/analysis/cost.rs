use crate::error::Result;
use crate::models::cost::{CostEstimate, CostModel, CostParameters, CostRange, FileCost, MultiplierRange};
use std::cmp::Ordering;

/// What the translator needs to know about one scored file.
#[derive(Debug, Clone, PartialEq)]
pub struct CostInput {
    pub path: String,
    pub commits: usize,
    pub bug_fix_commits: usize,
    pub contributors: usize,
    pub is_hotspot: bool,
    pub diffuse_ownership: bool,
    pub coordination_score: f64,
    pub concurrent_weeks: usize,
}

fn magnitude(value: f64) -> f64 {
    10f64.powi(value.abs().log10().floor() as i32 - 1)
}

pub fn floor_sig2(value: f64) -> f64 {
    if value <= 0.0 {
        return 0.0;
    }
    let scale = magnitude(value);
    (value / scale).floor() * scale
}

pub fn ceil_sig2(value: f64) -> f64 {
    if value <= 0.0 {
        return 0.0;
    }
    let scale = magnitude(value);
    (value / scale).ceil() * scale
}

pub fn round_sig2(value: f64) -> f64 {
    if value <= 0.0 {
        return 0.0;
    }
    let scale = magnitude(value);
    (value / scale).round() * scale
}

/// Two significant figures, rounded outwards so the range never narrows.
pub fn round_range(range: &CostRange) -> CostRange {
    let low = floor_sig2(range.low);
    let high = ceil_sig2(range.high);
    CostRange {
        low,
        likely: round_sig2(range.likely).clamp(low, high),
        high,
    }
}

/// Share of effort attributable to the multiplier: `(m - 1) / m`.
fn excess(multiplier: f64) -> f64 {
    if multiplier <= 1.0 {
        0.0
    } else {
        (multiplier - 1.0) / multiplier
    }
}

fn excess_range(base: f64, m: &MultiplierRange) -> CostRange {
    CostRange {
        low: base * excess(m.low),
        likely: base * excess(m.likely),
        high: base * excess(m.high),
    }
}

fn file_cost(
    input: &CostInput,
    model: &CostModel,
    params: &CostParameters,
    annual: f64,
) -> FileCost {
    let mut drivers = Vec::new();
    let mut multiplier = MultiplierRange::identity();
    if input.is_hotspot {
        multiplier = multiplier.max(&model.hotspot);
        drivers.push("hotspot".to_string());
    }
    if input.diffuse_ownership {
        multiplier = multiplier.max(&model.diffuse_ownership);
        drivers.push("diffuse_ownership".to_string());
    }

    let maintenance_base =
        annual * input.commits as f64 * params.hours_per_change * params.hourly_rate;
    let incident_base = annual
        * input.bug_fix_commits as f64
        * params.incidents_per_bug_fix
        * params.average_incident_cost;

    let contributor_weeks = input.coordination_score
        * annual
        * input.concurrent_weeks as f64
        * input.contributors.min(params.team_size) as f64;
    let hours = &model.coordination_hours;
    let coordination = CostRange {
        low: contributor_weeks * hours.low * params.hourly_rate,
        likely: contributor_weeks * hours.likely * params.hourly_rate,
        high: contributor_weeks * hours.high * params.hourly_rate,
    };
    if !coordination.is_zero() {
        drivers.push("coordination".to_string());
    }

    let maintenance = excess_range(maintenance_base, &multiplier);
    let incidents = excess_range(incident_base, &multiplier);
    let total = maintenance.add(&incidents).add(&coordination);

    FileCost {
        path: input.path.clone(),
        maintenance,
        incidents,
        coordination,
        total,
        drivers,
    }
}

/// Annualised excess cost ranges for every file with an applicable driver.
///
/// `window_days` annualises the observed activity. The calibration factor, when
/// present, scales every range before rounding.
pub fn translate_costs(
    inputs: &[CostInput],
    model: &CostModel,
    params: &CostParameters,
    window_days: f64,
    calibration_factor: Option<f64>,
) -> Result<CostEstimate> {
    params.validate()?;
    model.validate()?;

    let annual = 365.0 / window_days.max(1.0);
    let factor = calibration_factor.unwrap_or(1.0);

    let mut raw_total = CostRange::zero();
    let mut files: Vec<FileCost> = Vec::new();
    for input in inputs {
        let cost = file_cost(input, model, params, annual);
        if cost.total.is_zero() {
            continue;
        }
        raw_total = raw_total.add(&cost.total);
        files.push(FileCost {
            maintenance: round_range(&cost.maintenance.scale(factor)),
            incidents: round_range(&cost.incidents.scale(factor)),
            coordination: round_range(&cost.coordination.scale(factor)),
            total: round_range(&cost.total.scale(factor)),
            ..cost
        });
    }

    files.sort_by(|a, b| {
        b.total
            .likely
            .partial_cmp(&a.total.likely)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });

    let has_exposure = !raw_total.is_zero();
    let total = if has_exposure {
        round_range(&raw_total.scale(factor))
    } else {
        CostRange::zero()
    };

    let mut assumptions = vec![
        format!("hourly rate {:.2}", params.hourly_rate),
        format!("average incident cost {:.2}", params.average_incident_cost),
        format!("team size {}", params.team_size),
        format!("{:.1} hours per change", params.hours_per_change),
        format!("{:.2} incidents per bug-fix commit", params.incidents_per_bug_fix),
        format!("annualised from a {window_days:.0}-day window"),
    ];
    for range in [&model.hotspot, &model.diffuse_ownership, &model.coordination_hours] {
        if !range.citation.is_empty() {
            assumptions.push(range.citation.clone());
        }
    }
    if let Some(f) = calibration_factor {
        assumptions.push(format!("calibrated by a factor of {f:.2} from past actuals"));
    }
    if !has_exposure {
        assumptions.push("no file carries a cost driver; the range is zero".to_string());
    }

    log::debug!(
        "cost translation: {} of {} files carry exposure",
        files.len(),
        inputs.len()
    );

    Ok(CostEstimate {
        total,
        files,
        calibration_factor,
        has_exposure,
        assumptions,
    })
}
