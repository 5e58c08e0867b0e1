use crate::analysis::churn::{change_frequency, FileMetrics};
use crate::analysis::sampler::SamplingOutcome;
use crate::engine::settings::HotspotConfig;
use crate::models::risk::Hotspot;
use crate::source::HistoryWindow;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct HotspotInput {
    pub path: String,
    pub freq: f64,
    pub complexity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFile {
    pub freq: f64,
    pub complexity: f64,
    pub norm_freq: f64,
    pub norm_complexity: f64,
    pub risk: f64,
    pub is_hotspot: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HotspotOutcome {
    pub scores: BTreeMap<String, ScoredFile>,
    /// Files passing both floors, highest risk first.
    pub hotspots: Vec<Hotspot>,
}

/// Min-max normalise into [0, 1]. When every value is equal they all map to 1.0,
/// so the maximum is always exactly 1.0.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    values
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                1.0
            } else if *v >= max {
                1.0
            } else {
                ((v - min) / span).clamp(0.0, 1.0)
            }
        })
        .collect()
}

/// Normalise frequency and complexity independently, multiply, and rank.
///
/// Both factors must clear their floor, so trivial files that change often
/// (configuration, manifests) never rank as hotspots.
pub fn rank_hotspots(inputs: &[HotspotInput], config: &HotspotConfig) -> HotspotOutcome {
    let freqs: Vec<f64> = inputs.iter().map(|i| i.freq).collect();
    let complexities: Vec<f64> = inputs.iter().map(|i| i.complexity).collect();
    let norm_freqs = min_max_normalize(&freqs);
    let norm_complexities = min_max_normalize(&complexities);

    let mut outcome = HotspotOutcome::default();
    for (idx, input) in inputs.iter().enumerate() {
        let norm_freq = norm_freqs[idx];
        let norm_complexity = norm_complexities[idx];
        let risk = norm_freq * norm_complexity;
        let is_hotspot = norm_freq > config.min_norm_freq
            && norm_complexity > config.min_norm_complexity
            && input.complexity > 0.0;

        if is_hotspot {
            outcome.hotspots.push(Hotspot {
                path: input.path.clone(),
                risk,
                freq: input.freq,
                complexity: input.complexity,
                norm_freq,
                norm_complexity,
            });
        }

        outcome.scores.insert(
            input.path.clone(),
            ScoredFile {
                freq: input.freq,
                complexity: input.complexity,
                norm_freq,
                norm_complexity,
                risk,
                is_hotspot,
            },
        );
    }

    outcome.hotspots.sort_by(|a, b| {
        b.risk
            .partial_cmp(&a.risk)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    outcome
}

/// Hotspot ranking over every live file that has a latest complexity sample.
pub fn score_hotspots(
    metrics: &FileMetrics,
    sampling: &SamplingOutcome,
    window: &HistoryWindow,
    config: &HotspotConfig,
) -> HotspotOutcome {
    let inputs: Vec<HotspotInput> = metrics
        .live_files()
        .filter_map(|file| {
            sampling
                .latest_complexity(&file.path)
                .map(|complexity| HotspotInput {
                    path: file.path.clone(),
                    freq: change_frequency(file, window),
                    complexity,
                })
        })
        .collect();

    let outcome = rank_hotspots(&inputs, config);
    log::debug!(
        "{} of {} scored files are hotspots",
        outcome.hotspots.len(),
        inputs.len()
    );
    outcome
}
