use crate::engine::settings::{ComplexityConfig, TrendThresholds};
use crate::models::complexity::{
    ComplexitySample, ComplexityScore, ComplexityTrend, Confidence, TrendClass,
};

const DEFAULT_INDENT_UNIT: usize = 4;

/// Language-agnostic complexity proxies for one version of a file.
///
/// No parsing: line count, indentation depth and function-like declarations
/// only, so scores stay comparable across languages.
pub fn complexity_score(source: &str, config: &ComplexityConfig) -> ComplexityScore {
    let lines: Vec<&str> = source.lines().collect();
    let unit = indent_unit(&lines);

    let mut loc = 0usize;
    let mut depth_total = 0.0;
    for line in lines.iter().filter(|l| !l.trim().is_empty()) {
        loc += 1;
        depth_total += indent_depth(line, unit);
    }
    let avg_indent_depth = if loc == 0 { 0.0 } else { depth_total / loc as f64 };

    let mut function_count = 0usize;
    let mut long_function_count = 0usize;
    for (idx, line) in lines.iter().enumerate() {
        if !is_function_declaration(line.trim()) {
            continue;
        }
        function_count += 1;
        if function_length(&lines, idx, unit) > config.long_function_loc {
            long_function_count += 1;
        }
    }

    let value = loc as f64 * config.loc_weight
        + avg_indent_depth * config.indent_weight
        + function_count as f64 * config.function_weight
        + long_function_count as f64 * config.long_function_weight;

    ComplexityScore {
        loc,
        avg_indent_depth,
        function_count,
        long_function_count,
        value,
    }
}

// Smallest non-zero run of leading spaces; files indented with tabs fall back to the default.
fn indent_unit(lines: &[&str]) -> usize {
    lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| *c == ' ').count())
        .filter(|n| *n > 0)
        .min()
        .map(|n| n.clamp(2, 8))
        .unwrap_or(DEFAULT_INDENT_UNIT)
}

fn indent_depth(line: &str, unit: usize) -> f64 {
    let mut tabs = 0usize;
    let mut spaces = 0usize;
    for c in line.chars() {
        match c {
            '\t' => tabs += 1,
            ' ' => spaces += 1,
            _ => break,
        }
    }
    tabs as f64 + spaces as f64 / unit as f64
}

fn is_function_declaration(line: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "fn ", "pub fn ", "pub(crate) fn ", "async fn ", "pub async fn ",
        "def ", "async def ", "func ", "function ", "async function ",
        "export function ", "export async function ", "export default function ",
        "sub ", "fun ", "private fun ", "public fun ",
    ];
    const CONTROL: &[&str] = &[
        "if", "else", "for", "while", "switch", "match", "catch", "return", "do", "try",
        "elif", "with", "new", "throw", "case", "loop",
    ];

    if PREFIXES.iter().any(|p| line.starts_with(p)) {
        return true;
    }

    // Method-like signatures: `name(args) {` (C-family, Java, C#, JS methods)
    if !(line.ends_with('{') && line.contains('(') && line.contains(')')) {
        return false;
    }
    if line.contains('=') && !line.contains("=>") {
        return false;
    }
    let Some(before_paren) = line.split('(').next() else {
        return false;
    };
    let words: Vec<&str> = before_paren.split_whitespace().collect();
    match (words.first(), words.last()) {
        (Some(first), Some(name)) => {
            let first = first.trim_start_matches('}');
            !CONTROL.contains(&first)
                && !CONTROL.contains(name)
                && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        }
        _ => false,
    }
}

/// Lines from the declaration until the next line at the same or lower indentation
/// that is not just closing punctuation.
fn function_length(lines: &[&str], start: usize, unit: usize) -> usize {
    let base = indent_depth(lines[start], unit);
    let mut end = lines.len();

    for (offset, line) in lines[start + 1..].iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if indent_depth(line, unit) <= base && !is_closing(trimmed) {
            end = start + 1 + offset;
            break;
        }
    }

    lines[start..end].iter().filter(|l| !l.trim().is_empty()).count()
}

fn is_closing(trimmed: &str) -> bool {
    trimmed == "end"
        || trimmed
            .chars()
            .all(|c| matches!(c, '}' | ')' | ']' | ';' | ','))
}

/// Classify a complexity time series.
///
/// Bands (percent change from first to last sample): `<= improving_pct` is
/// improving, `>= deteriorating_pct` is deteriorating, within `±stable_pct`
/// is stable, anything between is drifting. A swing above `volatility_pct`
/// between consecutive samples overrides all of them.
pub fn classify_trend(
    path: &str,
    samples: Vec<ComplexitySample>,
    skipped_samples: usize,
    thresholds: &TrendThresholds,
) -> ComplexityTrend {
    let confidence = if skipped_samples > 0 {
        Confidence::Reduced
    } else {
        Confidence::Normal
    };

    if samples.len() < thresholds.min_snapshots {
        return ComplexityTrend {
            path: path.to_string(),
            samples,
            change_pct: None,
            max_swing_pct: None,
            class: TrendClass::InsufficientHistory,
            skipped_samples,
            confidence,
        };
    }

    let values: Vec<f64> = samples.iter().map(|s| s.score.value).collect();
    let change = percent_change(values[0], values[values.len() - 1]);
    let max_swing = values
        .windows(2)
        .map(|w| percent_change(w[0], w[1]).abs())
        .fold(0.0_f64, f64::max);

    let class = if max_swing > thresholds.volatility_pct {
        TrendClass::Volatile
    } else {
        class_for_change(change, thresholds)
    };

    ComplexityTrend {
        path: path.to_string(),
        samples,
        change_pct: Some(change),
        max_swing_pct: Some(max_swing),
        class,
        skipped_samples,
        confidence,
    }
}

pub fn class_for_change(change_pct: f64, thresholds: &TrendThresholds) -> TrendClass {
    if change_pct <= thresholds.improving_pct {
        TrendClass::Improving
    } else if change_pct >= thresholds.deteriorating_pct {
        TrendClass::Deteriorating
    } else if change_pct.abs() <= thresholds.stable_pct {
        TrendClass::Stable
    } else {
        TrendClass::Drifting
    }
}

fn percent_change(from: f64, to: f64) -> f64 {
    if from.abs() < f64::EPSILON {
        if to.abs() < f64::EPSILON {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        (to - from) / from * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn score(value: f64) -> ComplexityScore {
        ComplexityScore {
            loc: 0,
            avg_indent_depth: 0.0,
            function_count: 0,
            long_function_count: 0,
            value,
        }
    }

    fn samples(values: &[f64]) -> Vec<ComplexitySample> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| ComplexitySample {
                timestamp: t0 + Duration::days(30 * i as i64),
                commit_id: format!("c{i}"),
                score: score(*v),
            })
            .collect()
    }

    #[test]
    fn empty_source_has_no_functions() {
        let result = complexity_score("", &ComplexityConfig::default());
        assert_eq!(result.function_count, 0);
        assert_eq!(result.loc, 0);
        assert_eq!(result.value, 0.0);
    }

    #[test]
    fn detects_functions_across_languages() {
        let config = ComplexityConfig::default();
        let rust = "fn simple() {\n    42\n}\npub fn other() {\n}\n";
        let python = "def foo():\n    if x:\n        pass\n\nasync def bar():\n    pass\n";
        let go = "func main() {\n\tfmt.Println(\"x\")\n}\n";
        let java = "public int size() {\n    if (x) {\n        return 1;\n    }\n    return 0;\n}\n";

        assert_eq!(complexity_score(rust, &config).function_count, 2);
        assert_eq!(complexity_score(python, &config).function_count, 2);
        assert_eq!(complexity_score(go, &config).function_count, 1);
        assert_eq!(complexity_score(java, &config).function_count, 1);
    }

    #[test]
    fn control_flow_is_not_a_function() {
        let source = "if (ready) {\n}\nwhile (x) {\n}\n} else if (y) {\n}\nfor (i = 0; i < n; i++) {\n}\n";
        let result = complexity_score(source, &ComplexityConfig::default());
        assert_eq!(result.function_count, 0);
    }

    #[test]
    fn measures_indentation_in_units() {
        let source = "a\n    b\n        c\n";
        let result = complexity_score(source, &ComplexityConfig::default());
        assert_eq!(result.loc, 3);
        assert!((result.avg_indent_depth - 1.0).abs() < 1e-9);

        let tabs = "a\n\tb\n\t\tc\n";
        let result = complexity_score(tabs, &ComplexityConfig::default());
        assert!((result.avg_indent_depth - 1.0).abs() < 1e-9);
    }

    #[test]
    fn counts_long_functions() {
        let mut config = ComplexityConfig::default();
        config.long_function_loc = 5;

        let mut source = String::from("fn long() {\n");
        for i in 0..10 {
            source.push_str(&format!("    let x{i} = {i};\n"));
        }
        source.push_str("}\nfn short() {\n    1\n}\n");

        let result = complexity_score(&source, &config);
        assert_eq!(result.function_count, 2);
        assert_eq!(result.long_function_count, 1);
    }

    #[test]
    fn score_is_deterministic_weighted_sum() {
        let config = ComplexityConfig::default();
        let source = "def foo():\n    return 1\n";
        let a = complexity_score(source, &config);
        let b = complexity_score(source, &config);
        assert_eq!(a, b);

        let expected = 2.0 * config.loc_weight + 0.5 * config.indent_weight + config.function_weight;
        assert!((a.value - expected).abs() < 1e-9);
    }

    #[test]
    fn boundary_values_classify_explicitly() {
        let t = TrendThresholds::default();
        assert_eq!(class_for_change(-20.0, &t), TrendClass::Improving);
        assert_eq!(class_for_change(-19.999, &t), TrendClass::Drifting);
        assert_eq!(class_for_change(-10.0, &t), TrendClass::Stable);
        assert_eq!(class_for_change(-10.001, &t), TrendClass::Drifting);
        assert_eq!(class_for_change(0.0, &t), TrendClass::Stable);
        assert_eq!(class_for_change(10.0, &t), TrendClass::Stable);
        assert_eq!(class_for_change(10.001, &t), TrendClass::Drifting);
        assert_eq!(class_for_change(20.0, &t), TrendClass::Deteriorating);
        assert_eq!(class_for_change(f64::INFINITY, &t), TrendClass::Deteriorating);
    }

    #[test]
    fn fewer_than_three_samples_is_insufficient() {
        let t = TrendThresholds::default();
        let trend = classify_trend("a.rs", samples(&[10.0, 20.0]), 0, &t);
        assert_eq!(trend.class, TrendClass::InsufficientHistory);
        assert_eq!(trend.change_pct, None);
    }

    #[test]
    fn gradual_growth_deteriorates_without_volatility() {
        let t = TrendThresholds::default();
        let trend = classify_trend("a.rs", samples(&[100.0, 110.0, 120.0, 130.0]), 0, &t);
        assert_eq!(trend.class, TrendClass::Deteriorating);
        assert!((trend.change_pct.unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn large_swing_overrides_to_volatile() {
        let t = TrendThresholds::default();
        let trend = classify_trend("a.rs", samples(&[100.0, 130.0, 100.0]), 0, &t);
        assert_eq!(trend.class, TrendClass::Volatile);
        assert!((trend.change_pct.unwrap()).abs() < 1e-9);
    }

    #[test]
    fn gradual_decline_improves_and_flat_is_stable() {
        let t = TrendThresholds::default();
        let improving = classify_trend("a.rs", samples(&[100.0, 90.0, 80.0, 75.0]), 0, &t);
        assert_eq!(improving.class, TrendClass::Improving);

        let stable = classify_trend("a.rs", samples(&[100.0, 102.0, 99.0, 104.0]), 1, &t);
        assert_eq!(stable.class, TrendClass::Stable);
        assert_eq!(stable.confidence, Confidence::Reduced);
    }
}
