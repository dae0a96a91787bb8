//! Analyzer tests: empirical optima, model fit, report shape.

use sweep_harness::analysis::{Analyzer, DEFAULT_CURVE_SAMPLES};
use sweep_harness::experiment::{Outcome, RunRecord};
use sweep_harness::Error;

fn records(points: &[(u32, u64)]) -> Vec<RunRecord> {
    points
        .iter()
        .map(|&(n, s)| RunRecord::new(n, Outcome::Steps(s)))
        .collect()
}

/// Index of the first minimum of `key` over `points`, computed directly.
fn expected_argmin(points: &[(u32, u64)], key: impl Fn(u32, u64) -> f64) -> u32 {
    let mut best = points[0];
    for &p in &points[1..] {
        if key(p.0, p.1) < key(best.0, best.1) {
            best = p;
        }
    }
    best.0
}

const SAMPLE: [(u32, u64); 5] = [(1, 100), (2, 60), (3, 50), (4, 55), (5, 70)];

// ============================================================================
// Empirical optima
// ============================================================================

#[test]
fn test_empirical_optima_match_their_definitions() {
    let report = Analyzer::new().analyze(&records(&SAMPLE)).unwrap();

    assert_eq!(report.fastest.parameter, 3);
    assert_eq!(report.fastest.steps, 50);
    assert_eq!(
        report.most_efficient.parameter,
        expected_argmin(&SAMPLE, |n, s| s as f64 / f64::from(n))
    );
    assert_eq!(report.most_efficient.parameter, 4);
    assert_eq!(
        report.best_balanced.parameter,
        expected_argmin(&SAMPLE, |n, s| s as f64 * f64::from(n).sqrt())
    );
    assert_eq!(report.best_balanced.parameter, 2);
    assert_eq!(report.recommendation, 2);

    assert_eq!(report.baseline.parameter, 1);
    assert!((report.speedup_percent - 50.0).abs() < 1e-9);
    assert_eq!(report.tested, 5);
}

#[test]
fn test_model_optimum_stays_in_tested_range() {
    let report = Analyzer::new().analyze(&records(&SAMPLE)).unwrap();
    let model = report.model.expect("five distinct points fit");
    if let Some(optimum) = model.optimum {
        assert!((1.0..=5.0).contains(&optimum.parameter));
        assert!((optimum.predicted_steps - model.fit.predict(optimum.parameter)).abs() < 1e-9);
    }
    assert_eq!(report.curve.len(), DEFAULT_CURVE_SAMPLES);
}

#[test]
fn test_exact_model_recovers_optimum() {
    // 2520 is divisible by every n in 1..=10
    let points: Vec<(u32, u64)> = (1..=10u32)
        .map(|n| (n, 2520 / u64::from(n) + 10 + 40 * u64::from(n)))
        .collect();
    let report = Analyzer::new().analyze(&records(&points)).unwrap();

    let model = report.model.unwrap();
    assert!((model.fit.a - 2520.0).abs() < 1e-4);
    assert!((model.fit.b - 10.0).abs() < 1e-4);
    assert!((model.fit.c - 40.0).abs() < 1e-4);
    let optimum = model.optimum.unwrap();
    assert!((optimum.parameter - 63.0f64.sqrt()).abs() < 1e-4);
}

#[test]
fn test_optimum_outside_range_is_not_reported() {
    // sqrt(2520 / 1) is far above the tested 1..=5
    let points: Vec<(u32, u64)> = (1..=5u32)
        .map(|n| (n, 2520 / u64::from(n) + 10 + u64::from(n)))
        .collect();
    let report = Analyzer::new().analyze(&records(&points)).unwrap();

    let model = report.model.unwrap();
    assert!(model.fit.minimizer().unwrap() > 5.0);
    assert!(model.optimum.is_none());
    assert!(!report.curve.is_empty());
}

#[test]
fn test_two_points_skip_fit_but_keep_metrics() {
    let report = Analyzer::new()
        .analyze(&records(&[(2, 80), (4, 60)]))
        .unwrap();

    assert!(report.model.is_none());
    assert!(report.curve.is_empty());
    assert_eq!(report.fastest.parameter, 4);
    assert_eq!(report.most_efficient.parameter, 4);
    assert_eq!(report.recommendation, report.best_balanced.parameter);
    assert!(report.to_string().contains("No predictive model could be fitted"));
}

#[test]
fn test_single_success_is_enough_for_metrics() {
    let report = Analyzer::new().analyze(&records(&[(7, 300)])).unwrap();
    assert_eq!(report.fastest.parameter, 7);
    assert!(report.model.is_none());
    assert!(report.speedup_percent.abs() < f64::EPSILON);
}

// ============================================================================
// Non-success records
// ============================================================================

#[test]
fn test_failures_excluded_from_metrics_but_listed() {
    let mut all = records(&[(1, 100), (3, 50), (5, 70)]);
    all.push(RunRecord::new(2, Outcome::Timeout));
    all.push(RunRecord::new(4, Outcome::ConfigCorrupted));
    all.push(RunRecord::new(6, Outcome::Unknown));

    let report = Analyzer::new().analyze(&all).unwrap();

    let measured: Vec<u32> = report.observations.iter().map(|o| o.parameter).collect();
    assert_eq!(measured, vec![1, 3, 5]);
    assert_eq!(report.failed_parameters, vec![2, 4]);
    assert_eq!(report.unknown_parameters, vec![6]);
    assert_eq!(report.tested, 6);
    assert_eq!(report.fastest.parameter, 3);
}

#[test]
fn test_no_successful_runs_is_insufficient_data() {
    let all = vec![
        RunRecord::new(1, Outcome::Timeout),
        RunRecord::new(2, Outcome::Crashed),
    ];
    let err = Analyzer::new().analyze(&all).unwrap_err();
    assert!(matches!(err, Error::InsufficientData { found: 0, .. }));

    assert!(Analyzer::new().analyze(&[]).is_err());
}

// ============================================================================
// Report output
// ============================================================================

#[test]
fn test_report_serializes_for_plotting() {
    let report = Analyzer::new()
        .with_curve_samples(11)
        .analyze(&records(&SAMPLE))
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["recommendation"], 2);
    assert_eq!(json["fastest"]["parameter"], 3);
    assert_eq!(json["observations"].as_array().unwrap().len(), 5);
    assert_eq!(json["curve"].as_array().unwrap().len(), 11);
    assert!(json["model"]["fit"]["r_squared"].is_number());
}

#[test]
fn test_report_text_names_every_operating_point() {
    let text = Analyzer::new().analyze(&records(&SAMPLE)).unwrap().to_string();
    assert!(text.contains("Fastest: 3 (50 steps)"));
    assert!(text.contains("Most efficient: 4 (55 steps"));
    assert!(text.contains("Best balance: 2 (60 steps)"));
    assert!(text.contains("Recommendation: 2"));
}
