//! Property-based tests for sweep-harness
//!
//! - Config edits touch one line and nothing else
//! - Empirical optima are true minima of their metrics
//! - Run with ProptestConfig::with_cases(100)

use proptest::prelude::*;
use sweep_harness::analysis::Analyzer;
use sweep_harness::editor::{ConfigEditor, ParameterTarget};
use sweep_harness::experiment::{Outcome, RunRecord};

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Filler `key = value` lines that never define `robot`
fn arb_filler() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(
        ("[a-qs-z][a-z]{0,7}", "[0-9a-z,]{0,12}", 0usize..4)
            .prop_map(|(k, v, indent)| format!("{}{k} = {v}", " ".repeat(indent))),
        0..6,
    )
}

/// Artifact with the sweep field placed among random filler
fn arb_artifact() -> impl Strategy<Value = String> {
    (arb_filler(), arb_filler(), arb_filler(), 1u32..500).prop_map(|(before, after, other, n)| {
        let mut lines = vec!["[configuration]".to_string()];
        lines.extend(before);
        lines.push(format!("  robot = {n}"));
        lines.extend(after);
        lines.push("[color]".to_string());
        lines.push("  robot = 0,255,0".to_string());
        lines.extend(other);
        lines.join("\n") + "\n"
    })
}

/// Successful measurements over distinct parameters
fn arb_observations() -> impl Strategy<Value = Vec<(u32, u64)>> {
    proptest::collection::btree_map(1u32..60, 1u64..5000, 1..20)
        .prop_map(|m| m.into_iter().collect())
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: set_parameter changes exactly one line
    #[test]
    fn prop_set_parameter_isolates_field(text in arb_artifact(), value in 1u32..10_000) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configuration.ini");
        std::fs::write(&path, &text).unwrap();

        ConfigEditor::new(&path).set_parameter(value).unwrap();
        let after = std::fs::read_to_string(&path).unwrap();

        let before_lines: Vec<&str> = text.lines().collect();
        let after_lines: Vec<&str> = after.lines().collect();
        prop_assert_eq!(before_lines.len(), after_lines.len());

        let changed: Vec<usize> = (0..before_lines.len())
            .filter(|&i| before_lines[i] != after_lines[i])
            .collect();
        prop_assert!(changed.len() <= 1);
        let expected = format!("  robot = {value}");
        prop_assert!(after_lines.contains(&expected.as_str()));
        prop_assert!(after.contains("[color]\n  robot = 0,255,0\n"));
    }

    /// Property: reported optima minimize their metrics
    #[test]
    fn prop_optima_are_minimal(obs in arb_observations()) {
        let records: Vec<RunRecord> = obs
            .iter()
            .map(|&(n, s)| RunRecord::new(n, Outcome::Steps(s)))
            .collect();
        let report = Analyzer::new().analyze(&records).unwrap();

        for o in &report.observations {
            prop_assert!(report.fastest.steps <= o.steps);
            prop_assert!(report.most_efficient.efficiency() <= o.efficiency());
            prop_assert!(report.best_balanced.balance() <= o.balance());
        }
        prop_assert_eq!(report.recommendation, report.best_balanced.parameter);
        prop_assert_eq!(report.observations.len(), obs.len());
    }
}
