//! Result store tests: persistence after every record, resumability,
//! corruption handling, canonical ordering.

use sweep_harness::experiment::{Outcome, ResultStore, RunRecord, RunStatus};
use sweep_harness::Error;

fn temp_path() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("simulation_results.json");
    (dir, path)
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_every_upsert_is_durable() {
    let (_dir, path) = temp_path();
    let mut store = ResultStore::load(&path).unwrap();

    store.upsert(RunRecord::new(1, Outcome::Steps(100))).unwrap();
    assert_eq!(ResultStore::load(&path).unwrap().len(), 1);

    store.upsert(RunRecord::new(2, Outcome::Timeout)).unwrap();
    let reloaded = ResultStore::load(&path).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.get(2).unwrap().status(), RunStatus::Failed);
}

#[test]
fn test_round_trip_preserves_records() {
    let (_dir, path) = temp_path();
    let mut store = ResultStore::load(&path).unwrap();
    for (n, outcome) in [
        (3, Outcome::Steps(50)),
        (1, Outcome::Steps(100)),
        (2, Outcome::ConfigCorrupted),
        (4, Outcome::Unknown),
    ] {
        store.upsert(RunRecord::new(n, outcome)).unwrap();
    }
    store.finalize().unwrap();

    let reloaded = ResultStore::load(&path).unwrap();
    assert_eq!(reloaded.records(), store.records());
}

#[test]
fn test_finalize_sorts_ascending() {
    let (_dir, path) = temp_path();
    let mut store = ResultStore::load(&path).unwrap();
    for n in [5, 2, 9, 1] {
        store.upsert(RunRecord::new(n, Outcome::Steps(u64::from(n) * 10))).unwrap();
    }
    store.finalize().unwrap();

    let order: Vec<u32> = ResultStore::load(&path)
        .unwrap()
        .records()
        .iter()
        .map(RunRecord::parameter)
        .collect();
    assert_eq!(order, vec![1, 2, 5, 9]);
}

#[test]
fn test_file_is_human_diffable_json() {
    let (_dir, path) = temp_path();
    let mut store = ResultStore::load(&path).unwrap();
    store.upsert(RunRecord::new(3, Outcome::Timeout)).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\n  {"), "expected pretty-printed JSON: {text}");
    assert!(text.contains("\"total_steps\": \"TIMEOUT\""));
    assert!(text.contains("\"status\": \"failed\""));
}

// =============================================================================
// Resumability
// =============================================================================

#[test]
fn test_pending_skips_success_and_failure() {
    let (_dir, path) = temp_path();
    let mut store = ResultStore::load(&path).unwrap();
    store.upsert(RunRecord::new(2, Outcome::Steps(60))).unwrap();
    store.upsert(RunRecord::new(4, Outcome::Timeout)).unwrap();

    let reopened = ResultStore::load(&path).unwrap();
    assert_eq!(reopened.pending(1..=5), vec![1, 3, 5]);
}

#[test]
fn test_clear_empties_file() {
    let (_dir, path) = temp_path();
    let mut store = ResultStore::load(&path).unwrap();
    store.upsert(RunRecord::new(1, Outcome::Steps(1))).unwrap();
    store.clear().unwrap();

    assert!(store.is_empty());
    assert!(ResultStore::load(&path).unwrap().is_empty());
    assert_eq!(store.pending(1..=2), vec![1, 2]);
}

// =============================================================================
// Corruption and legacy files
// =============================================================================

#[test]
fn test_blank_store_is_empty() {
    let (_dir, path) = temp_path();
    std::fs::write(&path, "   \n").unwrap();
    assert!(ResultStore::load(&path).unwrap().is_empty());
}

#[test]
fn test_corrupt_store_is_replaced_and_preserved() {
    let (dir, path) = temp_path();
    std::fs::write(&path, "[{\"num_robots\": 1, \"total_").unwrap();

    let store = ResultStore::load(&path).unwrap();
    assert!(store.is_empty());
    assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");

    let aside = dir.path().join("simulation_results.json.corrupt");
    assert!(std::fs::read_to_string(aside).unwrap().starts_with("[{"));
}

#[test]
fn test_legacy_string_steps_are_coerced() {
    let (_dir, path) = temp_path();
    std::fs::write(
        &path,
        r#"[
  {"num_robots": 1, "total_steps": "118", "status": "success", "timestamp": "2025-02-10 09:15:02"},
  {"num_robots": 2, "total_steps": 74, "timestamp": "2025-02-10 09:16:40"}
]"#,
    )
    .unwrap();

    let store = ResultStore::load(&path).unwrap();
    assert_eq!(store.get(1).unwrap().steps(), Some(118));
    assert_eq!(store.get(2).unwrap().steps(), Some(74));
    assert_eq!(store.with_status(RunStatus::Success).count(), 2);
}

#[test]
fn test_open_existing_requires_results() {
    let (_dir, path) = temp_path();
    assert!(matches!(
        ResultStore::open_existing(&path),
        Err(Error::NoResults(_))
    ));

    std::fs::write(&path, "[]").unwrap();
    assert!(matches!(
        ResultStore::open_existing(&path),
        Err(Error::NoResults(_))
    ));

    std::fs::write(&path, "{oops").unwrap();
    assert!(matches!(
        ResultStore::open_existing(&path),
        Err(Error::StoreCorrupt(_))
    ));
}

#[test]
fn test_with_status_filters_records() {
    let (_dir, path) = temp_path();
    let mut store = ResultStore::load(&path).unwrap();
    store.upsert(RunRecord::new(1, Outcome::Steps(90))).unwrap();
    store.upsert(RunRecord::new(2, Outcome::Timeout)).unwrap();
    store.upsert(RunRecord::new(3, Outcome::Steps(70))).unwrap();
    store.upsert(RunRecord::new(4, Outcome::Unknown)).unwrap();

    let succeeded: Vec<u32> = store
        .with_status(RunStatus::Success)
        .map(RunRecord::parameter)
        .collect();
    assert_eq!(succeeded, vec![1, 3]);
    assert_eq!(store.with_status(RunStatus::Unknown).count(), 1);
}
