//! Config editor tests: single-field isolation and recovery reset.

use sweep_harness::editor::{ConfigEditor, ParameterTarget, CANONICAL_CONFIG, REQUIRED_SECTIONS};
use sweep_harness::Error;

const ARTIFACT: &str = "\
; generated by the simulator setup
[configuration]
  display = 1
  robot = 5
  seed = 150
  step=1200

[environment]
  rows = 20
  columns = 20

[color]
  robot = 0,255,0
  goal = 50,50,50
";

fn artifact(text: &str) -> (tempfile::TempDir, ConfigEditor) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configuration.ini");
    std::fs::write(&path, text).unwrap();
    (dir, ConfigEditor::new(path))
}

fn changed_lines(before: &str, after: &str) -> Vec<(usize, String, String)> {
    assert_eq!(before.lines().count(), after.lines().count());
    before
        .lines()
        .zip(after.lines())
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, (a, b))| (i, a.to_string(), b.to_string()))
        .collect()
}

#[test]
fn test_set_parameter_changes_exactly_one_line() {
    let (_dir, editor) = artifact(ARTIFACT);
    editor.set_parameter(17).unwrap();

    let after = std::fs::read_to_string(editor.path()).unwrap();
    let diff = changed_lines(ARTIFACT, &after);
    assert_eq!(diff, vec![(3, "  robot = 5".to_string(), "  robot = 17".to_string())]);
    assert!(after.ends_with('\n'));
}

#[test]
fn test_same_named_field_in_other_section_untouched() {
    let (_dir, editor) = artifact(ARTIFACT);
    editor.set_parameter(2).unwrap();

    let after = std::fs::read_to_string(editor.path()).unwrap();
    assert!(after.contains("[color]\n  robot = 0,255,0\n"));
}

#[test]
fn test_repeated_edits_converge() {
    let (_dir, editor) = artifact(ARTIFACT);
    for n in 1..=10 {
        editor.set_parameter(n).unwrap();
        assert_eq!(editor.read_parameter().unwrap(), Some(n));
    }
    editor.set_parameter(5).unwrap();
    assert_eq!(std::fs::read_to_string(editor.path()).unwrap(), ARTIFACT);
}

#[test]
fn test_field_only_in_wrong_section_is_not_found() {
    let text = "[configuration]\n  seed = 1\n[color]\n  robot = 0,255,0\n";
    let (_dir, editor) = artifact(text);
    let err = editor.set_parameter(4).unwrap_err();
    assert!(matches!(
        err,
        Error::ConfigFieldNotFound { ref field, ref section }
            if field == "robot" && section == "configuration"
    ));
    assert_eq!(std::fs::read_to_string(editor.path()).unwrap(), text);
}

#[test]
fn test_custom_field_editor() {
    let (_dir, editor) = artifact(ARTIFACT);
    let rows = ConfigEditor::for_field(editor.path(), "environment", "rows");
    rows.set_parameter(40).unwrap();

    let after = std::fs::read_to_string(editor.path()).unwrap();
    assert!(after.contains("  rows = 40\n"));
    assert!(after.contains("  robot = 5\n"));
}

#[test]
fn test_reset_backs_up_and_writes_canonical() {
    let broken = "[configuration]\n  robot = 3\n[color]\n  robot = 0,255\n";
    let (_dir, editor) = artifact(broken);

    editor.reset_to_defaults().unwrap();

    assert_eq!(std::fs::read_to_string(editor.backup_path()).unwrap(), broken);
    let after = std::fs::read_to_string(editor.path()).unwrap();
    assert_eq!(after, CANONICAL_CONFIG);
    for section in REQUIRED_SECTIONS {
        assert!(after.contains(&format!("[{section}]")));
    }
    assert_eq!(editor.read_parameter().unwrap(), Some(5));
}

#[test]
fn test_reset_without_existing_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let editor = ConfigEditor::new(dir.path().join("parameters").join("configuration.ini"));

    // backup fails (nothing to copy) but reset still succeeds
    editor.reset_to_defaults().unwrap();
    assert!(!editor.backup_path().exists());
    assert_eq!(std::fs::read_to_string(editor.path()).unwrap(), CANONICAL_CONFIG);
}

#[test]
fn test_reset_into_unwritable_location_is_config_reset_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();
    let editor = ConfigEditor::new(blocker.join("configuration.ini"));

    assert!(matches!(editor.reset_to_defaults(), Err(Error::ConfigReset(_))));
}
