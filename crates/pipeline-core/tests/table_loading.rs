//! Loading custom status tables from disk

use std::io::Write;

use telecrm_pipeline_core::{PipelineError, StatusTable, TableViolation};

const SHOWROOM_TABLE: &str = r#"
statuses:
  - id: walk_in
    label: Walk-in
    priority: 1
    allowed_transitions: [trial, left_store]
  - id: trial
    label: Trial
    note_required: true
    priority: 2
    allowed_transitions: [billed, left_store]
    note_templates:
      - Tried three necklace sets.
  - id: billed
    label: Billed
    is_terminal: true
    priority: 3
  - id: left_store
    label: Left Store
    is_terminal: true
    note_required: true
    priority: 4
"#;

fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_yaml_table_from_file() {
    let file = write_temp(".yaml", SHOWROOM_TABLE);
    let table = StatusTable::load_from_file(file.path()).unwrap();

    assert_eq!(table.len(), 4);
    assert!(table.can_transition("walk_in", "trial"));
    assert_eq!(table.note_templates("trial"), vec!["Tried three necklace sets."]);
    assert!(table.validate_transition("trial", "billed", None).is_ok());
    assert!(matches!(
        table.validate_transition("trial", "left_store", None),
        Err(PipelineError::NoteRequired { .. })
    ));
}

#[test]
fn test_load_json_table_from_file() {
    let json = r#"[
        {"id": "open", "label": "Open", "allowedTransitions": ["closed"], "priority": 1},
        {"id": "closed", "label": "Closed", "isTerminal": true, "priority": 2}
    ]"#;
    let file = write_temp(".json", json);
    let table = StatusTable::load_from_file(file.path()).unwrap();
    assert!(table.can_transition("open", "closed"));
}

#[test]
fn test_dangling_reference_in_file_is_rejected() {
    let yaml = r#"
statuses:
  - id: open
    label: Open
    allowed_transitions: [archived]
"#;
    let file = write_temp(".yml", yaml);
    let err = StatusTable::load_from_file(file.path()).unwrap_err();
    match err {
        PipelineError::InvalidTable { violations } => {
            assert_eq!(
                violations,
                vec![TableViolation::DanglingTransition {
                    from: "open".into(),
                    to: "archived".into()
                }]
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let err = StatusTable::load_from_file("/nonexistent/pipeline.yaml").unwrap_err();
    assert!(matches!(err, PipelineError::TableIo { .. }));
}
