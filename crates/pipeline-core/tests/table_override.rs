//! Replacing the process-wide table through the environment
//!
//! The default table is loaded once per process, so this file holds a
//! single test.

use std::io::Write;

use telecrm_pipeline_core::{
    TABLE_PATH_ENV, can_transition_to, default_table, get_next_possible_statuses, get_status_by_id,
};

const KIOSK_TABLE: &str = r#"
statuses:
  - id: enquiry
    label: Enquiry
    priority: 1
    allowed_transitions: [booked]
  - id: booked
    label: Booked
    is_terminal: true
    note_required: true
    priority: 2
"#;

#[test]
fn test_env_table_replaces_default() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("telecrm_pipeline_core=debug")
        .with_test_writer()
        .try_init();

    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(KIOSK_TABLE.as_bytes()).unwrap();

    unsafe {
        std::env::set_var(TABLE_PATH_ENV, file.path());
    }

    assert_eq!(default_table().len(), 2);
    assert!(can_transition_to("enquiry", "booked"));
    assert!(get_status_by_id("new_uncontacted").is_none());
    assert_eq!(get_next_possible_statuses("enquiry")[0].id, "booked");
}
